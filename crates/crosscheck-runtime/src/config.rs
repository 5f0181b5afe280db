//! Configuration for crosscheck-runtime.
//!
//! Precedence, lowest first: compiled-in defaults, the config file,
//! `CROSSCHECK_*` environment variables, then whatever the caller (usually the
//! CLI) applies on top.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crosscheck_core::{ConfigPatch, EnsembleMode, ValidationConfig};

use crate::RuntimeError;

/// Environment variable names.
pub const ENV_MODE: &str = "CROSSCHECK_MODE";
pub const ENV_DEV_PANEL: &str = "CROSSCHECK_DEV_PANEL";
pub const ENV_FALLBACK_ON_ERROR: &str = "CROSSCHECK_FALLBACK_ON_ERROR";
pub const ENV_CONSENSUS_THRESHOLD: &str = "CROSSCHECK_CONSENSUS_THRESHOLD";

/// Runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Validation settings handed to every run
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Ensemble generation settings
    #[serde(default)]
    pub ensemble: EnsembleConfig,

    /// Determinism configuration
    #[serde(default)]
    pub determinism: DeterminismConfig,
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, RuntimeError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validation.check()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, RuntimeError> {
        let config: RuntimeConfig = serde_json::from_str(json)?;
        config.validation.check()?;
        Ok(config)
    }

    /// Load by extension: `.json` as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    /// Apply `CROSSCHECK_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), RuntimeError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Unset variables are ignored; set but unparseable ones are errors.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), RuntimeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut patch = ConfigPatch::default();

        if let Some(mode) = lookup(ENV_MODE) {
            patch.mode = Some(mode.parse::<EnsembleMode>()?);
        }
        if let Some(value) = lookup(ENV_DEV_PANEL) {
            patch.enable_dev_panel = Some(parse_bool(ENV_DEV_PANEL, &value)?);
        }
        if let Some(value) = lookup(ENV_FALLBACK_ON_ERROR) {
            patch.fallback_on_error = Some(parse_bool(ENV_FALLBACK_ON_ERROR, &value)?);
        }
        if let Some(value) = lookup(ENV_CONSENSUS_THRESHOLD) {
            let threshold = value.trim().parse::<f64>().map_err(|_| RuntimeError::InvalidEnv {
                name: ENV_CONSENSUS_THRESHOLD.to_string(),
                value: value.clone(),
            })?;
            patch.consensus_threshold = Some(threshold);
        }

        self.validation.apply(&patch);
        self.validation.check()?;
        Ok(())
    }

    /// The QA timestamp: the configured one, else now.
    pub fn validated_at(&self) -> DateTime<Utc> {
        self.determinism.validated_at.unwrap_or_else(Utc::now)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, RuntimeError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(RuntimeError::InvalidEnv {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Ensemble generation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Timeout for a single generation pass
    #[serde(with = "humantime_serde", default = "default_pass_timeout")]
    pub pass_timeout: Duration,

    /// Budget for the whole ensemble, fallback included
    #[serde(with = "humantime_serde", default = "default_total_timeout")]
    pub total_timeout: Duration,
}

fn default_pass_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_total_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            pass_timeout: default_pass_timeout(),
            total_timeout: default_total_timeout(),
        }
    }
}

/// Determinism configuration for reproducible QA records.
///
/// ```yaml
/// determinism:
///   validated_at: "2025-12-20T10:00:00Z"
/// ```
///
/// When `validated_at` is None (default), the current system time is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeterminismConfig {
    /// Fixed timestamp recorded in QA records (ISO 8601)
    #[serde(default)]
    pub validated_at: Option<DateTime<Utc>>,
}

// Custom serialization for Duration using humantime format
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.validation.mode, EnsembleMode::Off);
        assert_eq!(config.ensemble.pass_timeout, Duration::from_secs(60));
        assert!(config.determinism.validated_at.is_none());
    }

    #[test]
    fn test_from_yaml() {
        let config = RuntimeConfig::from_yaml(
            r#"
validation:
  mode: 5pass
  consensus_threshold: 0.6
  material_disagreement_thresholds:
    value_variance_percent: 25
ensemble:
  pass_timeout: 45s
  total_timeout: 4m
"#,
        )
        .unwrap();

        assert_eq!(config.validation.mode, EnsembleMode::FivePass);
        assert_eq!(config.validation.consensus_threshold, 0.6);
        assert!(config.validation.fallback_on_error);
        assert_eq!(
            config.validation.material_disagreement_thresholds.value_variance_percent,
            25.0
        );
        assert!(config.validation.material_disagreement_thresholds.roi_flip_detection);
        assert_eq!(config.ensemble.pass_timeout, Duration::from_secs(45));
        assert_eq!(config.ensemble.total_timeout, Duration::from_secs(240));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let err = RuntimeConfig::from_yaml("validation:\n  mode: 4pass\n").unwrap_err();
        assert!(matches!(err, RuntimeError::Yaml(_)));
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let err = RuntimeConfig::from_json(r#"{"validation": {"consensus_threshold": 2.0}}"#)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RuntimeConfig::default();
        config
            .apply_env_from(env(&[
                (ENV_MODE, "3pass"),
                (ENV_DEV_PANEL, "true"),
                (ENV_FALLBACK_ON_ERROR, "0"),
                (ENV_CONSENSUS_THRESHOLD, "0.55"),
            ]))
            .unwrap();

        assert_eq!(config.validation.mode, EnsembleMode::ThreePass);
        assert!(config.validation.enable_dev_panel);
        assert!(!config.validation.fallback_on_error);
        assert_eq!(config.validation.consensus_threshold, 0.55);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let mut config = RuntimeConfig::default();
        assert!(matches!(
            config.apply_env_from(env(&[(ENV_MODE, "sometimes")])),
            Err(RuntimeError::Config(_))
        ));
        assert!(matches!(
            config.apply_env_from(env(&[(ENV_DEV_PANEL, "maybe")])),
            Err(RuntimeError::InvalidEnv { .. })
        ));
    }

    #[test]
    fn test_determinism_config_serialization() {
        use chrono::TimeZone;

        let mut config = RuntimeConfig::default();
        let fixed_time = Utc.with_ymd_and_hms(2025, 12, 20, 10, 0, 0).unwrap();
        config.determinism.validated_at = Some(fixed_time);

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("validated_at"));
        assert!(json.contains("\"1m\""));

        let parsed: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.validated_at(), fixed_time);
    }
}
