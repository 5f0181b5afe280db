//! Ensemble mode and validation configuration.
//!
//! [`ValidationConfig`] is a plain value threaded into every run. The
//! process-wide [`ModeRegistry`] only hands out snapshots of it; a run never
//! reads the registry after it has started, so concurrent runs cannot observe
//! a half-applied change.

use std::fmt;
use std::str::FromStr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unknown ensemble mode '{0}' (expected off, 3pass or 5pass)")]
    UnknownMode(String),

    #[error("Consensus threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("Value variance percent must be a non-negative number, got {0}")]
    InvalidVariancePercent(f64),
}

/// How many analytical passes run over a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnsembleMode {
    /// Kill switch: no lens runs, the result is a fixed perfect verdict.
    #[default]
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "3pass")]
    ThreePass,
    #[serde(rename = "5pass")]
    FivePass,
}

impl EnsembleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnsembleMode::Off => "off",
            EnsembleMode::ThreePass => "3pass",
            EnsembleMode::FivePass => "5pass",
        }
    }

    /// Whether validation does anything in this mode.
    pub fn is_active(&self) -> bool {
        !matches!(self, EnsembleMode::Off)
    }

    /// Number of passes the mode implies. `off` still counts the single
    /// generation pass.
    pub fn pass_count(&self) -> usize {
        match self {
            EnsembleMode::Off => 1,
            EnsembleMode::ThreePass => 3,
            EnsembleMode::FivePass => 5,
        }
    }
}

impl fmt::Display for EnsembleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnsembleMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(EnsembleMode::Off),
            "3pass" | "3" => Ok(EnsembleMode::ThreePass),
            "5pass" | "5" => Ok(EnsembleMode::FivePass),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Thresholds for declaring material disagreement between report variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisagreementThresholds {
    /// Coefficient of variation (in percent) above which a numeric field
    /// counts as materially divergent.
    #[serde(default = "default_value_variance_percent")]
    pub value_variance_percent: f64,

    /// Flag variants whose upside/downside ordering flips.
    #[serde(default = "default_true")]
    pub roi_flip_detection: bool,

    /// Flag variants that disagree on the headline diagnosis code.
    #[serde(default = "default_true")]
    pub diagnosis_code_mismatch: bool,
}

impl Default for DisagreementThresholds {
    fn default() -> Self {
        Self {
            value_variance_percent: default_value_variance_percent(),
            roi_flip_detection: true,
            diagnosis_code_mismatch: true,
        }
    }
}

/// Run-scoped validation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub mode: EnsembleMode,

    /// Produce the developer QA record and log registry changes.
    #[serde(default)]
    pub enable_dev_panel: bool,

    /// Degrade to a fallback verdict instead of returning lens faults.
    #[serde(default = "default_true")]
    pub fallback_on_error: bool,

    /// Mean lens score below which the lenses are considered in disagreement.
    #[serde(default = "default_consensus_threshold")]
    pub consensus_threshold: f64,

    #[serde(default)]
    pub material_disagreement_thresholds: DisagreementThresholds,
}

fn default_true() -> bool {
    true
}

fn default_consensus_threshold() -> f64 {
    0.7
}

fn default_value_variance_percent() -> f64 {
    30.0
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            mode: EnsembleMode::Off,
            enable_dev_panel: false,
            fallback_on_error: true,
            consensus_threshold: default_consensus_threshold(),
            material_disagreement_thresholds: DisagreementThresholds::default(),
        }
    }
}

impl ValidationConfig {
    /// Default configuration with the given mode.
    pub fn with_mode(mode: EnsembleMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.mode.is_active()
    }

    pub fn pass_count(&self) -> usize {
        self.mode.pass_count()
    }

    /// Reject values that would make scoring meaningless.
    pub fn check(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.consensus_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.consensus_threshold));
        }
        let variance = self.material_disagreement_thresholds.value_variance_percent;
        if !variance.is_finite() || variance < 0.0 {
            return Err(ConfigError::InvalidVariancePercent(variance));
        }
        Ok(())
    }

    /// Shallow-merge a patch into this configuration.
    pub fn apply(&mut self, patch: &ConfigPatch) {
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(dev) = patch.enable_dev_panel {
            self.enable_dev_panel = dev;
        }
        if let Some(fallback) = patch.fallback_on_error {
            self.fallback_on_error = fallback;
        }
        if let Some(threshold) = patch.consensus_threshold {
            self.consensus_threshold = threshold;
        }
        if let Some(thresholds) = &patch.material_disagreement_thresholds {
            self.material_disagreement_thresholds = thresholds.clone();
        }
    }
}

/// Partial update for [`ModeRegistry::set`]. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<EnsembleMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_dev_panel: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_on_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_disagreement_thresholds: Option<DisagreementThresholds>,
}

impl ConfigPatch {
    pub fn mode(mode: EnsembleMode) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }
}

/// Shared, mutable holder of the current [`ValidationConfig`].
///
/// Accessors return copies. Hand the copy to a run instead of reading the
/// registry from inside it.
#[derive(Debug, Default)]
pub struct ModeRegistry {
    inner: RwLock<ValidationConfig>,
}

impl ModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidationConfig) -> Self {
        Self {
            inner: RwLock::new(config),
        }
    }

    /// Snapshot of the current configuration.
    pub fn get(&self) -> ValidationConfig {
        self.read().clone()
    }

    /// Merge `patch` into the current configuration.
    pub fn set(&self, patch: ConfigPatch) {
        let mut config = self.write();
        let before = config.mode;
        config.apply(&patch);
        if config.enable_dev_panel {
            tracing::debug!(
                from = %before,
                to = %config.mode,
                patch = ?patch,
                "Validation config updated"
            );
        }
    }

    /// Restore compiled-in defaults.
    pub fn reset(&self) {
        *self.write() = ValidationConfig::default();
    }

    pub fn is_active(&self) -> bool {
        self.read().is_active()
    }

    pub fn pass_count(&self) -> usize {
        self.read().pass_count()
    }

    fn read(&self) -> RwLockReadGuard<'_, ValidationConfig> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ValidationConfig> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

lazy_static! {
    static ref GLOBAL_REGISTRY: ModeRegistry = ModeRegistry::new();
}

/// The process-wide registry.
pub fn global() -> &'static ModeRegistry {
    &GLOBAL_REGISTRY
}
