//! Diagnostic report model and parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::{EnsembleMetadata, GenerationPassId, ValidationMetadata};

/// Errors that can occur when loading reports.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to read report file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Report validation failed: {0}")]
    ValidationError(String),
}

/// The named narrative sections of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionId {
    ExecutiveBrief,
    Scenarios,
    Options,
    ExecutionPlan,
    ValueLedger,
    EvidenceRegister,
}

impl SectionId {
    pub const ALL: [SectionId; 6] = [
        SectionId::ExecutiveBrief,
        SectionId::Scenarios,
        SectionId::Options,
        SectionId::ExecutionPlan,
        SectionId::ValueLedger,
        SectionId::EvidenceRegister,
    ];

    /// Field name used in findings and serialized reports.
    pub fn key(&self) -> &'static str {
        match self {
            SectionId::ExecutiveBrief => "executive_brief",
            SectionId::Scenarios => "scenarios",
            SectionId::Options => "options",
            SectionId::ExecutionPlan => "execution_plan",
            SectionId::ValueLedger => "value_ledger",
            SectionId::EvidenceRegister => "evidence_register",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            SectionId::ExecutiveBrief => "executive brief",
            SectionId::Scenarios => "scenario analysis",
            SectionId::Options => "decision options",
            SectionId::ExecutionPlan => "execution plan",
            SectionId::ValueLedger => "value ledger",
            SectionId::EvidenceRegister => "evidence register",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }
}

/// Narrative text of a report. Missing sections deserialize as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Sections {
    #[serde(default)]
    pub executive_brief: String,
    #[serde(default)]
    pub scenarios: String,
    #[serde(default)]
    pub options: String,
    #[serde(default)]
    pub execution_plan: String,
    #[serde(default)]
    pub value_ledger: String,
    #[serde(default)]
    pub evidence_register: String,
}

impl Sections {
    pub fn get(&self, id: SectionId) -> &str {
        match id {
            SectionId::ExecutiveBrief => &self.executive_brief,
            SectionId::Scenarios => &self.scenarios,
            SectionId::Options => &self.options,
            SectionId::ExecutionPlan => &self.execution_plan,
            SectionId::ValueLedger => &self.value_ledger,
            SectionId::EvidenceRegister => &self.evidence_register,
        }
    }

    pub fn is_blank(&self, id: SectionId) -> bool {
        self.get(id).trim().is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SectionId, &str)> + '_ {
        SectionId::ALL.into_iter().map(move |id| (id, self.get(id)))
    }
}

/// Self-assessed quality of a report, each score on a 0-100 scale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Integrity {
    pub completeness: f64,
    pub evidence_quality: f64,
    pub confidence: f64,
    #[serde(default)]
    pub missing_data: Vec<String>,
}

impl Default for Integrity {
    fn default() -> Self {
        Self {
            completeness: 0.0,
            evidence_quality: 0.0,
            confidence: 0.0,
            missing_data: Vec::new(),
        }
    }
}

impl Integrity {
    /// Scores by name, for range checks and error messages.
    pub fn scores(&self) -> [(&'static str, f64); 3] {
        [
            ("completeness", self.completeness),
            ("evidence_quality", self.evidence_quality),
            ("confidence", self.confidence),
        ]
    }

    /// First score that is not a finite number in [0, 100].
    pub fn out_of_range(&self) -> Option<(&'static str, f64)> {
        self.scores()
            .into_iter()
            .find(|(_, v)| !v.is_finite() || *v < 0.0 || *v > 100.0)
    }
}

/// A generated diagnostic report (decision packet).
///
/// Produced by an external generator. Validation only ever attaches
/// `validation`; the merge path attaches `ensemble` and recomputes
/// `integrity`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Generation pass that produced this variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_id: Option<GenerationPassId>,

    /// Headline diagnosis identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis_code: Option<String>,

    #[serde(default)]
    pub sections: Sections,

    pub integrity: Integrity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationMetadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensemble: Option<EnsembleMetadata>,
}

impl DiagnosticReport {
    pub fn new(sections: Sections, integrity: Integrity) -> Self {
        Self {
            sections,
            integrity,
            ..Self::default()
        }
    }

    /// Parse a report from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ReportError> {
        let report: DiagnosticReport = serde_yaml::from_str(yaml)?;
        report.validate()?;
        Ok(report)
    }

    /// Parse a report from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        let report: DiagnosticReport = serde_json::from_str(json)?;
        report.validate()?;
        Ok(report)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load by extension: `.json` as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Self::from_json_file(path)
        } else {
            Self::from_yaml_file(path)
        }
    }

    /// Check the collaborator contract: integrity scores are 0-100.
    pub fn validate(&self) -> Result<(), ReportError> {
        if let Some((name, value)) = self.integrity.out_of_range() {
            return Err(ReportError::ValidationError(format!(
                "integrity.{} must be within 0-100, got {}",
                name, value
            )));
        }
        if self.integrity.missing_data.iter().any(|m| m.trim().is_empty()) {
            return Err(ReportError::ValidationError(
                "integrity.missing_data contains an empty label".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy of this report with `metadata` attached.
    pub fn with_validation(&self, metadata: ValidationMetadata) -> Self {
        Self {
            validation: Some(metadata),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_REPORT: &str = r#"
id: "pkt-001"
sections:
  executive_brief: "Cash runway is approximately 6 months."
  options: "Option 1: Refinance."
integrity:
  completeness: 80
  evidence_quality: 70
  confidence: 65
  missing_data:
    - "Monthly P&L"
"#;

    #[test]
    fn test_parse_valid_report() {
        let report = DiagnosticReport::from_yaml(VALID_REPORT).unwrap();
        assert_eq!(report.id.as_deref(), Some("pkt-001"));
        assert_eq!(report.integrity.evidence_quality, 70.0);
        assert_eq!(report.sections.get(SectionId::Options), "Option 1: Refinance.");
        // Absent sections are empty, not errors
        assert!(report.sections.is_blank(SectionId::ValueLedger));
        assert!(report.validation.is_none());
    }

    #[test]
    fn test_integrity_out_of_range_rejected() {
        let json = r#"{"integrity": {"completeness": 120, "evidence_quality": 50, "confidence": 50}}"#;
        let result = DiagnosticReport::from_json(json);
        assert!(matches!(result, Err(ReportError::ValidationError(_))));
    }

    #[test]
    fn test_missing_integrity_rejected() {
        let result = DiagnosticReport::from_json(r#"{"sections": {}}"#);
        assert!(matches!(result, Err(ReportError::JsonError(_))));
    }

    #[test]
    fn test_section_keys_round_trip() {
        for id in SectionId::ALL {
            assert_eq!(SectionId::from_key(id.key()), Some(id));
        }
        assert_eq!(SectionId::from_key("integrity.confidence"), None);
    }

    #[test]
    fn test_with_validation_leaves_original_untouched() {
        let report = DiagnosticReport::from_yaml(VALID_REPORT).unwrap();
        let validated = report.with_validation(ValidationMetadata::perfect(Default::default()));
        assert!(report.validation.is_none());
        assert!(validated.validation.is_some());
        assert_eq!(validated.sections, report.sections);
        assert_eq!(validated.integrity, report.integrity);
    }
}
