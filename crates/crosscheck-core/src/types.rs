//! Core types for crosscheck validation.
//!
//! These are the data structures shared by the lenses, the detector, the
//! ensemble merge and the runner.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::mode::EnsembleMode;

/// Validation lenses, in the order the runner executes them.
///
/// Synthesis must stay last: it reads every earlier result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LensId {
    #[serde(rename = "CONSISTENCY_LENS")]
    Consistency,
    #[serde(rename = "AUDIT_LENS")]
    Audit,
    #[serde(rename = "RISK_LENS")]
    Risk,
    #[serde(rename = "VALUE_LENS")]
    Value,
    #[serde(rename = "SYNTHESIS_LENS")]
    Synthesis,
}

impl LensId {
    pub fn as_str(&self) -> &'static str {
        match self {
            LensId::Consistency => "CONSISTENCY_LENS",
            LensId::Audit => "AUDIT_LENS",
            LensId::Risk => "RISK_LENS",
            LensId::Value => "VALUE_LENS",
            LensId::Synthesis => "SYNTHESIS_LENS",
        }
    }
}

impl fmt::Display for LensId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation passes used when several report variants are produced for the
/// same intake.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GenerationPassId {
    #[serde(rename = "CORE_DIAGNOSTIC")]
    CoreDiagnostic,
    #[serde(rename = "RISK_AUDIT")]
    RiskAudit,
    #[serde(rename = "VALUE_LENS")]
    ValueLens,
    #[serde(rename = "AUDIT_LENS")]
    AuditLens,
    #[serde(rename = "SYNTHESIS")]
    Synthesis,
}

impl GenerationPassId {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationPassId::CoreDiagnostic => "CORE_DIAGNOSTIC",
            GenerationPassId::RiskAudit => "RISK_AUDIT",
            GenerationPassId::ValueLens => "VALUE_LENS",
            GenerationPassId::AuditLens => "AUDIT_LENS",
            GenerationPassId::Synthesis => "SYNTHESIS",
        }
    }
}

impl fmt::Display for GenerationPassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a single finding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// What a finding is about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    RunwayMismatch,
    UndefinedOptionReference,
    SignalNotCarried,
    MissingProvenance,
    MissingValuationMethod,
    UnlabeledProbabilities,
    IncompleteEvidenceRegister,
    UnacknowledgedMissingData,
    RiskNotAddressed,
    DownsideWithoutUrgency,
    DebtNotAddressed,
    RecoveryNotReferenced,
    InvestmentWithoutReturn,
    UpsideWithoutGrowthPlan,
    PriorLensError,
    WarningAccumulation,
    ConfidenceDivergence,
}

/// A single observation made by one lens. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: FindingKind,

    pub severity: Severity,

    /// Report field the finding is about (a section key or an integrity path)
    pub field: String,

    pub message: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_fields: Vec<String>,
}

impl Finding {
    pub fn new(
        kind: FindingKind,
        severity: Severity,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            field: field.into(),
            message: message.into(),
            related_fields: Vec::new(),
        }
    }

    pub fn info(kind: FindingKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Info, field, message)
    }

    pub fn warning(kind: FindingKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, field, message)
    }

    pub fn error(kind: FindingKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, field, message)
    }

    /// Attach the other fields the finding cross-references.
    pub fn related<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.related_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

/// What a lens returns before the runner stamps it into a [`LensResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub findings: Vec<Finding>,
    pub score: f64,
}

/// The outcome of one lens invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LensResult {
    pub lens_id: LensId,

    pub success: bool,

    pub findings: Vec<Finding>,

    /// Lens score in [0, 1]
    pub score: f64,

    /// Wall-clock time of the invocation. Observability only, never scored.
    pub execution_time_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LensResult {
    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }
}

/// A report field flagged by more than one lens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDiff {
    pub field: String,
    pub lenses: Vec<LensId>,
    pub warnings: usize,
    pub errors: usize,
}

/// The verdict attached to a validated report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationMetadata {
    pub ensemble_mode: EnsembleMode,

    /// Mean lens score in [0, 1]
    pub consensus_score: f64,

    /// Blend of stated evidence quality and the audit lens, in [0, 1]
    pub evidence_score: f64,

    /// The report should not be trusted without human review
    pub material_disagreement: bool,

    /// The validation pipeline itself failed; the scores carry no analysis
    #[serde(default)]
    pub system_fault: bool,

    #[serde(default)]
    pub disagreement_notes: Vec<String>,

    #[serde(default)]
    pub follow_up_questions: Vec<String>,

    #[serde(default)]
    pub field_diffs: Vec<FieldDiff>,
}

impl ValidationMetadata {
    /// Note prefix used for fallback verdicts.
    pub const FALLBACK_NOTE_PREFIX: &'static str = "Validation fallback";

    /// Fixed result for runs where no lens executes.
    pub fn perfect(mode: EnsembleMode) -> Self {
        Self {
            ensemble_mode: mode,
            consensus_score: 1.0,
            evidence_score: 1.0,
            material_disagreement: false,
            system_fault: false,
            disagreement_notes: Vec::new(),
            follow_up_questions: Vec::new(),
            field_diffs: Vec::new(),
        }
    }

    /// Untrusted result returned when the pipeline fails.
    pub fn fallback(mode: EnsembleMode, error: &str) -> Self {
        Self {
            ensemble_mode: mode,
            consensus_score: 0.0,
            evidence_score: 0.0,
            material_disagreement: true,
            system_fault: true,
            disagreement_notes: vec![format!("{}: {}", Self::FALLBACK_NOTE_PREFIX, error)],
            follow_up_questions: Vec::new(),
            field_diffs: Vec::new(),
        }
    }
}

/// A comparable value pulled out of one report variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// Agreement of one field across report variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldComparison {
    pub field: String,

    /// Values in variant order
    pub values: Vec<FieldValue>,

    /// Coefficient of variation in percent (0 for text fields)
    pub variance: f64,

    /// Agreement in [0, 1]
    pub agreement_score: f64,

    pub selected_value: FieldValue,

    pub selection_reason: String,
}

/// Metadata attached to a report reconciled from several generated variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnsembleMetadata {
    pub ensemble_mode: EnsembleMode,
    pub consensus_score: f64,
    pub material_disagreement: bool,
    #[serde(default)]
    pub disagreement_notes: Vec<String>,
    #[serde(default)]
    pub field_comparisons: Vec<FieldComparison>,
    pub pass_count: usize,
    pub passes_completed: usize,
    pub fallback_used: bool,
    pub execution_time_total_ms: u64,
}
