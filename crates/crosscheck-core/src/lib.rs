//! # crosscheck-core
//!
//! Deterministic multi-pass validation of generated diagnostic reports.
//!
//! This crate re-examines a decision packet through independent lenses and
//! answers:
//! - Do the lenses agree with the packet and with each other?
//! - Is the disagreement material enough to need human review?
//! - What should be asked next?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same report and config always produce the same metadata
//! 2. **Additive**: The report is copied, never mutated; only `validation` is attached
//! 3. **Run-scoped config**: Runs take a [`ValidationConfig`] value, never a global
//! 4. **Fail-safe**: A lens fault yields a fallback verdict unless fallback is disabled
//!
//! ## Example
//!
//! ```rust,ignore
//! use crosscheck_core::{validate, DiagnosticReport, EnsembleMode, ValidationConfig};
//!
//! let report = DiagnosticReport::from_yaml_file("packet.yaml")?;
//! let config = ValidationConfig::with_mode(EnsembleMode::FivePass);
//! let validated = validate(&report, &config)?;
//!
//! if let Some(meta) = &validated.validation {
//!     println!("consensus {:.2}, material: {}", meta.consensus_score, meta.material_disagreement);
//! }
//! ```

pub mod detector;
pub mod ensemble;
pub mod followup;
pub mod lenses;
pub mod mode;
pub mod report;
pub mod runner;
pub mod types;

// Re-export main types at crate root
pub use detector::{DisagreementDetector, Verdict};
pub use ensemble::{EnsembleMerger, MergeError};
pub use followup::FollowUpGenerator;
pub use lenses::{lens_for, Lens, LensContext, LensDefinition, LensError};
pub use mode::{
    ConfigError, ConfigPatch, DisagreementThresholds, EnsembleMode, ModeRegistry,
    ValidationConfig,
};
pub use report::{DiagnosticReport, Integrity, NarrativeSignals, ReportError, SectionId, Sections};
pub use runner::{QaLensEntry, QaRecord, RunState, Runner, ValidationError, ValidationRun};
pub use types::{
    EnsembleMetadata, FieldComparison, FieldDiff, FieldValue, Finding, FindingKind,
    GenerationPassId, Inspection, LensId, LensResult, Severity, ValidationMetadata,
};

/// Validate a report under `config`.
///
/// This is the main entry point for single-report validation.
///
/// # Arguments
///
/// * `report` - The generated report; never modified
/// * `config` - Run-scoped configuration (snapshot it from
///   [`mode::global`] if you use the process-wide registry)
///
/// # Returns
///
/// A copy of `report` with `validation` attached.
pub fn validate(
    report: &DiagnosticReport,
    config: &ValidationConfig,
) -> Result<DiagnosticReport, ValidationError> {
    Runner::new(config.clone()).run(report).map(|run| run.report)
}
