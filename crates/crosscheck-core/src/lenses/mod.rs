//! Validation lenses.
//!
//! Each lens inspects the report independently and produces findings plus a
//! score in [0, 1]. Only the synthesis lens reads other lenses' results, which
//! is why it always runs last.
//!
//! ## Lens Independence
//!
//! - Lenses are deterministic: same report, same findings, same order
//! - No shared mutable state between lenses
//! - A lens signals a fault with `Err(LensError)`, never by panicking

mod audit;
pub mod catalog;
mod consistency;
mod risk;
mod synthesis;
mod value;

pub use audit::AuditLens;
pub use catalog::{
    generation_pass, generation_passes, validation_lens, validation_lenses,
    GenerationPassDefinition, LensDefinition, ValidationLensDefinition,
};
pub use consistency::ConsistencyLens;
pub use risk::RiskLens;
pub use synthesis::SynthesisLens;
pub use value::ValueLens;

use thiserror::Error;

use crate::report::{DiagnosticReport, NarrativeSignals};
use crate::types::{Finding, Inspection, LensId, LensResult, Severity};

/// Faults raised while a lens is running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LensError {
    #[error("{lens} received invalid input: {reason}")]
    InvalidInput { lens: LensId, reason: String },

    #[error("{lens} failed: {reason}")]
    Failed { lens: LensId, reason: String },
}

/// Everything a lens may look at.
#[derive(Debug, Clone, Copy)]
pub struct LensContext<'a> {
    pub report: &'a DiagnosticReport,
    pub signals: &'a NarrativeSignals,
    /// Results of the lenses that already ran in this pass
    pub prior: &'a [LensResult],
}

impl<'a> LensContext<'a> {
    pub fn new(
        report: &'a DiagnosticReport,
        signals: &'a NarrativeSignals,
        prior: &'a [LensResult],
    ) -> Self {
        Self {
            report,
            signals,
            prior,
        }
    }

    /// An integrity score as a 0-1 ratio, rejecting values outside 0-100.
    pub fn integrity_ratio(&self, lens: LensId, name: &str, value: f64) -> Result<f64, LensError> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(LensError::InvalidInput {
                lens,
                reason: format!("integrity.{} is {}", name, value),
            });
        }
        Ok(value / 100.0)
    }
}

/// Trait implemented by all lenses.
pub trait Lens: Send + Sync {
    fn lens_id(&self) -> LensId;

    fn definition(&self) -> &'static ValidationLensDefinition {
        validation_lens(self.lens_id())
    }

    /// Inspect the report.
    ///
    /// # Returns
    ///
    /// An [`Inspection`] with findings in a deterministic order and the lens
    /// score, or a [`LensError`] if the lens could not run.
    fn inspect(&self, ctx: &LensContext<'_>) -> Result<Inspection, LensError>;
}

/// The executor for a lens id.
pub fn lens_for(id: LensId) -> Box<dyn Lens> {
    match id {
        LensId::Consistency => Box::new(ConsistencyLens::new()),
        LensId::Audit => Box::new(AuditLens::new()),
        LensId::Risk => Box::new(RiskLens::new()),
        LensId::Value => Box::new(ValueLens::new()),
        LensId::Synthesis => Box::new(SynthesisLens::new()),
    }
}

pub(crate) fn count(findings: &[Finding], severity: Severity) -> usize {
    findings.iter().filter(|f| f.severity == severity).count()
}

/// `max(0, 1 − 0.2·errors − 0.1·warnings)`
pub(crate) fn penalty_score(findings: &[Finding]) -> f64 {
    let errors = count(findings, Severity::Error) as f64;
    let warnings = count(findings, Severity::Warning) as f64;
    (1.0 - 0.2 * errors - 0.1 * warnings).max(0.0)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::report::{DiagnosticReport, Integrity, Sections};

    pub fn report(sections: Sections) -> DiagnosticReport {
        DiagnosticReport::new(
            sections,
            Integrity {
                completeness: 80.0,
                evidence_quality: 80.0,
                confidence: 80.0,
                missing_data: vec![],
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FindingKind;

    #[test]
    fn test_lens_for_is_exhaustive_and_matches_id() {
        for id in [
            LensId::Consistency,
            LensId::Audit,
            LensId::Risk,
            LensId::Value,
            LensId::Synthesis,
        ] {
            let lens = lens_for(id);
            assert_eq!(lens.lens_id(), id);
            assert_eq!(lens.definition().id, id);
        }
    }

    #[test]
    fn test_penalty_score_floors_at_zero() {
        let findings: Vec<Finding> = (0..6)
            .map(|_| Finding::error(FindingKind::PriorLensError, "x", "boom"))
            .collect();
        assert_eq!(penalty_score(&findings), 0.0);
        assert_eq!(penalty_score(&[]), 1.0);
    }

    #[test]
    fn test_integrity_ratio_rejects_nan() {
        let report = test_support::report(Default::default());
        let signals = NarrativeSignals::extract(&report);
        let ctx = LensContext::new(&report, &signals, &[]);
        assert_eq!(ctx.integrity_ratio(LensId::Audit, "evidence_quality", 50.0), Ok(0.5));
        assert!(ctx
            .integrity_ratio(LensId::Audit, "evidence_quality", f64::NAN)
            .is_err());
    }
}
