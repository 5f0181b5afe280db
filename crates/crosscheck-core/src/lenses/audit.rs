//! Audit Lens
//!
//! **Question**: Is every claim traceable to labeled evidence?
//!
//! Unlike the other lenses, the audit score starts from the report's own
//! stated evidence quality rather than from 1.0.

use crate::report::signals::{ACKNOWLEDGMENT_TERMS, PROVENANCE_MARKERS, VALUATION_TERMS};
use crate::report::SectionId;
use crate::types::{Finding, FindingKind, Inspection, LensId, Severity};

use super::{count, Lens, LensContext, LensError};

/// The Audit lens.
pub struct AuditLens;

impl AuditLens {
    /// Below this share of received evidence the register is flagged.
    pub const MIN_EVIDENCE_COMPLETION: f64 = 0.5;

    /// More missing-data labels than this must be acknowledged in the brief.
    pub const MAX_SILENT_MISSING_DATA: usize = 3;

    pub fn new() -> Self {
        Self
    }

    fn check_provenance(&self, ctx: &LensContext<'_>, findings: &mut Vec<Finding>) {
        if ctx.signals.total_provenance_markers() == 0 {
            findings.push(Finding::warning(
                FindingKind::MissingProvenance,
                SectionId::ExecutiveBrief.key(),
                format!(
                    "No evidence provenance markers ({}) found in the narrative",
                    PROVENANCE_MARKERS
                        .iter()
                        .map(|m| format!("[{}]", m))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ));
        }
    }

    fn check_valuation_method(&self, ctx: &LensContext<'_>, findings: &mut Vec<Finding>) {
        if ctx.report.sections.is_blank(SectionId::ValueLedger) {
            return;
        }
        if !ctx.signals.mentions_any(SectionId::ValueLedger, VALUATION_TERMS) {
            findings.push(Finding::warning(
                FindingKind::MissingValuationMethod,
                SectionId::ValueLedger.key(),
                "Value ledger does not cite a valuation methodology",
            ));
        }
    }

    fn check_probability_labels(&self, ctx: &LensContext<'_>, findings: &mut Vec<Finding>) {
        if ctx.report.sections.is_blank(SectionId::Scenarios) {
            return;
        }
        if !ctx.signals.probabilities.any_labeled() {
            findings.push(Finding::warning(
                FindingKind::UnlabeledProbabilities,
                SectionId::Scenarios.key(),
                "Scenario probabilities are not explicitly labeled for base, upside or downside cases",
            ));
        }
    }

    fn check_evidence_register(&self, ctx: &LensContext<'_>, findings: &mut Vec<Finding>) {
        let Some(completion) = ctx.signals.evidence_completion() else {
            return;
        };
        if completion < Self::MIN_EVIDENCE_COMPLETION {
            findings.push(Finding::warning(
                FindingKind::IncompleteEvidenceRegister,
                SectionId::EvidenceRegister.key(),
                format!(
                    "Only {} of {} evidence items received ({:.0}%)",
                    ctx.signals.evidence_received,
                    ctx.signals.evidence_received + ctx.signals.evidence_pending,
                    completion * 100.0
                ),
            ));
        }
    }

    fn check_missing_data_acknowledged(&self, ctx: &LensContext<'_>, findings: &mut Vec<Finding>) {
        let missing = &ctx.report.integrity.missing_data;
        if missing.len() <= Self::MAX_SILENT_MISSING_DATA {
            return;
        }
        if !ctx
            .signals
            .mentions_any(SectionId::ExecutiveBrief, ACKNOWLEDGMENT_TERMS)
        {
            findings.push(
                Finding::warning(
                    FindingKind::UnacknowledgedMissingData,
                    SectionId::ExecutiveBrief.key(),
                    format!(
                        "{} missing-data items are not acknowledged in the executive brief",
                        missing.len()
                    ),
                )
                .related(["integrity.missing_data"]),
            );
        }
    }
}

impl Default for AuditLens {
    fn default() -> Self {
        Self::new()
    }
}

impl Lens for AuditLens {
    fn lens_id(&self) -> LensId {
        LensId::Audit
    }

    fn inspect(&self, ctx: &LensContext<'_>) -> Result<Inspection, LensError> {
        let evidence_quality = ctx.integrity_ratio(
            self.lens_id(),
            "evidence_quality",
            ctx.report.integrity.evidence_quality,
        )?;

        let mut findings = Vec::new();
        self.check_provenance(ctx, &mut findings);
        self.check_valuation_method(ctx, &mut findings);
        self.check_probability_labels(ctx, &mut findings);
        self.check_evidence_register(ctx, &mut findings);
        self.check_missing_data_acknowledged(ctx, &mut findings);

        let errors = count(&findings, Severity::Error) as f64;
        let warnings = count(&findings, Severity::Warning) as f64;
        let score = (evidence_quality - 0.15 * errors - 0.08 * warnings).max(0.0);

        Ok(Inspection { findings, score })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lenses::test_support::report;
    use crate::report::{DiagnosticReport, NarrativeSignals, Sections};

    fn inspect(report: &DiagnosticReport) -> Result<Inspection, LensError> {
        let signals = NarrativeSignals::extract(report);
        AuditLens::new().inspect(&LensContext::new(report, &signals, &[]))
    }

    fn kinds(inspection: &Inspection) -> Vec<FindingKind> {
        inspection.findings.iter().map(|f| f.kind).collect()
    }

    #[test]
    fn test_well_sourced_report_scores_evidence_quality() {
        let report = report(Sections {
            executive_brief: "Revenue fell 12% [OBSERVED].".to_string(),
            scenarios: "Base case (60% probability): flat revenue.".to_string(),
            value_ledger: "Enterprise value from a 4x EBITDA multiple [COMPUTED].".to_string(),
            evidence_register: "Bank statements - received\nTax returns - received".to_string(),
            ..Sections::default()
        });

        let inspection = inspect(&report).unwrap();
        assert!(inspection.findings.is_empty(), "{:?}", inspection.findings);
        assert!((inspection.score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_missing_provenance_and_method() {
        let report = report(Sections {
            value_ledger: "The business is worth about $2M.".to_string(),
            ..Sections::default()
        });

        let inspection = inspect(&report).unwrap();
        assert_eq!(
            kinds(&inspection),
            vec![FindingKind::MissingProvenance, FindingKind::MissingValuationMethod]
        );
        assert!((inspection.score - (0.8 - 0.16)).abs() < 1e-9);
    }

    #[test]
    fn test_unlabeled_probabilities() {
        let report = report(Sections {
            executive_brief: "[OBSERVED] Margins are thin.".to_string(),
            scenarios: "In a bad year the company loses its largest customer.".to_string(),
            ..Sections::default()
        });
        let inspection = inspect(&report).unwrap();
        assert_eq!(kinds(&inspection), vec![FindingKind::UnlabeledProbabilities]);
    }

    #[test]
    fn test_incomplete_evidence_register() {
        let report = report(Sections {
            executive_brief: "[OBSERVED] Margins are thin.".to_string(),
            evidence_register: "Bank statements - received\nAR aging - pending\nContracts - requested"
                .to_string(),
            ..Sections::default()
        });
        let inspection = inspect(&report).unwrap();
        assert_eq!(kinds(&inspection), vec![FindingKind::IncompleteEvidenceRegister]);
        assert!(inspection.findings[0].message.contains("1 of 3"));
    }

    #[test]
    fn test_unacknowledged_missing_data() {
        let mut report = report(Sections {
            executive_brief: "[INFERRED] The business is stable.".to_string(),
            ..Sections::default()
        });
        report.integrity.missing_data = vec![
            "Monthly P&L".to_string(),
            "Customer list".to_string(),
            "AR aging".to_string(),
            "Org chart".to_string(),
        ];
        let inspection = inspect(&report).unwrap();
        assert_eq!(kinds(&inspection), vec![FindingKind::UnacknowledgedMissingData]);

        report.sections.executive_brief =
            "[INFERRED] The business is stable, though several documents are missing.".to_string();
        let inspection = inspect(&report).unwrap();
        assert!(inspection.findings.is_empty());
    }

    #[test]
    fn test_invalid_evidence_quality_is_a_fault() {
        let mut report = report(Sections::default());
        report.integrity.evidence_quality = f64::NAN;
        assert!(matches!(
            inspect(&report),
            Err(LensError::InvalidInput { lens: LensId::Audit, .. })
        ));
    }

    #[test]
    fn test_score_floors_at_zero() {
        let mut report = report(Sections {
            scenarios: "Things could go either way.".to_string(),
            value_ledger: "Worth a lot.".to_string(),
            ..Sections::default()
        });
        report.integrity.evidence_quality = 10.0;
        let inspection = inspect(&report).unwrap();
        assert_eq!(inspection.score, 0.0);
    }
}
