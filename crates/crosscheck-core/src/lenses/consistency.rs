//! Consistency Lens
//!
//! **Question**: Do the sections of the packet agree with each other?
//!
//! | Check | Severity |
//! |-------|----------|
//! | Runway in the brief vs runway month in the scenarios differ by more than 3 | warning |
//! | Execution plan references an option the options section never defines | error |
//! | Operating signal named in the brief is absent from the execution plan | info |

use crate::report::signals::SIGNAL_TERMS;
use crate::report::SectionId;
use crate::types::{Finding, FindingKind, Inspection, LensId, Severity};

use super::{count, Lens, LensContext, LensError};

/// The Consistency lens.
pub struct ConsistencyLens;

impl ConsistencyLens {
    /// Months of slack allowed between two runway statements.
    pub const RUNWAY_TOLERANCE_MONTHS: f64 = 3.0;

    pub fn new() -> Self {
        Self
    }

    fn check_runway(&self, ctx: &LensContext<'_>, findings: &mut Vec<Finding>) {
        let (Some(brief), Some(scenario)) = (
            ctx.signals.brief_runway_months,
            ctx.signals.scenario_runway_months,
        ) else {
            return;
        };

        if (brief - scenario).abs() > Self::RUNWAY_TOLERANCE_MONTHS {
            findings.push(
                Finding::warning(
                    FindingKind::RunwayMismatch,
                    SectionId::Scenarios.key(),
                    format!(
                        "Executive brief states a runway of {} months but the scenarios place it at month {}",
                        brief, scenario
                    ),
                )
                .related([SectionId::ExecutiveBrief.key()]),
            );
        }
    }

    fn check_option_references(&self, ctx: &LensContext<'_>, findings: &mut Vec<Finding>) {
        if ctx.report.sections.is_blank(SectionId::Options) {
            return;
        }

        for id in ctx
            .signals
            .referenced_options
            .difference(&ctx.signals.defined_options)
        {
            findings.push(
                Finding::error(
                    FindingKind::UndefinedOptionReference,
                    SectionId::ExecutionPlan.key(),
                    format!(
                        "Execution plan references Option {} which is not defined in the options section",
                        id
                    ),
                )
                .related([SectionId::Options.key()]),
            );
        }
    }

    fn check_signal_carry_through(&self, ctx: &LensContext<'_>, findings: &mut Vec<Finding>) {
        if ctx.report.sections.is_blank(SectionId::ExecutionPlan) {
            return;
        }

        for term in ctx.signals.terms_in(SectionId::ExecutiveBrief, SIGNAL_TERMS) {
            if !ctx.signals.mentions(SectionId::ExecutionPlan, term) {
                findings.push(
                    Finding::info(
                        FindingKind::SignalNotCarried,
                        SectionId::ExecutionPlan.key(),
                        format!(
                            "Signal '{}' appears in the executive brief but not in the execution plan",
                            term
                        ),
                    )
                    .related([SectionId::ExecutiveBrief.key()]),
                );
            }
        }
    }

    /// `max(0, 1 − 0.2·errors − 0.1·warnings − 0.02·all)`
    fn score(findings: &[Finding]) -> f64 {
        let errors = count(findings, Severity::Error) as f64;
        let warnings = count(findings, Severity::Warning) as f64;
        let all = findings.len() as f64;
        (1.0 - 0.2 * errors - 0.1 * warnings - 0.02 * all).max(0.0)
    }
}

impl Default for ConsistencyLens {
    fn default() -> Self {
        Self::new()
    }
}

impl Lens for ConsistencyLens {
    fn lens_id(&self) -> LensId {
        LensId::Consistency
    }

    fn inspect(&self, ctx: &LensContext<'_>) -> Result<Inspection, LensError> {
        let mut findings = Vec::new();

        self.check_runway(ctx, &mut findings);
        self.check_option_references(ctx, &mut findings);
        self.check_signal_carry_through(ctx, &mut findings);

        let score = Self::score(&findings);
        Ok(Inspection { findings, score })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lenses::test_support::report;
    use crate::report::{NarrativeSignals, Sections};

    fn inspect(sections: Sections) -> Inspection {
        let report = report(sections);
        let signals = NarrativeSignals::extract(&report);
        ConsistencyLens::new()
            .inspect(&LensContext::new(&report, &signals, &[]))
            .unwrap()
    }

    #[test]
    fn test_runway_mismatch_warns() {
        let inspection = inspect(Sections {
            executive_brief: "Cash runway is approximately 6 months.".to_string(),
            scenarios: "Downside: the business runs out of cash in Month 18.".to_string(),
            ..Sections::default()
        });

        assert_eq!(inspection.findings.len(), 1);
        let finding = &inspection.findings[0];
        assert_eq!(finding.kind, FindingKind::RunwayMismatch);
        assert_eq!(finding.severity, Severity::Warning);
        assert!(inspection.score < 1.0);
        assert!((inspection.score - 0.88).abs() < 1e-9);
    }

    #[test]
    fn test_runway_within_tolerance_passes() {
        let inspection = inspect(Sections {
            executive_brief: "Runway is approximately 6 months.".to_string(),
            scenarios: "Base case: cash tightens around Month 8.".to_string(),
            ..Sections::default()
        });
        assert!(inspection.findings.is_empty());
        assert_eq!(inspection.score, 1.0);
    }

    #[test]
    fn test_undefined_option_is_error() {
        let inspection = inspect(Sections {
            options: "Option 1: Refinance.\nOption 2: Sell.\nOption 3: Cut costs.\nOption 4: Raise equity."
                .to_string(),
            execution_plan: "Week 1: launch Option 5 and prepare Option 2.".to_string(),
            ..Sections::default()
        });

        let errors: Vec<&Finding> = inspection.findings.iter().filter(|f| f.is_error()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, FindingKind::UndefinedOptionReference);
        assert!(errors[0].message.contains("Option 5"));
        assert!((inspection.score - 0.78).abs() < 1e-9);
    }

    #[test]
    fn test_option_range_defines_inner_options() {
        let inspection = inspect(Sections {
            options: "We evaluated Option 1 through Option 4 below.".to_string(),
            execution_plan: "Week 1: start Option 2.".to_string(),
            ..Sections::default()
        });
        assert!(!inspection
            .findings
            .iter()
            .any(|f| f.kind == FindingKind::UndefinedOptionReference));
    }

    #[test]
    fn test_option_check_skipped_without_options_section() {
        let inspection = inspect(Sections {
            execution_plan: "Start Option 5 immediately.".to_string(),
            ..Sections::default()
        });
        assert!(inspection.findings.is_empty());
    }

    #[test]
    fn test_signal_not_carried_is_info() {
        let inspection = inspect(Sections {
            executive_brief: "Customer churn doubled last quarter.".to_string(),
            execution_plan: "Week 1: renegotiate supplier terms.".to_string(),
            ..Sections::default()
        });
        assert_eq!(inspection.findings.len(), 1);
        assert_eq!(inspection.findings[0].severity, Severity::Info);
        assert!((inspection.score - 0.98).abs() < 1e-9);
    }
}
