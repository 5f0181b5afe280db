//! Risk Lens
//!
//! **Question**: Do the options answer the risks the packet itself identifies?
//!
//! Runs in 5-pass mode only.

use crate::report::signals::{DEBT_TERMS, RISK_TERMS, URGENCY_TERMS};
use crate::report::SectionId;
use crate::types::{Finding, FindingKind, Inspection, LensId};

use super::{penalty_score, Lens, LensContext, LensError};

/// The Risk lens.
pub struct RiskLens;

impl RiskLens {
    /// Downside probability (percent) above which the plan must read as urgent.
    pub const URGENT_DOWNSIDE_PERCENT: f64 = 40.0;

    pub fn new() -> Self {
        Self
    }

    fn check_risks_addressed(&self, ctx: &LensContext<'_>, findings: &mut Vec<Finding>) {
        if ctx.report.sections.is_blank(SectionId::Options) {
            return;
        }
        for term in ctx.signals.terms_in(SectionId::ExecutiveBrief, RISK_TERMS) {
            if !ctx.signals.mentions(SectionId::Options, term) {
                findings.push(
                    Finding::warning(
                        FindingKind::RiskNotAddressed,
                        SectionId::Options.key(),
                        format!(
                            "Risk '{}' is raised in the executive brief but no option addresses it",
                            term
                        ),
                    )
                    .related([SectionId::ExecutiveBrief.key()]),
                );
            }
        }
    }

    fn check_downside_urgency(&self, ctx: &LensContext<'_>, findings: &mut Vec<Finding>) {
        let Some(downside) = ctx.signals.probabilities.downside else {
            return;
        };
        if downside <= Self::URGENT_DOWNSIDE_PERCENT
            || ctx.report.sections.is_blank(SectionId::ExecutionPlan)
        {
            return;
        }
        if !ctx
            .signals
            .mentions_any(SectionId::ExecutionPlan, URGENCY_TERMS)
        {
            findings.push(
                Finding::error(
                    FindingKind::DownsideWithoutUrgency,
                    SectionId::ExecutionPlan.key(),
                    format!(
                        "Downside scenario is {}% likely but the execution plan carries no urgency",
                        downside
                    ),
                )
                .related([SectionId::Scenarios.key()]),
            );
        }
    }

    fn check_debt_addressed(&self, ctx: &LensContext<'_>, findings: &mut Vec<Finding>) {
        if ctx.report.sections.is_blank(SectionId::Options) {
            return;
        }
        let debt_terms = ctx.signals.terms_in(SectionId::ValueLedger, DEBT_TERMS);
        if debt_terms.is_empty() {
            return;
        }
        if !ctx.signals.mentions_any(SectionId::Options, DEBT_TERMS) {
            findings.push(
                Finding::warning(
                    FindingKind::DebtNotAddressed,
                    SectionId::Options.key(),
                    format!(
                        "Value ledger shows lender exposure ({}) that no option addresses",
                        debt_terms.join(", ")
                    ),
                )
                .related([SectionId::ValueLedger.key()]),
            );
        }
    }
}

impl Default for RiskLens {
    fn default() -> Self {
        Self::new()
    }
}

impl Lens for RiskLens {
    fn lens_id(&self) -> LensId {
        LensId::Risk
    }

    fn inspect(&self, ctx: &LensContext<'_>) -> Result<Inspection, LensError> {
        let mut findings = Vec::new();

        self.check_risks_addressed(ctx, &mut findings);
        self.check_downside_urgency(ctx, &mut findings);
        self.check_debt_addressed(ctx, &mut findings);

        let score = penalty_score(&findings);
        Ok(Inspection { findings, score })
    }
}
