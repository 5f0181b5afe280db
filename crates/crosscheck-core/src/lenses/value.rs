//! Value Lens
//!
//! **Question**: Are value claims carried through to the decisions?
//!
//! Runs in 5-pass mode only. Scored like the risk lens.

use crate::report::signals::{GROWTH_TERMS, RETURN_TERMS};
use crate::report::SectionId;
use crate::types::{Finding, FindingKind, Inspection, LensId};

use super::{penalty_score, Lens, LensContext, LensError};

/// The Value lens.
pub struct ValueLens;

impl ValueLens {
    /// Upside probability (percent) above which the plan should pursue it.
    pub const CREDIBLE_UPSIDE_PERCENT: f64 = 20.0;

    pub fn new() -> Self {
        Self
    }

    fn check_recovery_referenced(&self, ctx: &LensContext<'_>, findings: &mut Vec<Finding>) {
        if ctx.report.sections.is_blank(SectionId::Options) {
            return;
        }
        let recoveries = &ctx.signals.recovery_percentages;
        if recoveries.is_empty() {
            return;
        }

        let referenced = ctx.signals.mentions(SectionId::Options, "recover")
            || recoveries
                .iter()
                .any(|pct| ctx.signals.mentions(SectionId::Options, &format!("{}%", pct)));

        if !referenced {
            findings.push(
                Finding::warning(
                    FindingKind::RecoveryNotReferenced,
                    SectionId::Options.key(),
                    format!(
                        "Value ledger states recovery of {} but no option references it",
                        recoveries
                            .iter()
                            .map(|p| format!("{}%", p))
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                )
                .related([SectionId::ValueLedger.key()]),
            );
        }
    }

    fn check_investment_returns(&self, ctx: &LensContext<'_>, findings: &mut Vec<Finding>) {
        let amounts = &ctx.signals.investment_amounts;
        if amounts.is_empty() {
            return;
        }
        if !ctx.signals.mentions_any(SectionId::Options, RETURN_TERMS) {
            findings.push(Finding::warning(
                FindingKind::InvestmentWithoutReturn,
                SectionId::Options.key(),
                format!(
                    "Options commit {} without an ROI or payback estimate",
                    amounts.join(", ")
                ),
            ));
        }
    }

    fn check_upside_pursued(&self, ctx: &LensContext<'_>, findings: &mut Vec<Finding>) {
        let Some(upside) = ctx.signals.probabilities.upside else {
            return;
        };
        if upside <= Self::CREDIBLE_UPSIDE_PERCENT
            || ctx.report.sections.is_blank(SectionId::ExecutionPlan)
        {
            return;
        }
        if !ctx.signals.mentions_any(SectionId::ExecutionPlan, GROWTH_TERMS) {
            findings.push(
                Finding::warning(
                    FindingKind::UpsideWithoutGrowthPlan,
                    SectionId::ExecutionPlan.key(),
                    format!(
                        "Upside scenario is {}% likely but the execution plan has no growth step",
                        upside
                    ),
                )
                .related([SectionId::Scenarios.key()]),
            );
        }
    }
}

impl Default for ValueLens {
    fn default() -> Self {
        Self::new()
    }
}

impl Lens for ValueLens {
    fn lens_id(&self) -> LensId {
        LensId::Value
    }

    fn inspect(&self, ctx: &LensContext<'_>) -> Result<Inspection, LensError> {
        let mut findings = Vec::new();

        self.check_recovery_referenced(ctx, &mut findings);
        self.check_investment_returns(ctx, &mut findings);
        self.check_upside_pursued(ctx, &mut findings);

        let score = penalty_score(&findings);
        Ok(Inspection { findings, score })
    }
}
