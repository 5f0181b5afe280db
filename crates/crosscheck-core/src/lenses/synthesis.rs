//! Synthesis Lens
//!
//! **Question**: Taken together, do the earlier lenses support the report's
//! own stated confidence?
//!
//! Must run last. Its score is the mean of the prior lens scores, so a run
//! with no earlier lenses scores 1.0.

use crate::types::{Finding, FindingKind, Inspection, LensId, Severity};

use super::{Lens, LensContext, LensError};

/// The Synthesis lens.
pub struct SynthesisLens;

impl SynthesisLens {
    /// More prior warnings than this is itself a warning.
    pub const MAX_PRIOR_WARNINGS: usize = 3;

    /// Allowed gap between the prior mean score and stated confidence.
    pub const CONFIDENCE_TOLERANCE: f64 = 0.2;

    pub fn new() -> Self {
        Self
    }

    fn prior_mean(ctx: &LensContext<'_>) -> Option<f64> {
        if ctx.prior.is_empty() {
            return None;
        }
        let total: f64 = ctx.prior.iter().map(|r| r.score).sum();
        Some(total / ctx.prior.len() as f64)
    }
}

impl Default for SynthesisLens {
    fn default() -> Self {
        Self::new()
    }
}

impl Lens for SynthesisLens {
    fn lens_id(&self) -> LensId {
        LensId::Synthesis
    }

    fn inspect(&self, ctx: &LensContext<'_>) -> Result<Inspection, LensError> {
        let confidence = ctx.integrity_ratio(
            self.lens_id(),
            "confidence",
            ctx.report.integrity.confidence,
        )?;

        let mut findings = Vec::new();

        let failing: Vec<String> = ctx
            .prior
            .iter()
            .filter(|r| r.count(Severity::Error) > 0)
            .map(|r| r.lens_id.to_string())
            .collect();
        if !failing.is_empty() {
            findings.push(
                Finding::error(
                    FindingKind::PriorLensError,
                    "report",
                    format!("Errors raised by {}", failing.join(", ")),
                )
                .related(failing.iter().cloned()),
            );
        }

        let warnings: usize = ctx.prior.iter().map(|r| r.count(Severity::Warning)).sum();
        if warnings > Self::MAX_PRIOR_WARNINGS {
            findings.push(Finding::warning(
                FindingKind::WarningAccumulation,
                "report",
                format!("{} warnings accumulated across earlier lenses", warnings),
            ));
        }

        let mean = Self::prior_mean(ctx);
        if let Some(mean) = mean {
            if (mean - confidence).abs() > Self::CONFIDENCE_TOLERANCE {
                findings.push(
                    Finding::info(
                        FindingKind::ConfidenceDivergence,
                        "integrity.confidence",
                        format!(
                            "Lens consensus {:.2} diverges from stated confidence {:.2}",
                            mean, confidence
                        ),
                    ),
                );
            }
        }

        Ok(Inspection {
            findings,
            score: mean.unwrap_or(1.0),
        })
    }
}
