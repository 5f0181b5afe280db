//! Ensemble merge: reconcile report variants into one report.
//!
//! Policy:
//! 1. Numeric fields whose coefficient of variation exceeds the configured
//!    percentage are a material disagreement
//! 2. An upside/downside ordering that flips between the first and last
//!    variant is a material disagreement, whatever the variance
//! 3. Variants naming different diagnosis codes are a material disagreement
//! 4. Integrity takes the conservative minimum across variants, and
//!    confidence loses a further 15 points on material disagreement
//! 5. The synthesis variant is the base of the merged report, else the last

use thiserror::Error;
use tracing::{debug, info};

use crate::mode::{DisagreementThresholds, EnsembleMode, ValidationConfig};
use crate::report::{DiagnosticReport, Integrity, NarrativeSignals};
use crate::types::{EnsembleMetadata, FieldComparison, GenerationPassId};

use super::compare::compare_fields;

/// Errors raised while merging variants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("No report variants to merge")]
    NoVariants,
}

/// Reconciles generated report variants.
pub struct EnsembleMerger {
    thresholds: DisagreementThresholds,
}

impl EnsembleMerger {
    /// Confidence points removed when variants materially disagree.
    pub const CONFIDENCE_PENALTY: f64 = 15.0;

    pub fn new(thresholds: DisagreementThresholds) -> Self {
        Self { thresholds }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(config.material_disagreement_thresholds.clone())
    }

    /// Merge `variants` (in generation order) into one report.
    ///
    /// # Arguments
    ///
    /// * `mode` - Ensemble mode the variants were generated under
    /// * `variants` - Successfully generated variants
    ///
    /// # Returns
    ///
    /// The selected variant with merged `integrity` and attached
    /// [`EnsembleMetadata`]. Timing is left at zero for the caller to fill.
    pub fn merge(
        &self,
        mode: EnsembleMode,
        variants: &[DiagnosticReport],
    ) -> Result<DiagnosticReport, MergeError> {
        let base = Self::select_final(variants)?;
        let comparisons = compare_fields(variants);

        let mut notes = Vec::new();
        self.check_variance(&comparisons, &mut notes);
        if self.thresholds.roi_flip_detection {
            Self::check_roi_flip(variants, &mut notes);
        }
        if self.thresholds.diagnosis_code_mismatch {
            Self::check_diagnosis_codes(&comparisons, &mut notes);
        }
        let material_disagreement = !notes.is_empty();

        let consensus_score = if comparisons.is_empty() {
            1.0
        } else {
            comparisons.iter().map(|c| c.agreement_score).sum::<f64>() / comparisons.len() as f64
        };

        let integrity = Self::merge_integrity(variants, material_disagreement);

        if material_disagreement {
            info!(
                variants = variants.len(),
                notes = notes.len(),
                "Report variants materially disagree"
            );
        } else {
            debug!(variants = variants.len(), consensus_score, "Report variants merged");
        }

        Ok(DiagnosticReport {
            integrity,
            validation: None,
            ensemble: Some(EnsembleMetadata {
                ensemble_mode: mode,
                consensus_score,
                material_disagreement,
                disagreement_notes: notes,
                field_comparisons: comparisons,
                pass_count: mode.pass_count(),
                passes_completed: variants.len(),
                fallback_used: false,
                execution_time_total_ms: 0,
            }),
            ..base.clone()
        })
    }

    /// The variant tagged as the synthesis pass, else the last one.
    pub fn select_final(variants: &[DiagnosticReport]) -> Result<&DiagnosticReport, MergeError> {
        variants
            .iter()
            .rev()
            .find(|v| v.pass_id == Some(GenerationPassId::Synthesis))
            .or_else(|| variants.last())
            .ok_or(MergeError::NoVariants)
    }

    fn check_variance(&self, comparisons: &[FieldComparison], notes: &mut Vec<String>) {
        let limit = self.thresholds.value_variance_percent;
        for comparison in comparisons {
            let numeric = comparison.values.iter().all(|v| v.as_number().is_some());
            if numeric && comparison.variance > limit {
                notes.push(format!(
                    "Field '{}' varies by {:.1}% across variants (limit {:.1}%)",
                    comparison.field, comparison.variance, limit
                ));
            }
        }
    }

    fn check_roi_flip(variants: &[DiagnosticReport], notes: &mut Vec<String>) {
        let (Some(first), Some(last)) = (variants.first(), variants.last()) else {
            return;
        };
        if variants.len() < 2 {
            return;
        }

        let upside_leads = |report: &DiagnosticReport| {
            let p = NarrativeSignals::extract(report).probabilities;
            match (p.upside, p.downside) {
                (Some(up), Some(down)) => Some(up > down),
                _ => None,
            }
        };

        if let (Some(before), Some(after)) = (upside_leads(first), upside_leads(last)) {
            if before != after {
                notes.push(format!(
                    "ROI flip: upside {} downside in the first variant but {} it in the last",
                    if before { "exceeds" } else { "does not exceed" },
                    if after { "exceeds" } else { "does not exceed" },
                ));
            }
        }
    }

    fn check_diagnosis_codes(comparisons: &[FieldComparison], notes: &mut Vec<String>) {
        let Some(codes) = comparisons.iter().find(|c| c.field == "diagnosis_code") else {
            return;
        };
        let mut distinct: Vec<String> = Vec::new();
        for code in codes.values.iter().map(|v| v.to_string()) {
            if !distinct.contains(&code) {
                distinct.push(code);
            }
        }
        if distinct.len() > 1 {
            notes.push(format!(
                "Variants disagree on the diagnosis code: {}",
                distinct.join(", ")
            ));
        }
    }

    /// Conservative integrity across variants.
    fn merge_integrity(variants: &[DiagnosticReport], material_disagreement: bool) -> Integrity {
        let min = |get: fn(&Integrity) -> f64| {
            variants
                .iter()
                .map(|v| get(&v.integrity))
                .fold(f64::INFINITY, f64::min)
        };

        let mut confidence = min(|i| i.confidence);
        if material_disagreement {
            confidence = (confidence - Self::CONFIDENCE_PENALTY).max(0.0);
        }

        let mut missing_data: Vec<String> = Vec::new();
        for label in variants.iter().flat_map(|v| &v.integrity.missing_data) {
            let key = label.trim().to_lowercase();
            if !missing_data.iter().any(|m| m.trim().to_lowercase() == key) {
                missing_data.push(label.clone());
            }
        }

        Integrity {
            completeness: min(|i| i.completeness),
            evidence_quality: min(|i| i.evidence_quality),
            confidence,
            missing_data,
        }
    }
}
