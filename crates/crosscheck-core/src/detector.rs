//! Disagreement detector: aggregates lens results into a verdict.
//!
//! Material disagreement is a union of independent triggers, not a weighted
//! composite:
//! 1. Any lens raised an `error` finding
//! 2. A single report field collected two or more `warning` findings
//! 3. The mean lens score is below the consensus threshold
//!
//! Every trigger that fires contributes its own note. Notes are never
//! deduplicated across triggers.

use std::collections::{BTreeMap, BTreeSet};

use crate::report::DiagnosticReport;
use crate::types::{FieldDiff, LensId, LensResult, Severity};

/// Aggregated scores and notes for one validation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub consensus_score: f64,
    pub evidence_score: f64,
    pub material_disagreement: bool,
    pub notes: Vec<String>,
    pub field_diffs: Vec<FieldDiff>,
}

/// The disagreement detector.
pub struct DisagreementDetector {
    consensus_threshold: f64,
}

impl DisagreementDetector {
    /// Warnings on one field at which the field counts as contested.
    pub const FIELD_WARNING_LIMIT: usize = 2;

    pub fn new(consensus_threshold: f64) -> Self {
        Self {
            consensus_threshold,
        }
    }

    /// Aggregate lens results for `report`.
    ///
    /// # Arguments
    ///
    /// * `report` - The report the lenses inspected (for stated evidence quality)
    /// * `results` - Lens results in execution order
    ///
    /// # Returns
    ///
    /// A [`Verdict`] whose scores are always within [0, 1].
    pub fn detect(&self, report: &DiagnosticReport, results: &[LensResult]) -> Verdict {
        let mean = mean_score(results);
        let consensus_score = clamp_unit(mean);
        let evidence_score = self.evidence_score(report, results);

        let mut notes = Vec::new();

        // Trigger 1: any error finding
        let errors: Vec<String> = results
            .iter()
            .flat_map(|r| {
                r.findings
                    .iter()
                    .filter(|f| f.is_error())
                    .map(move |f| format!("{} on {}", r.lens_id, f.field))
            })
            .collect();
        if !errors.is_empty() {
            notes.push(format!(
                "{} error-severity finding(s): {}",
                errors.len(),
                errors.join(", ")
            ));
        }

        // Trigger 2: warnings piling up on one field
        let mut warnings_by_field: BTreeMap<&str, usize> = BTreeMap::new();
        for finding in results.iter().flat_map(|r| &r.findings) {
            if finding.is_warning() {
                *warnings_by_field.entry(finding.field.as_str()).or_insert(0) += 1;
            }
        }
        for (field, count) in &warnings_by_field {
            if *count >= Self::FIELD_WARNING_LIMIT {
                notes.push(format!("Field '{}' has {} warnings across lenses", field, count));
            }
        }

        // Trigger 3: low consensus
        if mean < self.consensus_threshold {
            notes.push(format!(
                "Mean lens score {:.2} is below the consensus threshold {:.2}",
                mean, self.consensus_threshold
            ));
        }

        Verdict {
            consensus_score,
            evidence_score,
            material_disagreement: !notes.is_empty(),
            notes,
            field_diffs: field_diffs(results),
        }
    }

    /// Stated evidence quality blended with the audit lens score, if it ran.
    fn evidence_score(&self, report: &DiagnosticReport, results: &[LensResult]) -> f64 {
        let stated = clamp_unit(report.integrity.evidence_quality / 100.0);
        let audit = results
            .iter()
            .find(|r| r.lens_id == LensId::Audit && r.success)
            .map(|r| clamp_unit(r.score));

        match audit {
            Some(audit) => clamp_unit((stated + audit) / 2.0),
            None => stated,
        }
    }
}

/// Mean of lens scores, 1.0 when no lens ran.
fn mean_score(results: &[LensResult]) -> f64 {
    if results.is_empty() {
        return 1.0;
    }
    results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64
}

/// Clamp to [0, 1], mapping NaN to 0.
fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Fields flagged by at least two distinct lenses, in field order.
fn field_diffs(results: &[LensResult]) -> Vec<FieldDiff> {
    let mut by_field: BTreeMap<&str, (BTreeSet<LensId>, usize, usize)> = BTreeMap::new();
    for result in results {
        for finding in &result.findings {
            let entry = by_field.entry(finding.field.as_str()).or_default();
            entry.0.insert(result.lens_id);
            match finding.severity {
                Severity::Warning => entry.1 += 1,
                Severity::Error => entry.2 += 1,
                Severity::Info => {}
            }
        }
    }

    by_field
        .into_iter()
        .filter(|(_, (lenses, _, _))| lenses.len() >= 2)
        .map(|(field, (lenses, warnings, errors))| FieldDiff {
            field: field.to_string(),
            lenses: lenses.into_iter().collect(),
            warnings,
            errors,
        })
        .collect()
}
