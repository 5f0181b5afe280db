//! Field comparator: agreement of key values across report variants.

use std::collections::BTreeSet;

use crate::report::{DiagnosticReport, NarrativeSignals};
use crate::types::{FieldComparison, FieldValue};

/// Agreement below which a numeric field takes the median instead of the
/// last variant's value.
pub const MEDIAN_OVERRIDE_THRESHOLD: f64 = 0.7;

/// Fields in the order comparisons are reported.
const FIELD_ORDER: [&str; 10] = [
    "confidence",
    "completeness",
    "evidence_quality",
    "missing_data_count",
    "runway_months",
    "signal_count",
    "probability_base",
    "probability_upside",
    "probability_downside",
    "diagnosis_code",
];

/// Comparable values of one variant, in canonical field order.
///
/// Integrity scores and the missing-data count are always present; the
/// narrative-derived fields only when the narrative states them.
pub fn extract_key_values(report: &DiagnosticReport) -> Vec<(&'static str, FieldValue)> {
    let signals = NarrativeSignals::extract(report);
    let integrity = &report.integrity;

    let mut values = vec![
        ("confidence", FieldValue::Number(integrity.confidence)),
        ("completeness", FieldValue::Number(integrity.completeness)),
        ("evidence_quality", FieldValue::Number(integrity.evidence_quality)),
        (
            "missing_data_count",
            FieldValue::Number(integrity.missing_data.len() as f64),
        ),
    ];

    if let Some(runway) = signals
        .brief_runway_months
        .or(signals.scenario_runway_months)
    {
        values.push(("runway_months", FieldValue::Number(runway)));
    }

    let signal_count = signals.signal_count();
    if signal_count > 0 {
        values.push(("signal_count", FieldValue::Number(signal_count as f64)));
    }

    let probabilities = signals.probabilities;
    for (field, probability) in [
        ("probability_base", probabilities.base),
        ("probability_upside", probabilities.upside),
        ("probability_downside", probabilities.downside),
    ] {
        if let Some(p) = probability {
            values.push((field, FieldValue::Number(p)));
        }
    }

    if let Some(code) = report.diagnosis_code.as_deref().map(str::trim) {
        if !code.is_empty() {
            values.push(("diagnosis_code", FieldValue::Text(code.to_string())));
        }
    }

    values
}

/// Agreement of a set of values, in [0, 1].
///
/// | Values | Score |
/// |--------|-------|
/// | empty | 1.0 |
/// | numeric, all zero | 1.0 |
/// | numeric, zero mean with non-zero members | 0.5 |
/// | numeric | `max(0, 1 − CV)` |
/// | text or mixed | `1 − (unique − 1) / count` |
pub fn agreement_score(values: &[FieldValue]) -> f64 {
    if values.is_empty() {
        return 1.0;
    }

    match numbers(values) {
        Some(nums) => match coefficient_of_variation(&nums) {
            Some(cv) => (1.0 - cv).max(0.0),
            None if nums.iter().all(|n| *n == 0.0) => 1.0,
            None => 0.5,
        },
        None => {
            let unique: BTreeSet<String> = values.iter().map(|v| v.to_string()).collect();
            1.0 - (unique.len() as f64 - 1.0) / values.len() as f64
        }
    }
}

/// Population coefficient of variation. `None` when the mean is zero.
pub fn coefficient_of_variation(nums: &[f64]) -> Option<f64> {
    if nums.is_empty() {
        return None;
    }
    let n = nums.len() as f64;
    let mean = nums.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return None;
    }
    let variance = nums.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt() / mean.abs())
}

/// Median of a non-empty slice; the mean of the middle pair for even counts.
pub fn median(nums: &[f64]) -> Option<f64> {
    if nums.is_empty() {
        return None;
    }
    let mut sorted = nums.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Compare every key field across `variants` (in variant order).
///
/// A field is compared over the variants that state it. The selected value
/// is the last variant's, except that a numeric field agreeing less than
/// [`MEDIAN_OVERRIDE_THRESHOLD`] takes the median.
pub fn compare_fields(variants: &[DiagnosticReport]) -> Vec<FieldComparison> {
    let extracted: Vec<Vec<(&'static str, FieldValue)>> =
        variants.iter().map(extract_key_values).collect();

    FIELD_ORDER
        .iter()
        .filter_map(|field| {
            let values: Vec<FieldValue> = extracted
                .iter()
                .filter_map(|kv| kv.iter().find(|(k, _)| k == field).map(|(_, v)| v.clone()))
                .collect();
            compare_values(field, values)
        })
        .collect()
}

fn compare_values(field: &str, values: Vec<FieldValue>) -> Option<FieldComparison> {
    let last = values.last()?.clone();
    let agreement = agreement_score(&values);
    let nums = numbers(&values);

    let variance = match &nums {
        Some(nums) => match coefficient_of_variation(nums) {
            Some(cv) => cv * 100.0,
            None if nums.iter().all(|n| *n == 0.0) => 0.0,
            // Values straddle zero: treat as fully divergent
            None => 100.0,
        },
        None => 0.0,
    };

    let (selected_value, selection_reason) = match nums.as_deref().and_then(median) {
        Some(m) if agreement < MEDIAN_OVERRIDE_THRESHOLD => (
            FieldValue::Number(m),
            format!(
                "Median of {} values (agreement {:.2} below {:.2})",
                values.len(),
                agreement,
                MEDIAN_OVERRIDE_THRESHOLD
            ),
        ),
        _ => (last, "Value from the last variant".to_string()),
    };

    Some(FieldComparison {
        field: field.to_string(),
        values,
        variance,
        agreement_score: agreement,
        selected_value,
        selection_reason,
    })
}

/// All values as numbers, or `None` if any is text.
fn numbers(values: &[FieldValue]) -> Option<Vec<f64>> {
    values.iter().map(FieldValue::as_number).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Integrity, Sections};

    fn nums(values: &[f64]) -> Vec<FieldValue> {
        values.iter().map(|v| FieldValue::Number(*v)).collect()
    }

    fn texts(values: &[&str]) -> Vec<FieldValue> {
        values.iter().map(|v| FieldValue::Text(v.to_string())).collect()
    }

    #[test]
    fn test_agreement_identical_numbers() {
        assert_eq!(agreement_score(&nums(&[70.0, 70.0, 70.0])), 1.0);
    }

    #[test]
    fn test_agreement_special_cases() {
        assert_eq!(agreement_score(&[]), 1.0);
        assert_eq!(agreement_score(&nums(&[0.0, 0.0])), 1.0);
        assert_eq!(agreement_score(&nums(&[-5.0, 5.0])), 0.5);
    }

    #[test]
    fn test_agreement_text() {
        assert_eq!(agreement_score(&texts(&["D1", "D1", "D1"])), 1.0);
        let score = agreement_score(&texts(&["D1", "D2", "D1"]));
        assert!((score - (1.0 - 1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_agreement_is_bounded() {
        let score = agreement_score(&nums(&[1.0, 1.0, 1000.0]));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_median_override() {
        let comparison = compare_values("runway_months", nums(&[10.0, 10.0, 100.0])).unwrap();
        assert!(comparison.agreement_score < MEDIAN_OVERRIDE_THRESHOLD);
        assert_eq!(comparison.selected_value, FieldValue::Number(10.0));
        assert!(comparison.selection_reason.starts_with("Median"));
    }

    #[test]
    fn test_agreeing_field_keeps_last_value() {
        let comparison = compare_values("confidence", nums(&[70.0, 72.0, 71.0])).unwrap();
        assert_eq!(comparison.selected_value, FieldValue::Number(71.0));
        assert!(comparison.variance < 5.0);
    }

    #[test]
    fn test_median_even_count() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_extract_key_values() {
        let mut report = DiagnosticReport::new(
            Sections {
                executive_brief: "Runway is approximately 6 months; churn is rising.".to_string(),
                scenarios: "Upside case (25% probability). Downside case (40% probability)."
                    .to_string(),
                ..Sections::default()
            },
            Integrity {
                completeness: 70.0,
                evidence_quality: 60.0,
                confidence: 65.0,
                missing_data: vec!["AR aging".to_string()],
            },
        );
        report.diagnosis_code = Some("LIQUIDITY_CRUNCH".to_string());

        let fields: Vec<&str> = extract_key_values(&report).iter().map(|(k, _)| *k).collect();
        assert_eq!(
            fields,
            vec![
                "confidence",
                "completeness",
                "evidence_quality",
                "missing_data_count",
                "runway_months",
                "signal_count",
                "probability_upside",
                "probability_downside",
                "diagnosis_code",
            ]
        );
    }

    #[test]
    fn test_compare_fields_skips_absent_fields() {
        let a = DiagnosticReport::new(Sections::default(), Integrity::default());
        let comparisons = compare_fields(&[a.clone(), a]);
        assert_eq!(comparisons.len(), 4);
        assert!(comparisons.iter().all(|c| c.agreement_score == 1.0));
    }
}
