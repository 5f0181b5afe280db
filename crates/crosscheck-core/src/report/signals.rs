//! Structured signals extracted from report narrative.
//!
//! A missed match is never an error: the corresponding field stays empty and
//! the lens check that depends on it is skipped.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

use super::parser::{DiagnosticReport, SectionId, Sections};

lazy_static! {
    /// "runway is approximately 6 months", "runway of ~9-12 months"
    static ref RUNWAY_PATTERN: Regex = Regex::new(
        r"(?i)\brunway\b[^0-9.\n]{0,40}?(\d+(?:\.\d+)?)"
    ).unwrap();

    /// "Month 18"
    static ref MONTH_REF_PATTERN: Regex = Regex::new(
        r"(?i)\bmonth\s+(\d{1,3})\b"
    ).unwrap();

    /// "Option 3", "Option B"
    static ref OPTION_ID_PATTERN: Regex = Regex::new(
        r"(?i)\boption\s+(\d{1,2}|[A-H])\b"
    ).unwrap();

    /// "Option 1 through Option 4", "Options 2-5", "Option A to D"
    static ref OPTION_RANGE_PATTERN: Regex = Regex::new(
        r"\b(?i:options?)\s+(\d{1,2}|[A-H])\s*(?:(?i:through|thru|to)|-|–)\s*(?:(?i:options?)\s+)?(\d{1,2}|[A-H])\b"
    ).unwrap();

    static ref PROVENANCE_PATTERN: Regex = Regex::new(
        r"\[(OBSERVED|INFERRED|ASSUMED|COMPUTED)\]"
    ).unwrap();

    /// "Downside case (45% probability)", "Base: 50%"
    static ref PROBABILITY_PATTERN: Regex = Regex::new(
        r"(?i)\b(base|upside|downside)\b[^%\n]{0,60}?(\d{1,3}(?:\.\d+)?)\s*%"
    ).unwrap();

    static ref EVIDENCE_PENDING_PATTERN: Regex = Regex::new(
        r"(?i)\b(pending|requested|outstanding|awaiting|not yet received)\b"
    ).unwrap();

    static ref EVIDENCE_RECEIVED_PATTERN: Regex = Regex::new(
        r"(?i)\b(received|verified|provided|on file)\b"
    ).unwrap();

    /// "40% recovery", "recovery of roughly 35%"
    static ref RECOVERY_PATTERN: Regex = Regex::new(
        r"(?i)(\d{1,3}(?:\.\d+)?)\s*%\s*(?:recovery|recovered)|\brecover(?:y|ed)\b[^%\n]{0,40}?(\d{1,3}(?:\.\d+)?)\s*%"
    ).unwrap();

    /// Currency amounts such as "$250k", "$1.2M", "$400,000"
    static ref AMOUNT_PATTERN: Regex = Regex::new(
        r"(?i)\$\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:k|mm|m|million|thousand|bn|billion)\b)?"
    ).unwrap();
}

/// Evidence-provenance markers recognised in narrative text.
pub const PROVENANCE_MARKERS: [&str; 4] = ["OBSERVED", "INFERRED", "ASSUMED", "COMPUTED"];

/// Operating signals whose mention in the brief should carry into the plan.
pub static SIGNAL_TERMS: &[&str] = &[
    "churn",
    "cash burn",
    "margin compression",
    "declining revenue",
    "attrition",
    "backlog",
    "seasonality",
];

/// Risk vocabulary that the decision options are expected to address.
pub static RISK_TERMS: &[&str] = &[
    "covenant",
    "default",
    "insolvency",
    "going concern",
    "liquidity",
    "concentration",
    "litigation",
    "regulatory",
    "key person",
];

/// Language showing lender or debt exposure.
pub static DEBT_TERMS: &[&str] = &[
    "secured lender",
    "senior lender",
    "senior debt",
    "secured debt",
    "lien",
    "creditor",
    "debt",
];

/// Valuation methodologies a value ledger should cite.
pub static VALUATION_TERMS: &[&str] = &[
    "dcf",
    "discounted cash flow",
    "ebitda multiple",
    "revenue multiple",
    "multiple",
    "comparable",
    "liquidation value",
    "asset-based",
    "book value",
    "orderly liquidation",
];

/// Wording that acknowledges gaps in the supplied data.
pub static ACKNOWLEDGMENT_TERMS: &[&str] = &[
    "missing",
    "data gap",
    "limited data",
    "not provided",
    "incomplete",
    "unavailable",
    "pending",
];

/// Urgency language expected in a plan facing a likely downside.
pub static URGENCY_TERMS: &[&str] = &[
    "immediate",
    "immediately",
    "urgent",
    "urgently",
    "within 30 days",
    "first 30 days",
    "week 1",
    "this week",
    "critical",
    "priority",
];

/// Growth language expected in a plan with a credible upside.
pub static GROWTH_TERMS: &[&str] = &[
    "growth",
    "opportunity",
    "expand",
    "expansion",
    "upside",
    "scale",
    "new market",
];

/// Return-on-investment language.
pub static RETURN_TERMS: &[&str] = &[
    "roi",
    "return on",
    "payback",
    "pays back",
    "irr",
    "break-even",
    "breakeven",
];

/// Context words that turn a currency amount into an investment.
pub static INVESTMENT_TERMS: &[&str] = &["invest", "capex", "capital", "cost", "spend", "fund"];

/// Labeled scenario probabilities, as percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScenarioProbabilities {
    pub base: Option<f64>,
    pub upside: Option<f64>,
    pub downside: Option<f64>,
}

impl ScenarioProbabilities {
    pub fn any_labeled(&self) -> bool {
        self.base.is_some() || self.upside.is_some() || self.downside.is_some()
    }
}

/// Everything the lenses read from narrative text, extracted once per report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NarrativeSignals {
    /// Runway stated in the executive brief
    pub brief_runway_months: Option<f64>,

    /// Runway implied by the scenarios: an explicit runway statement there,
    /// else the first month reference
    pub scenario_runway_months: Option<f64>,

    pub scenario_month_refs: Vec<u32>,

    /// Option identifiers defined in the options section (uppercased)
    pub defined_options: BTreeSet<String>,

    /// Option identifiers referenced in the execution plan (uppercased)
    pub referenced_options: BTreeSet<String>,

    /// Occurrences of each provenance marker across all sections
    pub provenance_markers: BTreeMap<&'static str, usize>,

    pub probabilities: ScenarioProbabilities,

    pub evidence_received: usize,
    pub evidence_pending: usize,

    /// Recovery percentages stated in the value ledger
    pub recovery_percentages: Vec<f64>,

    /// Currency amounts in the options section that sit next to investment wording
    pub investment_amounts: Vec<String>,

    lowered: BTreeMap<SectionId, String>,
}

impl NarrativeSignals {
    pub fn extract(report: &DiagnosticReport) -> Self {
        Self::from_sections(&report.sections)
    }

    pub fn from_sections(sections: &Sections) -> Self {
        let lowered = sections
            .iter()
            .map(|(id, text)| (id, text.to_lowercase()))
            .collect();

        let scenario_month_refs: Vec<u32> = MONTH_REF_PATTERN
            .captures_iter(&sections.scenarios)
            .filter_map(|c| c.get(1)?.as_str().parse().ok())
            .collect();

        let scenario_runway_months = first_runway(&sections.scenarios)
            .or_else(|| scenario_month_refs.first().map(|m| f64::from(*m)));

        let mut provenance_markers = BTreeMap::new();
        for (_, text) in sections.iter() {
            for cap in PROVENANCE_PATTERN.captures_iter(text) {
                if let Some(marker) = cap
                    .get(1)
                    .and_then(|m| PROVENANCE_MARKERS.iter().find(|p| **p == m.as_str()))
                {
                    *provenance_markers.entry(*marker).or_insert(0) += 1;
                }
            }
        }

        let (evidence_received, evidence_pending) = count_evidence_items(&sections.evidence_register);

        Self {
            brief_runway_months: first_runway(&sections.executive_brief),
            scenario_runway_months,
            scenario_month_refs,
            defined_options: option_ids(&sections.options),
            referenced_options: option_ids(&sections.execution_plan),
            provenance_markers,
            probabilities: probabilities(&sections.scenarios),
            evidence_received,
            evidence_pending,
            recovery_percentages: recovery_percentages(&sections.value_ledger),
            investment_amounts: investment_amounts(&sections.options),
            lowered,
        }
    }

    /// Whether `section` mentions `term` (case-insensitive).
    pub fn mentions(&self, section: SectionId, term: &str) -> bool {
        self.lowered
            .get(&section)
            .map(|text| text.contains(&term.to_lowercase()))
            .unwrap_or(false)
    }

    pub fn mentions_any(&self, section: SectionId, terms: &[&str]) -> bool {
        terms.iter().any(|t| self.mentions(section, t))
    }

    /// The subset of `terms` that `section` mentions, in list order.
    pub fn terms_in(&self, section: SectionId, terms: &[&'static str]) -> Vec<&'static str> {
        terms.iter().copied().filter(|t| self.mentions(section, t)).collect()
    }

    pub fn total_provenance_markers(&self) -> usize {
        self.provenance_markers.values().sum()
    }

    /// Share of evidence items already received, if the register lists any.
    pub fn evidence_completion(&self) -> Option<f64> {
        let total = self.evidence_received + self.evidence_pending;
        if total == 0 {
            None
        } else {
            Some(self.evidence_received as f64 / total as f64)
        }
    }

    /// Number of operating and risk signals named in the brief.
    pub fn signal_count(&self) -> usize {
        self.terms_in(SectionId::ExecutiveBrief, SIGNAL_TERMS).len()
            + self.terms_in(SectionId::ExecutiveBrief, RISK_TERMS).len()
    }
}

fn first_runway(text: &str) -> Option<f64> {
    RUNWAY_PATTERN
        .captures(text)
        .and_then(|c| c.get(1)?.as_str().parse().ok())
}

/// Widest option range expanded; anything wider is treated as prose.
const MAX_OPTION_RANGE: u32 = 20;

fn option_ids(text: &str) -> BTreeSet<String> {
    let mut ids: BTreeSet<String> = OPTION_ID_PATTERN
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_uppercase()))
        .collect();

    for cap in OPTION_RANGE_PATTERN.captures_iter(text) {
        let (Some(start), Some(end)) = (cap.get(1), cap.get(2)) else {
            continue;
        };
        ids.extend(expand_option_range(start.as_str(), end.as_str()));
    }
    ids
}

/// Ids from `start` to `end` inclusive. Both ends must be numbers or both
/// letters, in ascending order.
fn expand_option_range(start: &str, end: &str) -> Vec<String> {
    if let (Ok(a), Ok(b)) = (start.parse::<u32>(), end.parse::<u32>()) {
        if a <= b && b - a <= MAX_OPTION_RANGE {
            return (a..=b).map(|n| n.to_string()).collect();
        }
        return Vec::new();
    }

    let mut letters = (start.chars(), end.chars());
    match (letters.0.next(), letters.1.next()) {
        (Some(a), Some(b)) if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() && a <= b => {
            (a..=b).map(|c| c.to_string()).collect()
        }
        _ => Vec::new(),
    }
}

fn probabilities(text: &str) -> ScenarioProbabilities {
    let mut probs = ScenarioProbabilities::default();
    for cap in PROBABILITY_PATTERN.captures_iter(text) {
        let (Some(label), Some(value)) = (cap.get(1), cap.get(2)) else {
            continue;
        };
        let Ok(value) = value.as_str().parse::<f64>() else {
            continue;
        };
        let slot = match label.as_str().to_lowercase().as_str() {
            "base" => &mut probs.base,
            "upside" => &mut probs.upside,
            _ => &mut probs.downside,
        };
        // First labeled figure wins
        if slot.is_none() {
            *slot = Some(value);
        }
    }
    probs
}

fn count_evidence_items(text: &str) -> (usize, usize) {
    let mut received = 0;
    let mut pending = 0;
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        // "not yet received" is pending, so pending is checked first
        if EVIDENCE_PENDING_PATTERN.is_match(line) {
            pending += 1;
        } else if EVIDENCE_RECEIVED_PATTERN.is_match(line) {
            received += 1;
        }
    }
    (received, pending)
}

fn recovery_percentages(text: &str) -> Vec<f64> {
    RECOVERY_PATTERN
        .captures_iter(text)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

fn investment_amounts(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            INVESTMENT_TERMS.iter().any(|t| lower.contains(t))
        })
        .flat_map(|line| AMOUNT_PATTERN.find_iter(line).map(|m| m.as_str().trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections() -> Sections {
        Sections {
            executive_brief: "Cash runway is approximately 6 months. Customer churn is rising \
                              and covenant headroom is thin."
                .to_string(),
            scenarios: "Base case (50% probability): stabilise by Month 9.\n\
                        Upside case: 20% chance of contract win.\n\
                        Downside case (30% probability): cash exhausted by Month 18."
                .to_string(),
            options: "Option 1: Refinance the secured debt.\n\
                      Option 2: Invest $250k in sales capacity.\n\
                      Option B: Sell the non-core unit."
                .to_string(),
            execution_plan: "Week 1: start Option 1. Month 2: evaluate Option 4.".to_string(),
            value_ledger: "Orderly liquidation value suggests a 40% recovery for unsecured creditors. \
                           [COMPUTED]"
                .to_string(),
            evidence_register: "Bank statements - received\nAR aging - pending\n\
                                Payroll register - verified\nCustomer contracts - not yet received"
                .to_string(),
        }
    }

    #[test]
    fn test_runway_and_month_refs() {
        let signals = NarrativeSignals::from_sections(&sections());
        assert_eq!(signals.brief_runway_months, Some(6.0));
        assert_eq!(signals.scenario_month_refs, vec![9, 18]);
        // No runway statement in scenarios: falls back to first month reference
        assert_eq!(signals.scenario_runway_months, Some(9.0));
    }

    #[test]
    fn test_option_ids() {
        let signals = NarrativeSignals::from_sections(&sections());
        let defined: Vec<&str> = signals.defined_options.iter().map(String::as_str).collect();
        assert_eq!(defined, vec!["1", "2", "B"]);
        assert!(signals.referenced_options.contains("4"));
        assert!(signals.referenced_options.contains("1"));
    }

    #[test]
    fn test_option_ranges_define_every_option() {
        let through = option_ids("We evaluated Option 1 through Option 4 below.");
        let through: Vec<&str> = through.iter().map(String::as_str).collect();
        assert_eq!(through, vec!["1", "2", "3", "4"]);

        let dashed = option_ids("Options 2-5 are ranked by cost.");
        assert!(["2", "3", "4", "5"].iter().all(|id| dashed.contains(*id)));

        let letters = option_ids("Option A to Option C are mutually exclusive.");
        let letters: Vec<&str> = letters.iter().map(String::as_str).collect();
        assert_eq!(letters, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_option_range_ignores_prose() {
        // "to a buyer" is not a range end
        let ids = option_ids("Option 2 to a buyer; Option 9 to 3 is backwards.");
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["2", "9"]);
    }

    #[test]
    fn test_probabilities() {
        let signals = NarrativeSignals::from_sections(&sections());
        assert_eq!(signals.probabilities.base, Some(50.0));
        assert_eq!(signals.probabilities.upside, Some(20.0));
        assert_eq!(signals.probabilities.downside, Some(30.0));
    }

    #[test]
    fn test_evidence_register_counts() {
        let signals = NarrativeSignals::from_sections(&sections());
        assert_eq!(signals.evidence_received, 2);
        assert_eq!(signals.evidence_pending, 2);
        assert_eq!(signals.evidence_completion(), Some(0.5));
    }

    #[test]
    fn test_value_signals() {
        let signals = NarrativeSignals::from_sections(&sections());
        assert_eq!(signals.recovery_percentages, vec![40.0]);
        assert_eq!(signals.investment_amounts, vec!["$250k".to_string()]);
        assert_eq!(signals.provenance_markers.get("COMPUTED"), Some(&1));
        assert_eq!(signals.total_provenance_markers(), 1);
    }

    #[test]
    fn test_keyword_mentions() {
        let signals = NarrativeSignals::from_sections(&sections());
        assert!(signals.mentions(SectionId::ExecutiveBrief, "CHURN"));
        assert_eq!(
            signals.terms_in(SectionId::ExecutiveBrief, RISK_TERMS),
            vec!["covenant"]
        );
        assert_eq!(signals.signal_count(), 2);
    }

    #[test]
    fn test_empty_sections_yield_no_signals() {
        let signals = NarrativeSignals::from_sections(&Sections::default());
        assert_eq!(signals.brief_runway_months, None);
        assert_eq!(signals.scenario_runway_months, None);
        assert!(signals.defined_options.is_empty());
        assert!(!signals.probabilities.any_labeled());
        assert_eq!(signals.evidence_completion(), None);
    }
}
