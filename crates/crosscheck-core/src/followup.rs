//! Follow-up question generator.
//!
//! Questions are only produced when the verdict is weak: evidence score
//! below 0.6 or material disagreement. A report that already validates
//! cleanly gets no questions, whatever its missing-data list says.
//!
//! | Missing-data keywords | Question topic |
//! |-----------------------|----------------|
//! | `p&l`, `revenue` | Monthly P&L |
//! | `customer`, `concentration` | Customer concentration |
//! | `aging`, `receivable` | Receivables aging |
//! | `org`, `management` | Organization and management |
//! | `capex`, `capital` | Capital expenditure |

use crate::report::SectionId;
use crate::types::LensResult;

/// A missing-data category and its canonical question.
struct QuestionCategory {
    keywords: &'static [&'static str],
    question: &'static str,
}

static CATEGORIES: &[QuestionCategory] = &[
    QuestionCategory {
        keywords: &["p&l", "revenue"],
        question: "Can you share monthly P&L statements for the last 24 months, with revenue \
                   broken out by product or service line?",
    },
    QuestionCategory {
        keywords: &["customer", "concentration"],
        question: "Who are your top 10 customers, and what share of revenue does each represent?",
    },
    QuestionCategory {
        keywords: &["aging", "receivable"],
        question: "Can you provide a current accounts receivable aging report, including \
                   balances over 90 days?",
    },
    QuestionCategory {
        keywords: &["org", "management"],
        question: "Can you share an organization chart showing key managers, their tenure and \
                   any open roles?",
    },
    QuestionCategory {
        keywords: &["capex", "capital"],
        question: "What capital expenditures are planned or deferred over the next 12 months, \
                   and how will they be funded?",
    },
];

/// Builds follow-up questions from missing data and weak findings.
pub struct FollowUpGenerator;

impl FollowUpGenerator {
    /// Evidence score below which questions are generated.
    pub const EVIDENCE_THRESHOLD: f64 = 0.6;

    /// Hard cap on the number of questions returned.
    pub const MAX_QUESTIONS: usize = 7;

    /// Warning findings considered for finding-derived questions.
    const WARNINGS_CONSIDERED: usize = 3;

    /// Finding-derived questions kept.
    const MAX_FINDING_QUESTIONS: usize = 2;

    pub fn new() -> Self {
        Self
    }

    /// Generate follow-up questions for a run.
    ///
    /// # Arguments
    ///
    /// * `missing_data` - The report's missing-data labels
    /// * `results` - Lens results in execution order
    /// * `evidence_score` - Evidence score from the detector
    /// * `material_disagreement` - Verdict from the detector
    ///
    /// # Returns
    ///
    /// Deduplicated questions, at most [`Self::MAX_QUESTIONS`]. Empty when
    /// the verdict is already acceptable.
    pub fn generate(
        &self,
        missing_data: &[String],
        results: &[LensResult],
        evidence_score: f64,
        material_disagreement: bool,
    ) -> Vec<String> {
        if evidence_score >= Self::EVIDENCE_THRESHOLD && !material_disagreement {
            return Vec::new();
        }

        let mut questions: Vec<String> = Vec::new();
        let mut push = |q: String| {
            if !questions.contains(&q) {
                questions.push(q);
            }
        };

        for label in missing_data {
            let normalized = label.to_lowercase();
            for category in CATEGORIES {
                if category.keywords.iter().any(|k| normalized.contains(k)) {
                    push(category.question.to_string());
                }
            }
        }

        results
            .iter()
            .flat_map(|r| &r.findings)
            .filter(|f| f.is_warning())
            .take(Self::WARNINGS_CONSIDERED)
            .filter_map(|f| {
                SectionId::from_key(&f.field).map(|section| {
                    format!(
                        "In the {}: {}. What additional information would resolve this?",
                        section.title(),
                        f.message
                    )
                })
            })
            .take(Self::MAX_FINDING_QUESTIONS)
            .for_each(&mut push);

        questions.truncate(Self::MAX_QUESTIONS);
        questions
    }
}

impl Default for FollowUpGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Finding, FindingKind, LensId};

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn result(findings: Vec<Finding>) -> LensResult {
        LensResult {
            lens_id: LensId::Audit,
            success: true,
            findings,
            score: 0.5,
            execution_time_ms: 0,
            error: None,
        }
    }

    #[test]
    fn test_suppressed_when_verdict_is_acceptable() {
        let missing = labels(&["Monthly P&L", "Customer list", "AR aging"]);
        let questions = FollowUpGenerator::new().generate(&missing, &[], 0.6, false);
        assert!(questions.is_empty());
    }

    #[test]
    fn test_one_question_per_category() {
        let missing = labels(&["Monthly P&L", "Revenue by customer", "AR aging report"]);
        let questions = FollowUpGenerator::new().generate(&missing, &[], 0.4, false);
        // "Revenue by customer" hits both P&L (deduplicated) and customer
        assert_eq!(questions.len(), 3);
        assert!(questions[0].contains("P&L"));
        assert!(questions[1].contains("top 10 customers"));
        assert!(questions[2].contains("aging"));
    }

    #[test]
    fn test_finding_questions_limited_to_two() {
        let findings = vec![
            Finding::warning(FindingKind::RiskNotAddressed, "options", "Risk 'covenant' unaddressed"),
            Finding::warning(FindingKind::WarningAccumulation, "report", "not a section"),
            Finding::warning(FindingKind::UnlabeledProbabilities, "scenarios", "Unlabeled"),
            Finding::warning(FindingKind::MissingValuationMethod, "value_ledger", "No method"),
        ];
        let questions = FollowUpGenerator::new().generate(&[], &[result(findings)], 0.9, true);
        assert_eq!(questions.len(), 2);
        assert!(questions[0].starts_with("In the decision options:"));
        assert!(questions[1].starts_with("In the scenario analysis:"));
    }

    #[test]
    fn test_every_source_fills_the_cap() {
        let missing = labels(&["P&L", "Customer", "Aging", "Org chart", "Capex plan"]);
        let findings = vec![
            Finding::warning(FindingKind::RiskNotAddressed, "options", "a"),
            Finding::warning(FindingKind::DebtNotAddressed, "execution_plan", "b"),
            Finding::warning(FindingKind::MissingProvenance, "executive_brief", "c"),
        ];
        let questions = FollowUpGenerator::new().generate(&missing, &[result(findings)], 0.1, true);
        assert_eq!(questions.len(), FollowUpGenerator::MAX_QUESTIONS);
        assert!(questions[6].starts_with("In the execution plan:"));
    }
}
