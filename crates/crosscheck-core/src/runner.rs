//! Validation runner.
//!
//! Two states:
//!
//! | State | Mode | Behavior |
//! |-------|------|----------|
//! | `SinglePass` | `off` | No lens runs; the perfect verdict is attached |
//! | `MultiPass` | `3pass`, `5pass` | Lenses run in catalog order, synthesis last |
//!
//! A lens fault, an `Err` or a panic, is all-or-nothing: the whole run
//! degrades to the fallback verdict (or the error is returned when
//! `fallback_on_error` is off). The results of lenses that already succeeded
//! are discarded.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::detector::DisagreementDetector;
use crate::followup::FollowUpGenerator;
use crate::lenses::{lens_for, validation_lenses, Lens, LensContext, LensError};
use crate::mode::{ConfigError, EnsembleMode, ValidationConfig};
use crate::report::{DiagnosticReport, NarrativeSignals};
use crate::types::{LensId, LensResult, ValidationMetadata};

/// Errors returned by a validation run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Lens fault: {0}")]
    Lens(#[from] LensError),
}

/// Runner state, derived from the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    SinglePass,
    MultiPass,
}

impl RunState {
    pub fn for_mode(mode: EnsembleMode) -> Self {
        if mode.is_active() {
            RunState::MultiPass
        } else {
            RunState::SinglePass
        }
    }
}

/// One lens line of the QA record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaLensEntry {
    pub lens_id: LensId,
    pub score: f64,
    pub finding_count: usize,
    pub execution_time_ms: u64,
}

/// Developer-only record of a run. Never part of the validation metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaRecord {
    pub mode: EnsembleMode,
    pub state: RunState,
    pub validated_at: DateTime<Utc>,
    pub lenses: Vec<QaLensEntry>,
    pub top_disagreements: Vec<String>,
    pub total_time_ms: u64,
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct ValidationRun {
    /// Copy of the input report with `validation` attached
    pub report: DiagnosticReport,

    /// Lens results behind the verdict (empty for single-pass and fallback runs)
    pub lens_results: Vec<LensResult>,

    /// Present only when the dev panel is enabled
    pub debug: Option<QaRecord>,
}

/// Runs the lenses for one configuration.
pub struct Runner {
    config: ValidationConfig,
    lenses: Vec<Box<dyn Lens>>,
}

impl Runner {
    /// Entries kept in the QA record's disagreement list.
    const TOP_DISAGREEMENTS: usize = 3;

    /// Runner with the catalog lenses for `config.mode`.
    pub fn new(config: ValidationConfig) -> Self {
        let lenses = validation_lenses(config.mode)
            .iter()
            .map(|def| lens_for(def.id))
            .collect();
        Self { config, lenses }
    }

    /// Runner with an explicit lens sequence. The mode still decides
    /// whether any lens runs.
    pub fn with_lenses(config: ValidationConfig, lenses: Vec<Box<dyn Lens>>) -> Self {
        Self { config, lenses }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate `report`, stamping the QA record with the current time.
    pub fn run(&self, report: &DiagnosticReport) -> Result<ValidationRun, ValidationError> {
        self.run_at(report, Utc::now())
    }

    /// Validate `report` with an explicit QA timestamp.
    ///
    /// # Arguments
    ///
    /// * `report` - The report to validate; never modified
    /// * `validated_at` - Timestamp recorded in the QA record
    ///
    /// # Returns
    ///
    /// A [`ValidationRun`] whose report is a copy of the input with
    /// `validation` attached. Lens faults are returned as
    /// [`ValidationError::Lens`] only when `fallback_on_error` is off.
    pub fn run_at(
        &self,
        report: &DiagnosticReport,
        validated_at: DateTime<Utc>,
    ) -> Result<ValidationRun, ValidationError> {
        self.config.check()?;

        let started = Instant::now();
        let mode = self.config.mode;
        let state = RunState::for_mode(mode);

        let (metadata, lens_results) = match state {
            RunState::SinglePass => (ValidationMetadata::perfect(mode), Vec::new()),
            RunState::MultiPass => match self.execute_lenses(report) {
                Ok(results) => (self.build_metadata(report, &results), results),
                Err(e) if self.config.fallback_on_error => {
                    warn!(mode = %mode, error = %e, "Validation degraded to fallback");
                    (ValidationMetadata::fallback(mode, &e.to_string()), Vec::new())
                }
                Err(e) => return Err(e.into()),
            },
        };

        info!(
            mode = %mode,
            consensus_score = metadata.consensus_score,
            material_disagreement = metadata.material_disagreement,
            system_fault = metadata.system_fault,
            "Validation complete"
        );

        let debug = self.config.enable_dev_panel.then(|| {
            let record = QaRecord {
                mode,
                state,
                validated_at,
                lenses: lens_results
                    .iter()
                    .map(|r| QaLensEntry {
                        lens_id: r.lens_id,
                        score: r.score,
                        finding_count: r.findings.len(),
                        execution_time_ms: r.execution_time_ms,
                    })
                    .collect(),
                top_disagreements: metadata
                    .disagreement_notes
                    .iter()
                    .take(Self::TOP_DISAGREEMENTS)
                    .cloned()
                    .collect(),
                total_time_ms: started.elapsed().as_millis() as u64,
            };
            debug!(target: "crosscheck::qa", record = ?record, "QA record");
            record
        });

        Ok(ValidationRun {
            report: report.with_validation(metadata),
            lens_results,
            debug,
        })
    }

    /// Run every lens in order. The first fault aborts the sequence.
    fn execute_lenses(&self, report: &DiagnosticReport) -> Result<Vec<LensResult>, LensError> {
        let signals = NarrativeSignals::extract(report);
        let mut results: Vec<LensResult> = Vec::with_capacity(self.lenses.len());

        for lens in &self.lenses {
            let started = Instant::now();
            let ctx = LensContext::new(report, &signals, &results);
            let inspection = panic::catch_unwind(AssertUnwindSafe(|| lens.inspect(&ctx)))
                .unwrap_or_else(|payload| {
                    Err(LensError::Failed {
                        lens: lens.lens_id(),
                        reason: format!("panicked: {}", panic_payload_to_string(payload.as_ref())),
                    })
                })?;
            let execution_time_ms = started.elapsed().as_millis() as u64;

            debug!(
                lens = %lens.lens_id(),
                score = inspection.score,
                findings = inspection.findings.len(),
                execution_time_ms,
                "Lens finished"
            );

            results.push(LensResult {
                lens_id: lens.lens_id(),
                success: true,
                findings: inspection.findings,
                score: inspection.score,
                execution_time_ms,
                error: None,
            });
        }

        Ok(results)
    }

    fn build_metadata(&self, report: &DiagnosticReport, results: &[LensResult]) -> ValidationMetadata {
        let verdict = DisagreementDetector::new(self.config.consensus_threshold).detect(report, results);
        let follow_up_questions = FollowUpGenerator::new().generate(
            &report.integrity.missing_data,
            results,
            verdict.evidence_score,
            verdict.material_disagreement,
        );

        ValidationMetadata {
            ensemble_mode: self.config.mode,
            consensus_score: verdict.consensus_score,
            evidence_score: verdict.evidence_score,
            material_disagreement: verdict.material_disagreement,
            system_fault: false,
            disagreement_notes: verdict.notes,
            follow_up_questions,
            field_diffs: verdict.field_diffs,
        }
    }
}

fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lenses::test_support::report;
    use crate::report::Sections;
    use crate::types::Inspection;
    use chrono::TimeZone;

    struct FaultyLens;

    impl Lens for FaultyLens {
        fn lens_id(&self) -> LensId {
            LensId::Risk
        }

        fn inspect(&self, _ctx: &LensContext<'_>) -> Result<Inspection, LensError> {
            Err(LensError::Failed {
                lens: LensId::Risk,
                reason: "pattern table unavailable".to_string(),
            })
        }
    }

    struct PanickingLens;

    impl Lens for PanickingLens {
        fn lens_id(&self) -> LensId {
            LensId::Value
        }

        fn inspect(&self, ctx: &LensContext<'_>) -> Result<Inspection, LensError> {
            let amounts: Vec<String> = ctx.signals.investment_amounts.clone();
            let _first = &amounts[0];
            Ok(Inspection {
                findings: Vec::new(),
                score: 1.0,
            })
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_run_state_for_mode() {
        assert_eq!(RunState::for_mode(EnsembleMode::Off), RunState::SinglePass);
        assert_eq!(RunState::for_mode(EnsembleMode::FivePass), RunState::MultiPass);
    }

    #[test]
    fn test_single_pass_runs_no_lens() {
        let runner = Runner::with_lenses(ValidationConfig::default(), vec![Box::new(FaultyLens)]);
        let run = runner.run(&report(Sections::default())).unwrap();
        assert!(run.lens_results.is_empty());
        assert_eq!(
            run.report.validation,
            Some(ValidationMetadata::perfect(EnsembleMode::Off))
        );
    }

    #[test]
    fn test_lens_order_matches_catalog() {
        let runner = Runner::new(ValidationConfig::with_mode(EnsembleMode::FivePass));
        let run = runner.run(&report(Sections::default())).unwrap();
        let ids: Vec<LensId> = run.lens_results.iter().map(|r| r.lens_id).collect();
        assert_eq!(
            ids,
            vec![
                LensId::Consistency,
                LensId::Audit,
                LensId::Risk,
                LensId::Value,
                LensId::Synthesis
            ]
        );
    }

    #[test]
    fn test_fault_falls_back() {
        let config = ValidationConfig::with_mode(EnsembleMode::ThreePass);
        let runner = Runner::with_lenses(config, vec![Box::new(FaultyLens)]);
        let run = runner.run(&report(Sections::default())).unwrap();

        let meta = run.report.validation.unwrap();
        assert!(meta.material_disagreement);
        assert!(meta.system_fault);
        assert_eq!(meta.ensemble_mode, EnsembleMode::ThreePass);
        assert_eq!(meta.disagreement_notes.len(), 1);
        assert!(meta.disagreement_notes[0].contains("pattern table unavailable"));
    }

    #[test]
    fn test_panicking_lens_falls_back() {
        let config = ValidationConfig::with_mode(EnsembleMode::FivePass);
        let runner = Runner::with_lenses(
            config,
            vec![lens_for(LensId::Consistency), Box::new(PanickingLens)],
        );
        let run = runner.run(&report(Sections::default())).unwrap();

        assert!(run.lens_results.is_empty());
        let meta = run.report.validation.unwrap();
        assert!(meta.material_disagreement);
        assert!(meta.system_fault);
        assert_eq!(meta.disagreement_notes.len(), 1);
        assert!(meta.disagreement_notes[0].contains("Validation fallback"));
        assert!(meta.disagreement_notes[0].contains("panicked"));
    }

    #[test]
    fn test_panicking_lens_propagates_without_fallback() {
        let config = ValidationConfig {
            fallback_on_error: false,
            ..ValidationConfig::with_mode(EnsembleMode::ThreePass)
        };
        let runner = Runner::with_lenses(config, vec![Box::new(PanickingLens)]);
        let err = runner.run(&report(Sections::default())).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Lens(LensError::Failed { lens: LensId::Value, .. })
        ));
    }

    #[test]
    fn test_fault_propagates_without_fallback() {
        let config = ValidationConfig {
            fallback_on_error: false,
            ..ValidationConfig::with_mode(EnsembleMode::ThreePass)
        };
        let runner = Runner::with_lenses(config, vec![Box::new(FaultyLens)]);
        let err = runner.run(&report(Sections::default())).unwrap_err();
        assert!(matches!(err, ValidationError::Lens(LensError::Failed { .. })));
    }

    #[test]
    fn test_invalid_threshold_is_rejected() {
        let config = ValidationConfig {
            consensus_threshold: 1.5,
            ..ValidationConfig::with_mode(EnsembleMode::ThreePass)
        };
        let err = Runner::new(config).run(&report(Sections::default())).unwrap_err();
        assert_eq!(err, ValidationError::Config(ConfigError::ThresholdOutOfRange(1.5)));
    }

    #[test]
    fn test_qa_record_only_with_dev_panel() {
        let input = report(Sections::default());
        let quiet = Runner::new(ValidationConfig::with_mode(EnsembleMode::ThreePass));
        assert!(quiet.run(&input).unwrap().debug.is_none());

        let config = ValidationConfig {
            enable_dev_panel: true,
            ..ValidationConfig::with_mode(EnsembleMode::ThreePass)
        };
        let run = Runner::new(config).run_at(&input, fixed_time()).unwrap();
        let record = run.debug.unwrap();
        assert_eq!(record.validated_at, fixed_time());
        assert_eq!(record.state, RunState::MultiPass);
        assert_eq!(record.lenses.len(), 3);
        assert!(record.top_disagreements.len() <= 3);
    }
}
