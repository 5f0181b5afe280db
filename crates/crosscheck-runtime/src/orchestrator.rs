//! Runtime orchestrator for validation and ensemble generation.
//!
//! The orchestrator is the async boundary around the synchronous core. It
//! implements:
//! - Validation of a finished report with the configured mode
//! - Ensemble generation: catalog passes run in order, each with its own timeout
//! - Conservative merge of the surviving variants
//! - Single-pass fallback when every pass fails

use std::sync::Arc;
use std::time::Instant;

use crosscheck_core::lenses::generation_passes;
use crosscheck_core::{DiagnosticReport, EnsembleMerger, GenerationPassId, Runner, ValidationRun};

use crate::config::RuntimeConfig;
use crate::generator::{GenerationRequest, ReportGenerator};
use crate::RuntimeError;

/// Note attached when the single-pass fallback replaced the ensemble.
pub const FALLBACK_NOTE: &str = "Ensemble fallback: every generation pass failed";

/// Orchestrates validation and ensemble generation.
pub struct ValidationOrchestrator {
    /// External report generator, required only for generation
    generator: Option<Arc<dyn ReportGenerator>>,

    /// Configuration
    config: RuntimeConfig,
}

impl ValidationOrchestrator {
    /// Create an orchestrator that can validate but not generate.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            generator: None,
            config,
        }
    }

    pub fn builder() -> ValidationOrchestratorBuilder {
        ValidationOrchestratorBuilder::new()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Validate a finished report.
    ///
    /// The configuration is snapshotted here; a change made while the run is
    /// in flight is not observed.
    pub async fn validate(&self, report: &DiagnosticReport) -> Result<ValidationRun, RuntimeError> {
        let runner = Runner::new(self.config.validation.clone());
        let run = runner.run_at(report, self.config.validated_at())?;
        Ok(run)
    }

    /// Generate a report for `intake` with the configured ensemble mode.
    ///
    /// # Execution Flow
    /// 1. `off`: one plain generation, returned as is
    /// 2. Otherwise run each catalog pass in order under `pass_timeout`;
    ///    failed or timed-out passes are logged and skipped
    /// 3. The synthesis pass receives every earlier variant
    /// 4. Merge the surviving variants and attach ensemble metadata
    /// 5. No survivors: single-pass fallback if `fallback_on_error`, else
    ///    [`RuntimeError::AllPassesFailed`]
    ///
    /// The whole flow is bounded by `total_timeout`.
    pub async fn generate_ensemble(
        &self,
        intake: &serde_json::Value,
    ) -> Result<DiagnosticReport, RuntimeError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or(RuntimeError::GeneratorNotConfigured)?;
        let total = self.config.ensemble.total_timeout;

        match tokio::time::timeout(total, self.do_generate(generator.as_ref(), intake)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?total, "Ensemble generation timed out");
                Err(RuntimeError::Timeout(total))
            }
        }
    }

    async fn do_generate(
        &self,
        generator: &dyn ReportGenerator,
        intake: &serde_json::Value,
    ) -> Result<DiagnosticReport, RuntimeError> {
        let started = Instant::now();
        let validation = &self.config.validation;
        let mode = validation.mode;

        if !mode.is_active() {
            return self
                .generate_pass(generator, GenerationRequest::single(intake.clone()))
                .await;
        }

        let passes = generation_passes(mode);
        let mut variants: Vec<DiagnosticReport> = Vec::with_capacity(passes.len());

        for pass in passes {
            let prior = if pass.id == GenerationPassId::Synthesis {
                variants.clone()
            } else {
                Vec::new()
            };
            let request = GenerationRequest::for_pass(intake.clone(), pass, prior);

            match self.generate_pass(generator, request).await {
                Ok(mut report) => {
                    report.pass_id = Some(pass.id);
                    variants.push(report);
                }
                Err(e) => {
                    tracing::warn!(
                        generator = generator.name(),
                        pass = %pass.id,
                        error = %e,
                        "Generation pass failed, skipping"
                    );
                }
            }
        }

        let merger = EnsembleMerger::from_config(validation);

        let mut merged = if variants.is_empty() {
            if !validation.fallback_on_error {
                return Err(RuntimeError::AllPassesFailed {
                    attempted: passes.len(),
                });
            }
            tracing::warn!(
                generator = generator.name(),
                attempted = passes.len(),
                "All generation passes failed, falling back to single pass"
            );
            let report = self
                .generate_pass(generator, GenerationRequest::single(intake.clone()))
                .await?;
            let mut merged = merger.merge(mode, &[report])?;
            if let Some(meta) = merged.ensemble.as_mut() {
                meta.fallback_used = true;
                meta.passes_completed = 0;
                meta.disagreement_notes.push(FALLBACK_NOTE.to_string());
            }
            merged
        } else {
            merger.merge(mode, &variants)?
        };

        if let Some(meta) = merged.ensemble.as_mut() {
            meta.execution_time_total_ms = started.elapsed().as_millis() as u64;
            tracing::info!(
                mode = %mode,
                passes_completed = meta.passes_completed,
                pass_count = meta.pass_count,
                material_disagreement = meta.material_disagreement,
                fallback_used = meta.fallback_used,
                "Ensemble generation complete"
            );
        }

        Ok(merged)
    }

    /// One generator call under the pass timeout, with the result checked.
    async fn generate_pass(
        &self,
        generator: &dyn ReportGenerator,
        request: GenerationRequest,
    ) -> Result<DiagnosticReport, RuntimeError> {
        let timeout = self.config.ensemble.pass_timeout;
        let report = match tokio::time::timeout(timeout, generator.generate(&request)).await {
            Ok(result) => result?,
            Err(_) => return Err(RuntimeError::Timeout(timeout)),
        };
        report.validate()?;
        Ok(report)
    }
}

/// Builder for ValidationOrchestrator.
pub struct ValidationOrchestratorBuilder {
    generator: Option<Arc<dyn ReportGenerator>>,
    config: RuntimeConfig,
}

impl ValidationOrchestratorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            generator: None,
            config: RuntimeConfig::default(),
        }
    }

    /// Set the report generator.
    pub fn generator(mut self, generator: Arc<dyn ReportGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the orchestrator, rejecting an invalid validation config.
    pub fn build(self) -> Result<ValidationOrchestrator, RuntimeError> {
        self.config.validation.check()?;
        Ok(ValidationOrchestrator {
            generator: self.generator,
            config: self.config,
        })
    }
}

impl Default for ValidationOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
