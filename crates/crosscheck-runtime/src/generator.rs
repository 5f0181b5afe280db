//! The external report generator, as seen from the runtime.
//!
//! crosscheck never writes reports itself. Callers plug in whatever produces
//! them (a model client, a template engine, a fixture loader) by implementing
//! [`ReportGenerator`].

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crosscheck_core::lenses::GenerationPassDefinition;
use crosscheck_core::{DiagnosticReport, GenerationPassId};

/// Errors a generator may report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("Generation failed: {0}")]
    Failed(String),

    #[error("Generator returned an invalid report: {0}")]
    InvalidReport(String),
}

/// One request to the generator.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// Structured intake answers, passed through untouched
    pub intake: serde_json::Value,

    /// Pass being generated; `None` for a plain single-pass generation
    pub pass: Option<GenerationPassId>,

    /// Catalog instruction for the pass (empty for single-pass)
    pub instruction: String,

    /// Variants produced by earlier passes. Only the synthesis pass gets them.
    pub prior: Vec<DiagnosticReport>,
}

impl GenerationRequest {
    /// Plain generation with no ensemble pass.
    pub fn single(intake: serde_json::Value) -> Self {
        Self {
            intake,
            pass: None,
            instruction: String::new(),
            prior: Vec::new(),
        }
    }

    /// Request for a catalog pass.
    pub fn for_pass(
        intake: serde_json::Value,
        pass: &GenerationPassDefinition,
        prior: Vec<DiagnosticReport>,
    ) -> Self {
        Self {
            intake,
            pass: Some(pass.id),
            instruction: pass.instruction.to_string(),
            prior,
        }
    }
}

/// Produces diagnostic reports.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Generate one report for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<DiagnosticReport, GeneratorError>;

    /// Name used in logs.
    fn name(&self) -> &str;
}
