//! # crosscheck-runtime
//!
//! Async orchestration around crosscheck-core.
//!
//! This crate provides:
//! - Layered configuration (file, `CROSSCHECK_*` environment, caller overrides)
//! - The [`ReportGenerator`] seam for whatever produces reports
//! - Ensemble generation with per-pass timeouts and single-pass fallback
//! - Async validation of finished reports

pub mod config;
pub mod generator;
pub mod orchestrator;

pub use config::{DeterminismConfig, EnsembleConfig, RuntimeConfig};
pub use generator::{GenerationRequest, GeneratorError, ReportGenerator};
pub use orchestrator::{ValidationOrchestrator, ValidationOrchestratorBuilder};

use std::time::Duration;
use thiserror::Error;

use crosscheck_core::{ConfigError, MergeError, ReportError, ValidationError};

/// Runtime errors.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: String, value: String },

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("No report generator configured")]
    GeneratorNotConfigured,

    #[error("All {attempted} generation passes failed")]
    AllPassesFailed { attempted: usize },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}
