//! crosscheck CLI
//!
//! Command-line interface for diagnostic report validation.
//!
//! ## Usage
//!
//! ```bash
//! # Validate a report with the 5-pass lens set
//! crosscheck --mode 5pass validate packet.yaml
//!
//! # Pipe from stdin, per-lens breakdown
//! cat packet.yaml | crosscheck --mode 3pass validate --explain
//!
//! # Merge generated variants
//! crosscheck --mode 3pass merge core.yaml risk.yaml synthesis.yaml --format json
//!
//! # Show the lens catalog and the effective configuration
//! crosscheck lenses --mode 5pass
//! crosscheck lenses --mode 3pass --format json
//! crosscheck --config crosscheck.yaml config show
//! ```
//!
//! Settings are layered: config file, then `CROSSCHECK_*` environment
//! variables, then flags.
//!
//! ## Exit Codes
//!
//! - 0: Consistent
//! - 1: Material disagreement
//! - 2: System fault (validation fell back)
//! - 3: Error

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crosscheck_core::lenses::{generation_passes, validation_lens, validation_lenses};
use crosscheck_core::{
    DiagnosticReport, EnsembleMerger, EnsembleMetadata, EnsembleMode, LensResult,
    ValidationMetadata,
};
use crosscheck_runtime::{RuntimeConfig, ValidationOrchestrator};

/// crosscheck: multi-lens validation of diagnostic reports
#[derive(Parser)]
#[command(name = "crosscheck")]
#[command(version)]
#[command(about = "Validate and reconcile generated diagnostic reports", long_about = None)]
struct Cli {
    /// Runtime config file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ensemble mode: off, 3pass or 5pass
    #[arg(long, global = true, value_parser = parse_mode)]
    mode: Option<EnsembleMode>,

    /// Mean lens score below which lenses count as disagreeing (0.0 - 1.0)
    #[arg(long, global = true)]
    consensus_threshold: Option<f64>,

    /// Return lens faults as errors instead of a fallback verdict
    #[arg(long, global = true)]
    no_fallback: bool,

    /// Produce the developer QA record
    #[arg(long, global = true)]
    dev: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a generated report
    Validate {
        /// Path to the report (reads from stdin if not provided)
        report: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Show the per-lens breakdown
        #[arg(long)]
        explain: bool,

        /// Explicit timestamp for the QA record (ISO 8601 / RFC 3339).
        /// Example: --validated-at 2025-12-20T00:00:00Z
        #[arg(long, value_parser = parse_datetime)]
        validated_at: Option<DateTime<Utc>>,
    },

    /// Merge report variants into one report
    Merge {
        /// Variant files, in generation order
        #[arg(required = true)]
        variants: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List validation lenses and generation passes
    Lenses {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration after file, environment and flags
    Show,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Parse ISO 8601 / RFC 3339 datetime string to DateTime<Utc>.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid datetime format: {}. Expected ISO 8601/RFC 3339 (e.g., 2025-12-20T00:00:00Z)", e))
}

fn parse_mode(s: &str) -> Result<EnsembleMode, String> {
    s.parse::<EnsembleMode>().map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    match run() {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(3)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Validate {
            report,
            format,
            explain,
            validated_at,
        } => validate_command(config, report, format, explain, validated_at),
        Commands::Merge { variants, format } => merge_command(config, &variants, format),
        Commands::Lenses { format } => list_lenses(config.validation.mode, format),
        Commands::Config { action } => match action {
            ConfigAction::Show => show_config(&config),
        },
    }
}

/// Build the effective configuration: file, then environment, then flags.
fn load_config(cli: &Cli) -> Result<RuntimeConfig> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => RuntimeConfig::default(),
    };

    config
        .apply_env()
        .context("Invalid CROSSCHECK_* environment variable")?;

    let validation = &mut config.validation;
    if let Some(mode) = cli.mode {
        validation.mode = mode;
    }
    if let Some(threshold) = cli.consensus_threshold {
        validation.consensus_threshold = threshold;
    }
    if cli.no_fallback {
        validation.fallback_on_error = false;
    }
    if cli.dev {
        validation.enable_dev_panel = true;
    }
    validation.check().context("Invalid configuration")?;

    Ok(config)
}

fn load_report(path: Option<&Path>) -> Result<DiagnosticReport> {
    let report = match path {
        Some(path) => DiagnosticReport::from_file(path)
            .with_context(|| format!("Failed to load report from {:?}", path))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            // YAML is a superset of JSON, so either format parses here
            DiagnosticReport::from_yaml(&buffer).context("Failed to parse report from stdin")?
        }
    };
    Ok(report)
}

fn validate_command(
    mut config: RuntimeConfig,
    report_path: Option<PathBuf>,
    format: OutputFormat,
    explain: bool,
    validated_at: Option<DateTime<Utc>>,
) -> Result<ExitCode> {
    let report = load_report(report_path.as_deref())?;

    if validated_at.is_some() {
        config.determinism.validated_at = validated_at;
    }

    let orchestrator = ValidationOrchestrator::builder()
        .config(config)
        .build()
        .context("Invalid configuration")?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let run = runtime
        .block_on(orchestrator.validate(&report))
        .context("Validation failed")?;

    let Some(meta) = run.report.validation.as_ref() else {
        bail!("Validation produced no metadata");
    };

    match format {
        OutputFormat::Json => {
            let json = match &run.debug {
                Some(record) => serde_json::to_string_pretty(&serde_json::json!({
                    "report": &run.report,
                    "qa": record,
                }))?,
                None => serde_json::to_string_pretty(&run.report)?,
            };
            println!("{}", json);
        }
        OutputFormat::Text => {
            print_validation(meta);
            if explain {
                print_lens_breakdown(&run.lens_results);
            }
            if let Some(record) = &run.debug {
                println!();
                println!("--- QA Record ---");
                println!();
                println!("Validated at: {}", record.validated_at.to_rfc3339());
                println!("State: {:?}", record.state);
                println!("Total time: {} ms", record.total_time_ms);
            }
        }
    }

    Ok(if meta.system_fault {
        ExitCode::from(2)
    } else if meta.material_disagreement {
        ExitCode::from(1)
    } else {
        ExitCode::from(0)
    })
}

fn print_validation(meta: &ValidationMetadata) {
    if meta.system_fault {
        println!("SYSTEM FAULT");
    } else if meta.material_disagreement {
        println!("MATERIAL DISAGREEMENT");
    } else {
        println!("CONSISTENT");
    }
    println!();
    println!("Mode: {}", meta.ensemble_mode);
    println!("Consensus: {:.0}%", meta.consensus_score * 100.0);
    println!("Evidence: {:.0}%", meta.evidence_score * 100.0);

    if !meta.disagreement_notes.is_empty() {
        println!();
        println!("Disagreements:");
        for note in &meta.disagreement_notes {
            println!("  - {}", note);
        }
    }

    if !meta.field_diffs.is_empty() {
        println!();
        println!("Disputed fields:");
        for diff in &meta.field_diffs {
            let lenses: Vec<&str> = diff.lenses.iter().map(|l| l.as_str()).collect();
            println!(
                "  - {}: {} warning(s), {} error(s) from {}",
                diff.field,
                diff.warnings,
                diff.errors,
                lenses.join(", ")
            );
        }
    }

    if !meta.follow_up_questions.is_empty() {
        println!();
        println!("Follow-up questions:");
        for (i, question) in meta.follow_up_questions.iter().enumerate() {
            println!("  {}. {}", i + 1, question);
        }
    }
}

fn print_lens_breakdown(results: &[LensResult]) {
    println!();
    println!("--- Lens Findings ---");
    println!();

    if results.is_empty() {
        println!("No lenses ran.");
        return;
    }

    for result in results {
        println!(
            "{}: {:.0}% ({} finding(s), {} ms)",
            validation_lens(result.lens_id).name,
            result.score * 100.0,
            result.findings.len(),
            result.execution_time_ms
        );
        for finding in &result.findings {
            println!(
                "  - [{}] {}: {}",
                finding.severity.as_str(),
                finding.field,
                finding.message
            );
        }
    }
}

fn merge_command(config: RuntimeConfig, paths: &[PathBuf], format: OutputFormat) -> Result<ExitCode> {
    let mode = config.validation.mode;
    if !mode.is_active() {
        bail!("Merging variants needs an active ensemble mode (--mode 3pass or 5pass)");
    }

    let variants = paths
        .iter()
        .map(|path| load_report(Some(path)))
        .collect::<Result<Vec<_>>>()?;

    let merged = EnsembleMerger::from_config(&config.validation)
        .merge(mode, &variants)
        .context("Merge failed")?;
    let Some(meta) = merged.ensemble.as_ref() else {
        bail!("Merge produced no ensemble metadata");
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&merged)?);
        }
        OutputFormat::Text => print_merge(&merged, meta),
    }

    Ok(if meta.material_disagreement {
        ExitCode::from(1)
    } else {
        ExitCode::from(0)
    })
}

fn print_merge(merged: &DiagnosticReport, meta: &EnsembleMetadata) {
    if meta.material_disagreement {
        println!("MATERIAL DISAGREEMENT");
    } else {
        println!("CONSISTENT");
    }
    println!();
    println!(
        "Mode: {} ({} of {} variants)",
        meta.ensemble_mode, meta.passes_completed, meta.pass_count
    );
    println!("Consensus: {:.0}%", meta.consensus_score * 100.0);
    if let Some(pass) = merged.pass_id {
        println!("Base variant: {}", pass);
    }
    println!(
        "Integrity: completeness {:.0}, evidence {:.0}, confidence {:.0}",
        merged.integrity.completeness,
        merged.integrity.evidence_quality,
        merged.integrity.confidence
    );

    if !meta.disagreement_notes.is_empty() {
        println!();
        println!("Disagreements:");
        for note in &meta.disagreement_notes {
            println!("  - {}", note);
        }
    }

    if !meta.field_comparisons.is_empty() {
        println!();
        println!("Fields:");
        for comparison in &meta.field_comparisons {
            println!(
                "  {}: {} ({:.0}% agreement, {})",
                comparison.field,
                comparison.selected_value,
                comparison.agreement_score * 100.0,
                comparison.selection_reason
            );
        }
    }

    if !merged.integrity.missing_data.is_empty() {
        println!();
        println!("Missing data:");
        for label in &merged.integrity.missing_data {
            println!("  - {}", label);
        }
    }
}

fn list_lenses(mode: EnsembleMode, format: OutputFormat) -> Result<ExitCode> {
    if let OutputFormat::Json = format {
        let json = serde_json::json!({
            "mode": mode,
            "validation_lenses": validation_lenses(mode),
            "generation_passes": generation_passes(mode),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(ExitCode::from(0));
    }

    println!("Mode: {}", mode);
    println!();

    if !mode.is_active() {
        println!("Single pass: no lenses run.");
        return Ok(ExitCode::from(0));
    }

    println!("Validation lenses:");
    for (i, lens) in validation_lenses(mode).iter().enumerate() {
        println!("  {}. {} ({})", i + 1, lens.name, lens.id);
        println!("     {}", lens.description);
    }
    println!();

    println!("Generation passes:");
    for (i, pass) in generation_passes(mode).iter().enumerate() {
        println!("  {}. {} ({})", i + 1, pass.name, pass.id);
        println!("     {}", pass.description);
    }

    Ok(ExitCode::from(0))
}

fn show_config(config: &RuntimeConfig) -> Result<ExitCode> {
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    println!("{}", json);
    Ok(ExitCode::from(0))
}
