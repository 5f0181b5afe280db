//! Diagnostic reports and the structured signals extracted from them.
//!
//! Reports arrive from an external generator as YAML/JSON. Every number or
//! keyword the lenses need is pulled out of the narrative once, into
//! [`NarrativeSignals`], so lens code never touches raw prose.

mod parser;
pub mod signals;

pub use parser::{DiagnosticReport, Integrity, ReportError, SectionId, Sections};
pub use signals::{NarrativeSignals, ScenarioProbabilities};
