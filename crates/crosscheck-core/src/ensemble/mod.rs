//! Generation ensemble: reconciling several generated variants of one report.
//!
//! This is the multi-report sibling of the validation path. Validation runs
//! lenses once over a single report; the ensemble compares key fields across
//! variants and merges them into one conservative report.

pub mod compare;
mod merge;

pub use compare::{agreement_score, compare_fields, extract_key_values};
pub use merge::{EnsembleMerger, MergeError};
