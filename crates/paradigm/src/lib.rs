//! Determines whether a source -> target schema conversion is
//! same-paradigm, cross-paradigm, multi-step, or impossible, and selects a
//! translation strategy (§4.6). Pure, deterministic, side-effect-free --
//! the translator calls this once per request and dispatches on the
//! result.

pub mod analyzer;
pub mod matrix;
pub mod types;

pub use analyzer::analyze;
pub use matrix::compatibility_matrix;
pub use types::{Approach, Compatibility, Complexity, ParadigmAnalysisResult, Strategy};
