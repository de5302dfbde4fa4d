//! chsweep: radiotherapy site × clonal hematopoiesis association analysis
//!
//! Loads a per-subject table, derives analysis variables, builds cohorts and
//! runs the forest fits and model sweeps that relate radiotherapy dose by
//! anatomic site to clonal hematopoiesis mutations.

pub mod cli;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod utils;

pub use error::{AnalysisError, FitError};
