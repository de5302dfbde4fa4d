//! Error types for the analysis pipeline.
//!
//! `AnalysisError` covers failures that stop a run (or the sweep that depends on
//! them). `FitError` describes why a single regression could not be fit; the sweep
//! engine records it per cell and keeps going.

use polars::prelude::PolarsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors raised by the loader, deriver, cohort builder and sweep engine.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A required input field is absent or holds values of the wrong type.
    #[error("schema error in field '{field}': {reason}")]
    Schema { field: String, reason: String },

    /// A cohort predicate selected nobody, so nothing downstream can be fit.
    #[error("cohort '{cohort}' is empty after filtering")]
    EmptyCohort { cohort: String },

    /// A single regression failed. Sweeps catch this per cell.
    #[error("fit failed for {cell}: {reason}")]
    FitConvergence { cell: String, reason: FitError },

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    pub fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::Schema {
            field: field.into(),
            reason: "column not found in input".to_string(),
        }
    }

    pub fn empty_cohort(cohort: impl Into<String>) -> Self {
        Self::EmptyCohort {
            cohort: cohort.into(),
        }
    }

    pub fn fit(cell: impl Into<String>, reason: FitError) -> Self {
        Self::FitConvergence {
            cell: cell.into(),
            reason,
        }
    }
}

/// Why a single GLM fit did not produce usable estimates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("did not converge within {iterations} IRLS iterations")]
    NotConverged { iterations: usize },

    #[error("information matrix is singular (collinear or separated predictors)")]
    Singular,

    #[error("term '{term}' has no variation in the complete-case rows")]
    NoVariation { term: String },

    #[error("{n} complete observations for {p} parameters")]
    InsufficientData { n: usize, p: usize },

    #[error("binomial outcome '{field}' contains values other than 0 and 1")]
    NonBinaryOutcome { field: String },

    #[error("numerical issues: {message}")]
    Numerical { message: String },
}

impl FitError {
    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical {
            message: message.into(),
        }
    }
}
