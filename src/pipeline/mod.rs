//! Pipeline module - loading, enrichment, cohorts and model sweeps

pub mod analysis;
pub mod binning;
pub mod cohort;
pub mod columns;
pub mod covariates;
pub mod derive;
pub mod glm;
pub mod labels;
pub mod loader;
pub mod schema;
pub mod stats;
pub mod sweep;

pub use analysis::*;
pub use binning::*;
pub use cohort::*;
pub use covariates::{build_design, Covariate, CovariateKind, CovariateSet, DesignMatrix};
pub use derive::*;
pub use glm::*;
pub use labels::term_label;
pub use loader::*;
pub use stats::*;
pub use sweep::*;
