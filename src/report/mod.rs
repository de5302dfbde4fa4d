//! Report module - descriptive tables, result export and the run summary

pub mod descriptive;
pub mod export;
pub mod summary;

pub use descriptive::*;
pub use export::*;
pub use summary::*;
