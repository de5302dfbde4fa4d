//! Command-line argument definitions using clap

use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::{AnalysisConfig, GlmConfig};

/// chsweep - Radiotherapy site × clonal hematopoiesis association sweeps
#[derive(Parser, Debug)]
#[command(name = "chsweep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input file path (CSV, TSV or Parquet), one row per subject
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory for result tables.
    /// Defaults to '<input stem>_analysis' next to the input file.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Tumor types with fewer distinct subjects than this (within a cohort) are collapsed into "Other"
    #[arg(long, default_value = "50", value_parser = validate_rare_threshold)]
    pub rare_threshold: usize,

    /// Maximum IRLS iterations per logistic fit before the cell is reported as not converged
    #[arg(long, default_value = "25", value_parser = validate_max_iterations)]
    pub max_iterations: usize,

    /// Relative deviance change below which a logistic fit has converged
    #[arg(long, default_value = "1e-8", value_parser = validate_tolerance)]
    pub tolerance: f64,

    /// Worker threads for the sweeps (0 = one per CPU core)
    #[arg(long, default_value = "0")]
    pub threads: usize,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan (very slow for large files).
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,

    /// Package all outputs into a single zip archive
    #[arg(long, default_value = "false")]
    pub bundle: bool,

    /// Skip interactive confirmation prompts
    #[arg(long, default_value = "false")]
    pub no_confirm: bool,

    /// Show diagnostic logging (equivalent to RUST_LOG=debug)
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,
}

impl Cli {
    /// Get the output directory, deriving it from the input if not explicitly provided.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            let parent = self
                .input
                .parent()
                .unwrap_or_else(|| std::path::Path::new("."));
            let stem = self
                .input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output");
            parent.join(format!("{}_analysis", stem))
        })
    }

    /// Path of the zip archive written with `--bundle`.
    pub fn bundle_path(&self) -> PathBuf {
        let dir = self.output_dir();
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("analysis");
        dir.join(format!("{}.zip", name))
    }

    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            rare_threshold: self.rare_threshold,
            glm: GlmConfig {
                max_iterations: self.max_iterations,
                tolerance: self.tolerance,
                ..GlmConfig::default()
            },
        }
    }
}

/// Validator for rare_threshold parameter
fn validate_rare_threshold(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid count", s))?;

    if value == 0 {
        Err("rare_threshold must be at least 1".to_string())
    } else {
        Ok(value)
    }
}

/// Validator for max_iterations parameter
fn validate_max_iterations(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid count", s))?;

    if !(1..=1000).contains(&value) {
        Err(format!(
            "max_iterations must be between 1 and 1000, got {}",
            value
        ))
    } else {
        Ok(value)
    }
}

/// Validator for tolerance parameter
fn validate_tolerance(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if !(value > 0.0 && value < 1.0) {
        Err(format!("tolerance must be in (0, 1), got {}", value))
    } else {
        Ok(value)
    }
}
