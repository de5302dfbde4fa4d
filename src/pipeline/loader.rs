//! Dataset loader for CSV and Parquet files

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;

/// Tokens read as null in CSV input besides empty fields.
const NULL_TOKENS: [&str; 3] = ["NA", "NaN", "N/A"];

/// Load a dataset lazily (CSV or Parquet based on extension)
pub fn load_dataset(path: &Path, infer_schema_length: usize) -> Result<LazyFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    // 0 means full table scan
    let schema_length = if infer_schema_length == 0 {
        None
    } else {
        Some(infer_schema_length)
    };

    let lf = match extension.as_str() {
        "csv" | "tsv" | "txt" => {
            let separator = if extension == "tsv" { b'\t' } else { b',' };
            LazyCsvReader::new(path)
                .with_separator(separator)
                .with_infer_schema_length(schema_length)
                .with_null_values(Some(NullValues::AllColumns(
                    NULL_TOKENS.iter().map(|t| (*t).into()).collect(),
                )))
                .finish()
                .with_context(|| format!("Failed to load CSV file: {}", path.display()))?
        }
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, tsv, parquet",
            extension
        ),
    };

    Ok(lf)
}

/// Load and collect a dataset, returning it with its shape and estimated size in MB
pub fn collect_dataset(
    path: &Path,
    infer_schema_length: usize,
) -> Result<(DataFrame, usize, usize, f64)> {
    let df = load_dataset(path, infer_schema_length)?
        .collect()
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let (rows, cols) = df.shape();
    let memory_mb = df.estimated_size() as f64 / (1024.0 * 1024.0);
    Ok((df, rows, cols, memory_mb))
}

/// Column names without materialising the data
pub fn get_column_names(path: &Path, infer_schema_length: usize) -> Result<Vec<String>> {
    let schema = load_dataset(path, infer_schema_length)?
        .collect_schema()
        .with_context(|| format!("Failed to read schema of {}", path.display()))?;
    Ok(schema.iter_names().map(|n| n.to_string()).collect())
}
