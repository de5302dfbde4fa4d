//! Unit tests for dataset loader

use chsweep::pipeline::{collect_dataset, derive_features, get_column_names};
use polars::prelude::*;
use std::io::Write;
use tempfile::TempDir;

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_load_csv_file() {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    writeln!(file, "a,b,c").unwrap();
    writeln!(file, "1,2,3").unwrap();
    writeln!(file, "4,5,6").unwrap();
    drop(file);

    let (df, rows, cols, mem_mb) = collect_dataset(&csv_path, 100).unwrap();

    assert_eq!(rows, 2, "Should have 2 data rows");
    assert_eq!(cols, 3, "Should have 3 columns");
    assert_eq!(df.get_column_names(), &["a", "b", "c"]);
    assert!(mem_mb >= 0.0, "Memory estimate should be non-negative");
}

#[test]
fn test_na_tokens_are_null() {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("missing.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    writeln!(file, "race,packyears").unwrap();
    writeln!(file, "WHITE,NA").unwrap();
    writeln!(file, ",12.5").unwrap();
    writeln!(file, "ASIAN,").unwrap();
    writeln!(file, "N/A,3").unwrap();
    drop(file);

    let (df, rows, _, _) = collect_dataset(&csv_path, 100).unwrap();

    assert_eq!(rows, 4);
    assert_eq!(df.column("race").unwrap().null_count(), 2);
    assert_eq!(df.column("packyears").unwrap().null_count(), 2);
    assert!(
        df.column("packyears").unwrap().dtype().is_float()
            || df.column("packyears").unwrap().dtype().is_integer(),
        "NA tokens must not force a numeric column to text"
    );
}

#[test]
fn test_synthetic_csv_loads_and_derives() {
    let mut raw = SyntheticCohort::default().with_subjects(50).generate();
    let (_dir, path) = create_temp_csv(&mut raw);

    let (df, rows, _, _) = collect_dataset(&path, 10000).unwrap();
    assert_eq!(rows, 50);

    let (derived, summary) = derive_features(&df).unwrap();
    assert_eq!(derived.height(), 50);
    assert_eq!(summary.rows, 50);
}

#[test]
fn test_load_parquet_file() {
    let mut raw = SyntheticCohort::default().with_subjects(25).generate();
    let (_dir, path) = create_temp_parquet(&mut raw);

    let (loaded, rows, cols, _) = collect_dataset(&path, 100).unwrap();

    assert_eq!(rows, 25);
    assert_eq!(cols, raw.width());
    assert_eq!(loaded.get_column_names(), raw.get_column_names());
}

#[test]
fn test_get_column_names_csv() {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    writeln!(file, "STUDY_ID,age,XRT").unwrap();
    writeln!(file, "S1,61,1").unwrap();
    drop(file);

    let columns = get_column_names(&csv_path, 100).unwrap();

    assert_eq!(columns, vec!["STUDY_ID", "age", "XRT"]);
}

#[test]
fn test_unsupported_format() {
    let temp_dir = TempDir::new().unwrap();
    let bad_path = temp_dir.path().join("test.xlsx");
    std::fs::File::create(&bad_path).unwrap();

    let result = collect_dataset(&bad_path, 100);

    assert!(result.is_err(), "Unsupported format should return error");
    let err_msg = result.unwrap_err().to_string();
    assert!(
        err_msg.contains("Unsupported"),
        "Error message should mention unsupported format: {}",
        err_msg
    );
}

#[test]
fn test_nonexistent_file() {
    let path = std::path::Path::new("/nonexistent/path/to/file.csv");
    assert!(collect_dataset(path, 100).is_err());
}
