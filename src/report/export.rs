//! Result export: CSV tables, the heatmap pivot, the JSON report and the zip bundle

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use polars::prelude::*;
use serde::Serialize;

use crate::pipeline::{
    term_label, AnalysisConfig, AnalysisResults, CellFailure, CollapseTable, DerivationSummary,
    ResultRow, SweepReport,
};

/// Value shown in each heatmap cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatmapValue {
    Estimate,
    PValue,
}

/// Result rows as a table with one row per reported coefficient.
pub fn results_to_frame(rows: &[ResultRow]) -> PolarsResult<DataFrame> {
    df! {
        "term" => rows.iter().map(|r| r.term.as_str()).collect::<Vec<_>>(),
        "term_label" => rows.iter().map(|r| r.term_label.as_str()).collect::<Vec<_>>(),
        "outcome" => rows.iter().map(|r| r.outcome.as_str()).collect::<Vec<_>>(),
        "subgroup" => rows.iter().map(|r| r.subgroup.as_str()).collect::<Vec<_>>(),
        "family" => rows.iter().map(|r| r.family.to_string()).collect::<Vec<_>>(),
        "estimate" => rows.iter().map(|r| r.estimate).collect::<Vec<_>>(),
        "conf_low" => rows.iter().map(|r| r.conf_low).collect::<Vec<_>>(),
        "conf_high" => rows.iter().map(|r| r.conf_high).collect::<Vec<_>>(),
        "std_error" => rows.iter().map(|r| r.std_error).collect::<Vec<_>>(),
        "p_value" => rows.iter().map(|r| r.p_value).collect::<Vec<_>>(),
        "q_value" => rows.iter().map(|r| r.q_value).collect::<Vec<_>>(),
        "significance" => rows.iter().map(|r| r.significance.as_str()).collect::<Vec<_>>(),
        "p_category" => rows.iter().map(|r| r.p_category.as_str()).collect::<Vec<_>>(),
        "support" => rows.iter().map(|r| r.support as u64).collect::<Vec<_>>(),
        "n_obs" => rows.iter().map(|r| r.n_obs as u64).collect::<Vec<_>>(),
        "masked" => rows.iter().map(|r| r.masked).collect::<Vec<_>>(),
    }
}

/// Failed cells of one or more sweeps.
pub fn failures_to_frame<'a>(
    failures: impl IntoIterator<Item = (&'a str, &'a CellFailure)>,
) -> PolarsResult<DataFrame> {
    let failures: Vec<(&str, &CellFailure)> = failures.into_iter().collect();
    df! {
        "sweep" => failures.iter().map(|(s, _)| *s).collect::<Vec<_>>(),
        "exposure" => failures.iter().map(|(_, f)| f.exposure.as_str()).collect::<Vec<_>>(),
        "outcome" => failures.iter().map(|(_, f)| f.outcome.as_str()).collect::<Vec<_>>(),
        "subgroup" => failures.iter().map(|(_, f)| f.subgroup.as_str()).collect::<Vec<_>>(),
        "reason" => failures.iter().map(|(_, f)| f.reason.to_string()).collect::<Vec<_>>(),
    }
}

/// Pivot a site × gene sweep: one row per exposure label, one column per outcome.
///
/// Masked (zero support) and failed cells are null.
pub fn heatmap_frame(report: &SweepReport, value: HeatmapValue) -> PolarsResult<DataFrame> {
    let mut row_keys: Vec<&str> = Vec::new();
    let mut outcomes: Vec<&str> = Vec::new();
    let cells = report
        .rows
        .iter()
        .map(|r| (r.term.as_str(), r.outcome.as_str()))
        .chain(
            report
                .failures
                .iter()
                .map(|f| (f.exposure.as_str(), f.outcome.as_str())),
        );
    for (term, outcome) in cells {
        if !row_keys.contains(&term) {
            row_keys.push(term);
        }
        if !outcomes.contains(&outcome) {
            outcomes.push(outcome);
        }
    }
    let row_labels: Vec<String> = row_keys.iter().map(|t| term_label(t)).collect();

    let mut columns = vec![Column::new("term".into(), row_labels)];
    for outcome in &outcomes {
        let values: Vec<Option<f64>> = row_keys
            .iter()
            .map(|term| {
                report
                    .rows
                    .iter()
                    .find(|r| r.term == *term && r.outcome == *outcome)
                    .filter(|r| !r.masked)
                    .map(|r| match value {
                        HeatmapValue::Estimate => r.estimate,
                        HeatmapValue::PValue => r.p_value,
                    })
            })
            .collect();
        columns.push(Column::new((*outcome).into(), values));
    }
    DataFrame::new(columns)
}

/// Write `df` as CSV, creating parent directories as needed.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    CsvWriter::new(&mut file)
        .finish(df)
        .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
    Ok(())
}

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub chsweep_version: String,
    pub input_file: String,
    pub config: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct CohortEntry {
    pub label: String,
    pub subjects: usize,
    pub tumor_type_collapse: CollapseTable,
}

/// Everything one run produced, as written to `analysis_report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    pub derivation: DerivationSummary,
    pub cohorts: Vec<CohortEntry>,
    pub sweeps: Vec<SweepReport>,
}

impl AnalysisReport {
    pub fn new(
        input_file: &Path,
        config: &AnalysisConfig,
        derivation: &DerivationSummary,
        results: &AnalysisResults,
    ) -> Self {
        Self {
            metadata: ReportMetadata {
                timestamp: Utc::now().to_rfc3339(),
                chsweep_version: env!("CARGO_PKG_VERSION").to_string(),
                input_file: input_file.display().to_string(),
                config: *config,
            },
            derivation: derivation.clone(),
            cohorts: results
                .cohorts
                .as_slice()
                .iter()
                .map(|c| CohortEntry {
                    label: c.label.clone(),
                    subjects: c.len(),
                    tumor_type_collapse: c.collapse.clone(),
                })
                .collect(),
            sweeps: results.sweeps().cloned().collect(),
        }
    }
}

/// Export the analysis report to a JSON file
pub fn export_analysis_report(report: &AnalysisReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize analysis report to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write analysis report to {}", output_path.display()))?;

    Ok(())
}

/// Write every table of a run into `output_dir`, returning the paths written.
pub fn export_results(
    output_dir: &Path,
    cohort_summary: &mut DataFrame,
    results: &AnalysisResults,
    report: &AnalysisReport,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;
    let mut written = Vec::new();

    let path = output_dir.join("cohort_summary.csv");
    write_csv(cohort_summary, &path)?;
    written.push(path);

    for forest in &results.forests {
        let path = output_dir.join(format!("{}.csv", forest.name));
        write_csv(&mut results_to_frame(&forest.rows)?, &path)?;
        written.push(path);
    }

    let path = output_dir.join(format!("{}.csv", results.site_gene.name));
    write_csv(&mut results_to_frame(&results.site_gene.rows)?, &path)?;
    written.push(path);

    let path = output_dir.join("site_gene_heatmap.csv");
    write_csv(&mut heatmap_frame(&results.site_gene, HeatmapValue::Estimate)?, &path)?;
    written.push(path);

    let path = output_dir.join(format!("{}.csv", results.outcome_subgroup.name));
    write_csv(&mut results_to_frame(&results.outcome_subgroup.rows)?, &path)?;
    written.push(path);

    let path = output_dir.join("sweep_failures.csv");
    let failures = results
        .sweeps()
        .flat_map(|s| s.failures.iter().map(move |f| (s.name.as_str(), f)));
    write_csv(&mut failures_to_frame(failures)?, &path)?;
    written.push(path);

    let path = output_dir.join("analysis_report.json");
    export_analysis_report(report, &path)?;
    written.push(path);

    Ok(written)
}

/// Package output files into a zip archive and remove the originals.
pub fn package_outputs(files: &[PathBuf], zip_path: &Path) -> Result<()> {
    use std::io::{Read, Write};
    use ::zip::write::SimpleFileOptions;
    use ::zip::ZipWriter;

    let zip_file = std::fs::File::create(zip_path)
        .with_context(|| format!("Failed to create zip file: {}", zip_path.display()))?;

    let mut zip = ZipWriter::new(zip_file);
    let options = SimpleFileOptions::default()
        .compression_method(::zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for path in files {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {}", path.display()))?;
        zip.start_file(filename, options)
            .with_context(|| format!("Failed to add {} to zip", filename))?;
        let mut content = Vec::new();
        std::fs::File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?
            .read_to_end(&mut content)?;
        zip.write_all(&content)?;
    }

    zip.finish().context("Failed to finalize zip file")?;

    for path in files {
        std::fs::remove_file(path).ok();
    }

    Ok(())
}
