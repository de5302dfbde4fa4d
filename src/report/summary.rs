//! Terminal summary of an analysis run

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::{AnalysisResults, SweepReport};

/// Counts shown at the end of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub subjects: usize,
    pub cohorts: Vec<(String, usize)>,
    pub sweeps: Vec<SweepLine>,
    pub failures: Vec<String>,
}

#[derive(Debug)]
pub struct SweepLine {
    pub name: String,
    pub fitted: usize,
    pub failed: usize,
    pub masked: usize,
    pub significant: usize,
}

impl From<&SweepReport> for SweepLine {
    fn from(report: &SweepReport) -> Self {
        Self {
            name: report.name.clone(),
            fitted: report.rows.len(),
            failed: report.failures.len(),
            masked: report.rows.iter().filter(|r| r.masked).count(),
            significant: report.significant(),
        }
    }
}

impl RunSummary {
    pub fn new(subjects: usize, results: &AnalysisResults) -> Self {
        Self {
            subjects,
            cohorts: results
                .cohorts
                .as_slice()
                .iter()
                .map(|c| (c.label.clone(), c.len()))
                .collect(),
            sweeps: results.sweeps().map(SweepLine::from).collect(),
            failures: results
                .sweeps()
                .flat_map(|s| s.failures.iter().map(|f| f.to_error().to_string()))
                .collect(),
        }
    }

    pub fn total_failures(&self) -> usize {
        self.sweeps.iter().map(|s| s.failed).sum()
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("ANALYSIS SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Cohort").add_attribute(Attribute::Bold),
            Cell::new("Subjects").add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![Cell::new("📁 Loaded"), Cell::new(self.subjects)]);
        for (label, n) in &self.cohorts {
            table.add_row(vec![Cell::new(label), Cell::new(n)]);
        }
        for line in table.to_string().lines() {
            println!("    {}", line);
        }

        println!();
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Model").add_attribute(Attribute::Bold),
            Cell::new("Fitted").add_attribute(Attribute::Bold),
            Cell::new("Failed").add_attribute(Attribute::Bold),
            Cell::new("Masked").add_attribute(Attribute::Bold),
            Cell::new("p < 0.05").add_attribute(Attribute::Bold),
        ]);
        for sweep in &self.sweeps {
            table.add_row(vec![
                Cell::new(&sweep.name),
                Cell::new(sweep.fitted).fg(Color::Green),
                Cell::new(sweep.failed).fg(if sweep.failed == 0 {
                    Color::White
                } else {
                    Color::Red
                }),
                Cell::new(sweep.masked).fg(if sweep.masked == 0 {
                    Color::White
                } else {
                    Color::Yellow
                }),
                Cell::new(sweep.significant)
                    .fg(Color::Cyan)
                    .add_attribute(Attribute::Bold),
            ]);
        }
        for line in table.to_string().lines() {
            println!("    {}", line);
        }

        if !self.failures.is_empty() {
            println!();
            println!(
                "    {} {}",
                style("📝").cyan(),
                style("FAILED CELLS").white().bold()
            );
            println!("    {}", style("─".repeat(50)).dim());
            println!();
            for failure in &self.failures {
                println!("        {} {}", style("•").dim(), failure);
            }
        }
    }
}
