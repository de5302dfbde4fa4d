//! chsweep: radiotherapy site × clonal hematopoiesis association CLI
//!
//! Runs the standard analysis end to end: load, derive, cohorts, descriptive
//! table, forest fits, both sweeps, export.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;

use chsweep::cli::{confirm_overwrite, Cli};
use chsweep::pipeline::{
    build_standard_cohorts, collect_dataset, derive_features, outcome_subgroup_plan,
    run_forest_fits, run_sweep, site_gene_plan, AnalysisResults,
};
use chsweep::report::{describe_cohorts, export_results, package_outputs, AnalysisReport, RunSummary};
use chsweep::utils::{
    create_spinner, finish_with_success, print_banner, print_completion, print_config,
    print_count, print_info, print_step_header, print_step_time, print_success,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    let output_dir = cli.output_dir();
    let config = cli.analysis_config();

    if !cli.no_confirm && !confirm_overwrite(&output_dir)? {
        println!("Cancelled by user.");
        return Ok(());
    }

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&cli.input, &output_dir, &config);

    // Step 1: Load dataset
    print_step_header(1, "Load Dataset");
    let step_start = Instant::now();
    let spinner = create_spinner("Reading input...");
    let (raw, rows, cols, memory_mb) = collect_dataset(&cli.input, cli.infer_schema_length)?;
    finish_with_success(&spinner, "Dataset loaded");

    println!("\n    {} Dataset Statistics:", style("✧").cyan());
    println!("      Rows: {}", rows);
    println!("      Columns: {}", cols);
    println!("      Estimated memory: {:.2} MB", memory_mb);
    print_step_time(step_start.elapsed());

    // Step 2: Derive analysis variables over the full table
    print_step_header(2, "Derive Features");
    let step_start = Instant::now();
    let (population, derivation) = derive_features(&raw)?;
    print_success("Derived recoded, binned and composite variables");
    print_count("CH-positive subject(s)", derivation.any_ch, None);
    if derivation.missing_race > 0 || derivation.missing_smoking > 0 {
        print_info(&format!(
            "{} missing race, {} missing smoking status (kept as 'Missing')",
            derivation.missing_race, derivation.missing_smoking
        ));
    }
    print_step_time(step_start.elapsed());

    // Step 3: Cohorts and descriptive table
    print_step_header(3, "Cohorts");
    let step_start = Instant::now();
    let cohorts = build_standard_cohorts(&population, config.rare_threshold)?;
    for cohort in cohorts.as_slice() {
        print_count(
            &format!("subject(s) in '{}'", cohort.label),
            cohort.len(),
            Some(&format!(
                "({} rare tumor type(s) collapsed)",
                cohort.collapse.relabeled.len()
            )),
        );
    }
    let mut cohort_summary = describe_cohorts(&cohorts.as_slice())?;
    print_success("Descriptive table built");
    print_step_time(step_start.elapsed());

    // Step 4: Forest fits
    print_step_header(4, "Multivariable Models");
    let step_start = Instant::now();
    let spinner = create_spinner("Fitting forest models...");
    let forests = run_forest_fits(&cohorts.all, &config.glm)?;
    finish_with_success(&spinner, &format!("{} forest model(s) fitted", forests.len()));
    for forest in forests.iter().filter(|f| !f.failures.is_empty()) {
        print_info(&format!("{} could not be fit", forest.name));
    }
    print_step_time(step_start.elapsed());

    // Step 5: Sweeps
    print_step_header(5, "Model Sweeps");
    let step_start = Instant::now();
    let site_gene = run_sweep(&cohorts.xrt, &site_gene_plan(&cohorts.xrt)?, &config.glm)?;
    let outcome_subgroup =
        run_sweep(&cohorts.xrt, &outcome_subgroup_plan(&cohorts.xrt)?, &config.glm)?;
    print_count(
        "site × gene association(s) at p < 0.05",
        site_gene.significant(),
        Some(&format!("(of {} cells)", site_gene.cells_attempted())),
    );
    print_step_time(step_start.elapsed());

    let results = AnalysisResults {
        cohorts,
        forests,
        site_gene,
        outcome_subgroup,
    };

    // Step 6: Export
    print_step_header(6, "Save Results");
    let step_start = Instant::now();
    let spinner = create_spinner("Writing result tables...");
    let report = AnalysisReport::new(&cli.input, &config, &derivation, &results);
    let written = export_results(&output_dir, &mut cohort_summary, &results, &report)?;
    if cli.bundle {
        let zip_path = cli.bundle_path();
        package_outputs(&written, &zip_path)?;
        finish_with_success(&spinner, &format!("Bundled to {}", zip_path.display()));
    } else {
        finish_with_success(
            &spinner,
            &format!("Saved {} file(s) to {}", written.len(), output_dir.display()),
        );
    }
    print_step_time(step_start.elapsed());

    let summary = RunSummary::new(rows, &results);
    summary.display();

    print_completion();

    Ok(())
}
