//! The standard end-to-end analysis: cohorts, forest fits and both sweeps

use polars::prelude::*;
use serde::Serialize;

use super::cohort::{Cohort, CohortFilter, DEFAULT_RARE_THRESHOLD};
use super::covariates::CovariateSet;
use super::glm::GlmConfig;
use super::schema::{self, Gene, Site};
use super::sweep::{
    fit_forest, outcome_subgroup_cells, run_sweep, site_gene_cells, OutcomeSpec, Subgroup,
    SweepPlan, SweepReport,
};
use crate::error::Result;

/// Outcomes of the multivariable forest fits.
pub const FOREST_OUTCOMES: [&str; 3] = [schema::ANY_CH, schema::DDR, schema::NON_DDR_CH];

pub const SITE_GENE_SWEEP: &str = "site_gene_sweep";
pub const OUTCOME_SUBGROUP_SWEEP: &str = "outcome_subgroup_sweep";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AnalysisConfig {
    pub rare_threshold: usize,
    pub glm: GlmConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rare_threshold: DEFAULT_RARE_THRESHOLD,
            glm: GlmConfig::default(),
        }
    }
}

/// The three cohorts every table is reported over.
#[derive(Debug, Clone)]
pub struct StandardCohorts {
    /// Everyone with a known blood-draw date.
    pub all: Cohort,
    pub xrt: Cohort,
    pub no_xrt: Cohort,
}

impl StandardCohorts {
    pub fn as_slice(&self) -> [&Cohort; 3] {
        [&self.all, &self.xrt, &self.no_xrt]
    }
}

pub fn build_standard_cohorts(population: &DataFrame, rare_threshold: usize) -> Result<StandardCohorts> {
    let all = Cohort::build("All", population, CohortFilter::BloodDrawKnown, rare_threshold)?;
    let xrt = Cohort::build(
        "XRT",
        population,
        CohortFilter::ReceivedRadiotherapy.and(CohortFilter::BloodDrawKnown),
        rare_threshold,
    )?;
    let no_xrt = Cohort::build(
        "No XRT",
        population,
        CohortFilter::NoRadiotherapy.and(CohortFilter::BloodDrawKnown),
        rare_threshold,
    )?;
    Ok(StandardCohorts { all, xrt, no_xrt })
}

/// Exposures of the forest fits: radiotherapy and every chemotherapy class.
pub fn forest_exposures() -> Vec<&'static str> {
    let mut exposures = vec![schema::XRT];
    exposures.extend(schema::CHEMO_CLASSES);
    exposures
}

/// Standard covariates without the chemotherapy classes (they are exposures here) plus tumor type.
pub fn forest_covariates() -> CovariateSet {
    schema::CHEMO_CLASSES
        .iter()
        .fold(CovariateSet::standard(), |set, class| set.without(class))
        .with_tumor_type()
}

/// CH subgroups of the outcome sweep.
pub fn ch_subgroups() -> Vec<Subgroup> {
    vec![
        Subgroup::new("All CH", CohortFilter::ChPositive),
        Subgroup::new("DDR CH", CohortFilter::DdrPositive),
        Subgroup::new("DTA CH", CohortFilter::DtaPositive),
        Subgroup::new("Non-DDR CH", CohortFilter::NonDdrCh),
    ]
}

pub fn site_gene_plan(cohort: &Cohort) -> Result<SweepPlan> {
    SweepPlan::new(
        SITE_GENE_SWEEP,
        site_gene_cells(&Site::ALL, &Gene::PANEL),
        CovariateSet::standard(),
        &cohort.frame.schema(),
    )
}

pub fn outcome_subgroup_plan(cohort: &Cohort) -> Result<SweepPlan> {
    SweepPlan::new(
        OUTCOME_SUBGROUP_SWEEP,
        outcome_subgroup_cells(
            &[
                OutcomeSpec::gaussian(schema::MAX_VAF),
                OutcomeSpec::gaussian(schema::MUTNUM),
            ],
            &ch_subgroups(),
            schema::TOTAL_DOSE,
        ),
        CovariateSet::standard(),
        &cohort.frame.schema(),
    )
}

pub fn run_forest_fits(cohort: &Cohort, config: &GlmConfig) -> Result<Vec<SweepReport>> {
    let exposures = forest_exposures();
    let covariates = forest_covariates();
    FOREST_OUTCOMES
        .iter()
        .map(|outcome| {
            fit_forest(
                cohort,
                &OutcomeSpec::binomial(outcome),
                &exposures,
                &covariates,
                config,
            )
        })
        .collect()
}

/// Everything the standard run produces, before export.
#[derive(Debug, Clone)]
pub struct AnalysisResults {
    pub cohorts: StandardCohorts,
    pub forests: Vec<SweepReport>,
    pub site_gene: SweepReport,
    pub outcome_subgroup: SweepReport,
}

impl AnalysisResults {
    pub fn sweeps(&self) -> impl Iterator<Item = &SweepReport> {
        self.forests
            .iter()
            .chain([&self.site_gene, &self.outcome_subgroup])
    }
}

/// Run every model of the standard plan over an enriched population.
pub fn run_standard_analysis(population: &DataFrame, config: &AnalysisConfig) -> Result<AnalysisResults> {
    let cohorts = build_standard_cohorts(population, config.rare_threshold)?;
    let forests = run_forest_fits(&cohorts.all, &config.glm)?;
    let site_gene = run_sweep(&cohorts.xrt, &site_gene_plan(&cohorts.xrt)?, &config.glm)?;
    let outcome_subgroup = run_sweep(
        &cohorts.xrt,
        &outcome_subgroup_plan(&cohorts.xrt)?,
        &config.glm,
    )?;
    Ok(AnalysisResults {
        cohorts,
        forests,
        site_gene,
        outcome_subgroup,
    })
}
