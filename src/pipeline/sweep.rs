//! Model sweep engine
//!
//! A sweep is a declared list of independent cells, each one regression of an
//! outcome on one exposure plus a fixed covariate set within one subgroup of a
//! cohort. Cells only read the shared cohort frame, so they are evaluated in
//! parallel and collected back in declaration order.
//!
//! A cell whose fit fails is recorded as a [`CellFailure`] and the sweep keeps
//! going. Schema problems and empty subgroups abort the whole sweep.

use std::collections::HashMap;

use polars::prelude::*;
use rayon::prelude::*;
use serde::{Serialize, Serializer};

use super::cohort::{Cohort, CohortFilter};
use super::columns::{f64_values, flag_values};
use super::covariates::{build_design, validate_term, CovariateSet, INTERCEPT};
use super::glm::{fit_glm, Family, GlmConfig};
use super::labels::term_label;
use super::schema::{Gene, Site};
use super::stats::{benjamini_hochberg, p_value_category, significance_stars};
use crate::error::{AnalysisError, FitError, Result};
use crate::utils::progress::{create_progress_bar, finish_with_success, finish_with_warning};

/// Dependent variable of a cell and the family it is fit with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeSpec {
    pub field: String,
    pub family: Family,
}

impl OutcomeSpec {
    pub fn binomial(field: &str) -> Self {
        Self {
            field: field.to_string(),
            family: Family::Binomial,
        }
    }

    pub fn gaussian(field: &str) -> Self {
        Self {
            field: field.to_string(),
            family: Family::Gaussian,
        }
    }
}

/// A named restriction of the sweep cohort.
#[derive(Debug, Clone, PartialEq)]
pub struct Subgroup {
    pub label: String,
    pub filter: CohortFilter,
}

impl Subgroup {
    pub fn new(label: &str, filter: CohortFilter) -> Self {
        Self {
            label: label.to_string(),
            filter,
        }
    }

    /// The whole cohort.
    pub fn everyone(label: &str) -> Self {
        Self::new(label, CohortFilter::All(Vec::new()))
    }

    fn is_everyone(&self) -> bool {
        matches!(&self.filter, CohortFilter::All(f) if f.is_empty())
    }
}

/// One regression in a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepCell {
    pub exposure: String,
    pub outcome: OutcomeSpec,
    pub subgroup: Subgroup,
}

impl SweepCell {
    pub fn id(&self) -> String {
        format!(
            "{} ~ {} [{}]",
            self.outcome.field, self.exposure, self.subgroup.label
        )
    }
}

/// One cell per (site, gene): the gene flag regressed on the site dose.
pub fn site_gene_cells(sites: &[Site], genes: &[Gene]) -> Vec<SweepCell> {
    sites
        .iter()
        .flat_map(|site| {
            genes.iter().map(move |gene| SweepCell {
                exposure: site.scaled_dose_column().to_string(),
                outcome: OutcomeSpec::binomial(gene.symbol()),
                subgroup: Subgroup::everyone("All"),
            })
        })
        .collect()
}

/// One cell per (outcome, subgroup), all on the same exposure.
pub fn outcome_subgroup_cells(
    outcomes: &[OutcomeSpec],
    subgroups: &[Subgroup],
    exposure: &str,
) -> Vec<SweepCell> {
    outcomes
        .iter()
        .flat_map(|outcome| {
            subgroups.iter().map(move |subgroup| SweepCell {
                exposure: exposure.to_string(),
                outcome: outcome.clone(),
                subgroup: subgroup.clone(),
            })
        })
        .collect()
}

/// A validated sweep: cells plus the covariate set every cell adjusts for.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub name: String,
    pub cells: Vec<SweepCell>,
    pub covariates: CovariateSet,
}

impl SweepPlan {
    /// Check every term and covariate against `schema` before anything is fit.
    pub fn new(
        name: &str,
        cells: Vec<SweepCell>,
        covariates: CovariateSet,
        schema: &Schema,
    ) -> Result<Self> {
        covariates.validate(schema)?;
        for cell in &cells {
            validate_term(schema, &cell.exposure)?;
            validate_term(schema, &cell.outcome.field)?;
        }
        Ok(Self {
            name: name.to_string(),
            cells,
            covariates,
        })
    }
}

/// One reported coefficient.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub term: String,
    pub term_label: String,
    pub outcome: String,
    pub subgroup: String,
    pub family: Family,
    /// Odds ratio for binomial fits, raw coefficient otherwise.
    pub estimate: f64,
    pub conf_low: f64,
    pub conf_high: f64,
    /// Standard error on the linear-predictor scale.
    pub std_error: f64,
    pub p_value: f64,
    pub q_value: Option<f64>,
    pub significance: String,
    pub p_category: String,
    pub support: usize,
    pub n_obs: usize,
    /// Zero support: plotting consumers should not draw this estimate.
    pub masked: bool,
}

/// A cell that produced no estimate.
#[derive(Debug, Clone, Serialize)]
pub struct CellFailure {
    pub exposure: String,
    pub outcome: String,
    pub subgroup: String,
    #[serde(serialize_with = "serialize_display")]
    pub reason: FitError,
}

impl CellFailure {
    fn new(cell: &SweepCell, reason: FitError) -> Self {
        Self {
            exposure: cell.exposure.clone(),
            outcome: cell.outcome.field.clone(),
            subgroup: cell.subgroup.label.clone(),
            reason,
        }
    }

    pub fn to_error(&self) -> AnalysisError {
        AnalysisError::fit(
            format!("{} ~ {} [{}]", self.outcome, self.exposure, self.subgroup),
            self.reason.clone(),
        )
    }
}

fn serialize_display<S: Serializer>(value: &FitError, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Rows of every successful cell (declaration order) plus every failed cell.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub name: String,
    pub cohort: String,
    pub rows: Vec<ResultRow>,
    pub failures: Vec<CellFailure>,
}

impl SweepReport {
    pub fn cells_attempted(&self) -> usize {
        self.rows.len() + self.failures.len()
    }

    pub fn significant(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| !r.masked && r.p_value < 0.05)
            .count()
    }
}

/// Fit every cell of `plan` within `cohort`.
pub fn run_sweep(cohort: &Cohort, plan: &SweepPlan, config: &GlmConfig) -> Result<SweepReport> {
    if cohort.is_empty() {
        return Err(AnalysisError::empty_cohort(&cohort.label));
    }

    // Materialise each subgroup once; the tumor-type collapse is recomputed per subgroup
    let mut subgroups: HashMap<String, Cohort> = HashMap::new();
    for cell in &plan.cells {
        let label = &cell.subgroup.label;
        if subgroups.contains_key(label) {
            continue;
        }
        let sub = if cell.subgroup.is_everyone() {
            cohort.clone()
        } else {
            cohort.subset(
                &format!("{} / {}", cohort.label, label),
                cell.subgroup.filter.clone(),
            )?
        };
        subgroups.insert(label.clone(), sub);
    }

    log::info!(
        "sweep '{}': {} cells on cohort '{}' ({} subjects)",
        plan.name,
        plan.cells.len(),
        cohort.label,
        cohort.len()
    );

    let pb = create_progress_bar(plan.cells.len() as u64, &format!("   {}", plan.name));

    let outcomes: Vec<std::result::Result<ResultRow, CellFailure>> = plan
        .cells
        .par_iter()
        .map(|cell| {
            let frame = &subgroups[&cell.subgroup.label].frame;
            let outcome = evaluate_cell(frame, cell, &plan.covariates, config);
            pb.inc(1);
            outcome
        })
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(row) => rows.push(row),
            Err(failure) => {
                log::warn!("{}", failure.to_error());
                failures.push(failure);
            }
        }
    }

    let q_values = benjamini_hochberg(&rows.iter().map(|r| r.p_value).collect::<Vec<_>>());
    for (row, q) in rows.iter_mut().zip(q_values) {
        row.q_value = Some(q).filter(|q| !q.is_nan());
    }

    let summary = format!(
        "{}: {} fitted, {} failed",
        plan.name,
        rows.len(),
        failures.len()
    );
    if failures.is_empty() {
        finish_with_success(&pb, &summary);
    } else {
        finish_with_warning(&pb, &summary);
    }

    Ok(SweepReport {
        name: plan.name.clone(),
        cohort: cohort.label.clone(),
        rows,
        failures,
    })
}

/// Fit a single cell. The outer error aborts the sweep, the inner one is per cell.
fn evaluate_cell(
    frame: &DataFrame,
    cell: &SweepCell,
    covariates: &CovariateSet,
    config: &GlmConfig,
) -> Result<std::result::Result<ResultRow, CellFailure>> {
    let support = cell_support(frame, cell)?;

    let design = match build_design(frame, &cell.outcome.field, &[&cell.exposure], covariates)? {
        Ok(design) => design,
        Err(reason) => return Ok(Err(CellFailure::new(cell, reason))),
    };

    let fit = match fit_glm(&design, cell.outcome.family, config) {
        Ok(fit) => fit,
        Err(reason) => return Ok(Err(CellFailure::new(cell, reason))),
    };

    let Some(coefficient) = fit.coefficient(&cell.exposure) else {
        return Ok(Err(CellFailure::new(
            cell,
            FitError::NoVariation {
                term: cell.exposure.clone(),
            },
        )));
    };

    let (estimate, conf_low, conf_high) = coefficient.effect(cell.outcome.family);
    Ok(Ok(ResultRow {
        term: cell.exposure.clone(),
        term_label: term_label(&cell.exposure),
        outcome: cell.outcome.field.clone(),
        subgroup: cell.subgroup.label.clone(),
        family: cell.outcome.family,
        estimate,
        conf_low,
        conf_high,
        std_error: coefficient.std_error,
        p_value: coefficient.p_value,
        q_value: None,
        significance: significance_stars(coefficient.p_value).to_string(),
        p_category: p_value_category(coefficient.p_value).to_string(),
        support,
        n_obs: fit.n_obs,
        masked: support == 0,
    }))
}

/// Subjects in the cell frame with exposure > 0 and, for binomial outcomes, the outcome present.
fn cell_support(frame: &DataFrame, cell: &SweepCell) -> Result<usize> {
    let exposure = f64_values(frame, &cell.exposure)?;
    let count = match cell.outcome.family {
        Family::Binomial => {
            let outcome = flag_values(frame, &cell.outcome.field)?;
            exposure
                .iter()
                .zip(&outcome)
                .filter(|(d, o)| d.is_some_and(|d| d > 0.0) && **o)
                .count()
        }
        Family::Gaussian => {
            let outcome = f64_values(frame, &cell.outcome.field)?;
            exposure
                .iter()
                .zip(&outcome)
                .filter(|(d, o)| d.is_some_and(|d| d > 0.0) && o.is_some())
                .count()
        }
    };
    Ok(count)
}

/// A single multivariable fit reporting every non-intercept term.
///
/// A failed fit is returned as the report's only failure.
pub fn fit_forest(
    cohort: &Cohort,
    outcome: &OutcomeSpec,
    exposures: &[&str],
    covariates: &CovariateSet,
    config: &GlmConfig,
) -> Result<SweepReport> {
    if cohort.is_empty() {
        return Err(AnalysisError::empty_cohort(&cohort.label));
    }
    let schema = cohort.frame.schema();
    covariates.validate(&schema)?;
    validate_term(&schema, &outcome.field)?;
    for exposure in exposures {
        validate_term(&schema, exposure)?;
    }

    let name = format!("forest_{}", outcome.field);
    let mut report = SweepReport {
        name: name.clone(),
        cohort: cohort.label.clone(),
        rows: Vec::new(),
        failures: Vec::new(),
    };

    let failure = |reason: FitError| CellFailure {
        exposure: exposures.join(" + "),
        outcome: outcome.field.clone(),
        subgroup: cohort.label.clone(),
        reason,
    };

    let design = match build_design(&cohort.frame, &outcome.field, exposures, covariates)? {
        Ok(design) => design,
        Err(reason) => {
            let failure = failure(reason);
            log::warn!("{}", failure.to_error());
            report.failures.push(failure);
            return Ok(report);
        }
    };

    let fit = match fit_glm(&design, outcome.family, config) {
        Ok(fit) => fit,
        Err(reason) => {
            let failure = failure(reason);
            log::warn!("{}", failure.to_error());
            report.failures.push(failure);
            return Ok(report);
        }
    };

    log::info!(
        "{}: {} terms over {} of {} subjects ({} iterations)",
        name,
        fit.coefficients.len() - 1,
        fit.n_obs,
        design.rows_available,
        fit.iterations
    );

    report.rows = fit
        .coefficients
        .iter()
        .filter(|c| c.term != INTERCEPT)
        .map(|c| {
            let (estimate, conf_low, conf_high) = c.effect(outcome.family);
            let support = design.support(&c.term);
            ResultRow {
                term: c.term.clone(),
                term_label: term_label(&c.term),
                outcome: outcome.field.clone(),
                subgroup: cohort.label.clone(),
                family: outcome.family,
                estimate,
                conf_low,
                conf_high,
                std_error: c.std_error,
                p_value: c.p_value,
                q_value: None,
                significance: significance_stars(c.p_value).to_string(),
                p_category: p_value_category(c.p_value).to_string(),
                support,
                n_obs: fit.n_obs,
                masked: support == 0,
            }
        })
        .collect();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_gene_cells_cross_product_order() {
        let cells = site_gene_cells(&Site::ALL, &Gene::PANEL);
        assert_eq!(cells.len(), 90);
        assert_eq!(cells[0].exposure, "eqd_3abdomen_100");
        assert_eq!(cells[0].outcome.field, "DNMT3A");
        assert_eq!(cells[1].outcome.field, "TET2");
        assert_eq!(cells[10].exposure, "eqd_3brain_100");
        assert!(cells.iter().all(|c| c.outcome.family == Family::Binomial));
    }

    #[test]
    fn test_outcome_subgroup_cells() {
        let cells = outcome_subgroup_cells(
            &[OutcomeSpec::gaussian("max_vaf"), OutcomeSpec::gaussian("mutnum")],
            &[
                Subgroup::new("All CH", CohortFilter::ChPositive),
                Subgroup::new("DDR CH", CohortFilter::DdrPositive),
            ],
            "total_dose_100",
        );
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[1].subgroup.label, "DDR CH");
        assert_eq!(cells[2].outcome.field, "mutnum");
    }

    #[test]
    fn test_plan_rejects_unknown_exposure() {
        let df = df! { "y" => [1.0f64, 0.0] }.unwrap();
        let cells = vec![SweepCell {
            exposure: "dose".to_string(),
            outcome: OutcomeSpec::binomial("y"),
            subgroup: Subgroup::everyone("All"),
        }];
        let err = SweepPlan::new("t", cells, CovariateSet::empty(), &df.schema()).unwrap_err();
        assert!(matches!(err, AnalysisError::Schema { field, .. } if field == "dose"));
    }
}
