//! Generalised linear model fitting
//!
//! Binomial (logit link) models are fit by iteratively reweighted least squares;
//! gaussian (identity link) models by ordinary least squares. Both report Wald
//! standard errors from the inverse information matrix.
//!
//! Convergence follows the usual deviance criterion:
//! `|dev - dev_old| / (|dev| + 0.1) < tolerance`. A fit that has not met it
//! after `max_iterations` IRLS steps is reported as not converged rather than
//! returned with unstable estimates.

use faer::linalg::solvers::Cholesky;
use faer::prelude::{SolverCore, SpSolver};
use faer::{Mat, Side};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use super::covariates::DesignMatrix;
use crate::error::FitError;

/// Fitted probabilities are kept this far from 0 and 1.
const PROB_EPS: f64 = 1e-10;

/// Pivot size, relative to its own diagonal entry, below which a column counts as aliased.
const SINGULAR_TOL: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Logit link; effects are reported as odds ratios.
    Binomial,
    /// Identity link; effects are reported on the outcome scale.
    Gaussian,
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Family::Binomial => write!(f, "binomial"),
            Family::Gaussian => write!(f, "gaussian"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GlmConfig {
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Two-sided confidence level for intervals.
    pub confidence: f64,
}

impl Default for GlmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tolerance: 1e-8,
            confidence: 0.95,
        }
    }
}

/// Estimate and Wald inference for one model term.
#[derive(Debug, Clone, Serialize)]
pub struct Coefficient {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    /// z (binomial) or t (gaussian) statistic.
    pub statistic: f64,
    pub p_value: f64,
    /// Bounds on the linear-predictor scale.
    pub conf_low: f64,
    pub conf_high: f64,
}

impl Coefficient {
    /// Effect size and interval on the reporting scale (odds ratio for binomial fits).
    pub fn effect(&self, family: Family) -> (f64, f64, f64) {
        match family {
            Family::Binomial => (
                self.estimate.exp(),
                self.conf_low.exp(),
                self.conf_high.exp(),
            ),
            Family::Gaussian => (self.estimate, self.conf_low, self.conf_high),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GlmFit {
    pub family: Family,
    pub coefficients: Vec<Coefficient>,
    pub iterations: usize,
    pub deviance: f64,
    pub n_obs: usize,
    pub df_residual: usize,
}

impl GlmFit {
    pub fn coefficient(&self, term: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.term == term)
    }
}

/// Fit `design` under `family`.
pub fn fit_glm(
    design: &DesignMatrix,
    family: Family,
    config: &GlmConfig,
) -> Result<GlmFit, FitError> {
    let n = design.n_obs();
    let p = design.n_params();
    if n <= p {
        return Err(FitError::InsufficientData { n, p });
    }

    match family {
        Family::Binomial => fit_logistic(design, config),
        Family::Gaussian => fit_gaussian(design, config),
    }
}

fn fit_logistic(design: &DesignMatrix, config: &GlmConfig) -> Result<GlmFit, FitError> {
    let x = &design.x;
    let y = &design.y;
    let (n, p) = (x.nrows(), x.ncols());

    if let Some(bad) = y.iter().find(|v| **v != 0.0 && **v != 1.0) {
        return Err(FitError::NonBinaryOutcome {
            field: format!("response value {}", bad),
        });
    }

    // Start from mu = (y + 0.5) / 2, eta = logit(mu)
    let mut mu: Vec<f64> = y.iter().map(|yi| (yi + 0.5) / 2.0).collect();
    let mut eta: Vec<f64> = mu.iter().map(|m| (m / (1.0 - m)).ln()).collect();
    let mut deviance = binomial_deviance(y, &mu);
    let mut beta = vec![0.0; p];
    let mut converged = false;
    let mut iterations = 0;

    while iterations < config.max_iterations {
        iterations += 1;

        let weights: Vec<f64> = mu.iter().map(|m| (m * (1.0 - m)).max(PROB_EPS)).collect();
        let working: Vec<f64> = (0..n)
            .map(|i| eta[i] + (y[i] - mu[i]) / weights[i])
            .collect();

        beta = weighted_least_squares(x, &weights, &working)?;

        eta = linear_predictor(x, &beta);
        mu = eta
            .iter()
            .map(|e| (1.0 / (1.0 + (-e).exp())).clamp(PROB_EPS, 1.0 - PROB_EPS))
            .collect();

        let new_deviance = binomial_deviance(y, &mu);
        if !new_deviance.is_finite() {
            return Err(FitError::numerical("deviance became non-finite"));
        }
        let change = (new_deviance - deviance).abs() / (new_deviance.abs() + 0.1);
        deviance = new_deviance;
        if change < config.tolerance {
            converged = true;
            break;
        }
    }

    if !converged {
        return Err(FitError::NotConverged { iterations });
    }

    let weights: Vec<f64> = mu.iter().map(|m| (m * (1.0 - m)).max(PROB_EPS)).collect();
    let covariance = invert_spd(&crossprod_weighted(x, &weights)).ok_or(FitError::Singular)?;

    let normal = Normal::new(0.0, 1.0).map_err(|e| FitError::numerical(e.to_string()))?;
    let critical = normal.inverse_cdf(0.5 + config.confidence / 2.0);

    let coefficients = wald_table(design, &beta, &covariance, 1.0, |stat| {
        2.0 * (1.0 - normal.cdf(stat.abs()))
    }, critical)?;

    Ok(GlmFit {
        family: Family::Binomial,
        coefficients,
        iterations,
        deviance,
        n_obs: n,
        df_residual: n - p,
    })
}

fn fit_gaussian(design: &DesignMatrix, config: &GlmConfig) -> Result<GlmFit, FitError> {
    let x = &design.x;
    let y = &design.y;
    let (n, p) = (x.nrows(), x.ncols());

    let ones = vec![1.0; n];
    let beta = weighted_least_squares(x, &ones, y)?;
    let fitted = linear_predictor(x, &beta);
    let rss: f64 = y.iter().zip(&fitted).map(|(yi, fi)| (yi - fi).powi(2)).sum();
    let df_residual = n - p;
    let dispersion = rss / df_residual as f64;

    let covariance = invert_spd(&crossprod_weighted(x, &ones)).ok_or(FitError::Singular)?;

    let t = StudentsT::new(0.0, 1.0, df_residual as f64)
        .map_err(|e| FitError::numerical(e.to_string()))?;
    let critical = t.inverse_cdf(0.5 + config.confidence / 2.0);

    let coefficients = wald_table(design, &beta, &covariance, dispersion, |stat| {
        2.0 * (1.0 - t.cdf(stat.abs()))
    }, critical)?;

    Ok(GlmFit {
        family: Family::Gaussian,
        coefficients,
        iterations: 1,
        deviance: rss,
        n_obs: n,
        df_residual,
    })
}

fn wald_table(
    design: &DesignMatrix,
    beta: &[f64],
    covariance: &Mat<f64>,
    dispersion: f64,
    p_value: impl Fn(f64) -> f64,
    critical: f64,
) -> Result<Vec<Coefficient>, FitError> {
    design
        .terms
        .iter()
        .enumerate()
        .map(|(j, term)| {
            let estimate = beta[j];
            let variance = covariance[(j, j)] * dispersion;
            let std_error = variance.max(0.0).sqrt();
            if !estimate.is_finite() || !std_error.is_finite() {
                return Err(FitError::numerical(format!(
                    "non-finite estimate for '{}'",
                    term
                )));
            }
            let statistic = if std_error > 0.0 {
                estimate / std_error
            } else {
                f64::INFINITY
            };
            Ok(Coefficient {
                term: term.clone(),
                estimate,
                std_error,
                statistic,
                p_value: p_value(statistic).clamp(0.0, 1.0),
                conf_low: estimate - critical * std_error,
                conf_high: estimate + critical * std_error,
            })
        })
        .collect()
}

fn binomial_deviance(y: &[f64], mu: &[f64]) -> f64 {
    -2.0 * y
        .iter()
        .zip(mu)
        .map(|(yi, mi)| {
            let mi = mi.clamp(PROB_EPS, 1.0 - PROB_EPS);
            yi * mi.ln() + (1.0 - yi) * (1.0 - mi).ln()
        })
        .sum::<f64>()
}

fn linear_predictor(x: &Mat<f64>, beta: &[f64]) -> Vec<f64> {
    (0..x.nrows())
        .map(|i| (0..x.ncols()).map(|j| x[(i, j)] * beta[j]).sum())
        .collect()
}

/// X' W X
fn crossprod_weighted(x: &Mat<f64>, weights: &[f64]) -> Mat<f64> {
    let mut xw = x.clone();
    for i in 0..x.nrows() {
        let s = weights[i].sqrt();
        for j in 0..x.ncols() {
            xw[(i, j)] *= s;
        }
    }
    xw.transpose() * &xw
}

/// Solve (X' W X) beta = X' W z.
fn weighted_least_squares(x: &Mat<f64>, weights: &[f64], z: &[f64]) -> Result<Vec<f64>, FitError> {
    let p = x.ncols();
    let information = crossprod_weighted(x, weights);
    let llt = cholesky(&information).ok_or(FitError::Singular)?;

    let mut score = Mat::<f64>::zeros(p, 1);
    for i in 0..x.nrows() {
        let wz = weights[i] * z[i];
        for j in 0..p {
            score[(j, 0)] += x[(i, j)] * wz;
        }
    }
    let beta = llt.solve(&score);
    Ok((0..p).map(|j| beta[(j, 0)]).collect())
}

/// Cholesky factor of a symmetric positive-definite matrix, or `None` when
/// some column is (numerically) a combination of the ones before it.
///
/// Each pivot is judged against its own diagonal entry, not the largest one.
fn cholesky(a: &Mat<f64>) -> Option<Cholesky<f64>> {
    let p = a.nrows();
    if p == 0 || (0..p).any(|j| !(a[(j, j)] > 0.0) || !a[(j, j)].is_finite()) {
        return None;
    }

    let llt = a.cholesky(Side::Lower).ok()?;
    let l = llt.compute_l();
    for j in 0..p {
        // Squared pivot is the residual of column j after the earlier columns
        let pivot = l[(j, j)] * l[(j, j)];
        if !(pivot > SINGULAR_TOL * a[(j, j)]) {
            return None;
        }
    }
    Some(llt)
}

/// Inverse of a symmetric positive-definite matrix, or `None` when singular.
fn invert_spd(a: &Mat<f64>) -> Option<Mat<f64>> {
    cholesky(a).map(|llt| llt.inverse())
}
