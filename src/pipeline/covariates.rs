//! Covariate sets and design matrices
//!
//! A `CovariateSet` is declared once per analysis and checked against the
//! enriched schema before any model is fit. Design matrices are built per fit
//! with complete-case row selection, so two fits over the same cohort may use
//! different rows when their covariates are missing in different places.

use std::collections::BTreeSet;

use faer::Mat;
use polars::prelude::*;
use serde::Serialize;

use super::columns::{f64_values, string_values};
use super::schema;
use crate::error::{AnalysisError, FitError, Result};

pub const INTERCEPT: &str = "(Intercept)";

/// How a covariate enters the linear predictor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CovariateKind {
    Numeric,
    /// A boolean column entering as 0/1.
    Flag,
    /// Treatment-coded dummies against `reference` (first sorted level when `None`).
    Categorical { reference: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Covariate {
    pub field: String,
    pub kind: CovariateKind,
}

impl Covariate {
    pub fn numeric(field: &str) -> Self {
        Self {
            field: field.to_string(),
            kind: CovariateKind::Numeric,
        }
    }

    pub fn flag(field: &str) -> Self {
        Self {
            field: field.to_string(),
            kind: CovariateKind::Flag,
        }
    }

    pub fn categorical(field: &str, reference: Option<&str>) -> Self {
        Self {
            field: field.to_string(),
            kind: CovariateKind::Categorical {
                reference: reference.map(|r| r.to_string()),
            },
        }
    }
}

/// An ordered, statically declared set of adjustment covariates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CovariateSet {
    pub covariates: Vec<Covariate>,
}

impl CovariateSet {
    pub fn new(covariates: Vec<Covariate>) -> Self {
        Self { covariates }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Age, sex, race, smoking and chemotherapy classes.
    pub fn standard() -> Self {
        let mut covariates = vec![
            Covariate::numeric(schema::AGE_SCALED),
            Covariate::categorical(schema::GENDER, Some("Male")),
            Covariate::categorical(schema::RACE_CAT, Some("White")),
            Covariate::categorical(schema::SMOKE_CAT, Some("0")),
        ];
        covariates.extend(schema::CHEMO_CLASSES.iter().map(|c| Covariate::flag(c)));
        Self { covariates }
    }

    /// The standard set plus the cohort-collapsed tumor type.
    pub fn with_tumor_type(mut self) -> Self {
        self.covariates
            .push(Covariate::categorical(schema::TUMOR_TYPE_COLLAPSED, None));
        self
    }

    pub fn without(mut self, field: &str) -> Self {
        self.covariates.retain(|c| c.field != field);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.covariates.iter().map(|c| c.field.as_str())
    }

    /// Check that every covariate exists with a compatible dtype.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for covariate in &self.covariates {
            let dtype = schema
                .get(covariate.field.as_str())
                .ok_or_else(|| AnalysisError::missing_field(&covariate.field))?;
            let ok = match covariate.kind {
                CovariateKind::Numeric => dtype.is_primitive_numeric(),
                CovariateKind::Flag => {
                    matches!(dtype, DataType::Boolean) || dtype.is_primitive_numeric()
                }
                CovariateKind::Categorical { .. } => matches!(dtype, DataType::String),
            };
            if !ok {
                return Err(AnalysisError::schema(
                    &covariate.field,
                    format!("{:?} covariate cannot be read from a {} column", covariate.kind, dtype),
                ));
            }
        }
        Ok(())
    }
}

/// Check that a model term (outcome or exposure) exists and is numeric or boolean.
pub fn validate_term(schema: &Schema, field: &str) -> Result<()> {
    let dtype = schema
        .get(field)
        .ok_or_else(|| AnalysisError::missing_field(field))?;
    if matches!(dtype, DataType::Boolean) || dtype.is_primitive_numeric() {
        Ok(())
    } else {
        Err(AnalysisError::schema(
            field,
            format!("model terms must be numeric or boolean, found {}", dtype),
        ))
    }
}

/// Response vector plus model matrix for one fit.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub x: Mat<f64>,
    pub y: Vec<f64>,
    /// Column names of `x`, starting with the intercept.
    pub terms: Vec<String>,
    /// Number of input rows before complete-case selection.
    pub rows_available: usize,
}

impl DesignMatrix {
    pub fn n_obs(&self) -> usize {
        self.y.len()
    }

    pub fn n_params(&self) -> usize {
        self.terms.len()
    }

    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.terms.iter().position(|t| t == term)
    }

    /// Observations with a positive response and a non-zero value for `term`.
    pub fn support(&self, term: &str) -> usize {
        let Some(j) = self.term_index(term) else {
            return 0;
        };
        (0..self.n_obs())
            .filter(|&i| self.y[i] > 0.0 && self.x[(i, j)] != 0.0)
            .count()
    }
}

enum Block {
    Numeric {
        name: String,
        values: Vec<Option<f64>>,
        exposure: bool,
    },
    Categorical {
        field: String,
        reference: Option<String>,
        values: Vec<Option<String>>,
    },
}

/// Build the model matrix `outcome ~ exposures + covariates` over complete cases.
///
/// Covariate columns without variation are dropped as aliased. An exposure
/// without variation makes the fit impossible and is reported as such.
pub fn build_design(
    df: &DataFrame,
    outcome: &str,
    exposures: &[&str],
    covariates: &CovariateSet,
) -> Result<std::result::Result<DesignMatrix, FitError>> {
    let y_raw = f64_values(df, outcome)?;

    let mut blocks = Vec::with_capacity(exposures.len() + covariates.covariates.len());
    for exposure in exposures {
        blocks.push(Block::Numeric {
            name: exposure.to_string(),
            values: f64_values(df, exposure)?,
            exposure: true,
        });
    }
    for covariate in &covariates.covariates {
        match &covariate.kind {
            CovariateKind::Numeric | CovariateKind::Flag => blocks.push(Block::Numeric {
                name: covariate.field.clone(),
                values: f64_values(df, &covariate.field)?,
                exposure: false,
            }),
            CovariateKind::Categorical { reference } => blocks.push(Block::Categorical {
                field: covariate.field.clone(),
                reference: reference.clone(),
                values: string_values(df, &covariate.field)?,
            }),
        }
    }

    // Complete cases for this fit only
    let rows: Vec<usize> = (0..df.height())
        .filter(|&i| {
            y_raw[i].is_some()
                && blocks.iter().all(|b| match b {
                    Block::Numeric { values, .. } => values[i].is_some(),
                    Block::Categorical { values, .. } => values[i].is_some(),
                })
        })
        .collect();

    let y: Vec<f64> = rows.iter().filter_map(|&i| y_raw[i]).collect();

    let mut terms = vec![INTERCEPT.to_string()];
    let mut columns: Vec<Vec<f64>> = vec![vec![1.0; rows.len()]];

    for block in &blocks {
        match block {
            Block::Numeric {
                name,
                values,
                exposure,
            } => {
                let col: Vec<f64> = rows.iter().filter_map(|&i| values[i]).collect();
                if !has_variation(&col) {
                    if *exposure {
                        return Ok(Err(FitError::NoVariation { term: name.clone() }));
                    }
                    log::debug!("dropping aliased covariate '{}' (no variation)", name);
                    continue;
                }
                terms.push(name.clone());
                columns.push(col);
            }
            Block::Categorical {
                field,
                reference,
                values,
            } => {
                let observed: Vec<&str> = rows
                    .iter()
                    .filter_map(|&i| values[i].as_deref())
                    .collect();
                let levels: BTreeSet<&str> = observed.iter().copied().collect();
                if levels.len() < 2 {
                    log::debug!("dropping aliased covariate '{}' (single level)", field);
                    continue;
                }
                let reference_level = match reference.as_deref() {
                    Some(r) if levels.contains(r) => r,
                    Some(r) => {
                        let fallback = levels.iter().next().copied().unwrap_or(r);
                        log::debug!(
                            "reference level '{}' of '{}' absent from fit rows; using '{}'",
                            r,
                            field,
                            fallback
                        );
                        fallback
                    }
                    None => levels.iter().next().copied().unwrap_or_default(),
                };
                for level in levels.iter().filter(|l| **l != reference_level) {
                    terms.push(format!("{}{}", field, level));
                    columns.push(
                        observed
                            .iter()
                            .map(|v| if v == level { 1.0 } else { 0.0 })
                            .collect(),
                    );
                }
            }
        }
    }

    let n = rows.len();
    let p = terms.len();
    if n <= p {
        return Ok(Err(FitError::InsufficientData { n, p }));
    }

    let mut x = Mat::<f64>::zeros(n, p);
    for (j, col) in columns.iter().enumerate() {
        for (i, &v) in col.iter().enumerate() {
            x[(i, j)] = v;
        }
    }

    Ok(Ok(DesignMatrix {
        x,
        y,
        terms,
        rows_available: df.height(),
    }))
}

fn has_variation(values: &[f64]) -> bool {
    match values.first() {
        Some(first) => values.iter().any(|v| v != first),
        None => false,
    }
}
