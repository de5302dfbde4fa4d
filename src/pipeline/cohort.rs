//! Cohort filtering and rare-category collapse
//!
//! Filters are pure row predicates over the enriched table and compose by
//! conjunction, so their order never matters. The rare-category collapse is a
//! second pass over an already-filtered cohort: distinct subjects are counted
//! per category within that cohort only, then small categories become "Other".

use std::collections::{BTreeMap, BTreeSet, HashSet};

use polars::prelude::*;
use serde::Serialize;

use super::columns::{f64_values, flag_values, string_values};
use super::schema::{self, MISSING_LEVEL, OTHER_LEVEL};
use crate::error::{AnalysisError, Result};

/// Default minimum number of distinct subjects for a tumor type to keep its label.
pub const DEFAULT_RARE_THRESHOLD: usize = 50;

/// A row predicate over the enriched table.
#[derive(Debug, Clone, PartialEq)]
pub enum CohortFilter {
    ReceivedRadiotherapy,
    NoRadiotherapy,
    BloodDrawKnown,
    ChPositive,
    DdrPositive,
    DtaPositive,
    NonDdrCh,
    ChemoExposed,
    /// Any boolean column being true.
    Flag(String),
    /// Conjunction of the inner filters. Empty means "everyone".
    All(Vec<CohortFilter>),
}

impl CohortFilter {
    pub fn and(self, other: CohortFilter) -> CohortFilter {
        match (self, other) {
            (CohortFilter::All(mut a), CohortFilter::All(b)) => {
                a.extend(b);
                CohortFilter::All(a)
            }
            (CohortFilter::All(mut a), f) => {
                a.push(f);
                CohortFilter::All(a)
            }
            (f, CohortFilter::All(mut b)) => {
                b.insert(0, f);
                CohortFilter::All(b)
            }
            (f, g) => CohortFilter::All(vec![f, g]),
        }
    }

    /// Evaluate the predicate for every row.
    pub fn mask(&self, df: &DataFrame) -> Result<Vec<bool>> {
        match self {
            CohortFilter::ReceivedRadiotherapy => flag_values(df, schema::XRT),
            CohortFilter::NoRadiotherapy => {
                Ok(flag_values(df, schema::XRT)?.into_iter().map(|f| !f).collect())
            }
            CohortFilter::BloodDrawKnown => Ok(f64_values(df, schema::DAYS_TO_BLOOD_DRAW)?
                .into_iter()
                .map(|d| d.is_some())
                .collect()),
            CohortFilter::ChPositive => flag_values(df, schema::ANY_CH),
            CohortFilter::DdrPositive => flag_values(df, schema::DDR),
            CohortFilter::DtaPositive => flag_values(df, schema::DTA),
            CohortFilter::NonDdrCh => flag_values(df, schema::NON_DDR_CH),
            CohortFilter::ChemoExposed => flag_values(df, schema::ANY_CHEMO),
            CohortFilter::Flag(column) => flag_values(df, column),
            CohortFilter::All(filters) => {
                let mut mask = vec![true; df.height()];
                for filter in filters {
                    for (m, v) in mask.iter_mut().zip(filter.mask(df)?) {
                        *m &= v;
                    }
                }
                Ok(mask)
            }
        }
    }

    /// Rows of `df` satisfying the predicate.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mask = self.mask(df)?;
        let mask = BooleanChunked::from_slice("mask".into(), &mask);
        Ok(df.filter(&mask)?)
    }
}

/// Distinct-subject counts per category and the categories relabelled "Other".
#[derive(Debug, Clone, Serialize)]
pub struct CollapseTable {
    pub column: String,
    pub threshold: usize,
    pub counts: BTreeMap<String, usize>,
    pub relabeled: BTreeSet<String>,
}

impl CollapseTable {
    /// Count distinct subjects per category of `column` and mark those below `threshold`.
    pub fn compute(df: &DataFrame, column: &str, threshold: usize) -> Result<Self> {
        let ids = string_values(df, schema::STUDY_ID)?;
        let categories = string_values(df, column)?;

        let mut subjects: BTreeMap<String, HashSet<String>> = BTreeMap::new();
        for (row, (id, cat)) in ids.iter().zip(&categories).enumerate() {
            let id = id.clone().unwrap_or_else(|| format!("row-{}", row));
            subjects
                .entry(category_key(cat.as_deref()))
                .or_default()
                .insert(id);
        }

        let counts: BTreeMap<String, usize> =
            subjects.into_iter().map(|(k, v)| (k, v.len())).collect();
        let relabeled: BTreeSet<String> = counts
            .iter()
            .filter(|(_, n)| **n < threshold)
            .map(|(k, _)| k.clone())
            .collect();

        if !relabeled.is_empty() {
            log::debug!(
                "collapsing {} rare '{}' categories into '{}': {:?}",
                relabeled.len(),
                column,
                OTHER_LEVEL,
                relabeled
            );
        }

        Ok(Self {
            column: column.to_string(),
            threshold,
            counts,
            relabeled,
        })
    }

    pub fn label_for(&self, category: Option<&str>) -> String {
        let key = category_key(category);
        if self.relabeled.contains(&key) {
            OTHER_LEVEL.to_string()
        } else {
            key
        }
    }

    /// The collapsed column for every row of `df`.
    pub fn collapsed_column(&self, df: &DataFrame, name: &str) -> Result<Column> {
        let labels: Vec<String> = string_values(df, &self.column)?
            .iter()
            .map(|c| self.label_for(c.as_deref()))
            .collect();
        Ok(Column::new(name.into(), labels))
    }
}

fn category_key(category: Option<&str>) -> String {
    match category.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => MISSING_LEVEL.to_string(),
    }
}

/// A labelled, filtered view of the enriched population.
#[derive(Debug, Clone)]
pub struct Cohort {
    pub label: String,
    pub filter: CohortFilter,
    pub frame: DataFrame,
    pub collapse: CollapseTable,
}

impl Cohort {
    /// Filter `population` and compute the tumor-type collapse on the result.
    ///
    /// Fails with `EmptyCohort` when nobody satisfies the filter.
    pub fn build(
        label: &str,
        population: &DataFrame,
        filter: CohortFilter,
        rare_threshold: usize,
    ) -> Result<Self> {
        let mut frame = filter.apply(population)?;
        if frame.height() == 0 {
            return Err(AnalysisError::empty_cohort(label));
        }

        let collapse = CollapseTable::compute(&frame, schema::TUMOR_TYPE, rare_threshold)?;
        frame.with_column(collapse.collapsed_column(&frame, schema::TUMOR_TYPE_COLLAPSED)?)?;

        log::info!("cohort '{}': {} subjects", label, frame.height());
        Ok(Self {
            label: label.to_string(),
            filter,
            frame,
            collapse,
        })
    }

    /// A sub-cohort of this one. The collapse is recomputed from the subset's own counts.
    pub fn subset(&self, label: &str, filter: CohortFilter) -> Result<Self> {
        let combined = self.filter.clone().and(filter);
        Cohort::build(label, &self.frame, combined, self.collapse.threshold)
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Distinct subject count.
    pub fn subjects(&self) -> Result<usize> {
        let ids: HashSet<Option<String>> =
            string_values(&self.frame, schema::STUDY_ID)?.into_iter().collect();
        Ok(ids.len())
    }
}
