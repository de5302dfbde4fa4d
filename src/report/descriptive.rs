//! Descriptive cohort table
//!
//! One column per cohort. Numeric variables are summarised as
//! `median [Q1, Q3]`, categorical and flag variables as `n (pct%)` per level.

use std::collections::BTreeSet;

use polars::prelude::*;

use crate::error::Result;
use crate::pipeline::columns::{f64_values, flag_values, string_values};
use crate::pipeline::schema::{self, Gene, MISSING_LEVEL, OTHER_LEVEL};
use crate::pipeline::{observed_levels, Cohort, MUTNUM_LABELS, PACKYEAR_LABELS, VAF_LABELS};

/// How a variable is summarised in the table.
#[derive(Debug, Clone, Copy)]
enum Summary {
    Median,
    Levels,
    /// Levels in a fixed bin order rather than sorted.
    Ordered(&'static [&'static str]),
    Flag,
}

fn table_variables() -> Vec<(&'static str, &'static str, Summary)> {
    let mut vars = vec![
        (schema::AGE, "Age", Summary::Median),
        (schema::GENDER, "Sex", Summary::Levels),
        (schema::RACE_CAT, "Race", Summary::Levels),
        (schema::SMOKE_CAT, "Smoking", Summary::Levels),
        (schema::PACKYEARS, "Pack-years", Summary::Median),
        (
            schema::PACKYEARS_BIN,
            "Pack-years (binned)",
            Summary::Ordered(&PACKYEAR_LABELS),
        ),
        (schema::TUMOR_TYPE_COLLAPSED, "Tumor type", Summary::Levels),
        (schema::MODALITY_CAT, "Modality", Summary::Levels),
        (schema::TOTAL_DOSE, "Total dose (Gy)", Summary::Median),
        (schema::DAYS_TO_BLOOD_DRAW, "Days to blood draw", Summary::Median),
        (schema::ANY_CHEMO, "Any chemotherapy", Summary::Flag),
    ];
    vars.extend(schema::CHEMO_CLASSES.iter().map(|c| (*c, *c, Summary::Flag)));
    vars.extend([
        (schema::ANY_CH, "Any CH", Summary::Flag),
        (schema::DDR, "DDR CH", Summary::Flag),
        (schema::DTA, "DTA CH", Summary::Flag),
        (schema::MUTNUM_BIN, "Mutation count", Summary::Ordered(&MUTNUM_LABELS)),
        (schema::VAF_BIN, "Maximum VAF", Summary::Ordered(&VAF_LABELS)),
    ]);
    vars.extend(Gene::PANEL.iter().map(|g| (g.symbol(), g.symbol(), Summary::Flag)));
    vars
}

/// Type-7 sample quantile of sorted values.
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

fn median_iqr(values: &[Option<f64>]) -> String {
    let mut observed: Vec<f64> = values.iter().flatten().copied().collect();
    observed.sort_by(f64::total_cmp);
    match (
        quantile(&observed, 0.5),
        quantile(&observed, 0.25),
        quantile(&observed, 0.75),
    ) {
        (Some(m), Some(q1), Some(q3)) => format!("{:.1} [{:.1}, {:.1}]", m, q1, q3),
        _ => "NA".to_string(),
    }
}

fn count_pct(n: usize, total: usize) -> String {
    let pct = if total > 0 {
        n as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    format!("{} ({:.1}%)", n, pct)
}

/// Sorted levels with `Missing` and `Other` moved to the end.
fn display_order(levels: BTreeSet<String>) -> Vec<String> {
    let (mut regular, tail): (Vec<String>, Vec<String>) = levels
        .into_iter()
        .partition(|l| l != MISSING_LEVEL && l != OTHER_LEVEL);
    for special in [OTHER_LEVEL, MISSING_LEVEL] {
        if tail.iter().any(|l| l == special) {
            regular.push(special.to_string());
        }
    }
    regular
}

fn level_values(cohort: &Cohort, field: &str) -> Result<Vec<String>> {
    Ok(string_values(&cohort.frame, field)?
        .into_iter()
        .map(|v| v.unwrap_or_else(|| MISSING_LEVEL.to_string()))
        .collect())
}

/// Build the descriptive table for `cohorts`, one column per cohort label.
pub fn describe_cohorts(cohorts: &[&Cohort]) -> Result<DataFrame> {
    let mut variables: Vec<String> = vec!["N".to_string()];
    let mut levels: Vec<String> = vec![String::new()];
    let mut cells: Vec<Vec<String>> = cohorts.iter().map(|c| vec![c.len().to_string()]).collect();

    for (field, label, summary) in table_variables() {
        match summary {
            Summary::Median => {
                variables.push(label.to_string());
                levels.push("median [Q1, Q3]".to_string());
                for (cohort, column) in cohorts.iter().zip(cells.iter_mut()) {
                    column.push(median_iqr(&f64_values(&cohort.frame, field)?));
                }
            }
            Summary::Flag => {
                variables.push(label.to_string());
                levels.push("n (%)".to_string());
                for (cohort, column) in cohorts.iter().zip(cells.iter_mut()) {
                    let n = flag_values(&cohort.frame, field)?.iter().filter(|f| **f).count();
                    column.push(count_pct(n, cohort.len()));
                }
            }
            Summary::Levels | Summary::Ordered(_) => {
                let per_cohort: Vec<Vec<String>> = cohorts
                    .iter()
                    .map(|c| level_values(c, field))
                    .collect::<Result<_>>()?;
                let observed: BTreeSet<String> = per_cohort.iter().flatten().cloned().collect();
                let order: Vec<String> = match summary {
                    Summary::Ordered(labels) => {
                        let seen: Vec<&str> = observed.iter().map(String::as_str).collect();
                        let mut order: Vec<String> = observed_levels(labels, &seen)
                            .into_iter()
                            .map(str::to_string)
                            .collect();
                        if observed.contains(MISSING_LEVEL) && !labels.contains(&MISSING_LEVEL) {
                            order.push(MISSING_LEVEL.to_string());
                        }
                        order
                    }
                    _ => display_order(observed),
                };
                for level in order {
                    variables.push(label.to_string());
                    for (values, column) in per_cohort.iter().zip(cells.iter_mut()) {
                        let n = values.iter().filter(|v| **v == level).count();
                        column.push(count_pct(n, values.len()));
                    }
                    levels.push(level);
                }
            }
        }
    }

    let mut columns = vec![
        Column::new("Variable".into(), variables),
        Column::new("Level".into(), levels),
    ];
    for (cohort, values) in cohorts.iter().zip(cells) {
        columns.push(Column::new(cohort.label.as_str().into(), values));
    }
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_type7() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&v, 0.5), Some(2.5));
        assert_eq!(quantile(&v, 0.25), Some(1.75));
        assert_eq!(quantile(&v, 0.75), Some(3.25));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_display_order_puts_missing_last() {
        let levels: BTreeSet<String> = ["Missing", "White", "Other", "Asian"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(display_order(levels), vec!["Asian", "White", "Other", "Missing"]);
    }

    #[test]
    fn test_count_pct() {
        assert_eq!(count_pct(1, 4), "1 (25.0%)");
        assert_eq!(count_pct(0, 0), "0 (0.0%)");
    }
}
