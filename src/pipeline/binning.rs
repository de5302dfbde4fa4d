//! Fixed-edge binning of continuous fields
//!
//! Buckets are lower-inclusive (`[lo, hi)`): a value sitting exactly on an edge
//! goes to the bucket that edge opens. The final bucket is closed on both ends.

use polars::prelude::*;

use super::schema::MISSING_LEVEL;
use crate::error::{AnalysisError, Result};

/// Pack-year bucket edges.
pub const PACKYEAR_EDGES: [f64; 12] = [
    0.0,
    0.001,
    1.0,
    2.0,
    5.0,
    10.0,
    20.0,
    30.0,
    40.0,
    50.0,
    100.0,
    f64::INFINITY,
];

pub const PACKYEAR_LABELS: [&str; 11] = [
    "[0,0.001)",
    "[0.001,1)",
    "[1,2)",
    "[2,5)",
    "[5,10)",
    "[10,20)",
    "[20,30)",
    "[30,40)",
    "[40,50)",
    "[50,100)",
    "[100,Inf]",
];

pub const MUTNUM_LABELS: [&str; 3] = ["0", "1", ">=2"];

/// VAF thresholds. Values at zero (or absent) form their own "None" bucket.
pub const VAF_EDGES: [f64; 5] = [0.0, 0.05, 0.10, 0.20, 1.0];

pub const VAF_LABELS: [&str; 5] = ["None", "<0.05", "0.05-0.10", "0.10-0.20", ">=0.20"];

/// Index of the bucket holding `value`, or `None` when it lies outside the edges.
///
/// `edges` must be sorted ascending; there are `edges.len() - 1` buckets.
pub fn bucket_index(value: f64, edges: &[f64]) -> Option<usize> {
    let n_buckets = edges.len().checked_sub(1)?;
    if n_buckets == 0 || value.is_nan() || value < edges[0] || value > edges[n_buckets] {
        return None;
    }
    // Number of edges <= value; the bucket is the one opened by the last of them
    let idx = edges.partition_point(|&e| e <= value) - 1;
    Some(idx.min(n_buckets - 1))
}

/// Bin a numeric pack-years column into labelled buckets.
///
/// A text column is rejected: it has either been binned already or was read
/// with the wrong type, and re-binning labels would silently corrupt them.
pub fn bin_pack_years(col: &Column) -> Result<Column> {
    let name = col.name().to_string();
    if !col.dtype().is_primitive_numeric() && !matches!(col.dtype(), DataType::Null) {
        return Err(AnalysisError::schema(
            name,
            format!("pack-year binning needs a numeric column, found {}", col.dtype()),
        ));
    }

    let cast = col.cast(&DataType::Float64)?;
    let labels = cast
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v.filter(|x| !x.is_nan()) {
            None => Ok(MISSING_LEVEL),
            Some(x) => bucket_index(x, &PACKYEAR_EDGES)
                .map(|i| PACKYEAR_LABELS[i])
                .ok_or_else(|| {
                    AnalysisError::schema(
                        name.clone(),
                        format!("row {}: pack-years {} is negative", row, x),
                    )
                }),
        })
        .collect::<Result<Vec<&str>>>()?;

    Ok(Column::new(super::schema::PACKYEARS_BIN.into(), labels))
}

/// Mutation count bucket: `0`, `1` or `>=2`. Null counts read as zero.
pub fn mutnum_label(count: Option<f64>) -> &'static str {
    match count.unwrap_or(0.0) {
        c if c >= 2.0 => MUTNUM_LABELS[2],
        c if c >= 1.0 => MUTNUM_LABELS[1],
        _ => MUTNUM_LABELS[0],
    }
}

/// VAF bucket label, or `None` when the value lies outside `[0, 1]`.
pub fn vaf_label(vaf: Option<f64>) -> Option<&'static str> {
    match vaf {
        None => Some(VAF_LABELS[0]),
        Some(v) if v == 0.0 => Some(VAF_LABELS[0]),
        Some(v) => {
            let idx = bucket_index(v, &VAF_EDGES)?;
            Some(VAF_LABELS[idx + 1])
        }
    }
}

/// Labels of `labels` that occur in `observed`, in bucket order.
pub fn observed_levels<'a>(labels: &[&'a str], observed: &[&str]) -> Vec<&'a str> {
    labels
        .iter()
        .copied()
        .filter(|l| observed.contains(l))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_values_bucket_upward() {
        assert_eq!(bucket_index(1.0, &PACKYEAR_EDGES), Some(2));
        assert_eq!(PACKYEAR_LABELS[2], "[1,2)");
        assert_eq!(bucket_index(0.001, &PACKYEAR_EDGES), Some(1));
        assert_eq!(bucket_index(0.0, &PACKYEAR_EDGES), Some(0));
        assert_eq!(bucket_index(0.9999, &PACKYEAR_EDGES), Some(1));
    }

    #[test]
    fn test_last_bucket_is_closed() {
        assert_eq!(bucket_index(100.0, &PACKYEAR_EDGES), Some(10));
        assert_eq!(bucket_index(f64::INFINITY, &PACKYEAR_EDGES), Some(10));
        assert_eq!(bucket_index(1.0, &VAF_EDGES), Some(3));
    }

    #[test]
    fn test_out_of_range_values() {
        assert_eq!(bucket_index(-0.5, &PACKYEAR_EDGES), None);
        assert_eq!(bucket_index(f64::NAN, &PACKYEAR_EDGES), None);
        assert_eq!(bucket_index(1.5, &VAF_EDGES), None);
    }

    #[test]
    fn test_mutnum_labels() {
        assert_eq!(mutnum_label(None), "0");
        assert_eq!(mutnum_label(Some(0.0)), "0");
        assert_eq!(mutnum_label(Some(1.0)), "1");
        assert_eq!(mutnum_label(Some(2.0)), ">=2");
        assert_eq!(mutnum_label(Some(7.0)), ">=2");
    }

    #[test]
    fn test_vaf_labels() {
        assert_eq!(vaf_label(None), Some("None"));
        assert_eq!(vaf_label(Some(0.0)), Some("None"));
        assert_eq!(vaf_label(Some(0.02)), Some("<0.05"));
        assert_eq!(vaf_label(Some(0.05)), Some("0.05-0.10"));
        assert_eq!(vaf_label(Some(0.10)), Some("0.10-0.20"));
        assert_eq!(vaf_label(Some(0.20)), Some(">=0.20"));
        assert_eq!(vaf_label(Some(1.0)), Some(">=0.20"));
        assert_eq!(vaf_label(Some(1.2)), None);
    }

    #[test]
    fn test_bin_pack_years_column() {
        let col = Column::new("packyears".into(), [Some(0.0f64), Some(1.0), None, Some(150.0)]);
        let binned = bin_pack_years(&col).unwrap();
        let labels: Vec<Option<&str>> = binned.str().unwrap().into_iter().collect();
        assert_eq!(
            labels,
            vec![Some("[0,0.001)"), Some("[1,2)"), Some("Missing"), Some("[100,Inf]")]
        );
    }

    #[test]
    fn test_bin_pack_years_rejects_labels() {
        let col = Column::new("packyears".into(), ["[1,2)", "[2,5)"]);
        assert!(matches!(bin_pack_years(&col), Err(AnalysisError::Schema { .. })));
    }

    #[test]
    fn test_observed_levels_keep_bucket_order() {
        let observed = ["[5,10)", "[0,0.001)", "[5,10)"];
        assert_eq!(
            observed_levels(&PACKYEAR_LABELS, &observed),
            vec!["[0,0.001)", "[5,10)"]
        );
    }
}
