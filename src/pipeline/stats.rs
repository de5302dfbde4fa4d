//! P-value bookkeeping shared by every result table

/// Conventional significance stars.
pub fn significance_stars(p_value: f64) -> &'static str {
    if p_value < 0.001 {
        "***"
    } else if p_value < 0.01 {
        "**"
    } else if p_value < 0.05 {
        "*"
    } else {
        ""
    }
}

/// Display category used to colour forest and heatmap points.
pub fn p_value_category(p_value: f64) -> &'static str {
    if p_value < 0.05 {
        "< 0.05"
    } else if p_value < 0.2 {
        "0.05–0.2"
    } else {
        "> 0.2"
    }
}

/// Benjamini–Hochberg adjusted p-values, returned in input order.
///
/// NaN p-values are left as NaN and do not count towards the number of tests.
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..p_values.len())
        .filter(|&i| !p_values[i].is_nan())
        .collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let m = order.len() as f64;
    let mut adjusted = vec![f64::NAN; p_values.len()];
    let mut running_min = 1.0f64;
    for (rank, &idx) in order.iter().enumerate().rev() {
        let q = p_values[idx] * m / (rank + 1) as f64;
        running_min = running_min.min(q);
        adjusted[idx] = running_min.min(1.0);
    }
    adjusted
}
