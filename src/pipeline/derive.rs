//! Feature deriver
//!
//! Adds recoded categoricals, binned continuous fields, normalised doses and
//! composite CH flags to the loaded table. Every derived value depends only on
//! its own row, apart from `age_scaled`, whose mean and standard deviation are
//! taken once over the full loaded table.

use polars::prelude::*;
use serde::Serialize;

use super::binning::{bin_pack_years, mutnum_label, vaf_label};
use super::columns::{f64_values, flag_values, string_values};
use super::schema::{self, Gene, Site, MISSING_LEVEL, OTHER_LEVEL};
use crate::error::{AnalysisError, Result};

/// Population statistics used for age standardisation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AgeScaling {
    pub mean: f64,
    pub sd: f64,
}

impl AgeScaling {
    /// Mean and sample standard deviation over non-null ages.
    pub fn from_values(ages: &[Option<f64>]) -> Result<Self> {
        let observed: Vec<f64> = ages.iter().flatten().copied().collect();
        if observed.is_empty() {
            return Err(AnalysisError::schema(schema::AGE, "no non-null ages to scale"));
        }
        let n = observed.len() as f64;
        let mean = observed.iter().sum::<f64>() / n;
        let sd = if observed.len() > 1 {
            (observed.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        Ok(Self { mean, sd })
    }

    pub fn scale(&self, age: f64) -> f64 {
        if self.sd > 0.0 && self.sd.is_finite() {
            (age - self.mean) / self.sd
        } else {
            age - self.mean
        }
    }
}

/// Collapse self-reported race to `Missing`, `Other` or a title-cased category.
pub fn recode_race(raw: Option<&str>) -> String {
    let Some(value) = raw.map(str::trim) else {
        return MISSING_LEVEL.to_string();
    };
    if value.is_empty() || value.eq_ignore_ascii_case("unknown") {
        MISSING_LEVEL.to_string()
    } else if value.eq_ignore_ascii_case("missing/other") {
        OTHER_LEVEL.to_string()
    } else {
        title_case(value)
    }
}

/// Collapse smoking history to `0` (never), `1` (ever) or `Missing`.
pub fn recode_smoking(raw: Option<&str>) -> &'static str {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("0") | Some("never") => "0",
        Some("1") | Some("former") | Some("current") | Some("ever") => "1",
        _ => MISSING_LEVEL,
    }
}

/// Normalise sex to `Male` / `Female`; anything else is not a valid record.
pub fn normalize_gender(raw: Option<&str>) -> Option<&'static str> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("male") | Some("m") => Some("Male"),
        Some("female") | Some("f") => Some("Female"),
        _ => None,
    }
}

/// Capitalise the first letter of every word, where words are split at any non-letter.
fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut out = String::with_capacity(word.len());
            let mut word_start = true;
            for c in word.chars() {
                if c.is_alphabetic() {
                    if word_start {
                        out.extend(c.to_uppercase());
                    } else {
                        out.extend(c.to_lowercase());
                    }
                    word_start = false;
                } else {
                    out.push(c);
                    word_start = true;
                }
            }
            out
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Summary of a derivation pass, reported alongside the enriched table.
#[derive(Debug, Clone, Serialize)]
pub struct DerivationSummary {
    pub rows: usize,
    pub age_scaling: AgeScaling,
    pub missing_race: usize,
    pub missing_smoking: usize,
    pub any_ch: usize,
}

/// Derive every analysis variable over the full loaded table.
///
/// Fails with a schema error when a required column is absent or unreadable.
pub fn derive_features(df: &DataFrame) -> Result<(DataFrame, DerivationSummary)> {
    schema::validate_input_schema(df)?;
    let height = df.height();
    let mut out = df.clone();

    // Demographics
    let ages = f64_values(df, schema::AGE)?;
    let age_scaling = AgeScaling::from_values(&ages)?;
    if age_scaling.sd == 0.0 {
        log::warn!("age has zero variance; age_scaled is centred only");
    }
    let age_scaled: Vec<Option<f64>> = ages
        .iter()
        .map(|a| a.map(|v| age_scaling.scale(v)))
        .collect();
    out.with_column(Column::new(schema::AGE_SCALED.into(), age_scaled))?;

    let genders = string_values(df, schema::GENDER_RAW)?
        .iter()
        .enumerate()
        .map(|(row, g)| {
            normalize_gender(g.as_deref()).ok_or_else(|| {
                AnalysisError::schema(
                    schema::GENDER_RAW,
                    format!("row {}: unrecognised value {:?}", row, g),
                )
            })
        })
        .collect::<Result<Vec<&str>>>()?;
    out.with_column(Column::new(schema::GENDER.into(), genders))?;

    let races: Vec<String> = string_values(df, schema::RACE)?
        .iter()
        .map(|r| recode_race(r.as_deref()))
        .collect();
    let missing_race = races.iter().filter(|r| r.as_str() == MISSING_LEVEL).count();
    out.with_column(Column::new(schema::RACE_CAT.into(), races))?;

    let smoking: Vec<&str> = string_values(df, schema::SMOKING)?
        .iter()
        .map(|s| recode_smoking(s.as_deref()))
        .collect();
    let missing_smoking = smoking.iter().filter(|s| **s == MISSING_LEVEL).count();
    out.with_column(Column::new(schema::SMOKE_CAT.into(), smoking))?;

    out.with_column(bin_pack_years(df.column(schema::PACKYEARS)?)?)?;

    let modality: Vec<String> = string_values(df, schema::MODALITY)?
        .into_iter()
        .map(|m| match m.map(|s| s.trim().to_string()) {
            Some(s) if !s.is_empty() => s,
            _ => MISSING_LEVEL.to_string(),
        })
        .collect();
    out.with_column(Column::new(schema::MODALITY_CAT.into(), modality))?;

    // Treatment
    out.with_column(Column::new(schema::XRT.into(), flag_values(df, schema::XRT)?))?;

    let mut any_chemo = vec![false; height];
    for class in schema::CHEMO_CLASSES {
        let flags = flag_values(df, class)?;
        for (acc, f) in any_chemo.iter_mut().zip(&flags) {
            *acc |= *f;
        }
        out.with_column(Column::new(class.into(), flags))?;
    }
    out.with_column(Column::new(schema::ANY_CHEMO.into(), any_chemo))?;

    let mut total_dose: Vec<Option<f64>> = vec![None; height];
    for site in Site::ALL {
        let doses = f64_values(df, site.dose_column())?;
        if let Some((row, d)) = doses
            .iter()
            .enumerate()
            .find_map(|(row, d)| d.filter(|x| *x < 0.0).map(|x| (row, x)))
        {
            return Err(AnalysisError::schema(
                site.dose_column(),
                format!("row {}: negative dose {}", row, d),
            ));
        }
        for (acc, d) in total_dose.iter_mut().zip(&doses) {
            if let Some(d) = d {
                *acc = Some(acc.unwrap_or(0.0) + d / 100.0);
            }
        }
        let scaled: Vec<Option<f64>> = doses.iter().map(|d| d.map(|x| x / 100.0)).collect();
        out.with_column(Column::new(site.scaled_dose_column().into(), scaled))?;
    }
    out.with_column(Column::new(schema::TOTAL_DOSE.into(), total_dose))?;

    // Mutations
    let mut ddr = vec![false; height];
    let mut dta = vec![false; height];
    let mut any_gene = vec![false; height];
    for gene in Gene::PANEL {
        let flags = flag_values(df, gene.symbol())?;
        for row in 0..height {
            if flags[row] {
                any_gene[row] = true;
                if Gene::DDR.contains(&gene) {
                    ddr[row] = true;
                }
                if Gene::DTA.contains(&gene) {
                    dta[row] = true;
                }
            }
        }
        out.with_column(Column::new(gene.symbol().into(), flags))?;
    }

    let mutnum = f64_values(df, schema::MUTNUM)?;
    if let Some(row) = mutnum.iter().position(|m| matches!(m, Some(x) if *x < 0.0)) {
        return Err(AnalysisError::schema(
            schema::MUTNUM,
            format!("row {}: negative mutation count", row),
        ));
    }
    let any_ch: Vec<bool> = any_gene
        .iter()
        .zip(&mutnum)
        .map(|(g, m)| *g || m.unwrap_or(0.0) >= 1.0)
        .collect();
    let non_ddr_ch: Vec<bool> = any_ch.iter().zip(&ddr).map(|(c, d)| *c && !*d).collect();
    let mutnum_bins: Vec<&str> = mutnum.iter().map(|m| mutnum_label(*m)).collect();

    let vaf_bins = f64_values(df, schema::MAX_VAF)?
        .iter()
        .enumerate()
        .map(|(row, v)| {
            vaf_label(*v).ok_or_else(|| {
                AnalysisError::schema(
                    schema::MAX_VAF,
                    format!("row {}: VAF {:?} outside [0, 1]", row, v),
                )
            })
        })
        .collect::<Result<Vec<&str>>>()?;

    let any_ch_count = any_ch.iter().filter(|c| **c).count();
    out.with_column(Column::new(schema::DDR.into(), ddr))?;
    out.with_column(Column::new(schema::DTA.into(), dta))?;
    out.with_column(Column::new(schema::ANY_CH.into(), any_ch))?;
    out.with_column(Column::new(schema::NON_DDR_CH.into(), non_ddr_ch))?;
    out.with_column(Column::new(schema::MUTNUM_BIN.into(), mutnum_bins))?;
    out.with_column(Column::new(schema::VAF_BIN.into(), vaf_bins))?;

    log::info!(
        "derived features for {} rows ({} CH-positive, {} missing race, {} missing smoking)",
        height,
        any_ch_count,
        missing_race,
        missing_smoking
    );

    let summary = DerivationSummary {
        rows: height,
        age_scaling,
        missing_race,
        missing_smoking,
        any_ch: any_ch_count,
    };
    Ok((out, summary))
}
