//! Typed column extraction
//!
//! Input columns arrive with whatever dtype CSV inference chose. These helpers
//! read them as numbers, flags or text and turn anything unreadable into a
//! schema error naming the column.

use polars::prelude::*;

use crate::error::{AnalysisError, Result};

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| AnalysisError::missing_field(name))
}

/// Read a column as optional floats. Text that does not parse is a schema error.
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = column(df, name)?;

    match col.dtype() {
        DataType::String => {
            let ca = col.str()?;
            ca.into_iter()
                .enumerate()
                .map(|(row, v)| match v.map(str::trim) {
                    None | Some("") => Ok(None),
                    Some(s) if s.eq_ignore_ascii_case("na") || s.eq_ignore_ascii_case("nan") => {
                        Ok(None)
                    }
                    Some(s) => s.parse::<f64>().map(Some).map_err(|_| {
                        AnalysisError::schema(
                            name,
                            format!("row {}: '{}' is not numeric", row, s),
                        )
                    }),
                })
                .collect()
        }
        DataType::Null => Ok(vec![None; col.len()]),
        DataType::Boolean => Ok(col
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| if b { 1.0 } else { 0.0 }))
            .collect()),
        dtype if dtype.is_primitive_numeric() => {
            let cast = col.cast(&DataType::Float64)?;
            Ok(cast
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()))
                .collect())
        }
        other => Err(AnalysisError::schema(
            name,
            format!("expected a numeric column, found {}", other),
        )),
    }
}

/// Read a column of boolean flags. Null means "not measured" and reads as false.
pub fn flag_values(df: &DataFrame, name: &str) -> Result<Vec<bool>> {
    let col = column(df, name)?;

    match col.dtype() {
        DataType::Boolean => Ok(col.bool()?.into_iter().map(|v| v.unwrap_or(false)).collect()),
        DataType::String => {
            let ca = col.str()?;
            ca.into_iter()
                .enumerate()
                .map(|(row, v)| match v.map(|s| s.trim().to_ascii_lowercase()) {
                    None => Ok(false),
                    Some(s) => match s.as_str() {
                        "" | "na" | "nan" => Ok(false),
                        "1" | "1.0" | "true" | "t" | "yes" | "y" => Ok(true),
                        "0" | "0.0" | "false" | "f" | "no" | "n" => Ok(false),
                        _ => Err(AnalysisError::schema(
                            name,
                            format!("row {}: '{}' is not a flag value", row, s),
                        )),
                    },
                })
                .collect()
        }
        DataType::Null => Ok(vec![false; col.len()]),
        dtype if dtype.is_primitive_numeric() => {
            let cast = col.cast(&DataType::Float64)?;
            Ok(cast
                .f64()?
                .into_iter()
                .map(|v| matches!(v, Some(x) if x != 0.0 && !x.is_nan()))
                .collect())
        }
        other => Err(AnalysisError::schema(
            name,
            format!("expected a flag column, found {}", other),
        )),
    }
}

/// Read a column as optional text, casting numbers and flags to their string form.
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = column(df, name)?;

    let values: Vec<Option<String>> = match col.dtype() {
        DataType::String => col
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect(),
        DataType::Null => vec![None; col.len()],
        DataType::Float32 | DataType::Float64 => {
            // Integral floats print without a trailing ".0" so "1" and "1.0" agree
            let cast = col.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| {
                    v.filter(|x| !x.is_nan()).map(|x| {
                        if x.fract() == 0.0 {
                            format!("{}", x as i64)
                        } else {
                            format!("{}", x)
                        }
                    })
                })
                .collect()
        }
        _ => {
            let cast = col.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect()
        }
    };

    Ok(values)
}
