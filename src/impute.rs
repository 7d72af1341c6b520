//! Missing-value imputation with memorized constants

use crate::classify::ColumnKind;
use crate::error::{PrepError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Suffix appended to a column name to form its indicator column
pub const INDICATOR_SUFFIX: &str = "_imputed";

/// A memorized fill value: string for categorical columns, integer for
/// numeric columns. Serialized untagged so the constants artifact stays a
/// plain string-or-integer mapping on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImputeValue {
    Integer(i64),
    Text(String),
}

impl std::fmt::Display for ImputeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImputeValue::Integer(v) => write!(f, "{v}"),
            ImputeValue::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Result of fitting imputation for one column
#[derive(Debug, Clone)]
pub struct FittedImpute {
    pub value: ImputeValue,
    pub needs_indicator: bool,
}

/// Indicator column name for a feature column
pub fn indicator_name(column: &str) -> String {
    format!("{column}{INDICATOR_SUFFIX}")
}

/// Compute the fill value for a column. Categorical columns take the mode
/// (ties broken by first encounter in row order); numeric columns take the
/// mean truncated to an integer. `needs_indicator` is true iff the column
/// has at least one missing value.
pub fn fit(series: &Series, kind: ColumnKind) -> Result<FittedImpute> {
    let needs_indicator = series.null_count() > 0;
    let value = match kind {
        ColumnKind::Categorical => ImputeValue::Text(mode_value(series)?),
        ColumnKind::Numeric => ImputeValue::Integer(truncated_mean(series)?),
    };
    Ok(FittedImpute {
        value,
        needs_indicator,
    })
}

/// Mode of a column over its string representation, first-encountered value
/// winning ties.
fn mode_value(series: &Series) -> Result<String> {
    let casted = series.cast(&DataType::String)?;
    let ca = casted.str()?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for value in ca.into_iter().flatten() {
        let count = counts.entry(value).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for value in &order {
        let count = counts[value];
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }

    best.map(|(value, _)| value.to_string()).ok_or_else(|| {
        PrepError::DataError(format!(
            "column {} has no non-missing values to impute from",
            series.name()
        ))
    })
}

/// Arithmetic mean of the non-missing values, truncated to an integer.
/// Fails if the column contains values that cannot be coerced to float.
fn truncated_mean(series: &Series) -> Result<i64> {
    let casted = series.cast(&DataType::Float64)?;
    if casted.null_count() > series.null_count() {
        return Err(PrepError::DataError(format!(
            "column {} contains values that cannot be coerced to a number",
            series.name()
        )));
    }
    let mean = casted.f64()?.mean().ok_or_else(|| {
        PrepError::DataError(format!(
            "column {} has no non-missing values to impute from",
            series.name()
        ))
    })?;
    Ok(mean as i64)
}

/// Replace missing entries in a series with the stored constant. Numeric
/// columns are cast to Float64; the constant is parsed when it was stored as
/// text. String columns take the textual form of the constant.
pub fn fill_series(series: &Series, value: &ImputeValue) -> Result<Series> {
    if is_numeric_dtype(series.dtype()) {
        let fill = match value {
            ImputeValue::Integer(v) => *v as f64,
            ImputeValue::Text(v) => v.trim().parse::<f64>().map_err(|_| {
                PrepError::DataError(format!(
                    "constant '{v}' for column {} is not numeric",
                    series.name()
                ))
            })?,
        };
        let casted = series.cast(&DataType::Float64)?;
        let ca = casted.f64()?;
        let filled: Float64Chunked = ca
            .into_iter()
            .map(|opt| Some(opt.unwrap_or(fill)))
            .collect();
        return Ok(filled.with_name(series.name().clone()).into_series());
    }

    let fill = value.to_string();
    let casted = series.cast(&DataType::String)?;
    let ca = casted.str()?;
    let filled: StringChunked = ca
        .into_iter()
        .map(|opt| Some(opt.unwrap_or(fill.as_str()).to_string()))
        .collect();
    Ok(filled.with_name(series.name().clone()).into_series())
}

/// 1/0 indicator series recording which entries of `series` are missing
pub fn indicator_series(series: &Series, column: &str) -> Series {
    let flags: Int32Chunked = series
        .is_null()
        .into_iter()
        .map(|opt| opt.map(|missing| if missing { 1 } else { 0 }))
        .collect();
    flags.with_name(indicator_name(column).into()).into_series()
}

/// All-zero indicator series for a batch column with no missing values
pub fn zero_indicator(column: &str, height: usize) -> Series {
    Series::new(indicator_name(column).into(), vec![0i32; height])
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}
