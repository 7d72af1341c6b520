//! Serving-time preprocessing
//!
//! Replays training-time imputation and indicator synthesis on a new batch
//! using only the persisted artifacts, then projects the batch to the exact
//! column order the model expects. One bad column never aborts the whole
//! batch; per-column outcomes are surfaced to the caller as warnings.

use crate::artifacts::ServingContext;
use crate::error::{PrepError, Result};
use crate::impute::{self, ImputeValue, INDICATOR_SUFFIX};
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// How a batch column was handled during serving preprocessing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnStatus {
    /// Missing values were filled from the stored constant
    Imputed,
    /// No missing values; indicator emitted as all zeros
    Clean,
    /// Column could not be processed and was left as-is
    Skipped,
    /// Feature absent from the batch, rebuilt entirely from its constant
    Synthesized,
}

/// Per-column outcome surfaced to the caller alongside the aligned batch
#[derive(Debug, Clone, Serialize)]
pub struct ColumnOutcome {
    pub column: String,
    pub status: ColumnStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ColumnOutcome {
    fn new(column: &str, status: ColumnStatus, detail: Option<String>) -> Self {
        Self {
            column: column.to_string(),
            status,
            detail,
        }
    }
}

/// Reproduce training-time imputation on a serving batch and align it to
/// the schema's feature order.
///
/// Every batch column with a stored constant gets an indicator column: 1/0
/// flags when the batch has missing values, all zeros otherwise. The batch
/// missingness pattern is independent of training, so the indicator is
/// emitted even when training required none. Columns that cannot be
/// imputed are skipped with a diagnostic; a feature that cannot be produced
/// at all fails the request.
pub fn apply(
    batch: &DataFrame,
    ctx: &ServingContext,
) -> Result<(DataFrame, Vec<ColumnOutcome>)> {
    let mut df = batch.clone();
    let mut outcomes = Vec::new();

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for col in &names {
        let Some(constant) = ctx.constants.get(col) else {
            continue;
        };
        let series = df.column(col)?.as_materialized_series().clone();
        let missing = series.null_count();
        if missing > 0 {
            match impute::fill_series(&series, constant) {
                Ok(filled) => {
                    let flag = impute::indicator_series(&series, col);
                    df.replace(col, filled)?;
                    df.with_column(flag)?;
                    outcomes.push(ColumnOutcome::new(
                        col,
                        ColumnStatus::Imputed,
                        Some(format!("{missing} values filled")),
                    ));
                }
                Err(e) => {
                    warn!(column = %col, error = %e, "skipping column during imputation");
                    outcomes.push(ColumnOutcome::new(
                        col,
                        ColumnStatus::Skipped,
                        Some(e.to_string()),
                    ));
                }
            }
        } else {
            df.with_column(impute::zero_indicator(col, df.height()))?;
            outcomes.push(ColumnOutcome::new(col, ColumnStatus::Clean, None));
        }
    }

    // Project to the exact feature order the model expects, dropping any
    // extra columns along the way.
    let height = df.height();
    let mut selected: Vec<Column> = Vec::with_capacity(ctx.schema.features.len());
    let mut synthesized: HashSet<&str> = HashSet::new();
    for feature in &ctx.schema.features {
        if let Ok(col) = df.column(feature.as_str()) {
            selected.push(col.clone());
            continue;
        }
        if let Some(constant) = ctx.constants.get(feature) {
            warn!(column = %feature, "feature absent from batch, synthesizing from stored constant");
            selected.push(constant_column(feature, constant, height));
            synthesized.insert(feature.as_str());
            outcomes.push(ColumnOutcome::new(feature, ColumnStatus::Synthesized, None));
            continue;
        }
        if let Some(base) = feature.strip_suffix(INDICATOR_SUFFIX) {
            if synthesized.contains(base) {
                // Every row of a synthesized column was originally missing
                selected.push(Column::new(feature.as_str().into(), vec![1i32; height]));
                continue;
            }
            if ctx.constants.contains(base) {
                selected.push(Column::new(feature.as_str().into(), vec![0i32; height]));
                continue;
            }
        }
        return Err(PrepError::UnsupportedInput(format!(
            "required feature '{feature}' is missing from the batch and no stored constant can produce it"
        )));
    }

    Ok((DataFrame::new(selected)?, outcomes))
}

fn constant_column(name: &str, value: &ImputeValue, height: usize) -> Column {
    match value {
        ImputeValue::Integer(v) => Column::new(name.into(), vec![*v as f64; height]),
        ImputeValue::Text(v) => Column::new(name.into(), vec![v.clone(); height]),
    }
}

/// Build a DataFrame from JSON request records. Column order follows first
/// encounter across records; a column whose non-missing values are all
/// numbers becomes Float64, anything else becomes a string column.
pub fn records_to_dataframe(records: &[serde_json::Value]) -> Result<DataFrame> {
    if records.is_empty() {
        return Err(PrepError::UnsupportedInput(
            "request contains no records".to_string(),
        ));
    }

    let mut names: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for record in records {
        let object = record.as_object().ok_or_else(|| {
            PrepError::UnsupportedInput("each record must be a JSON object".to_string())
        })?;
        for key in object.keys() {
            if seen.insert(key.clone()) {
                names.push(key.clone());
            }
        }
    }

    let mut columns: Vec<Column> = Vec::with_capacity(names.len());
    for name in &names {
        let values: Vec<&serde_json::Value> = records
            .iter()
            .map(|r| r.get(name).unwrap_or(&serde_json::Value::Null))
            .collect();

        let all_numeric = values
            .iter()
            .all(|v| v.is_null() || v.is_number());
        if all_numeric {
            let data: Vec<Option<f64>> = values.iter().map(|v| v.as_f64()).collect();
            columns.push(Column::new(name.as_str().into(), data));
        } else {
            let data: Vec<Option<String>> = values
                .iter()
                .map(|v| match v {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect();
            columns.push(Column::new(name.as_str().into(), data));
        }
    }

    Ok(DataFrame::new(columns)?)
}

/// Convert a DataFrame to row-oriented JSON records
pub fn dataframe_to_records(df: &DataFrame) -> Result<Vec<serde_json::Value>> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let mut object = serde_json::Map::with_capacity(names.len());
        for name in &names {
            let col = df.column(name)?;
            object.insert(name.clone(), any_value_to_json(col.get(row)?));
        }
        records.push(serde_json::Value::Object(object));
    }
    Ok(records)
}

/// Extract one column as JSON values, in row order
pub fn column_values(df: &DataFrame, name: &str) -> Result<Vec<serde_json::Value>> {
    let col = df
        .column(name)
        .map_err(|_| PrepError::ColumnNotFound(name.to_string()))?;
    let mut values = Vec::with_capacity(col.len());
    for row in 0..col.len() {
        values.push(any_value_to_json(col.get(row)?));
    }
    Ok(values)
}

fn any_value_to_json(value: AnyValue) -> serde_json::Value {
    use serde_json::json;
    match value {
        AnyValue::Null => serde_json::Value::Null,
        AnyValue::Boolean(v) => json!(v),
        AnyValue::Float64(v) => json!(v),
        AnyValue::Float32(v) => json!(v),
        AnyValue::Int64(v) => json!(v),
        AnyValue::Int32(v) => json!(v),
        AnyValue::Int16(v) => json!(v),
        AnyValue::Int8(v) => json!(v),
        AnyValue::UInt64(v) => json!(v),
        AnyValue::UInt32(v) => json!(v),
        AnyValue::String(v) => json!(v),
        AnyValue::StringOwned(v) => json!(v.to_string()),
        other => json!(other.to_string()),
    }
}
