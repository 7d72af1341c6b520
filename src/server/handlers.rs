//! HTTP request handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::labels::PredictionDecoder;
use crate::serving;

use super::error::Result;
use super::state::AppState;

#[derive(Deserialize)]
pub struct ValidateRequest {
    pub data: Vec<serde_json::Value>,
}

/// Score a batch of records against the configured model.
///
/// The batch is imputed and aligned with the stored artifacts, scored by
/// the engine, and predicted label tokens are decoded back to their raw
/// values. Per-column preprocessing outcomes come back as warnings.
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<serde_json::Value>> {
    let ctx = state.context().await;
    let df = serving::records_to_dataframe(&request.data)?;
    info!(rows = df.height(), columns = df.width(), "validation batch received");

    // Round-trip id values so callers can correlate predictions with rows
    let ids = match ctx.schema.index.as_deref() {
        Some(index) if df.column(index).is_ok() => {
            Some((index.to_string(), serving::column_values(&df, index)?))
        }
        _ => None,
    };

    let (aligned, warnings) = serving::apply(&df, &ctx)?;
    let predictions = state.engine.predict(&ctx.schema.model_path, &aligned)?;
    let mut records = serving::dataframe_to_records(&predictions)?;

    if !ctx.label_map.is_empty() {
        PredictionDecoder::new(&ctx.label_map, state.config.prediction_field.as_str())
            .decode(&mut records);
    }

    if let Some((index, values)) = ids {
        for (record, value) in records.iter_mut().zip(values) {
            if let Some(object) = record.as_object_mut() {
                object.insert(index.clone(), value);
            }
        }
    }

    Ok(Json(json!({
        "predictions": records,
        "warnings": warnings,
    })))
}

/// Health check
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let ctx = state.context().await;
    Json(json!({
        "status": "ok",
        "version": ctx.version(),
    }))
}

/// Explicitly reload the artifact pair from disk
pub async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let version = state.reload().await?;
    info!(version = %version, "serving context reloaded");
    Ok(Json(json!({
        "reloaded": true,
        "version": version,
    })))
}
