//! Integration test: serving API endpoints

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use autoprep::artifacts::{ConstantsArtifact, SchemaArtifact, ServingContext};
use autoprep::engine::{ModelEngine, TrainOutcome};
use autoprep::impute::ImputeValue;
use autoprep::server::{create_router, AppState, ServerConfig};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use polars::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use tower::ServiceExt;

const NY_TOKEN: &str = "aabbccddeeff0011";

/// Engine that scores every row with the NY token
struct TokenEngine;

impl ModelEngine for TokenEngine {
    fn train(
        &self,
        _data: &DataFrame,
        _label: &str,
        _id_column: Option<&str>,
        _max_runtime_secs: u64,
    ) -> autoprep::Result<TrainOutcome> {
        Ok(TrainOutcome {
            model_path: "models/leader".to_string(),
            metrics: json!({}),
        })
    }

    fn predict(&self, model_path: &str, batch: &DataFrame) -> autoprep::Result<DataFrame> {
        assert_eq!(model_path, "models/leader");
        Ok(df!("predict" => vec![NY_TOKEN; batch.height()]).unwrap())
    }
}

fn write_artifacts(dir: &Path, version: &str) {
    let mut label_map = HashMap::new();
    label_map.insert("NY".to_string(), NY_TOKEN.to_string());
    let schema = SchemaArtifact {
        model_path: "models/leader".to_string(),
        index: Some("id".to_string()),
        features: vec!["age".to_string(), "age_imputed".to_string()],
        columns: vec!["id".to_string(), "age".to_string(), "city".to_string()],
        label: "city".to_string(),
        label_map,
        version: version.to_string(),
    };
    schema.save(dir).unwrap();

    let mut values = BTreeMap::new();
    values.insert("age".to_string(), ImputeValue::Integer(35));
    ConstantsArtifact::new(version.to_string(), values)
        .save(dir)
        .unwrap();
}

fn test_app(dir: &TempDir) -> axum::Router {
    write_artifacts(dir.path(), "v1");
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        config_dir: dir.path().to_str().unwrap().to_string(),
        prediction_field: "predict".to_string(),
    };
    let context = ServingContext::load(dir.path()).unwrap();
    let state = Arc::new(AppState::new(config, context, Arc::new(TokenEngine)));
    create_router(state)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 64)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_artifact_version() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], "v1");
}

#[tokio::test]
async fn test_validate_decodes_labels_and_round_trips_ids() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let body = json!({
        "data": [
            { "id": 1, "age": 30 },
            { "id": 2, "age": null },
        ]
    });
    let response = app.oneshot(post_json("/validate/", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let predictions = json["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 2);
    // The engine predicted tokens; the response carries decoded labels
    assert_eq!(predictions[0]["predict"], "NY");
    assert_eq!(predictions[1]["predict"], "NY");
    // Id values correlate predictions with input rows
    assert_eq!(predictions[0]["id"], 1.0);
    assert_eq!(predictions[1]["id"], 2.0);
    assert!(json["warnings"].is_array());
}

#[tokio::test]
async fn test_validate_with_unimputable_missing_feature_fails() {
    let dir = TempDir::new().unwrap();
    write_artifacts(dir.path(), "v1");

    // Schema with a feature that has no stored constant
    let mut schema = SchemaArtifact::load(dir.path()).unwrap();
    schema.features.push("score".to_string());
    schema.save(dir.path()).unwrap();

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        config_dir: dir.path().to_str().unwrap().to_string(),
        prediction_field: "predict".to_string(),
    };
    let context = ServingContext::load(dir.path()).unwrap();
    let state = Arc::new(AppState::new(config, context, Arc::new(TokenEngine)));
    let app = create_router(state);

    let body = json!({ "data": [ { "age": 30 } ] });
    let response = app.oneshot(post_json("/validate/", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], true);
}

#[tokio::test]
async fn test_validate_empty_batch_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let body = json!({ "data": [] });
    let response = app.oneshot(post_json("/validate/", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reload_picks_up_a_new_artifact_pair() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    write_artifacts(dir.path(), "v2");
    let response = app
        .clone()
        .oneshot(post_json("/reload", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["reloaded"], true);
    assert_eq!(json["version"], "v2");
}

#[tokio::test]
async fn test_reload_refuses_a_torn_pair() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    // Constants from a different run than the schema
    let mut values = BTreeMap::new();
    values.insert("age".to_string(), ImputeValue::Integer(35));
    ConstantsArtifact::new("other".to_string(), values)
        .save(dir.path())
        .unwrap();

    let response = app.oneshot(post_json("/reload", json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
