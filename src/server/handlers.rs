//! HTTP request handlers

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde_json::{json, Value};
use tracing::debug;

use crate::preprocessing::diagnosis;

use super::error::{Result, ServerError};
use super::state::AppState;

pub const ROOT_MESSAGE: &str = "API para predecir riesgo de presentar Diabetes";

pub async fn root() -> Json<Value> {
    Json(json!({ "message": ROOT_MESSAGE }))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.predictor.model_name(),
        "uptime_secs": state.uptime_secs(),
    }))
}

/// Score one record. The body is parsed here rather than by the `Json`
/// extractor so that malformed JSON maps to 400 and missing fields to 422.
pub async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>> {
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid JSON: {}", e)))?;
    let record = payload
        .as_object()
        .ok_or_else(|| ServerError::BadRequest("Expected a JSON object".to_string()))?;

    let prediction = state.predictor.predict_record(record)?;
    let result = diagnosis(prediction);
    debug!(prediction, result, "Prediction served");

    Ok(Json(json!({ "result": result })))
}
