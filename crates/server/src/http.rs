//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use pipeline::{PipelineError, PredictionResult, RawInput, ValidationError};

use crate::AppState;

/// Errors surfaced to HTTP clients
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Body could not be decoded into the expected shape
    #[error("{0}")]
    Body(#[from] JsonRejection),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Per-record validation failures of a batch request
    #[error("{} invalid records", .0.len())]
    BatchValidation(Vec<(usize, ValidationError)>),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Reload failed: {0:#}")]
    Reload(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Body(rejection) => {
                // Unreadable bodies are reported like any other invalid input
                debug!("Rejected body ({}): {}", rejection.status(), rejection.body_text());
                let detail = json!([{ "field": "body", "message": rejection.body_text() }]);
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::Validation(err) => {
                let detail: Vec<_> = err
                    .violations
                    .iter()
                    .map(|v| json!({ "field": v.field, "message": v.message }))
                    .collect();
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::BatchValidation(errors) => {
                let detail: Vec<_> = errors
                    .iter()
                    .flat_map(|(record, err)| {
                        err.violations.iter().map(move |v| {
                            json!({ "record": record, "field": v.field, "message": v.message })
                        })
                    })
                    .collect();
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::Pipeline(PipelineError::NotReady) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": PipelineError::NotReady.to_string() })),
            )
                .into_response(),
            ApiError::Pipeline(err) => {
                error!("Prediction failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": err.to_string() })),
                )
                    .into_response()
            }
            ApiError::Reload(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("{:#}", err) })),
            )
                .into_response(),
        }
    }
}

/// Liveness probe. Static, no computation.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness response once a bundle is loaded
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub model: String,
    pub stage: String,
    pub version: String,
    pub features: usize,
}

/// Readiness probe: 503 until the model and feature schema are loaded
pub async fn ready(State(state): State<Arc<AppState>>) -> Result<Json<ReadyResponse>, ApiError> {
    let bundle = state.predictor.bundle().await?;
    Ok(Json(ReadyResponse {
        status: "ready",
        model: bundle.model_name.clone(),
        stage: bundle.stage.clone(),
        version: bundle.version.version.clone(),
        features: bundle.schema().len(),
    }))
}

/// Predict the price of one listing
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RawInput>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(raw) = payload?;
    if let Err(e) = raw.validate() {
        debug!("Rejected input: {}", e);
        return Err(e.into());
    }

    let result = state.predictor.predict(&raw).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub records: Vec<RawInput>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub predictions: Vec<PredictionResult>,
}

/// Predict many listings. Any invalid record rejects the whole batch.
pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Json(request) = payload?;

    let invalid: Vec<(usize, ValidationError)> = request
        .records
        .iter()
        .enumerate()
        .filter_map(|(idx, raw)| raw.validate().err().map(|e| (idx, e)))
        .collect();
    if !invalid.is_empty() {
        debug!("Rejected batch: {} of {} records invalid", invalid.len(), request.records.len());
        return Err(ApiError::BatchValidation(invalid));
    }

    let predictions = state.predictor.predict_batch(&request.records).await?;
    Ok(Json(BatchResponse { predictions }))
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub model: String,
    pub version: String,
    pub columns: Vec<String>,
}

/// Feature columns of the bundle currently serving
pub async fn schema(State(state): State<Arc<AppState>>) -> Result<Json<SchemaResponse>, ApiError> {
    let bundle = state.predictor.bundle().await?;
    Ok(Json(SchemaResponse {
        model: bundle.model_name.clone(),
        version: bundle.version.version.clone(),
        columns: bundle.schema().columns().to_vec(),
    }))
}

/// Re-resolve model and schema from the registry and swap them in
pub async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    info!("Reload requested");
    let bundle = state.predictor.reload().await.map_err(|e| {
        warn!("Keeping previous bundle");
        ApiError::Reload(e)
    })?;

    Ok(Json(json!({
        "status": "reloaded",
        "model": bundle.model_name,
        "version": bundle.version.version,
        "features": bundle.schema().len(),
    })))
}
