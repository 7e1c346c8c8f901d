//! Server crate for the house price predictor.
//!
//! This crate contains the predictor that owns the serving bundle and the
//! HTTP boundary that validates requests before they reach the pipeline.

pub mod config;
pub mod http;
pub mod predictor;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use model_client::{FileRegistry, FsArtifactStore};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::ServerConfig;
pub use predictor::{ModelSource, Predictor, ServingBundle};

/// Shared application state
pub struct AppState {
    pub predictor: Predictor,
}

impl AppState {
    pub fn new(predictor: Predictor) -> Self {
        Self { predictor }
    }

    /// State backed by the file registry and artifact store in `config`.
    ///
    /// Nothing is loaded yet; call `predictor.reload()` to load the bundle.
    pub fn from_config(config: &ServerConfig) -> Self {
        let store = Arc::new(FsArtifactStore::new(config.artifact_root.clone()));
        let registry = Arc::new(FileRegistry::new(config.registry_path.clone(), store.clone()));

        Self::new(Predictor::new(ModelSource {
            registry,
            store,
            model_name: config.model_name.clone(),
            stage: config.stage.clone(),
            feature_artifact_path: config.feature_artifact_path.clone(),
        }))
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::health))
        .route("/ready", get(http::ready))
        .route("/predict", post(http::predict))
        .route("/predict/batch", post(http::predict_batch))
        .route("/schema", get(http::schema))
        .route("/admin/reload", post(http::reload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start serving on `config.listen_addr`.
///
/// The listener comes up immediately so liveness checks pass; the bundle is
/// loaded in the background and `/ready` reports 503 until it is in place.
pub async fn serve(config: &ServerConfig) -> Result<()> {
    let state = Arc::new(AppState::from_config(config));

    let loader = state.clone();
    tokio::spawn(async move {
        if let Err(e) = loader.predictor.reload().await {
            warn!("Initial model load failed, serving 503 until reloaded: {:#}", e);
        }
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Binding {}", config.listen_addr))?;
    info!("House price server listening on {}", config.listen_addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CountingRegressor, Fixture, GatedRegistry, StaticRegistry};
    use std::time::Duration;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("request failed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn loaded_app(fixture: &Fixture) -> Router {
        let state = Arc::new(AppState::new(fixture.predictor()));
        state.predictor.reload().await.expect("initial load");
        create_router(state)
    }

    #[tokio::test]
    async fn test_health_is_static() {
        let fixture = Fixture::new();
        // Nothing loaded: liveness still passes
        let app = create_router(Arc::new(AppState::new(fixture.predictor())));

        let (status, body) = send(app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_ready_flips_after_load() {
        let fixture = Fixture::new();
        let state = Arc::new(AppState::new(fixture.predictor()));

        let (status, _) = send(create_router(state.clone()), get("/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = send(
            create_router(state.clone()),
            post_json("/predict", json!({"surface": 120, "rooms": 3, "governorate": "Tunis", "property_type": "Apartment"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        state.predictor.reload().await.unwrap();
        let (status, body) = send(create_router(state), get("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["version"], "1");
        assert_eq!(body["features"], 6);
    }

    #[tokio::test]
    async fn test_predict_returns_both_prices() {
        let fixture = Fixture::new();
        let app = loaded_app(&fixture).await;

        let (status, body) = send(
            app,
            post_json("/predict", json!({"surface": 120, "rooms": 3, "governorate": "Tunis", "property_type": "Apartment"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let log_price = body["predicted_log_price"].as_f64().unwrap();
        let price = body["predicted_price"].as_f64().unwrap();
        assert_eq!(log_price, fixture.expected_log_price(120.0, 3, true, true));
        assert_eq!(price, log_price.exp() - 1.0);
    }

    #[tokio::test]
    async fn test_unseen_category_is_served() {
        let fixture = Fixture::new();
        let app = loaded_app(&fixture).await;

        let (status, body) = send(
            app,
            post_json("/predict", json!({"surface": 120, "rooms": 3, "governorate": "Gotham", "property_type": "Apartment"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["predicted_log_price"].as_f64().unwrap(),
            fixture.expected_log_price(120.0, 3, false, true)
        );
    }

    #[tokio::test]
    async fn test_out_of_bounds_is_422() {
        let fixture = Fixture::new();
        let app = loaded_app(&fixture).await;

        let (status, body) = send(
            app,
            post_json("/predict", json!({"surface": 5, "rooms": 3, "governorate": "Tunis", "property_type": "Apartment"})),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"][0]["field"], "surface");
    }

    #[tokio::test]
    async fn test_model_is_only_called_for_valid_input() {
        let fixture = Fixture::new();
        let regressor = Arc::new(CountingRegressor::default());
        let registry = Arc::new(StaticRegistry {
            regressor: regressor.clone(),
        });
        let state = Arc::new(AppState::new(fixture.predictor_with(registry)));
        state.predictor.reload().await.unwrap();

        let (status, _) = send(
            create_router(state.clone()),
            post_json("/predict", json!({"surface": 5, "rooms": 3, "governorate": "Tunis", "property_type": "Apartment"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(regressor.calls(), 0);

        let (status, body) = send(
            create_router(state),
            post_json("/predict", json!({"surface": 120, "rooms": 3, "governorate": "Tunis", "property_type": "Apartment"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(regressor.calls(), 1);
        assert_eq!(body["predicted_log_price"], CountingRegressor::LOG_PRICE);
    }

    #[tokio::test]
    async fn test_unreadable_body_is_422() {
        let fixture = Fixture::new();
        let state = Arc::new(AppState::new(fixture.predictor()));
        state.predictor.reload().await.unwrap();

        let broken = Request::post("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"surface\": 120,"))
            .unwrap();
        let (status, body) = send(create_router(state.clone()), broken).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"][0]["field"], "body");

        let untyped = Request::post("/predict")
            .body(Body::from(
                json!({"surface": 120, "rooms": 3, "governorate": "Tunis", "property_type": "Apartment"}).to_string(),
            ))
            .unwrap();
        let (status, _) = send(create_router(state), untyped).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_missing_field_is_422() {
        let fixture = Fixture::new();
        let app = loaded_app(&fixture).await;

        let (status, body) = send(
            app,
            post_json("/predict", json!({"surface": 120, "rooms": 3, "governorate": "Tunis"})),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_array());
    }

    #[tokio::test]
    async fn test_batch_predictions_follow_input_order() {
        let fixture = Fixture::new();
        let app = loaded_app(&fixture).await;

        let (status, body) = send(
            app,
            post_json(
                "/predict/batch",
                json!({ "records": [
                    {"surface": 120, "rooms": 3, "governorate": "Tunis", "property_type": "Apartment"},
                    {"surface": 300, "rooms": 6, "governorate": "Sfax", "property_type": "Villa"}
                ]}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let predictions = body["predictions"].as_array().unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(
            predictions[0]["predicted_log_price"].as_f64().unwrap(),
            fixture.expected_log_price(120.0, 3, true, true)
        );
        assert_eq!(
            predictions[1]["predicted_log_price"].as_f64().unwrap(),
            fixture.expected_log_price(300.0, 6, false, false)
        );
    }

    #[tokio::test]
    async fn test_batch_with_invalid_record_is_rejected_whole() {
        let fixture = Fixture::new();
        let app = loaded_app(&fixture).await;

        let (status, body) = send(
            app,
            post_json(
                "/predict/batch",
                json!({ "records": [
                    {"surface": 120, "rooms": 3, "governorate": "Tunis", "property_type": "Apartment"},
                    {"surface": 120, "rooms": 25, "governorate": "Tunis", "property_type": "Apartment"}
                ]}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"][0]["record"], 1);
        assert_eq!(body["detail"][0]["field"], "rooms");
    }

    #[tokio::test]
    async fn test_schema_and_reload() {
        let fixture = Fixture::new();
        let state = Arc::new(AppState::new(fixture.predictor()));
        state.predictor.reload().await.unwrap();

        let (status, body) = send(create_router(state.clone()), get("/schema")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["columns"][4], "governorate_Tunis");

        fixture.promote_version_two();
        let (status, body) = send(create_router(state.clone()), post_json("/admin/reload", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], "2");

        let (_, body) = send(create_router(state), get("/schema")).await;
        assert_eq!(
            body["columns"],
            json!(["surface", "rooms", "governorate_Sfax", "property_type_Villa"])
        );
    }

    #[tokio::test]
    async fn test_failed_reload_is_500_and_keeps_serving() {
        let fixture = Fixture::new();
        let state = Arc::new(AppState::new(fixture.predictor()));
        state.predictor.reload().await.unwrap();

        fixture.break_manifest();
        let (status, body) = send(create_router(state.clone()), post_json("/admin/reload", json!({}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("manifest"));

        let (status, body) = send(create_router(state), get("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], "1");
    }

    #[tokio::test]
    async fn test_overlapping_reloads_apply_in_order() {
        let fixture = Fixture::new();
        let registry = Arc::new(GatedRegistry::default());
        let predictor = Arc::new(fixture.predictor_with(registry.clone()));

        // First reload reads version 1 and parks inside the registry
        let first = tokio::spawn({
            let predictor = predictor.clone();
            async move { predictor.reload().await }
        });
        registry.entered.notified().await;

        // Second reload starts later, so its version 2 must win
        let second = tokio::spawn({
            let predictor = predictor.clone();
            async move { predictor.reload().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        registry.release.notify_one();

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let bundle = predictor.bundle().await.unwrap();
        assert_eq!(bundle.version.version, "2");
        assert_eq!(bundle.schema().len(), 4);
    }
}
