//! # Predictor
//!
//! Owns the serving bundle (feature schema + model handle) and routes
//! requests through the prediction pipeline:
//! 1. Resolve the model for `(name, stage)` in the registry
//! 2. Download and decode the feature-column artifact of that run
//! 3. Swap the new bundle in atomically
//! 4. Serve predictions from whichever bundle is current
//!
//! Requests clone the current `Arc<ServingBundle>` and never observe a
//! partially loaded bundle. A failed reload keeps the previous one.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use feature_schema::FeatureSchema;
use model_client::{ArtifactStore, ModelRegistry, ModelVersion};
use pipeline::{PipelineError, PredictionPipeline, PredictionResult, RawInput};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Where a serving bundle comes from
#[derive(Clone)]
pub struct ModelSource {
    pub registry: Arc<dyn ModelRegistry>,
    pub store: Arc<dyn ArtifactStore>,
    pub model_name: String,
    pub stage: String,
    pub feature_artifact_path: String,
}

/// Immutable schema + model pair, loaded once and shared by all requests
pub struct ServingBundle {
    pub model_name: String,
    pub stage: String,
    pub version: ModelVersion,
    pub pipeline: PredictionPipeline,
}

impl ServingBundle {
    pub fn schema(&self) -> &FeatureSchema {
        self.pipeline.schema()
    }
}

impl std::fmt::Debug for ServingBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServingBundle")
            .field("model_name", &self.model_name)
            .field("stage", &self.stage)
            .field("version", &self.version)
            .field("features", &self.schema().len())
            .finish_non_exhaustive()
    }
}

/// Loads, swaps and serves the current bundle
pub struct Predictor {
    source: ModelSource,
    current: RwLock<Option<Arc<ServingBundle>>>,
    // Held from the registry read to the swap so reloads apply in order
    reload_lock: Mutex<()>,
}

impl Predictor {
    /// Create a predictor with nothing loaded yet.
    ///
    /// Predictions fail with `PipelineError::NotReady` until `reload`
    /// succeeds.
    pub fn new(source: ModelSource) -> Self {
        Self {
            source,
            current: RwLock::new(None),
            reload_lock: Mutex::new(()),
        }
    }

    /// The bundle currently serving traffic
    pub async fn bundle(&self) -> Result<Arc<ServingBundle>, PipelineError> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(PipelineError::NotReady)
    }

    pub async fn is_ready(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Resolve the model and schema again and swap them in.
    ///
    /// On failure the previously loaded bundle stays in place. Concurrent
    /// reloads run one after the other.
    pub async fn reload(&self) -> Result<Arc<ServingBundle>> {
        let _reloading = self.reload_lock.lock().await;
        let start_time = Instant::now();
        let bundle = match load_bundle(&self.source).await {
            Ok(bundle) => Arc::new(bundle),
            Err(e) => {
                warn!("Reload of {}/{} failed: {:#}", self.source.model_name, self.source.stage, e);
                return Err(e);
            }
        };

        let previous = self.current.write().await.replace(bundle.clone());
        info!(
            "Serving {}/{} version {} with {} features (previous: {}) in {:.2?}",
            bundle.model_name,
            bundle.stage,
            bundle.version.version,
            bundle.schema().len(),
            previous
                .map(|p| p.version.version.clone())
                .unwrap_or_else(|| "none".to_string()),
            start_time.elapsed()
        );
        Ok(bundle)
    }

    /// Predict one validated listing with the current bundle.
    pub async fn predict(&self, raw: &RawInput) -> Result<PredictionResult, PipelineError> {
        let bundle = self.bundle().await?;
        let start_time = Instant::now();
        let result = bundle.pipeline.predict(raw).await?;
        debug!(
            "{} predicted log_price={:.4} price={:.2} in {:.2?}",
            bundle.pipeline.model_name(),
            result.log_price,
            result.price,
            start_time.elapsed()
        );
        Ok(result)
    }

    /// Predict many validated listings with a single model call.
    pub async fn predict_batch(
        &self,
        raws: &[RawInput],
    ) -> Result<Vec<PredictionResult>, PipelineError> {
        let bundle = self.bundle().await?;
        let start_time = Instant::now();
        let results = bundle.pipeline.predict_batch(raws).await?;
        info!(
            "Predicted batch of {} listings in {:.2?}",
            results.len(),
            start_time.elapsed()
        );
        Ok(results)
    }
}

/// Resolve the model version, then fetch the feature schema logged by the
/// same run, so the two always come from one training job.
pub async fn load_bundle(source: &ModelSource) -> Result<ServingBundle> {
    let loaded = source
        .registry
        .load_model(&source.model_name, &source.stage)
        .await
        .with_context(|| format!("Loading model {}/{}", source.model_name, source.stage))?;

    let bytes = source
        .store
        .download(&loaded.version.run_id, &source.feature_artifact_path)
        .await
        .with_context(|| {
            format!(
                "Downloading {} for run {}",
                source.feature_artifact_path, loaded.version.run_id
            )
        })?;

    let schema = FeatureSchema::from_artifact(&bytes)
        .with_context(|| format!("Decoding {}", source.feature_artifact_path))?;
    info!(
        "Loaded feature schema with {} columns for run {}",
        schema.len(),
        loaded.version.run_id
    );

    Ok(ServingBundle {
        model_name: source.model_name.clone(),
        stage: source.stage.clone(),
        version: loaded.version,
        pipeline: PredictionPipeline::new(Arc::new(schema), loaded.regressor),
    })
}
