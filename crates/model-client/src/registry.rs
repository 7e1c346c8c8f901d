//! Model registry: resolve a named model and deployment stage to a
//! callable model handle.
//!
//! `FileRegistry` reads a JSON manifest on every lookup, so promoting a new
//! version is an edit to the manifest followed by a reload of the server.
//!
//! ```json
//! {
//!   "models": {
//!     "HousePriceModel": {
//!       "Production": {
//!         "version": "4",
//!         "run_id": "8f2c1e",
//!         "flavor": { "kind": "grpc", "endpoint": "http://localhost:50051" }
//!       },
//!       "Staging": {
//!         "version": "5",
//!         "run_id": "a91d07",
//!         "flavor": { "kind": "linear", "artifact_path": "model/coefficients.json" }
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifacts::ArtifactStore;
use crate::error::{ModelError, Result};
use crate::grpc::GrpcRegressor;
use crate::linear::LinearRegressor;
use crate::Regressor;

/// How a registered model version is served
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelFlavor {
    /// Remote scoring service
    Grpc { endpoint: String },
    /// Coefficients artifact logged under the version's run
    Linear { artifact_path: String },
}

/// A registered model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub version: String,
    pub run_id: String,
    pub flavor: ModelFlavor,
}

/// A model version together with its callable handle
#[derive(Clone)]
pub struct LoadedModel {
    pub version: ModelVersion,
    pub regressor: Arc<dyn Regressor>,
}

/// Lookup from `(name, stage)` to registered model versions.
#[tonic::async_trait]
pub trait ModelRegistry: Send + Sync {
    /// The version currently assigned to `stage`.
    async fn latest_version(&self, name: &str, stage: &str) -> Result<ModelVersion>;

    /// Resolve the version for `stage` and build a callable handle for it.
    async fn load_model(&self, name: &str, stage: &str) -> Result<LoadedModel>;
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    models: HashMap<String, HashMap<String, ModelVersion>>,
}

/// Registry backed by a JSON manifest file.
pub struct FileRegistry {
    manifest_path: PathBuf,
    store: Arc<dyn ArtifactStore>,
}

impl FileRegistry {
    /// # Arguments
    /// * `manifest_path` - JSON manifest describing registered versions
    /// * `store` - where `linear` flavors fetch their coefficients from
    pub fn new(manifest_path: impl Into<PathBuf>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            store,
        }
    }

    async fn read_manifest(&self) -> Result<Manifest> {
        let bytes = tokio::fs::read(&self.manifest_path).await.map_err(|e| {
            ModelError::Registry(format!(
                "cannot read manifest {}: {}",
                self.manifest_path.display(),
                e
            ))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ModelError::Registry(format!(
                "invalid manifest {}: {}",
                self.manifest_path.display(),
                e
            ))
        })
    }
}

#[tonic::async_trait]
impl ModelRegistry for FileRegistry {
    async fn latest_version(&self, name: &str, stage: &str) -> Result<ModelVersion> {
        let mut manifest = self.read_manifest().await?;
        manifest
            .models
            .get_mut(name)
            .and_then(|stages| stages.remove(stage))
            .ok_or_else(|| ModelError::ModelNotFound {
                name: name.to_string(),
                stage: stage.to_string(),
            })
    }

    async fn load_model(&self, name: &str, stage: &str) -> Result<LoadedModel> {
        let version = self.latest_version(name, stage).await?;
        info!(
            "Resolved {}/{} to version {} (run {})",
            name, stage, version.version, version.run_id
        );

        let regressor: Arc<dyn Regressor> = match &version.flavor {
            ModelFlavor::Grpc { endpoint } => {
                Arc::new(GrpcRegressor::connect(endpoint.clone(), name, version.version.clone()).await?)
            }
            ModelFlavor::Linear { artifact_path } => {
                let bytes = self.store.download(&version.run_id, artifact_path).await?;
                Arc::new(LinearRegressor::from_artifact(name, &bytes)?)
            }
        };

        Ok(LoadedModel { version, regressor })
    }
}
