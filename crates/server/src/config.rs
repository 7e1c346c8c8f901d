//! Server configuration.

use std::env;
use std::path::PathBuf;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_MODEL_NAME: &str = "HousePriceModel";
pub const DEFAULT_MODEL_STAGE: &str = "Production";
pub const DEFAULT_FEATURE_ARTIFACT_PATH: &str = "model_artifacts/best_model_features.pkl";
pub const DEFAULT_REGISTRY_PATH: &str = "mlruns/registry.json";
pub const DEFAULT_ARTIFACT_ROOT: &str = "mlruns";

/// Where to listen and which model to serve
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// JSON manifest of registered model versions
    pub registry_path: PathBuf,
    /// Root of the run artifact tree (`<root>/<run_id>/artifacts/...`)
    pub artifact_root: PathBuf,
    pub model_name: String,
    pub stage: String,
    /// Path of the feature-column artifact inside the model's run
    pub feature_artifact_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            registry_path: PathBuf::from(DEFAULT_REGISTRY_PATH),
            artifact_root: PathBuf::from(DEFAULT_ARTIFACT_ROOT),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            stage: DEFAULT_MODEL_STAGE.to_string(),
            feature_artifact_path: DEFAULT_FEATURE_ARTIFACT_PATH.to_string(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `HOUSE_PRICE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: lookup("HOUSE_PRICE_ADDR").unwrap_or(defaults.listen_addr),
            registry_path: lookup("HOUSE_PRICE_REGISTRY")
                .map(PathBuf::from)
                .unwrap_or(defaults.registry_path),
            artifact_root: lookup("HOUSE_PRICE_ARTIFACT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_root),
            model_name: lookup("HOUSE_PRICE_MODEL").unwrap_or(defaults.model_name),
            stage: lookup("HOUSE_PRICE_STAGE").unwrap_or(defaults.stage),
            feature_artifact_path: lookup("HOUSE_PRICE_FEATURE_ARTIFACT")
                .unwrap_or(defaults.feature_artifact_path),
        }
    }
}
