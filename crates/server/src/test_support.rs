//! On-disk registry fixture shared by the server tests.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use model_client::{
    FileRegistry, FsArtifactStore, LoadedModel, ModelFlavor, ModelRegistry, ModelVersion, Regressor,
};
use tempfile::TempDir;
use tokio::sync::Notify;

use crate::predictor::{ModelSource, Predictor};

pub const INTERCEPT: f64 = 10.0;
pub const COEFFICIENTS: [(&str, f64); 6] = [
    ("surface", 0.005),
    ("rooms", 0.05),
    ("rooms_per_surface", -2.0),
    ("surface_squared", 0.000001),
    ("governorate_Tunis", 0.4),
    ("property_type_Apartment", -0.1),
];

const FEATURES_PATH: &str = "model_artifacts/best_model_features.pkl";

const MANIFEST_V1: &str = r#"{
    "models": {
        "HousePriceModel": {
            "Production": {
                "version": "1",
                "run_id": "run-1",
                "flavor": { "kind": "linear", "artifact_path": "model/coefficients.json" }
            }
        }
    }
}"#;

const MANIFEST_V2: &str = r#"{
    "models": {
        "HousePriceModel": {
            "Production": {
                "version": "2",
                "run_id": "run-2",
                "flavor": { "kind": "linear", "artifact_path": "model/coefficients.json" }
            }
        }
    }
}"#;

/// Temp directory holding a registry manifest and two training runs
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let fixture = Self { dir };

        let coefficients: serde_json::Map<String, serde_json::Value> = COEFFICIENTS
            .iter()
            .map(|(column, c)| (column.to_string(), serde_json::json!(c)))
            .collect();
        let model = serde_json::json!({ "intercept": INTERCEPT, "coefficients": coefficients });

        // The training job stored the column list as its textual repr
        fixture.write_run(
            "run-1",
            br#""['surface', 'rooms', 'rooms_per_surface', 'surface_squared', 'governorate_Tunis', 'property_type_Apartment']""#,
            model.to_string().as_bytes(),
        );
        fixture.write_run(
            "run-2",
            b"['surface', 'rooms', 'governorate_Sfax', 'property_type_Villa']",
            br#"{"intercept": 11.0, "coefficients": {"surface": 0.002}}"#,
        );
        fs::write(fixture.manifest_path(), MANIFEST_V1).expect("write manifest");
        fixture
    }

    fn write_run(&self, run_id: &str, features: &[u8], model: &[u8]) {
        let artifacts = self.runs_root().join(run_id).join("artifacts");
        let features_path = artifacts.join(FEATURES_PATH);
        let model_path = artifacts.join("model/coefficients.json");
        for path in [&features_path, &model_path] {
            fs::create_dir_all(path.parent().expect("artifact parent")).expect("create run dir");
        }
        fs::write(features_path, features).expect("write features");
        fs::write(model_path, model).expect("write model");
    }

    fn runs_root(&self) -> std::path::PathBuf {
        self.dir.path().join("runs")
    }

    fn manifest_path(&self) -> std::path::PathBuf {
        self.dir.path().join("registry.json")
    }

    pub fn source(&self) -> ModelSource {
        let store = Arc::new(FsArtifactStore::new(self.runs_root()));
        ModelSource {
            registry: Arc::new(FileRegistry::new(self.manifest_path(), store.clone())),
            store,
            model_name: "HousePriceModel".to_string(),
            stage: "Production".to_string(),
            feature_artifact_path: FEATURES_PATH.to_string(),
        }
    }

    pub fn predictor(&self) -> Predictor {
        Predictor::new(self.source())
    }

    /// Same artifact tree, but models resolve through `registry`
    pub fn predictor_with(&self, registry: Arc<dyn ModelRegistry>) -> Predictor {
        Predictor::new(ModelSource {
            registry,
            ..self.source()
        })
    }

    /// Point `Production` at run-2
    pub fn promote_version_two(&self) {
        fs::write(self.manifest_path(), MANIFEST_V2).expect("write manifest");
    }

    pub fn break_manifest(&self) {
        fs::write(self.manifest_path(), b"{ not json").expect("write manifest");
    }

    /// Same arithmetic, in schema order, as the version-1 linear model
    pub fn expected_log_price(&self, surface: f64, rooms: u32, tunis: bool, apartment: bool) -> f64 {
        let rooms = f64::from(rooms);
        let values = [
            surface,
            rooms,
            rooms / surface,
            surface * surface,
            if tunis { 1.0 } else { 0.0 },
            if apartment { 1.0 } else { 0.0 },
        ];
        COEFFICIENTS
            .iter()
            .zip(values)
            .fold(INTERCEPT, |acc, ((_, c), value)| acc + c * value)
    }
}

/// Regressor double that counts how often it is called
#[derive(Default)]
pub struct CountingRegressor {
    calls: AtomicUsize,
}

impl CountingRegressor {
    pub const LOG_PRICE: f64 = 12.0;

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[tonic::async_trait]
impl Regressor for CountingRegressor {
    fn name(&self) -> &str {
        "CountingRegressor"
    }

    async fn predict(&self, _columns: &[String], rows: &[Vec<f64>]) -> model_client::Result<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Self::LOG_PRICE; rows.len()])
    }
}

fn version_entry(version: &str, run_id: &str) -> ModelVersion {
    ModelVersion {
        version: version.to_string(),
        run_id: run_id.to_string(),
        flavor: ModelFlavor::Linear {
            artifact_path: "model/coefficients.json".to_string(),
        },
    }
}

/// Registry double serving version 1 (run-1) through a shared regressor
pub struct StaticRegistry {
    pub regressor: Arc<CountingRegressor>,
}

#[tonic::async_trait]
impl ModelRegistry for StaticRegistry {
    async fn latest_version(&self, _name: &str, _stage: &str) -> model_client::Result<ModelVersion> {
        Ok(version_entry("1", "run-1"))
    }

    async fn load_model(&self, name: &str, stage: &str) -> model_client::Result<LoadedModel> {
        Ok(LoadedModel {
            version: self.latest_version(name, stage).await?,
            regressor: self.regressor.clone(),
        })
    }
}

/// Registry double whose first lookup sees version 1 and parks until
/// `release` is notified; every later lookup sees version 2.
#[derive(Default)]
pub struct GatedRegistry {
    lookups: AtomicUsize,
    pub entered: Notify,
    pub release: Notify,
}

#[tonic::async_trait]
impl ModelRegistry for GatedRegistry {
    async fn latest_version(&self, _name: &str, _stage: &str) -> model_client::Result<ModelVersion> {
        if self.lookups.fetch_add(1, Ordering::SeqCst) == 0 {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(version_entry("1", "run-1"))
        } else {
            Ok(version_entry("2", "run-2"))
        }
    }

    async fn load_model(&self, name: &str, stage: &str) -> model_client::Result<LoadedModel> {
        Ok(LoadedModel {
            version: self.latest_version(name, stage).await?,
            regressor: Arc::new(CountingRegressor::default()),
        })
    }
}
