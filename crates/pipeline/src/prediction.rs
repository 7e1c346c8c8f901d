//! Request-to-inference pipeline.
//!
//! Engineers features for a listing, aligns them on the training schema,
//! calls the model and undoes the `log1p` target transform.

use std::sync::Arc;

use feature_schema::FeatureSchema;
use model_client::{ModelError, Regressor};
use serde::Serialize;
use tracing::debug;

use crate::align::{align, align_batch, AlignedVector};
use crate::error::{PipelineError, Result};
use crate::features::FeatureEngineer;
use crate::input::RawInput;

/// Model output in log space and the price recovered from it.
///
/// `price == exp(log_price) - 1` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    #[serde(rename = "predicted_log_price")]
    pub log_price: f64,
    #[serde(rename = "predicted_price")]
    pub price: f64,
}

impl PredictionResult {
    /// Invert the training-time `log1p` transform.
    pub fn from_log_price(log_price: f64) -> Result<Self> {
        if !log_price.is_finite() {
            return Err(PipelineError::Inference(ModelError::InvalidResponse(format!(
                "model returned non-finite log price {}",
                log_price
            ))));
        }
        let price = log_price.exp() - 1.0;
        if !price.is_finite() {
            return Err(PipelineError::Inference(ModelError::InvalidResponse(format!(
                "log price {} overflows when exponentiated",
                log_price
            ))));
        }
        Ok(Self { log_price, price })
    }
}

/// Stateless pipeline over an immutable schema and model handle.
///
/// Cloning is cheap; clones share the schema and the model.
#[derive(Clone)]
pub struct PredictionPipeline {
    schema: Arc<FeatureSchema>,
    model: Arc<dyn Regressor>,
    engineer: FeatureEngineer,
}

impl PredictionPipeline {
    pub fn new(schema: Arc<FeatureSchema>, model: Arc<dyn Regressor>) -> Self {
        Self {
            schema,
            model,
            engineer: FeatureEngineer::new(),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Steps 1-3: engineer and align one record without calling the model.
    pub fn prepare(&self, raw: &RawInput) -> Result<AlignedVector> {
        let record = self.engineer.engineer(raw)?;
        Ok(align(&record, &self.schema))
    }

    /// Predict the price of one listing.
    ///
    /// `raw` is expected to have passed `RawInput::validate` already.
    ///
    /// # Errors
    /// * `Domain` if a derived feature is undefined (e.g. zero surface)
    /// * `Inference` if the model call fails or returns a non-finite value
    pub async fn predict(&self, raw: &RawInput) -> Result<PredictionResult> {
        let aligned = self.prepare(raw)?;
        debug!(
            columns = ?self.schema.columns(),
            values = ?aligned.values(),
            "Aligned feature vector"
        );

        let predictions = self
            .model
            .predict(self.schema.columns(), &[aligned.into_values()])
            .await?;

        let log_price = match predictions.as_slice() {
            [single] => *single,
            other => {
                return Err(PipelineError::Inference(ModelError::InvalidResponse(format!(
                    "expected 1 prediction, got {}",
                    other.len()
                ))));
            }
        };

        PredictionResult::from_log_price(log_price)
    }

    /// Predict many listings with a single model call.
    ///
    /// Feature engineering runs in parallel; results follow input order.
    pub async fn predict_batch(&self, raws: &[RawInput]) -> Result<Vec<PredictionResult>> {
        if raws.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<Vec<f64>> = align_batch(&self.engineer, raws, &self.schema)?
            .into_iter()
            .map(AlignedVector::into_values)
            .collect();
        debug!("Aligned {} rows for batch prediction", rows.len());

        let predictions = self.model.predict(self.schema.columns(), &rows).await?;
        if predictions.len() != rows.len() {
            return Err(PipelineError::Inference(ModelError::InvalidResponse(format!(
                "expected {} predictions, got {}",
                rows.len(),
                predictions.len()
            ))));
        }

        predictions
            .into_iter()
            .map(PredictionResult::from_log_price)
            .collect()
    }
}
