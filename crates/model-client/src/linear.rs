//! Local linear model read from a coefficients artifact.
//!
//! Artifact format (JSON):
//! ```json
//! { "intercept": 10.2, "coefficients": { "surface": 0.004, "governorate_Tunis": 0.31 } }
//! ```
//! Columns without a coefficient contribute nothing.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::{check_row_shapes, Regressor};

#[derive(Debug, Clone, Deserialize)]
struct LinearArtifact {
    intercept: f64,
    #[serde(default)]
    coefficients: HashMap<String, f64>,
}

/// `intercept + Σ coefficient[column] * value[column]`
#[derive(Debug, Clone)]
pub struct LinearRegressor {
    name: String,
    intercept: f64,
    coefficients: HashMap<String, f64>,
}

impl LinearRegressor {
    pub fn new(
        name: impl Into<String>,
        intercept: f64,
        coefficients: HashMap<String, f64>,
    ) -> Self {
        Self {
            name: name.into(),
            intercept,
            coefficients,
        }
    }

    /// Decode a JSON coefficients artifact.
    pub fn from_artifact(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let artifact: LinearArtifact = serde_json::from_slice(bytes)
            .map_err(|e| ModelError::InvalidArtifact(format!("linear model: {}", e)))?;

        if !artifact.intercept.is_finite() {
            return Err(ModelError::InvalidArtifact(
                "linear model: intercept is not finite".to_string(),
            ));
        }
        if let Some((column, _)) = artifact.coefficients.iter().find(|(_, c)| !c.is_finite()) {
            return Err(ModelError::InvalidArtifact(format!(
                "linear model: coefficient for {} is not finite",
                column
            )));
        }

        let name = name.into();
        debug!(
            "Loaded linear model {} with {} coefficients",
            name,
            artifact.coefficients.len()
        );
        Ok(Self::new(name, artifact.intercept, artifact.coefficients))
    }

    fn score_row(&self, columns: &[String], values: &[f64]) -> f64 {
        columns
            .iter()
            .zip(values)
            .fold(self.intercept, |acc, (column, value)| {
                acc + self.coefficients.get(column).copied().unwrap_or(0.0) * value
            })
    }
}

#[tonic::async_trait]
impl Regressor for LinearRegressor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn predict(&self, columns: &[String], rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        check_row_shapes(columns, rows)?;
        Ok(rows
            .iter()
            .map(|values| self.score_row(columns, values))
            .collect())
    }
}
