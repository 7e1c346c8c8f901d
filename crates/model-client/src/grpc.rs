//! Client for a remote scoring service over gRPC.
//!
//! Sends aligned feature rows to `pricing.PriceScorer/Predict` and checks
//! that one prediction comes back per row.

use tonic::transport::Channel;
use tracing::{debug, error, info};

use crate::error::{ModelError, Result};
use crate::pricing::price_scorer_client::PriceScorerClient;
use crate::pricing::{FeatureRow, PredictRequest};
use crate::{check_row_shapes, Regressor};

/// Regressor backed by a remote scoring service.
///
/// Cloning is cheap: clones share the underlying channel.
#[derive(Clone)]
pub struct GrpcRegressor {
    client: PriceScorerClient<Channel>,
    service_addr: String,
    model_name: String,
    model_version: String,
}

impl GrpcRegressor {
    /// Connect to the scoring service.
    ///
    /// # Arguments
    /// * `addr` - Address of the gRPC service (e.g., "http://localhost:50051")
    /// * `model_name` / `model_version` - forwarded with every request so the
    ///   service can route to the registered model
    pub async fn connect(
        addr: impl Into<String>,
        model_name: impl Into<String>,
        model_version: impl Into<String>,
    ) -> Result<Self> {
        let addr = addr.into();
        info!("Connecting to scoring service at {}", addr);

        let endpoint = Channel::from_shared(addr.clone())
            .map_err(|e| ModelError::ConnectionError(format!("invalid address {}: {}", addr, e)))?;
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ModelError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client: PriceScorerClient::new(channel),
            service_addr: addr,
            model_name: model_name.into(),
            model_version: model_version.into(),
        })
    }

    /// Get the address of the scoring service this client is connected to.
    pub fn service_address(&self) -> &str {
        &self.service_addr
    }
}

#[tonic::async_trait]
impl Regressor for GrpcRegressor {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn predict(&self, columns: &[String], rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        check_row_shapes(columns, rows)?;
        let expected_len = rows.len();
        debug!(
            "Scoring {} rows with {} v{}",
            expected_len, self.model_name, self.model_version
        );

        let request = tonic::Request::new(PredictRequest {
            model_name: self.model_name.clone(),
            model_version: self.model_version.clone(),
            columns: columns.to_vec(),
            rows: rows
                .iter()
                .map(|values| FeatureRow {
                    values: values.clone(),
                })
                .collect(),
        });

        let mut client = self.client.clone();
        let response = client.predict(request).await.map_err(|e| {
            error!("gRPC error while scoring rows: {}", e);
            ModelError::ScoringError(e.to_string())
        })?;

        let predictions = response.into_inner().predictions;
        if predictions.len() != expected_len {
            error!(
                "Mismatch in number of predictions returned: expected {}, got {}",
                expected_len,
                predictions.len()
            );
            return Err(ModelError::InvalidResponse(format!(
                "expected {} predictions, got {}",
                expected_len,
                predictions.len()
            )));
        }
        Ok(predictions)
    }
}
