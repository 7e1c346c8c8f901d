//! Model client for the house price predictor.
//!
//! This crate provides everything needed to get a callable price model:
//! - `Regressor`, the seam the prediction pipeline calls through
//! - `GrpcRegressor`, a client for a remote scoring service
//! - `LinearRegressor`, a local model read from a coefficients artifact
//! - `ModelRegistry` / `FileRegistry`, resolving `(name, stage)` to a model
//! - `ArtifactStore` / `FsArtifactStore`, fetching run artifacts as bytes

pub mod artifacts;
pub mod error;
pub mod grpc;
pub mod linear;
pub mod registry;

// Include the generated protobuf code
pub mod pricing {
    tonic::include_proto!("pricing");
}

pub use artifacts::{ArtifactStore, FsArtifactStore};
pub use error::{ModelError, Result};
pub use grpc::GrpcRegressor;
pub use linear::LinearRegressor;
pub use registry::{FileRegistry, LoadedModel, ModelFlavor, ModelRegistry, ModelVersion};

/// A regression model that maps feature rows to scalar predictions.
///
/// `columns` names the layout of every row. Implementations must return
/// exactly one prediction per row, in row order.
#[tonic::async_trait]
pub trait Regressor: Send + Sync {
    /// Returns the name of this model (for logging/debugging)
    fn name(&self) -> &str;

    async fn predict(&self, columns: &[String], rows: &[Vec<f64>]) -> Result<Vec<f64>>;
}

/// Check every row against the column count before it leaves the process.
pub(crate) fn check_row_shapes(columns: &[String], rows: &[Vec<f64>]) -> Result<()> {
    for (row, values) in rows.iter().enumerate() {
        if values.len() != columns.len() {
            return Err(ModelError::ShapeMismatch {
                row,
                expected: columns.len(),
                found: values.len(),
            });
        }
    }
    Ok(())
}
