//! Feature alignment and inference pipeline for house price prediction.
//!
//! This crate provides:
//! - `RawInput` and its boundary validation
//! - `FeatureEngineer` for derived features and one-hot indicators
//! - `align` for reprojection onto the training-time `FeatureSchema`
//! - `PredictionPipeline` tying the above to a model handle
//!
//! ## Architecture
//! A request flows through the pipeline in stages:
//! 1. The boundary validates the `RawInput` bounds
//! 2. `FeatureEngineer` builds an `EngineeredRecord`
//! 3. `align` lays it out in schema order, zero-filling absent columns
//! 4. The model scores the row; `exp(log_price) - 1` recovers the price
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{PredictionPipeline, RawInput};
//!
//! let raw = RawInput::new(120.0, 3, "Tunis", "Apartment");
//! raw.validate()?;
//!
//! let pipeline = PredictionPipeline::new(schema.clone(), model.clone());
//! let result = pipeline.predict(&raw).await?;
//! println!("{:.0} TND", result.price);
//! ```

pub mod align;
pub mod error;
pub mod features;
pub mod input;
pub mod prediction;

// Re-export main types
pub use align::{align, align_batch, AlignedVector};
pub use error::{FieldViolation, PipelineError, Result, ValidationError};
pub use features::{EngineeredRecord, FeatureEngineer};
pub use input::RawInput;
pub use prediction::{PredictionPipeline, PredictionResult};
