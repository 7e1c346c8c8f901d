//! # Feature Schema Crate
//!
//! Loads the ordered list of feature columns the price model was trained on.
//!
//! ## Main Components
//!
//! - **types**: `FeatureSchema`, the immutable column layout
//! - **parser**: decode artifact blobs (JSON, list literals) into column lists
//! - **pickle**: read pickled column lists written by the training job
//! - **error**: error types for schema loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use feature_schema::FeatureSchema;
//!
//! let schema = FeatureSchema::from_artifact(&bytes)?;
//! assert_eq!(schema.position("surface"), Some(0));
//! ```

pub mod error;
pub mod parser;
pub mod pickle;
pub mod types;

pub use error::{Result, SchemaError};
pub use types::FeatureSchema;
