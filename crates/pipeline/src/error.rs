//! Error types for request validation and the prediction pipeline.

use std::fmt;

use model_client::ModelError;
use thiserror::Error;

/// One field of a `RawInput` outside its declared bounds
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Input rejected at the boundary. Never reaches the pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid input: {}", format_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

fn format_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failures inside the prediction pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A derived feature is mathematically undefined for this input
    #[error("Domain error: {0}")]
    Domain(String),

    /// No feature schema / model has been loaded yet
    #[error("Model and feature schema are not loaded yet")]
    NotReady,

    /// The model call failed or returned an unusable value
    #[error("Inference failed: {0}")]
    Inference(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
