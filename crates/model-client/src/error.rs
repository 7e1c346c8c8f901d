use thiserror::Error;

/// Errors that can occur when resolving, loading, or invoking a model
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to connect to scoring service: {0}")]
    ConnectionError(String),

    #[error("Failed to score feature rows: {0}")]
    ScoringError(String),

    #[error("Invalid response from scoring service: {0}")]
    InvalidResponse(String),

    /// A row does not match the column list it was sent with
    #[error("Row {row} has {found} values but {expected} columns were given")]
    ShapeMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("No model '{name}' registered in stage '{stage}'")]
    ModelNotFound { name: String, stage: String },

    #[error("Artifact '{path}' not found for run {run_id}")]
    ArtifactNotFound { run_id: String, path: String },

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;
