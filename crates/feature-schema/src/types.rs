//! The feature schema fixed at model-training time.

use crate::error::{Result, SchemaError};
use crate::parser;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Ordered column names the trained model accepts.
///
/// The order defines the layout of every feature vector sent to the model,
/// so a schema is immutable once built. Share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl FeatureSchema {
    /// Build a schema from an ordered list of column names.
    ///
    /// Fails if the list is empty or names a column twice.
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut positions = HashMap::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            if positions.insert(column.clone(), idx).is_some() {
                return Err(SchemaError::DuplicateColumn {
                    column: column.clone(),
                });
            }
        }

        Ok(Self { columns, positions })
    }

    /// Decode an artifact blob (JSON, list literal, or pickle) into a schema.
    pub fn from_artifact(bytes: &[u8]) -> Result<Self> {
        let columns = parser::parse_artifact(bytes)?;
        debug!("Decoded {} feature columns from artifact", columns.len());
        Self::new(columns)
    }

    /// Read and decode a schema artifact from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_artifact(&bytes)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false for a constructed schema, kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Index of a column in the model's input vector
    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }
}
