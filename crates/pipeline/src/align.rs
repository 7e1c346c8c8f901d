//! Reprojection of engineered records onto the training-time schema.

use feature_schema::FeatureSchema;
use rayon::prelude::*;

use crate::error::Result;
use crate::features::{EngineeredRecord, FeatureEngineer};
use crate::input::RawInput;

/// Feature values laid out exactly as the model's `FeatureSchema`.
///
/// The only representation the model may consume.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedVector {
    values: Vec<f64>,
}

impl AlignedVector {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Project a record onto `schema`.
///
/// Walks the schema in order: a column the record produced takes its
/// value, any other column is 0. Record columns the schema does not name
/// (unseen categories) are dropped.
pub fn align(record: &EngineeredRecord, schema: &FeatureSchema) -> AlignedVector {
    let values = schema
        .iter()
        .map(|column| record.value(column).unwrap_or(0.0))
        .collect();
    AlignedVector { values }
}

/// Engineer and align many records in parallel, preserving input order.
///
/// Fails on the first record whose features are undefined.
pub fn align_batch(
    engineer: &FeatureEngineer,
    raws: &[RawInput],
    schema: &FeatureSchema,
) -> Result<Vec<AlignedVector>> {
    raws.par_iter()
        .map(|raw| engineer.engineer(raw).map(|record| align(&record, schema)))
        .collect()
}
