//! Feature engineering for a single listing.
//!
//! This module reproduces the transform the model was trained on:
//! derived numeric features plus one-hot indicators for the categoricals.

use std::collections::HashMap;

use crate::error::{PipelineError, Result};
use crate::input::RawInput;

pub const SURFACE: &str = "surface";
pub const ROOMS: &str = "rooms";
pub const ROOMS_PER_SURFACE: &str = "rooms_per_surface";
pub const SURFACE_SQUARED: &str = "surface_squared";
pub const GOVERNORATE: &str = "governorate";
pub const PROPERTY_TYPE: &str = "property_type";

/// Indicator column name for an observed categorical value: `<field>_<value>`
pub fn indicator_column(field: &str, value: &str) -> String {
    format!("{}_{}", field, value)
}

/// A `RawInput` expanded into named numeric features.
///
/// Holds the four raw fields, the derived ratios, and exactly one indicator
/// column per categorical field. Lives for one request only.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineeredRecord {
    pub surface: f64,
    pub rooms: u32,
    pub governorate: String,
    pub property_type: String,
    pub rooms_per_surface: f64,
    pub surface_squared: f64,
    values: HashMap<String, f64>,
}

impl EngineeredRecord {
    /// Value of a named feature, if this record produced it
    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }

    /// Names of every feature this record produced
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builds engineered records from raw input.
///
/// Stateless; one instance can be shared across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    /// Derive features for one record.
    ///
    /// ## Algorithm
    /// 1. Copy `surface` and `rooms`
    /// 2. `rooms_per_surface = rooms / surface`, `surface_squared = surface^2`
    /// 3. One indicator per categorical field, `<field>_<value> = 1`.
    ///    No baseline category is dropped.
    ///
    /// # Errors
    /// `PipelineError::Domain` if `surface` is zero, negative, or not finite,
    /// since `rooms_per_surface` would be infinite or NaN.
    pub fn engineer(&self, raw: &RawInput) -> Result<EngineeredRecord> {
        if !raw.surface.is_finite() || raw.surface <= 0.0 {
            return Err(PipelineError::Domain(format!(
                "surface must be a positive finite divisor, got {}",
                raw.surface
            )));
        }

        let rooms = f64::from(raw.rooms);
        let rooms_per_surface = rooms / raw.surface;
        let surface_squared = raw.surface * raw.surface;
        if !surface_squared.is_finite() {
            return Err(PipelineError::Domain(format!(
                "surface_squared overflows for surface {}",
                raw.surface
            )));
        }

        let mut values = HashMap::with_capacity(6);
        values.insert(SURFACE.to_string(), raw.surface);
        values.insert(ROOMS.to_string(), rooms);
        values.insert(ROOMS_PER_SURFACE.to_string(), rooms_per_surface);
        values.insert(SURFACE_SQUARED.to_string(), surface_squared);
        values.insert(indicator_column(GOVERNORATE, &raw.governorate), 1.0);
        values.insert(indicator_column(PROPERTY_TYPE, &raw.property_type), 1.0);

        Ok(EngineeredRecord {
            surface: raw.surface,
            rooms: raw.rooms,
            governorate: raw.governorate.clone(),
            property_type: raw.property_type.clone(),
            rooms_per_surface,
            surface_squared,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_computation() {
        let record = FeatureEngineer::new()
            .engineer(&RawInput::new(120.0, 3, "Tunis", "Apartment"))
            .unwrap();

        assert_eq!(record.rooms_per_surface, 0.025);
        assert_eq!(record.surface_squared, 14400.0);
        assert_eq!(record.value("surface"), Some(120.0));
        assert_eq!(record.value("rooms"), Some(3.0));
        assert_eq!(record.value("rooms_per_surface"), Some(0.025));
        assert_eq!(record.value("surface_squared"), Some(14400.0));
        assert_eq!(record.value("governorate_Tunis"), Some(1.0));
        assert_eq!(record.value("property_type_Apartment"), Some(1.0));
    }

    #[test]
    fn test_one_indicator_per_categorical() {
        let record = FeatureEngineer::new()
            .engineer(&RawInput::new(80.0, 2, "Sousse", "Villa"))
            .unwrap();

        let indicators: Vec<_> = record
            .columns()
            .filter(|c| c.starts_with("governorate_") || c.starts_with("property_type_"))
            .collect();
        assert_eq!(indicators.len(), 2);
        assert_eq!(record.len(), 6);
    }

    #[test]
    fn test_category_names_are_kept_verbatim() {
        let record = FeatureEngineer::new()
            .engineer(&RawInput::new(80.0, 2, "Ben Arous", "Appartement"))
            .unwrap();
        assert_eq!(record.value("governorate_Ben Arous"), Some(1.0));
        assert_eq!(record.value("governorate_ben arous"), None);
    }

    #[test]
    fn test_zero_surface_is_domain_error() {
        let err = FeatureEngineer::new()
            .engineer(&RawInput::new(0.0, 3, "Tunis", "Apartment"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Domain(_)));
    }

    #[test]
    fn test_non_finite_surface_is_domain_error() {
        let engineer = FeatureEngineer::new();
        for surface in [-10.0, f64::NAN, f64::INFINITY, f64::MAX] {
            let result = engineer.engineer(&RawInput::new(surface, 3, "Tunis", "Apartment"));
            assert!(matches!(result, Err(PipelineError::Domain(_))), "surface {surface}");
        }
    }
}
