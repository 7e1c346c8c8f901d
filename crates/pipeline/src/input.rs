//! The human-entered record accepted by the prediction endpoint.

use serde::{Deserialize, Serialize};

use crate::error::{FieldViolation, ValidationError};

/// Exclusive bounds on `surface` (square metres)
pub const SURFACE_MIN_EXCLUSIVE: f64 = 10.0;
pub const SURFACE_MAX_EXCLUSIVE: f64 = 2000.0;

/// Inclusive bounds on `rooms`
pub const ROOMS_MIN: u32 = 1;
pub const ROOMS_MAX: u32 = 20;

/// One listing as submitted by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    pub surface: f64,
    pub rooms: u32,
    pub governorate: String,
    pub property_type: String,
}

impl RawInput {
    pub fn new(
        surface: f64,
        rooms: u32,
        governorate: impl Into<String>,
        property_type: impl Into<String>,
    ) -> Self {
        Self {
            surface,
            rooms,
            governorate: governorate.into(),
            property_type: property_type.into(),
        }
    }

    /// Check every field against its declared bounds.
    ///
    /// All violations are reported, not just the first one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();

        // Written so that NaN fails the check too
        if !(self.surface > SURFACE_MIN_EXCLUSIVE && self.surface < SURFACE_MAX_EXCLUSIVE) {
            violations.push(FieldViolation {
                field: "surface",
                message: format!(
                    "must be greater than {} and less than {}, got {}",
                    SURFACE_MIN_EXCLUSIVE, SURFACE_MAX_EXCLUSIVE, self.surface
                ),
            });
        }

        if !(ROOMS_MIN..=ROOMS_MAX).contains(&self.rooms) {
            violations.push(FieldViolation {
                field: "rooms",
                message: format!(
                    "must be between {} and {} inclusive, got {}",
                    ROOMS_MIN, ROOMS_MAX, self.rooms
                ),
            });
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}
