//! Affine fit aligning the chart overlay to the frame.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Translate/scale/rotate transform applied to the overlay at render time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartFit {
    /// Horizontal translation in canvas pixels
    #[serde(default)]
    pub dx: f64,
    /// Vertical translation in canvas pixels
    #[serde(default)]
    pub dy: f64,
    /// Uniform scale factor
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Rotation in degrees
    #[serde(default)]
    pub rotation_deg: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl ChartFit {
    /// Create a fit from its components.
    pub fn new(dx: f64, dy: f64, scale: f64, rotation_deg: f64) -> Self {
        Self {
            dx,
            dy,
            scale,
            rotation_deg,
        }
    }

    /// The identity fit (no translation, unit scale, no rotation).
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 1.0, 0.0)
    }

    /// Return a copy moved by the given delta.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            dx: self.dx + dx,
            dy: self.dy + dy,
            ..*self
        }
    }

    /// Check that every component is usable.
    ///
    /// Scale must be strictly positive; all values must be finite.
    pub fn validate(self) -> Result<Self, ValidationError> {
        for (field, value) in [
            ("dx", self.dx),
            ("dy", self.dy),
            ("scale", self.scale),
            ("rotation_deg", self.rotation_deg),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::non_finite(field));
            }
        }
        if self.scale <= 0.0 {
            return Err(ValidationError::NonPositiveScale(self.scale));
        }
        Ok(self)
    }
}

impl Default for ChartFit {
    fn default() -> Self {
        Self::identity()
    }
}
