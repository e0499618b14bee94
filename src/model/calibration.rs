//! Calibration region of a frame image and its editing state.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Detected elliptical opening, in image-fraction coordinates.
///
/// Centers are fractions of width/height; `radius_x_norm` is a fraction of
/// image width and `radius_y_norm` a fraction of image height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRegion {
    pub center_x_norm: f64,
    pub center_y_norm: f64,
    pub radius_x_norm: f64,
    pub radius_y_norm: f64,
}

impl CalibrationRegion {
    /// Build a region from pixel measurements of a `width`x`height` image.
    pub fn from_pixels(cx: f64, cy: f64, rx: f64, ry: f64, width: u32, height: u32) -> Self {
        let w = f64::from(width.max(1));
        let h = f64::from(height.max(1));
        Self {
            center_x_norm: cx / w,
            center_y_norm: cy / h,
            radius_x_norm: rx / w,
            radius_y_norm: ry / h,
        }
    }

    /// Check that all values are finite and radii are non-negative.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let values = [
            self.center_x_norm,
            self.center_y_norm,
            self.radius_x_norm,
            self.radius_y_norm,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::InvalidRegion(
                "values must be finite".to_string(),
            ));
        }
        if self.radius_x_norm < 0.0 || self.radius_y_norm < 0.0 {
            return Err(ValidationError::InvalidRegion(
                "radii must be non-negative".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Older circle-only calibration payload (`frame_circle`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFrameCircle {
    pub cx_norm: f64,
    pub cy_norm: f64,
    /// Radius as a fraction of image width
    pub r_norm: f64,
}

impl LegacyFrameCircle {
    /// Convert to a region. `aspect` is image width / height when known.
    pub fn to_region(self, aspect: Option<f64>) -> CalibrationRegion {
        let ry = match aspect {
            Some(aspect) if aspect.is_finite() && aspect > 0.0 => self.r_norm * aspect,
            _ => self.r_norm,
        };
        CalibrationRegion {
            center_x_norm: self.cx_norm,
            center_y_norm: self.cy_norm,
            radius_x_norm: self.r_norm,
            radius_y_norm: ry,
        }
    }
}

/// Who produced a calibration region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationSource {
    /// Computed by automatic detection
    Auto,
    /// Set by the user (snap, restored draft, saved document)
    User,
}

/// Editing state of the calibration region.
///
/// `Unset` and `ClearedByUser` both have no region, but only `Unset` may
/// trigger automatic detection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CalibrationState {
    /// Not computed yet for this context
    #[default]
    Unset,
    /// Computed automatically from the frame image
    Detected(CalibrationRegion),
    /// Set deliberately (user snap, restored draft or saved document)
    Pinned(CalibrationRegion),
    /// Removed by the user; must not be recomputed automatically
    ClearedByUser,
}

impl CalibrationState {
    /// State for a region coming from a saved document or draft.
    ///
    /// A stored region wins over a stale `cleared` flag.
    pub fn from_saved(region: Option<CalibrationRegion>, cleared: bool) -> Self {
        match region {
            Some(region) => Self::Pinned(region),
            None if cleared => Self::ClearedByUser,
            None => Self::Unset,
        }
    }

    /// State for a freshly produced region.
    pub fn from_source(region: CalibrationRegion, source: CalibrationSource) -> Self {
        match source {
            CalibrationSource::Auto => Self::Detected(region),
            CalibrationSource::User => Self::Pinned(region),
        }
    }

    /// The current region, if any.
    pub fn region(&self) -> Option<CalibrationRegion> {
        match self {
            Self::Detected(region) | Self::Pinned(region) => Some(*region),
            Self::Unset | Self::ClearedByUser => None,
        }
    }

    /// Whether automatic detection should run.
    pub fn needs_detection(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Whether the user removed the region on purpose.
    pub fn is_cleared(&self) -> bool {
        matches!(self, Self::ClearedByUser)
    }
}
