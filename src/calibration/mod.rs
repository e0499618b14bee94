//! Frame calibration: finding the opening of a frame image.
//!
//! The pipeline is scan → fit → normalize:
//!
//! 1. [`scanner`] classifies pixels as background and casts rays from the
//!    opening's center to find where the background ends;
//! 2. [`fitter`] reduces the per-angle radii to an axis-aligned ellipse;
//! 3. [`FrameCalibrationService`] normalizes the ellipse to image fractions
//!    and caches it per image identity.
//!
//! [`calibration_to_fit`] then turns a region into the chart fit.

mod fetch;
pub mod fitter;
mod mapper;
pub mod scanner;
mod service;

use serde::{Deserialize, Serialize};

use crate::constants::*;

pub use fetch::{FileImageFetcher, ImageFetcher, MemoryImageFetcher};
pub use fitter::{EllipseFit, EllipseRadii, FitMethod, fit_ellipse};
pub use mapper::{CanvasSize, ChartGeometry, calibration_to_fit};
pub use scanner::{BackgroundThresholds, CenterEstimate, RasterView};
pub use service::{CenterOverride, FrameCalibrationService, calibration_cache_key};

/// Tunable detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    pub angle_step_deg: f64,
    pub radius_step_px: f64,
    pub alpha_threshold: f32,
    pub white_cutoff: f32,
    pub max_saturation: f32,
    pub offwhite_boost: f32,
    pub min_background_fraction: f64,
    pub fallback_percentile: f64,
    pub safety_margin_fraction: f64,
    pub min_safety_margin_px: f64,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            angle_step_deg: DEFAULT_ANGLE_STEP_DEG,
            radius_step_px: DEFAULT_RADIUS_STEP_PX,
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            white_cutoff: DEFAULT_WHITE_CUTOFF,
            max_saturation: DEFAULT_MAX_SATURATION,
            offwhite_boost: 0.0,
            min_background_fraction: DEFAULT_MIN_BACKGROUND_FRACTION,
            fallback_percentile: DEFAULT_FALLBACK_PERCENTILE,
            safety_margin_fraction: DEFAULT_SAFETY_MARGIN_FRACTION,
            min_safety_margin_px: DEFAULT_MIN_SAFETY_MARGIN_PX,
        }
    }
}

impl DetectionParams {
    /// Pixel classification thresholds.
    pub fn thresholds(&self) -> BackgroundThresholds {
        BackgroundThresholds {
            alpha_threshold: self.alpha_threshold,
            white_cutoff: self.white_cutoff,
            max_saturation: self.max_saturation,
            offwhite_boost: self.offwhite_boost,
        }
    }
}
