//! Global constants for framefit

/// Angular step between boundary rays, in degrees
pub const DEFAULT_ANGLE_STEP_DEG: f64 = 2.0;

/// Radial marching step along a boundary ray, in pixels
pub const DEFAULT_RADIUS_STEP_PX: f64 = 2.0;

/// Alpha (0.0-1.0) below which a pixel counts as transparent background
pub const DEFAULT_ALPHA_THRESHOLD: f32 = 0.05;

/// Minimum luminance (0.0-1.0) for a pixel to count as white background
pub const DEFAULT_WHITE_CUTOFF: f32 = 0.95;

/// Maximum HSV saturation for a pixel to count as white background
pub const DEFAULT_MAX_SATURATION: f32 = 0.10;

/// Fraction of pixels that must be background before the mask centroid is trusted
pub const DEFAULT_MIN_BACKGROUND_FRACTION: f64 = 0.01;

/// Percentile of boundary radii used when the least-squares fit is unusable
pub const DEFAULT_FALLBACK_PERCENTILE: f64 = 0.2;

/// Safety margin subtracted from fitted radii, as a fraction of image width
pub const DEFAULT_SAFETY_MARGIN_FRACTION: f64 = 0.002;

/// Lower bound for the safety margin, in pixels
pub const DEFAULT_MIN_SAFETY_MARGIN_PX: f64 = 1.0;

/// Quiet interval before a draft is written to the durable cache
pub const DEFAULT_DRAFT_DEBOUNCE_MS: u64 = 400;

/// Quiet interval before a history snapshot is recorded
pub const DEFAULT_HISTORY_DEBOUNCE_MS: u64 = 300;

/// Maximum number of undo steps kept per editing context
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Marker used in context keys when no frame is selected
pub const CHART_ONLY_MARKER: &str = "chart-only";

/// Durable cache namespace for unsaved document drafts
pub const DRAFT_NAMESPACE: &str = "draft";

/// Durable cache namespace for frame calibration results
pub const CALIBRATION_NAMESPACE: &str = "calibration";
