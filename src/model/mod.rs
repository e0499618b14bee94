//! Data models for the editing core.

mod calibration;
mod document;
mod fit;
mod overrides;

pub use calibration::{CalibrationRegion, CalibrationSource, CalibrationState, LegacyFrameCircle};
pub use document::{ContextKey, Design, DocumentModel, FrameRef, Timestamp, now_millis};
pub use fit::ChartFit;
pub use overrides::{ElementOverride, Overrides, apply_color, normalize_overrides, update_override};
