//! framefit - frame calibration and local-first chart fit editing
//!
//! Detects the opening of a frame image, fits a chart overlay into it and
//! keeps the resulting document in sync with a remote store while staying
//! usable offline.

pub mod cache;
pub mod calibration;
pub mod color_utils;
pub mod config;
pub mod constants;
pub mod error;
pub mod model;
pub mod session;
pub mod state;
pub mod store;
pub mod sync;
pub mod undo;

pub use config::EditorConfig;
pub use session::{EditorSession, FrameContext};
