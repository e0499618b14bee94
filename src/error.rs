//! Error types shared across the editing core.

use thiserror::Error;

/// Errors raised while detecting a frame's calibration region.
#[derive(Error, Debug)]
pub enum CalibrationError {
    /// The image bytes could not be decoded into a raster
    #[error("Failed to decode frame image '{source_id}': {source}")]
    ImageLoad {
        /// Image identity (URL or path) that failed
        source_id: String,
        /// Underlying decoder error
        #[source]
        source: image::ImageError,
    },

    /// The image bytes could not be fetched at all
    #[error("Failed to fetch frame image '{source_id}': {message}")]
    Fetch {
        /// Image identity (URL or path) that failed
        source_id: String,
        /// Description of the fetch failure
        message: String,
    },

    /// A pixel buffer could not be obtained for a decoded image
    #[error("Pixel data unavailable for '{source_id}' ({width}x{height})")]
    ContextUnavailable {
        /// Image identity (URL or path)
        source_id: String,
        /// Decoded width
        width: u32,
        /// Decoded height
        height: u32,
    },
}

/// Errors raised by a durable key/value cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// I/O error from a file-backed cache
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be (de)serialized
    #[error("Cache JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The cache backend refused the operation
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the remote document store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error from a file-backed store
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be (de)serialized
    #[error("Store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored or submitted payload failed validation
    #[error("Invalid document payload: {0}")]
    Invalid(#[from] ValidationError),

    /// The store rejected the request
    #[error("Store rejected request: {0}")]
    Rejected(String),

    /// The store could not be reached
    #[error("Store unreachable: {0}")]
    Offline(String),
}

/// Errors raised by the sync engine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote save failed; local edits and the draft are kept
    #[error("Save failed, local changes kept: {0}")]
    SaveFailed(#[source] StoreError),

    /// Durable draft write failed; in-memory state is still authoritative
    #[error("Draft write failed: {0}")]
    DraftWriteFailed(#[source] CacheError),

    /// No network identity is available for saving
    #[error("Cannot save while offline")]
    Offline,

    /// An operation needed an open editing context
    #[error("No editing context is open")]
    NoContext,

    /// Saving is blocked until the restore/discard decision is made
    #[error("A draft restore/discard decision is pending")]
    ConflictPending,

    /// A conflict resolution was requested without a pending conflict
    #[error("No draft conflict is pending")]
    NoPendingConflict,
}

/// Errors raised while validating document payloads.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Fit scale must be a positive finite number
    #[error("Chart fit scale must be positive, got {0}")]
    NonPositiveScale(f64),

    /// A numeric field was NaN or infinite
    #[error("Field '{field}' must be a finite number")]
    NonFinite {
        /// Name of the offending field
        field: String,
    },

    /// An override color was not a hex color
    #[error("Override color for '{element}' must be #rgb or #rrggbb, got '{color}'")]
    InvalidColor {
        /// Element id carrying the color
        element: String,
        /// The rejected color string
        color: String,
    },

    /// Calibration values were outside the expected range
    #[error("Calibration region is invalid: {0}")]
    InvalidRegion(String),
}

impl ValidationError {
    /// Create a non-finite field error.
    pub fn non_finite(field: impl Into<String>) -> Self {
        Self::NonFinite {
            field: field.into(),
        }
    }
}
