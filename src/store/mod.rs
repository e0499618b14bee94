//! Remote document store interface.
//!
//! The remote store holds the authoritative copy of each editing context.
//! Loading yields the server baseline; saving acknowledges a version. The
//! HTTP implementation lives outside this crate; [`FileDocumentStore`] and
//! [`MemoryDocumentStore`] are local stand-ins with the same contract.

mod file;
mod memory;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, ValidationError};
use crate::model::{
    CalibrationRegion, ChartFit, ContextKey, Design, DocumentModel, LegacyFrameCircle, Overrides,
    Timestamp, normalize_overrides,
};

pub use file::FileDocumentStore;
pub use memory::MemoryDocumentStore;

/// Current version of the stored document format.
pub const DOCUMENT_FORMAT_VERSION: u32 = 1;

fn default_format_version() -> u32 {
    DOCUMENT_FORMAT_VERSION
}

/// Server-side representation of one editing context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Format version of this payload
    #[serde(default = "default_format_version")]
    pub version: u32,
    /// Client version being saved (acknowledged on success)
    #[serde(default)]
    pub client_version: u64,
    #[serde(default)]
    pub fit: ChartFit,
    #[serde(default)]
    pub overrides: Overrides,
    #[serde(default)]
    pub design: Design,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration_region: Option<CalibrationRegion>,
    /// The user removed the calibration region on purpose
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub calibration_cleared: bool,
    /// Older circle-only calibration, read but never written
    #[serde(default, skip_serializing)]
    pub frame_circle: Option<LegacyFrameCircle>,
    /// Image aspect (width / height) used to convert `frame_circle`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_aspect: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<Timestamp>,
}

impl StoredDocument {
    /// Build the save payload for a document.
    pub fn from_document(doc: &DocumentModel, saved_at: Timestamp) -> Self {
        Self {
            version: DOCUMENT_FORMAT_VERSION,
            client_version: doc.client_version,
            fit: doc.fit,
            overrides: doc.overrides.clone(),
            design: doc.design.clone(),
            calibration_region: doc.calibration_region,
            calibration_cleared: doc.calibration_cleared,
            frame_circle: None,
            image_aspect: None,
            saved_at: Some(saved_at),
        }
    }

    /// Validate and normalize into a baseline.
    ///
    /// A missing `calibration_region` falls back to the legacy
    /// `frame_circle` when present.
    pub fn into_baseline(self) -> Result<Baseline, ValidationError> {
        let fit = self.fit.validate()?;
        let overrides = normalize_overrides(self.overrides)?;
        let calibration_region = match (self.calibration_region, self.frame_circle) {
            (Some(region), _) => Some(region.validate()?),
            (None, Some(circle)) => Some(circle.to_region(self.image_aspect).validate()?),
            (None, None) => None,
        };
        Ok(Baseline {
            fit,
            overrides,
            design: self.design,
            calibration_cleared: self.calibration_cleared && calibration_region.is_none(),
            calibration_region,
        })
    }
}

/// Server-provided starting point of an editing context.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Baseline {
    pub fit: ChartFit,
    pub overrides: Overrides,
    pub design: Design,
    pub calibration_region: Option<CalibrationRegion>,
    pub calibration_cleared: bool,
}

/// Asynchronous remote document store.
pub trait DocumentStore {
    /// Load the baseline for `key`; `None` when the context was never saved.
    fn load(
        &self,
        key: &ContextKey,
    ) -> impl Future<Output = Result<Option<Baseline>, StoreError>>;

    /// Save `document` for `key`, returning the acknowledged client version.
    fn save(
        &self,
        key: &ContextKey,
        document: &StoredDocument,
    ) -> impl Future<Output = Result<u64, StoreError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementOverride;

    #[test]
    fn test_legacy_frame_circle_becomes_region() {
        let stored: StoredDocument = serde_json::from_str(
            r#"{"overrides": {}, "frame_circle": {"cxNorm": 0.5, "cyNorm": 0.5, "rNorm": 0.25}}"#,
        )
        .unwrap();
        let baseline = stored.into_baseline().unwrap();
        let region = baseline.calibration_region.unwrap();
        assert_eq!(region.radius_x_norm, 0.25);
        assert_eq!(region.radius_y_norm, 0.25);
    }

    #[test]
    fn test_into_baseline_drops_empty_overrides() {
        let mut stored = StoredDocument::from_document(
            &DocumentModel::new(ContextKey::chart_only("c")),
            0,
        );
        stored
            .overrides
            .insert("empty".into(), ElementOverride::default());
        stored
            .overrides
            .insert("moved".into(), ElementOverride::offset(1.0, 0.0));
        let baseline = stored.into_baseline().unwrap();
        assert_eq!(baseline.overrides.len(), 1);
    }

    #[test]
    fn test_into_baseline_rejects_bad_scale() {
        let stored: StoredDocument = serde_json::from_str(r#"{"fit": {"scale": 0}}"#).unwrap();
        assert_eq!(
            stored.into_baseline(),
            Err(ValidationError::NonPositiveScale(0.0))
        );
    }

    #[test]
    fn test_payload_carries_client_version() {
        let mut doc = DocumentModel::new(ContextKey::framed("c", "f"));
        doc.client_version = 7;
        let stored = StoredDocument::from_document(&doc, 123);
        assert_eq!(stored.client_version, 7);
        assert_eq!(stored.saved_at, Some(123));
        let json = serde_json::to_string(&stored).unwrap();
        assert!(!json.contains("frame_circle"));
        assert!(!json.contains("calibration_cleared"));
    }

    #[test]
    fn test_cleared_calibration_survives_save() {
        let mut doc = DocumentModel::new(ContextKey::framed("c", "f"));
        doc.calibration_cleared = true;
        let json = serde_json::to_string(&StoredDocument::from_document(&doc, 1)).unwrap();
        let stored: StoredDocument = serde_json::from_str(&json).unwrap();
        let baseline = stored.into_baseline().unwrap();
        assert!(baseline.calibration_cleared);
        assert_eq!(baseline.calibration_region, None);
    }
}
