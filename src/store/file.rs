//! Directory-backed document store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{Baseline, DocumentStore, StoredDocument};
use crate::error::StoreError;
use crate::model::{ContextKey, FrameRef};

/// Stores each context as `document.json` under a chart/frame directory:
///
/// - `<root>/charts/<chart_id>/document.json` for chart-only contexts
/// - `<root>/charts/<chart_id>/frames/<frame_id>/document.json` otherwise
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    root: PathBuf,
}

impl FileDocumentStore {
    /// Use `root` as the storage directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default data directory for this user, if one can be determined.
    pub fn default_root() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("framefit"))
    }

    /// The storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, key: &ContextKey) -> Result<PathBuf, StoreError> {
        check_id(&key.chart_id)?;
        let chart_dir = self.root.join("charts").join(&key.chart_id);
        let dir = match &key.frame {
            FrameRef::ChartOnly => chart_dir,
            FrameRef::Frame(frame_id) => {
                check_id(frame_id)?;
                chart_dir.join("frames").join(frame_id)
            }
        };
        Ok(dir.join("document.json"))
    }
}

/// Reject ids that could escape the storage directory.
fn check_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
        && !id.contains('\0');
    if valid {
        Ok(())
    } else {
        Err(StoreError::Rejected(format!("invalid id '{}'", id)))
    }
}

impl DocumentStore for FileDocumentStore {
    async fn load(&self, key: &ContextKey) -> Result<Option<Baseline>, StoreError> {
        let path = self.document_path(key)?;
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No stored document for {} at {:?}", key, path);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let stored: StoredDocument = serde_json::from_str(&json)?;
        Ok(Some(stored.into_baseline()?))
    }

    async fn save(&self, key: &ContextKey, document: &StoredDocument) -> Result<u64, StoreError> {
        // Reject payloads that would not load back.
        document.clone().into_baseline()?;

        let path = self.document_path(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(document)?;
        let temp = path.with_extension("json.tmp");
        std::fs::write(&temp, json)?;
        std::fs::rename(&temp, &path)?;
        log::info!("Saved {} (version {}) to {:?}", key, document.client_version, path);
        Ok(document.client_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChartFit, DocumentModel, ElementOverride};

    #[test]
    fn test_missing_document_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path());
        let loaded = pollster::block_on(store.load(&ContextKey::framed("c1", "f1"))).unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path());
        let key = ContextKey::framed("c1", "f1");

        let mut doc = DocumentModel::new(key.clone());
        doc.fit = ChartFit::new(12.0, -4.0, 0.8, 15.0);
        doc.overrides
            .insert("mars".into(), ElementOverride::colored("#aa0000"));
        doc.client_version = 3;

        let ack = pollster::block_on(store.save(&key, &StoredDocument::from_document(&doc, 1)))
            .unwrap();
        assert_eq!(ack, 3);

        let baseline = pollster::block_on(store.load(&key)).unwrap().unwrap();
        assert_eq!(baseline.fit, doc.fit);
        assert_eq!(baseline.overrides, doc.overrides);
        assert!(dir.path().join("charts/c1/frames/f1/document.json").exists());
    }

    #[test]
    fn test_chart_only_and_framed_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path());
        let bare = ContextKey::chart_only("c1");
        let mut doc = DocumentModel::new(bare.clone());
        doc.fit = ChartFit::new(1.0, 1.0, 2.0, 0.0);
        pollster::block_on(store.save(&bare, &StoredDocument::from_document(&doc, 1))).unwrap();

        assert!(pollster::block_on(store.load(&bare)).unwrap().is_some());
        assert!(
            pollster::block_on(store.load(&ContextKey::framed("c1", "f1")))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_rejects_path_traversal_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path());
        let result = pollster::block_on(store.load(&ContextKey::framed("..", "f1")));
        assert!(matches!(result, Err(StoreError::Rejected(_))));
        let result = pollster::block_on(store.load(&ContextKey::framed("c1", "a/b")));
        assert!(matches!(result, Err(StoreError::Rejected(_))));
    }

    #[test]
    fn test_save_rejects_invalid_fit() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path());
        let key = ContextKey::chart_only("c1");
        let mut doc = DocumentModel::new(key.clone());
        doc.fit.scale = -1.0;
        let result = pollster::block_on(store.save(&key, &StoredDocument::from_document(&doc, 1)));
        assert!(matches!(result, Err(StoreError::Invalid(_))));
    }
}
