//! Frame image byte sources.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::CalibrationError;

/// Asynchronous byte fetch of a raster image by identity (URL or path).
pub trait ImageFetcher {
    fn fetch(&self, image_id: &str) -> impl Future<Output = Result<Vec<u8>, CalibrationError>>;
}

/// Reads images from the local filesystem.
///
/// Identities may be plain paths or `file://` URLs. Relative paths resolve
/// against the optional base directory.
#[derive(Debug, Clone, Default)]
pub struct FileImageFetcher {
    base: Option<PathBuf>,
}

impl FileImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative identities against `base`.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    fn resolve(&self, image_id: &str) -> PathBuf {
        let path = Path::new(image_id.strip_prefix("file://").unwrap_or(image_id));
        match &self.base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ImageFetcher for FileImageFetcher {
    async fn fetch(&self, image_id: &str) -> Result<Vec<u8>, CalibrationError> {
        let path = self.resolve(image_id);
        log::debug!("🖼️ Reading frame image {:?}", path);
        std::fs::read(&path).map_err(|e| CalibrationError::Fetch {
            source_id: image_id.to_string(),
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Default)]
struct Inner {
    images: HashMap<String, Vec<u8>>,
    fetches: usize,
}

/// Serves image bytes registered in memory. Clones share the same images.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageFetcher {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` under `image_id`.
    pub fn insert(&self, image_id: impl Into<String>, bytes: Vec<u8>) {
        self.inner.borrow_mut().images.insert(image_id.into(), bytes);
    }

    /// Number of fetches served, successful or not.
    pub fn fetch_count(&self) -> usize {
        self.inner.borrow().fetches
    }
}

impl ImageFetcher for MemoryImageFetcher {
    async fn fetch(&self, image_id: &str) -> Result<Vec<u8>, CalibrationError> {
        let mut inner = self.inner.borrow_mut();
        inner.fetches += 1;
        inner
            .images
            .get(image_id)
            .cloned()
            .ok_or_else(|| CalibrationError::Fetch {
                source_id: image_id.to_string(),
                message: "not found".to_string(),
            })
    }
}
