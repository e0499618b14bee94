//! File-backed cache: one JSON file per key.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::DurableCache;
use crate::error::CacheError;

/// Cache persisting each key as a file under a directory.
///
/// Keys are escaped into file names. Writes go to a temporary file that is
/// renamed into place, so a crash never leaves a half-written entry.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Use `dir` as the cache directory. It is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default cache directory for this user, if one can be determined.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("framefit"))
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", escape_key(key)))
    }
}

/// Escape a key into a file-name-safe string.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes
/// `%XX`, so distinct keys never collide.
fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            escaped.push(char::from(byte));
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    escaped
}

impl DurableCache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir)?;
        let target = self.path_for(key);
        let temp = target.with_extension("json.tmp");
        std::fs::write(&temp, value)?;
        std::fs::rename(&temp, &target)?;
        log::trace!("Cache: wrote {:?}", target);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_key() {
        assert_eq!(escape_key("draft:c1:f1"), "draft%3Ac1%3Af1");
        assert_eq!(escape_key("a_b-c"), "a_b-c");
        assert_ne!(escape_key("a/b"), escape_key("a%2Fb"));
    }

    #[test]
    fn test_round_trip_survives_new_handle() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("cache"));
        pollster::block_on(cache.set("draft:c1:f1", "{\"a\":1}".into())).unwrap();

        let reopened = FileCache::new(dir.path().join("cache"));
        let value = pollster::block_on(reopened.get("draft:c1:f1")).unwrap();
        assert_eq!(value.as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        assert_eq!(pollster::block_on(cache.get("nope")).unwrap(), None);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        pollster::block_on(cache.set("k", "v".into())).unwrap();
        pollster::block_on(cache.delete("k")).unwrap();
        pollster::block_on(cache.delete("k")).unwrap();
        assert_eq!(pollster::block_on(cache.get("k")).unwrap(), None);
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        pollster::block_on(cache.set("k", "1".into())).unwrap();
        pollster::block_on(cache.set("k", "2".into())).unwrap();
        assert_eq!(pollster::block_on(cache.get("k")).unwrap().as_deref(), Some("2"));
    }
}
