//! Durable local key/value cache.
//!
//! The cache stages unsaved document drafts and remembers frame calibration
//! results across restarts. It is scoped to the local device. Keys are
//! namespaced (`draft:...`, `calibration:...`) so both uses share one store.
//!
//! All operations are asynchronous; the in-process adapters complete
//! immediately, which keeps them usable from a single-threaded event loop.

mod file;
mod memory;

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CacheError;

pub use file::FileCache;
pub use memory::MemoryCache;

/// Asynchronous durable key/value store.
pub trait DurableCache {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, CacheError>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<(), CacheError>>;

    /// Remove `key`. Deleting a missing key succeeds.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), CacheError>>;
}

/// Read and deserialize a JSON value.
pub async fn get_json<C, T>(cache: &C, key: &str) -> Result<Option<T>, CacheError>
where
    C: DurableCache + ?Sized,
    T: DeserializeOwned,
{
    match cache.get(key).await? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Serialize and store a JSON value.
pub async fn set_json<C, T>(cache: &C, key: &str, value: &T) -> Result<(), CacheError>
where
    C: DurableCache + ?Sized,
    T: Serialize + ?Sized,
{
    let json = serde_json::to_string(value)?;
    cache.set(key, json).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChartFit;

    #[test]
    fn test_json_helpers_round_trip() {
        let cache = MemoryCache::new();
        let fit = ChartFit::new(1.0, 2.0, 3.0, 4.0);
        pollster::block_on(set_json(&cache, "k", &fit)).unwrap();
        let loaded: Option<ChartFit> = pollster::block_on(get_json(&cache, "k")).unwrap();
        assert_eq!(loaded, Some(fit));
    }

    #[test]
    fn test_get_json_reports_corrupt_values() {
        let cache = MemoryCache::new();
        pollster::block_on(cache.set("k", "{not json".to_string())).unwrap();
        let result: Result<Option<ChartFit>, _> = pollster::block_on(get_json(&cache, "k"));
        assert!(matches!(result, Err(CacheError::Json(_))));
    }
}
