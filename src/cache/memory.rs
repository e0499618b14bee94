//! In-process cache backed by a shared map.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::DurableCache;
use crate::error::CacheError;

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, String>,
    writes: usize,
    deletes: usize,
}

/// Cache living in process memory.
///
/// Cloning yields another handle to the same map, so a loader or a
/// calibration service can hold the cache alongside the engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether no key is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// Whether `key` is stored.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.borrow().entries.contains_key(key)
    }

    /// Raw value for `key`, bypassing the async interface.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner.borrow().entries.get(key).cloned()
    }

    /// Total number of `set` calls served.
    pub fn write_count(&self) -> usize {
        self.inner.borrow().writes
    }

    /// Total number of `delete` calls served.
    pub fn delete_count(&self) -> usize {
        self.inner.borrow().deletes
    }
}

impl DurableCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        let mut inner = self.inner.borrow_mut();
        inner.writes += 1;
        inner.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut inner = self.inner.borrow_mut();
        inner.deletes += 1;
        inner.entries.remove(key);
        Ok(())
    }
}
