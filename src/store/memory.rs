//! In-process document store.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{Baseline, DocumentStore, StoredDocument};
use crate::error::StoreError;
use crate::model::ContextKey;

#[derive(Debug, Default)]
struct Inner {
    documents: HashMap<ContextKey, StoredDocument>,
    saves: usize,
    offline: bool,
}

/// Document store living in process memory.
///
/// Clones share the same documents. [`set_offline`](Self::set_offline)
/// makes every call fail, which is how the sync engine's failure paths are
/// exercised.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.inner.borrow_mut().offline = offline;
    }

    /// Stored payload for `key`.
    pub fn get(&self, key: &ContextKey) -> Option<StoredDocument> {
        self.inner.borrow().documents.get(key).cloned()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.inner.borrow().saves
    }
}

impl DocumentStore for MemoryDocumentStore {
    async fn load(&self, key: &ContextKey) -> Result<Option<Baseline>, StoreError> {
        let inner = self.inner.borrow();
        if inner.offline {
            return Err(StoreError::Offline(format!("cannot load {}", key)));
        }
        match inner.documents.get(key) {
            Some(stored) => Ok(Some(stored.clone().into_baseline()?)),
            None => Ok(None),
        }
    }

    async fn save(&self, key: &ContextKey, document: &StoredDocument) -> Result<u64, StoreError> {
        let mut inner = self.inner.borrow_mut();
        if inner.offline {
            return Err(StoreError::Offline(format!("cannot save {}", key)));
        }
        document.clone().into_baseline()?;
        inner.documents.insert(key.clone(), document.clone());
        inner.saves += 1;
        Ok(document.client_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentModel;

    #[test]
    fn test_offline_store_fails_both_ways() {
        let store = MemoryDocumentStore::new();
        let key = ContextKey::chart_only("c");
        store.set_offline(true);
        let doc = StoredDocument::from_document(&DocumentModel::new(key.clone()), 0);
        assert!(matches!(
            pollster::block_on(store.save(&key, &doc)),
            Err(StoreError::Offline(_))
        ));
        assert!(pollster::block_on(store.load(&key)).is_err());

        store.set_offline(false);
        assert_eq!(pollster::block_on(store.save(&key, &doc)).unwrap(), 0);
        assert_eq!(store.save_count(), 1);
    }
}
