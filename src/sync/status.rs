//! Derived save status shown to the user.

use std::fmt;

use crate::model::DocumentModel;

/// Save status, derived from the document and network identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No network identity/credential is available
    Offline,
    /// Local edits exist that the remote store has not acknowledged
    UnsavedChanges,
    /// Everything is acknowledged and a sync has happened
    Saved,
    /// Nothing to report yet
    Idle,
}

impl SyncStatus {
    /// Derive the status. Never stored, always recomputed.
    pub fn derive(doc: Option<&DocumentModel>, has_credential: bool) -> Self {
        if !has_credential {
            return SyncStatus::Offline;
        }
        match doc {
            Some(doc) if doc.has_unsynced_changes() => SyncStatus::UnsavedChanges,
            Some(doc) if doc.last_synced_at.is_some() => SyncStatus::Saved,
            _ => SyncStatus::Idle,
        }
    }

    /// Label used in the status bar.
    pub fn label(&self) -> &'static str {
        match self {
            SyncStatus::Offline => "offline",
            SyncStatus::UnsavedChanges => "unsaved changes",
            SyncStatus::Saved => "saved",
            SyncStatus::Idle => "",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
