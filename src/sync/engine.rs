//! Local-first sync and conflict engine.
//!
//! The engine owns the editing state of the current context and keeps it
//! consistent with two collaborators:
//!
//! - the **durable cache**, where unsaved documents are staged as drafts
//!   through a coalescing debounce, and
//! - the **remote store**, which provides the baseline on entry and
//!   acknowledges versions on save.
//!
//! Entering a context is split in three steps so callers can interleave
//! other work while the loads are in flight:
//!
//! 1. [`SyncEngine::begin_context`] switches the context and hands out a
//!    [`ContextToken`];
//! 2. [`ContextLoad::fetch`] reads the server baseline and any draft using
//!    its own handles to the collaborators;
//! 3. [`SyncEngine::finish_context`] applies the result, unless the token is
//!    stale because another context was entered meanwhile.
//!
//! A draft with `client_version > server_version` means unsynced edits from
//! an earlier session. The engine then applies the baseline speculatively and
//! surfaces a restore/discard prompt instead of choosing a side.

use std::time::Duration;
use web_time::Instant;

use crate::cache::{DurableCache, get_json};
use crate::constants::DEFAULT_DRAFT_DEBOUNCE_MS;
use crate::error::{CacheError, StoreError, SyncError};
use crate::model::{ContextKey, DocumentModel, Timestamp, now_millis};
use crate::state::{Action, EditorState};
use crate::store::{Baseline, DocumentStore, StoredDocument};
use crate::sync::debounce::Debouncer;
use crate::sync::status::SyncStatus;

// ============================================================================
// Tokens, loads and outcomes
// ============================================================================

/// Identifies one entry into a context. Results carrying an outdated token
/// are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextToken {
    generation: u64,
    key: ContextKey,
}

impl ContextToken {
    /// The context this token was issued for.
    pub fn key(&self) -> &ContextKey {
        &self.key
    }

    /// Entry counter at issue time.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// In-flight read of a context's baseline and draft.
#[derive(Debug, Clone)]
pub struct ContextLoad<C, S> {
    token: ContextToken,
    cache: C,
    store: S,
}

impl<C: DurableCache, S: DocumentStore> ContextLoad<C, S> {
    /// The token this load will report under.
    pub fn token(&self) -> &ContextToken {
        &self.token
    }

    /// Read the server baseline and any cached draft.
    pub async fn fetch(self) -> LoadedContext {
        let baseline = self.store.load(&self.token.key).await;
        let draft =
            get_json::<C, DocumentModel>(&self.cache, &self.token.key.draft_cache_key()).await;
        LoadedContext {
            token: self.token,
            baseline,
            draft,
        }
    }
}

/// Result of [`ContextLoad::fetch`].
#[derive(Debug)]
pub struct LoadedContext {
    pub token: ContextToken,
    pub baseline: Result<Option<Baseline>, StoreError>,
    pub draft: Result<Option<DocumentModel>, CacheError>,
}

/// What the user is asked when a newer draft exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictPrompt {
    pub key: ContextKey,
    pub draft_client_version: u64,
    pub draft_server_version: u64,
    pub draft_saved_at: Option<Timestamp>,
}

/// The user's answer to a [`ConflictPrompt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Replace the baseline with the draft
    Restore,
    /// Delete the draft and keep the baseline
    Discard,
}

/// Result of finishing a context load.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextOutcome {
    /// Baseline applied, nothing to decide
    Loaded,
    /// Baseline applied speculatively; a restore/discard decision is needed
    ConflictPending(ConflictPrompt),
    /// The context changed while loading; nothing was applied
    Stale,
}

/// Soft failures that degrade offline resilience but lose no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncWarning {
    /// A draft could not be written to or deleted from the durable cache
    DraftWriteFailed(String),
    /// A cached draft could not be read
    DraftUnreadable(String),
    /// The server baseline could not be loaded; an empty baseline is used
    BaselineUnavailable(String),
}

// ============================================================================
// Save requests
// ============================================================================

/// A save captured from the current document.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    token: ContextToken,
    payload: StoredDocument,
}

impl SaveRequest {
    /// The payload that will be sent.
    pub fn payload(&self) -> &StoredDocument {
        &self.payload
    }

    /// Send the payload to the remote store.
    pub async fn send<S: DocumentStore>(self, store: &S) -> SaveReceipt {
        let result = store.save(&self.token.key, &self.payload).await;
        SaveReceipt {
            token: self.token,
            version: self.payload.client_version,
            result,
        }
    }
}

/// Outcome of [`SaveRequest::send`].
#[derive(Debug)]
pub struct SaveReceipt {
    pub token: ContextToken,
    pub version: u64,
    pub result: Result<u64, StoreError>,
}

// ============================================================================
// Engine
// ============================================================================

/// Sync/conflict engine for one editor.
#[derive(Debug)]
pub struct SyncEngine<C, S> {
    cache: C,
    store: S,
    state: Option<EditorState>,
    /// Incremented on every context entry
    generation: u64,
    /// Whether the baseline for the current entry has been applied
    applied: bool,
    /// Draft waiting for a restore/discard decision
    conflict: Option<DocumentModel>,
    /// Pending draft writes, serialized at schedule time
    drafts: Debouncer<ContextKey, String>,
    credential: Option<String>,
    warning: Option<SyncWarning>,
}

impl<C: DurableCache, S: DocumentStore> SyncEngine<C, S> {
    /// Default quiet interval before a draft is written.
    pub const DEFAULT_DRAFT_DEBOUNCE: Duration = Duration::from_millis(DEFAULT_DRAFT_DEBOUNCE_MS);

    /// Create an engine with the default draft debounce.
    pub fn new(cache: C, store: S) -> Self {
        Self::with_debounce(cache, store, Self::DEFAULT_DRAFT_DEBOUNCE)
    }

    /// Create an engine with a custom draft debounce.
    pub fn with_debounce(cache: C, store: S, draft_debounce: Duration) -> Self {
        Self {
            cache,
            store,
            state: None,
            generation: 0,
            applied: false,
            conflict: None,
            drafts: Debouncer::new(draft_debounce),
            credential: None,
            warning: None,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Set or clear the network identity used for saving.
    pub fn set_credential(&mut self, credential: Option<String>) {
        self.credential = credential;
    }

    /// Whether a network identity is available.
    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// The durable cache.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// The remote store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The current context, if any.
    pub fn context(&self) -> Option<&ContextKey> {
        self.state.as_ref().map(|s| &s.doc.context_key)
    }

    /// The current editing state, if a context is open.
    pub fn state(&self) -> Option<&EditorState> {
        self.state.as_ref()
    }

    /// The current document, if a context is open.
    pub fn document(&self) -> Option<&DocumentModel> {
        self.state.as_ref().map(|s| &s.doc)
    }

    /// Token for the current context entry.
    pub fn token(&self) -> Option<ContextToken> {
        self.context().map(|key| ContextToken {
            generation: self.generation,
            key: key.clone(),
        })
    }

    /// Whether `token` still identifies the current context entry.
    pub fn is_current(&self, token: &ContextToken) -> bool {
        token.generation == self.generation && self.context() == Some(&token.key)
    }

    /// Whether the baseline for the current entry has been applied.
    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// The pending restore/discard prompt, if any.
    pub fn conflict(&self) -> Option<ConflictPrompt> {
        self.conflict.as_ref().map(prompt_for)
    }

    /// Derived save status.
    pub fn status(&self) -> SyncStatus {
        SyncStatus::derive(self.document(), self.has_credential())
    }

    /// Most recent soft failure.
    pub fn warning(&self) -> Option<&SyncWarning> {
        self.warning.as_ref()
    }

    /// Take and clear the most recent soft failure.
    pub fn take_warning(&mut self) -> Option<SyncWarning> {
        self.warning.take()
    }

    /// Number of draft writes waiting for their quiet interval.
    pub fn pending_draft_writes(&self) -> usize {
        self.drafts.len()
    }

    /// When the next draft write becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.drafts.next_deadline()
    }

    // ------------------------------------------------------------------
    // Context entry
    // ------------------------------------------------------------------

    /// Switch to `key` and return the token its load must report under.
    ///
    /// Pending draft writes for the previous context stay scheduled; they
    /// carry their own serialized document.
    pub fn begin_context(&mut self, key: ContextKey) -> ContextToken {
        self.generation += 1;
        self.applied = false;
        self.conflict = None;
        self.warning = None;
        log::info!("📂 Entering context {} (generation {})", key, self.generation);
        self.state = Some(EditorState::new(key.clone()));
        ContextToken {
            generation: self.generation,
            key,
        }
    }

    /// Prepare the baseline/draft read for `token`.
    pub fn loader(&self, token: &ContextToken) -> ContextLoad<C, S>
    where
        C: Clone,
        S: Clone,
    {
        ContextLoad {
            token: token.clone(),
            cache: self.cache.clone(),
            store: self.store.clone(),
        }
    }

    /// Apply a finished load, or discard it if the context moved on.
    pub async fn finish_context(&mut self, loaded: LoadedContext) -> ContextOutcome {
        if !self.is_current(&loaded.token) {
            log::debug!(
                "Discarding stale load for {} (generation {})",
                loaded.token.key,
                loaded.token.generation
            );
            return ContextOutcome::Stale;
        }
        let key = loaded.token.key;

        let (baseline, saved_on_server) = match loaded.baseline {
            Ok(Some(baseline)) => (baseline, true),
            Ok(None) => (Baseline::default(), false),
            Err(e) => {
                log::warn!("Baseline for {} unavailable: {}", key, e);
                self.warning = Some(SyncWarning::BaselineUnavailable(e.to_string()));
                (Baseline::default(), false)
            }
        };

        let draft = match loaded.draft {
            Ok(Some(draft)) if draft.context_key == key => Some(draft),
            Ok(Some(draft)) => {
                log::warn!(
                    "Ignoring draft for {} stored under {}",
                    draft.context_key,
                    key
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Draft for {} unreadable: {}", key, e);
                self.warning = Some(SyncWarning::DraftUnreadable(e.to_string()));
                None
            }
        };

        // Apply the server baseline first so the editor is never blank.
        self.apply_action(Action::Load {
            fit: baseline.fit,
            overrides: baseline.overrides,
            design: baseline.design,
            calibration: baseline.calibration_region,
            calibration_cleared: baseline.calibration_cleared,
            user_adjusted: saved_on_server,
        });
        self.applied = true;

        match draft {
            Some(draft) if draft.has_unsynced_changes() => {
                let prompt = prompt_for(&draft);
                log::info!(
                    "⚠️ Unsynced draft for {} (client {} > server {}), asking user",
                    key,
                    draft.client_version,
                    draft.server_version
                );
                self.conflict = Some(draft);
                ContextOutcome::ConflictPending(prompt)
            }
            Some(_) => {
                log::debug!("Deleting stale draft for {}", key);
                self.delete_draft(&key).await;
                ContextOutcome::Loaded
            }
            None => ContextOutcome::Loaded,
        }
    }

    /// Enter `key` and load it in one step.
    pub async fn open_context(&mut self, key: ContextKey) -> ContextOutcome
    where
        C: Clone,
        S: Clone,
    {
        let token = self.begin_context(key);
        let loaded = self.loader(&token).fetch().await;
        self.finish_context(loaded).await
    }

    /// Answer the pending restore/discard prompt.
    pub async fn resolve_conflict(
        &mut self,
        choice: ConflictChoice,
        now: Instant,
    ) -> Result<(), SyncError> {
        let draft = self.conflict.take().ok_or(SyncError::NoPendingConflict)?;
        let key = draft.context_key.clone();
        match choice {
            ConflictChoice::Restore => {
                log::info!("♻️ Restoring draft for {} (version {})", key, draft.client_version);
                // The cached draft stays until the next successful save.
                self.apply_action(Action::ApplyDraft {
                    fit: draft.fit,
                    overrides: draft.overrides,
                    design: draft.design,
                    calibration: draft.calibration_region,
                    calibration_cleared: draft.calibration_cleared,
                    client_version: draft.client_version,
                    server_version: draft.server_version,
                    saved_at: draft.last_saved_at,
                    synced_at: draft.last_synced_at,
                });
            }
            ConflictChoice::Discard => {
                log::info!("🗑️ Discarding draft for {}", key);
                self.delete_draft(&key).await;
                // Edits made while the prompt was open still need a draft.
                self.schedule_draft(now);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Apply a transition and schedule draft persistence if needed.
    ///
    /// Returns false when no context is open.
    pub fn dispatch(&mut self, action: Action, now: Instant) -> bool {
        if self.state.is_none() {
            log::warn!("Ignoring {} without an open context", action.name());
            return false;
        }
        self.apply_action(action);
        self.schedule_draft(now);
        true
    }

    fn apply_action(&mut self, action: Action) {
        if let Some(state) = self.state.as_mut() {
            state.apply(action);
        }
    }

    fn schedule_draft(&mut self, now: Instant) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        if !state.doc.has_unsynced_changes() {
            return;
        }
        if self.conflict.is_some() {
            log::debug!("Draft write suspended until the draft conflict is resolved");
            return;
        }
        match state.doc.to_json() {
            Ok(json) => self
                .drafts
                .schedule(state.doc.context_key.clone(), json, now),
            Err(e) => {
                log::warn!("Could not serialize draft: {}", e);
                self.warning = Some(SyncWarning::DraftWriteFailed(e.to_string()));
            }
        }
    }

    /// Write every draft whose quiet interval has elapsed.
    ///
    /// Returns the number of drafts written.
    pub async fn flush_due(&mut self, now: Instant) -> usize {
        let due = self.drafts.take_due(now);
        self.write_drafts(due).await
    }

    /// Write every pending draft immediately (e.g. before shutdown).
    pub async fn flush_all(&mut self) -> usize {
        let due = self.drafts.take_all();
        self.write_drafts(due).await
    }

    async fn write_drafts(&mut self, due: Vec<(ContextKey, String)>) -> usize {
        let mut written = 0;
        for (key, json) in due {
            match self.cache.set(&key.draft_cache_key(), json).await {
                Ok(()) => {
                    written += 1;
                    log::debug!("💾 Draft written for {}", key);
                }
                Err(e) => {
                    let error = SyncError::DraftWriteFailed(e);
                    log::warn!("{} ({})", error, key);
                    self.warning = Some(SyncWarning::DraftWriteFailed(error.to_string()));
                }
            }
        }
        written
    }

    async fn delete_draft(&mut self, key: &ContextKey) {
        if let Err(e) = self.cache.delete(&key.draft_cache_key()).await {
            log::warn!("Could not delete draft for {}: {}", key, e);
            self.warning = Some(SyncWarning::DraftWriteFailed(e.to_string()));
        }
    }

    // ------------------------------------------------------------------
    // Saving
    // ------------------------------------------------------------------

    /// Capture the current document for saving.
    pub fn begin_save(&self) -> Result<SaveRequest, SyncError> {
        let state = self.state.as_ref().ok_or(SyncError::NoContext)?;
        if self.conflict.is_some() {
            return Err(SyncError::ConflictPending);
        }
        if !self.has_credential() {
            return Err(SyncError::Offline);
        }
        let token = self.token().ok_or(SyncError::NoContext)?;
        Ok(SaveRequest {
            token,
            payload: StoredDocument::from_document(&state.doc, now_millis()),
        })
    }

    /// Reconcile versions after a save attempt.
    ///
    /// On failure nothing changes: the draft and `server_version` stay put.
    pub async fn complete_save(
        &mut self,
        receipt: SaveReceipt,
        now: Instant,
    ) -> Result<u64, SyncError> {
        let SaveReceipt {
            token,
            version,
            result,
        } = receipt;
        let acknowledged = match result {
            Ok(acknowledged) => acknowledged,
            Err(e) => {
                let error = SyncError::SaveFailed(e);
                log::error!("{} ({} version {})", error, token.key, version);
                return Err(error);
            }
        };

        if !self.is_current(&token) {
            log::debug!("Save of {} acknowledged after leaving the context", token.key);
            self.retire_draft(&token.key, acknowledged).await;
            return Ok(acknowledged);
        }

        self.apply_action(Action::MarkSynced {
            acknowledged_version: acknowledged,
            saved_at: now_millis(),
        });
        self.drafts.cancel(&token.key);
        log::info!("✅ Saved {} (version {})", token.key, acknowledged);

        let unsynced = self
            .document()
            .is_some_and(DocumentModel::has_unsynced_changes);
        if unsynced {
            // Edited while the save was in flight.
            self.schedule_draft(now);
        } else {
            self.delete_draft(&token.key).await;
        }
        Ok(acknowledged)
    }

    /// Drop the pending write and cached draft of a context that is no
    /// longer open, unless they hold edits newer than `acknowledged`.
    async fn retire_draft(&mut self, key: &ContextKey, acknowledged: u64) {
        let covered = |doc: &DocumentModel| doc.client_version <= acknowledged;

        let pending_covered = self
            .drafts
            .pending_value(key)
            .map(|json| DocumentModel::from_json(json).is_ok_and(|doc| covered(&doc)));
        match pending_covered {
            Some(true) => {
                self.drafts.cancel(key);
            }
            // A newer edit is still queued and will replace the cached draft.
            Some(false) => return,
            None => {}
        }

        match get_json::<C, DocumentModel>(&self.cache, &key.draft_cache_key()).await {
            Ok(Some(draft)) if covered(&draft) => self.delete_draft(key).await,
            Ok(_) => {}
            Err(e) => log::warn!("Draft for {} unreadable: {}", key, e),
        }
    }

    /// Save the current document and reconcile versions.
    pub async fn save(&mut self, now: Instant) -> Result<u64, SyncError> {
        let request = self.begin_save()?;
        let receipt = request.send(&self.store).await;
        self.complete_save(receipt, now).await
    }
}

fn prompt_for(draft: &DocumentModel) -> ConflictPrompt {
    ConflictPrompt {
        key: draft.context_key.clone(),
        draft_client_version: draft.client_version,
        draft_server_version: draft.server_version,
        draft_saved_at: draft.last_saved_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, set_json};
    use crate::model::ChartFit;
    use crate::store::MemoryDocumentStore;

    type Engine = SyncEngine<MemoryCache, MemoryDocumentStore>;

    fn engine() -> (Engine, MemoryCache, MemoryDocumentStore) {
        let cache = MemoryCache::new();
        let store = MemoryDocumentStore::new();
        let mut engine = SyncEngine::new(cache.clone(), store.clone());
        engine.set_credential(Some("token".into()));
        (engine, cache, store)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn seed_server(store: &MemoryDocumentStore, key: &ContextKey, fit: ChartFit) {
        let mut doc = DocumentModel::new(key.clone());
        doc.fit = fit;
        doc.client_version = 2;
        pollster::block_on(store.save(key, &StoredDocument::from_document(&doc, 1))).unwrap();
    }

    fn seed_draft(cache: &MemoryCache, key: &ContextKey, fit: ChartFit, client: u64, server: u64) {
        let mut draft = DocumentModel::new(key.clone());
        draft.fit = fit;
        draft.client_version = client;
        draft.server_version = server;
        draft.last_saved_at = Some(99);
        pollster::block_on(set_json(cache, &key.draft_cache_key(), &draft)).unwrap();
    }

    #[test]
    fn test_newer_draft_raises_conflict_and_restores() {
        let (mut engine, cache, store) = engine();
        let key = ContextKey::framed("c1", "f1");
        let server_fit = ChartFit::new(1.0, 1.0, 1.0, 0.0);
        let draft_fit = ChartFit::new(5.0, 5.0, 2.0, 10.0);
        seed_server(&store, &key, server_fit);
        seed_draft(&cache, &key, draft_fit, 5, 2);

        let outcome = pollster::block_on(engine.open_context(key.clone()));
        let ContextOutcome::ConflictPending(prompt) = outcome else {
            panic!("expected a conflict, got {:?}", outcome);
        };
        assert_eq!(prompt.draft_client_version, 5);
        assert_eq!(prompt.draft_server_version, 2);
        assert_eq!(prompt.draft_saved_at, Some(99));
        // Baseline shown while the prompt is open
        assert_eq!(engine.document().unwrap().fit, server_fit);

        pollster::block_on(engine.resolve_conflict(ConflictChoice::Restore, Instant::now())).unwrap();
        let doc = engine.document().unwrap();
        assert_eq!(doc.fit, draft_fit);
        assert_eq!(doc.client_version, 5);
        assert_eq!(doc.server_version, 2);
        assert_eq!(engine.status(), SyncStatus::UnsavedChanges);
        assert!(cache.contains(&key.draft_cache_key()));
        assert!(engine.conflict().is_none());
    }

    #[test]
    fn test_discard_deletes_draft_and_keeps_baseline() {
        let (mut engine, cache, store) = engine();
        let key = ContextKey::framed("c1", "f1");
        let server_fit = ChartFit::new(1.0, 1.0, 1.0, 0.0);
        seed_server(&store, &key, server_fit);
        seed_draft(&cache, &key, ChartFit::new(9.0, 9.0, 1.0, 0.0), 3, 1);

        pollster::block_on(engine.open_context(key.clone()));
        pollster::block_on(engine.resolve_conflict(ConflictChoice::Discard, Instant::now())).unwrap();

        assert!(!cache.contains(&key.draft_cache_key()));
        assert_eq!(engine.document().unwrap().fit, server_fit);
        assert!(!engine.document().unwrap().has_unsynced_changes());
    }

    #[test]
    fn test_resolve_without_conflict_fails() {
        let (mut engine, _, _) = engine();
        pollster::block_on(engine.open_context(ContextKey::chart_only("c")));
        let result =
            pollster::block_on(engine.resolve_conflict(ConflictChoice::Restore, Instant::now()));
        assert!(matches!(result, Err(SyncError::NoPendingConflict)));
    }

    #[test]
    fn test_synced_draft_is_deleted_on_open() {
        let (mut engine, cache, _) = engine();
        let key = ContextKey::chart_only("c1");
        seed_draft(&cache, &key, ChartFit::identity(), 2, 2);

        let outcome = pollster::block_on(engine.open_context(key.clone()));
        assert_eq!(outcome, ContextOutcome::Loaded);
        assert!(!cache.contains(&key.draft_cache_key()));
    }

    #[test]
    fn test_rapid_edits_write_one_draft() {
        let (mut engine, cache, _) = engine();
        let key = ContextKey::framed("c1", "f1");
        pollster::block_on(engine.open_context(key.clone()));

        let t0 = Instant::now();
        for (i, offset) in [0, 100, 200].into_iter().enumerate() {
            let fit = ChartFit::new(i as f64, 0.0, 1.0, 0.0);
            assert!(engine.dispatch(Action::SetFit(fit), t0 + ms(offset)));
        }
        assert_eq!(engine.pending_draft_writes(), 1);

        // Quiet interval restarts with every edit.
        assert_eq!(pollster::block_on(engine.flush_due(t0 + ms(500))), 0);
        assert_eq!(pollster::block_on(engine.flush_due(t0 + ms(700))), 1);
        assert_eq!(cache.write_count(), 1);

        let draft: DocumentModel =
            serde_json::from_str(&cache.peek(&key.draft_cache_key()).unwrap()).unwrap();
        assert_eq!(draft.client_version, 3);
        assert_eq!(draft.fit.dx, 2.0);
    }

    #[test]
    fn test_save_then_reload_round_trips() {
        let (mut engine, cache, store) = engine();
        let key = ContextKey::framed("c1", "f1");
        pollster::block_on(engine.open_context(key.clone()));

        let t0 = Instant::now();
        let fit = ChartFit::new(3.0, -2.0, 1.5, 7.0);
        engine.dispatch(Action::SetFit(fit), t0);
        pollster::block_on(engine.flush_all());
        assert!(cache.contains(&key.draft_cache_key()));

        let acknowledged = pollster::block_on(engine.save(t0)).unwrap();
        assert_eq!(acknowledged, 1);
        assert_eq!(engine.status(), SyncStatus::Saved);
        assert!(!cache.contains(&key.draft_cache_key()));

        let mut reopened = SyncEngine::new(cache.clone(), store.clone());
        let outcome = pollster::block_on(reopened.open_context(key));
        assert_eq!(outcome, ContextOutcome::Loaded);
        let doc = reopened.document().unwrap();
        assert_eq!(doc.fit, fit);
        assert_eq!(doc.client_version, doc.server_version);
    }

    #[test]
    fn test_failed_save_keeps_draft_and_versions() {
        let (mut engine, cache, store) = engine();
        let key = ContextKey::chart_only("c1");
        pollster::block_on(engine.open_context(key.clone()));

        let t0 = Instant::now();
        engine.dispatch(Action::SetFit(ChartFit::new(1.0, 0.0, 1.0, 0.0)), t0);
        pollster::block_on(engine.flush_all());

        store.set_offline(true);
        let result = pollster::block_on(engine.save(t0));
        assert!(matches!(result, Err(SyncError::SaveFailed(_))));

        let doc = engine.document().unwrap();
        assert_eq!(doc.server_version, 0);
        assert_eq!(doc.client_version, 1);
        assert!(cache.contains(&key.draft_cache_key()));
        assert_eq!(engine.status(), SyncStatus::UnsavedChanges);
    }

    #[test]
    fn test_save_without_credential_is_offline() {
        let (mut engine, _, store) = engine();
        engine.set_credential(None);
        pollster::block_on(engine.open_context(ContextKey::chart_only("c1")));
        engine.dispatch(Action::SetFit(ChartFit::new(1.0, 0.0, 1.0, 0.0)), Instant::now());

        assert_eq!(engine.status(), SyncStatus::Offline);
        let result = pollster::block_on(engine.save(Instant::now()));
        assert!(matches!(result, Err(SyncError::Offline)));
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_stale_load_is_discarded() {
        let (mut engine, _, store) = engine();
        let first = ContextKey::framed("c1", "f1");
        let second = ContextKey::framed("c1", "f2");
        seed_server(&store, &first, ChartFit::new(8.0, 8.0, 1.0, 0.0));

        let token = engine.begin_context(first);
        let load = engine.loader(&token);
        pollster::block_on(engine.open_context(second.clone()));

        let loaded = pollster::block_on(load.fetch());
        assert_eq!(pollster::block_on(engine.finish_context(loaded)), ContextOutcome::Stale);
        assert_eq!(engine.context(), Some(&second));
        assert_eq!(engine.document().unwrap().fit, ChartFit::identity());
        assert!(!engine.is_current(&token));
    }

    #[test]
    fn test_draft_writes_suspended_during_conflict() {
        let (mut engine, cache, store) = engine();
        let key = ContextKey::chart_only("c1");
        seed_server(&store, &key, ChartFit::identity());
        seed_draft(&cache, &key, ChartFit::new(4.0, 0.0, 1.0, 0.0), 4, 1);
        pollster::block_on(engine.open_context(key));

        engine.dispatch(Action::SetFit(ChartFit::new(2.0, 0.0, 1.0, 0.0)), Instant::now());
        assert_eq!(engine.pending_draft_writes(), 0);
        assert!(matches!(
            pollster::block_on(engine.save(Instant::now())),
            Err(SyncError::ConflictPending)
        ));
    }

    #[test]
    fn test_edit_during_save_stays_unsynced() {
        let (mut engine, cache, store) = engine();
        let key = ContextKey::chart_only("c1");
        pollster::block_on(engine.open_context(key.clone()));
        let t0 = Instant::now();
        engine.dispatch(Action::SetFit(ChartFit::new(1.0, 0.0, 1.0, 0.0)), t0);

        let request = engine.begin_save().unwrap();
        engine.dispatch(Action::SetFit(ChartFit::new(2.0, 0.0, 1.0, 0.0)), t0);
        let receipt = pollster::block_on(request.send(&store));
        assert_eq!(pollster::block_on(engine.complete_save(receipt, t0)).unwrap(), 1);

        let doc = engine.document().unwrap();
        assert_eq!(doc.server_version, 1);
        assert_eq!(doc.client_version, 2);
        assert_eq!(engine.pending_draft_writes(), 1);
        pollster::block_on(engine.flush_all());
        assert!(cache.contains(&key.draft_cache_key()));
    }

    #[test]
    fn test_save_acknowledged_after_switch_deletes_draft() {
        let (mut engine, cache, store) = engine();
        let first = ContextKey::framed("c1", "a");
        let fit = ChartFit::new(6.0, 1.0, 1.0, 0.0);
        pollster::block_on(engine.open_context(first.clone()));
        engine.dispatch(Action::SetFit(fit), Instant::now());
        pollster::block_on(engine.flush_all());

        let request = engine.begin_save().unwrap();
        pollster::block_on(engine.open_context(ContextKey::framed("c1", "b")));
        let receipt = pollster::block_on(request.send(&store));
        assert_eq!(
            pollster::block_on(engine.complete_save(receipt, Instant::now())).unwrap(),
            1
        );
        assert!(!cache.contains(&first.draft_cache_key()));

        let outcome = pollster::block_on(engine.open_context(first));
        assert_eq!(outcome, ContextOutcome::Loaded);
        assert_eq!(engine.document().unwrap().fit, fit);
    }

    #[test]
    fn test_late_acknowledgement_cancels_queued_draft_write() {
        let (mut engine, cache, store) = engine();
        let first = ContextKey::framed("c1", "a");
        pollster::block_on(engine.open_context(first.clone()));
        engine.dispatch(Action::SetFit(ChartFit::new(2.0, 0.0, 1.0, 0.0)), Instant::now());

        let request = engine.begin_save().unwrap();
        pollster::block_on(engine.open_context(ContextKey::framed("c1", "b")));
        assert_eq!(engine.pending_draft_writes(), 1);
        let receipt = pollster::block_on(request.send(&store));
        pollster::block_on(engine.complete_save(receipt, Instant::now())).unwrap();

        assert_eq!(engine.pending_draft_writes(), 0);
        pollster::block_on(engine.flush_all());
        assert!(!cache.contains(&first.draft_cache_key()));
    }

    #[test]
    fn test_late_acknowledgement_keeps_newer_draft() {
        let (mut engine, cache, store) = engine();
        let first = ContextKey::framed("c1", "a");
        pollster::block_on(engine.open_context(first.clone()));
        let t0 = Instant::now();
        engine.dispatch(Action::SetFit(ChartFit::new(1.0, 0.0, 1.0, 0.0)), t0);
        let request = engine.begin_save().unwrap();
        engine.dispatch(Action::SetFit(ChartFit::new(2.0, 0.0, 1.0, 0.0)), t0);
        pollster::block_on(engine.flush_all());

        pollster::block_on(engine.open_context(ContextKey::framed("c1", "b")));
        let receipt = pollster::block_on(request.send(&store));
        pollster::block_on(engine.complete_save(receipt, t0)).unwrap();

        let draft: DocumentModel =
            serde_json::from_str(&cache.peek(&first.draft_cache_key()).unwrap()).unwrap();
        assert_eq!(draft.client_version, 2);
    }

    #[derive(Debug, Clone)]
    struct BrokenCache;

    impl DurableCache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: String) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("quota exceeded".into()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Ok(())
        }
    }

    #[test]
    fn test_draft_write_failure_is_a_warning() {
        let mut engine = SyncEngine::new(BrokenCache, MemoryDocumentStore::new());
        pollster::block_on(engine.open_context(ContextKey::chart_only("c1")));
        engine.dispatch(Action::SetFit(ChartFit::new(1.0, 0.0, 1.0, 0.0)), Instant::now());

        assert_eq!(pollster::block_on(engine.flush_all()), 0);
        assert!(matches!(
            engine.warning(),
            Some(SyncWarning::DraftWriteFailed(_))
        ));
        assert_eq!(engine.document().unwrap().client_version, 1);
    }

    #[test]
    fn test_dispatch_without_context_is_ignored() {
        let (mut engine, _, _) = engine();
        assert!(!engine.dispatch(Action::ResetToInitial, Instant::now()));
        assert!(matches!(engine.begin_save(), Err(SyncError::NoContext)));
    }
}
