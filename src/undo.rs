//! Undo/Redo history for the editable slice of a document.
//!
//! History is snapshot-based: a watcher observes the current
//! [`HistorySnapshot`] after every change, and once the document has been
//! quiet for the debounce interval the snapshot from *before* the burst of
//! changes is pushed onto the undo stack. Applying an undo/redo entry is
//! tagged by the caller (see [`crate::state::Action::ApplyHistory`]) and
//! re-bases the watcher so the applied entry is not recorded again.

use std::time::Duration;
use web_time::Instant;

use crate::constants::{DEFAULT_HISTORY_CAPACITY, DEFAULT_HISTORY_DEBOUNCE_MS};
use crate::state::HistorySnapshot;
use crate::sync::Debouncer;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the history stacks
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Maximum number of snapshots kept in the undo stack
    pub max_history: usize,
    /// Quiet interval before a change is recorded
    pub debounce: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_HISTORY_CAPACITY,
            debounce: Duration::from_millis(DEFAULT_HISTORY_DEBOUNCE_MS),
        }
    }
}

// ============================================================================
// History Manager
// ============================================================================

/// The undo/redo history of one editing context.
///
/// Maintains two stacks:
/// - `past`: snapshots that can be returned to with undo (most recent at the end)
/// - `future`: snapshots that can be returned to with redo (most recent at the end)
///
/// Recording a new change clears `future`.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    past: Vec<HistorySnapshot>,
    future: Vec<HistorySnapshot>,
    config: HistoryConfig,
    /// Last snapshot the watcher has seen
    observed: Option<HistorySnapshot>,
    /// Snapshot from before the current burst of changes
    pending: Debouncer<(), HistorySnapshot>,
}

impl HistoryManager {
    /// Create a history with default configuration
    pub fn new() -> Self {
        Self::with_config(HistoryConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(config: HistoryConfig) -> Self {
        Self {
            past: Vec::new(),
            future: Vec::new(),
            pending: Debouncer::new(config.debounce),
            observed: None,
            config,
        }
    }

    /// Report the current snapshot after a change that did not come from
    /// undo/redo. The first observation only establishes the baseline.
    pub fn observe(&mut self, current: &HistorySnapshot, now: Instant) {
        let Some(observed) = self.observed.as_ref() else {
            self.observed = Some(current.clone());
            return;
        };
        if observed == current {
            return;
        }

        let previous = self.observed.replace(current.clone());
        if !self.pending.extend(&(), now) {
            if let Some(previous) = previous {
                self.pending.schedule((), previous, now);
            }
        }
    }

    /// Record the pending change once its quiet interval has elapsed.
    ///
    /// Returns true if a snapshot was pushed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut pushed = false;
        for ((), previous) in self.pending.take_due(now) {
            pushed |= self.commit(previous);
        }
        pushed
    }

    /// Record the pending change immediately, if any.
    pub fn flush(&mut self) -> bool {
        let mut pushed = false;
        for ((), previous) in self.pending.take_all() {
            pushed |= self.commit(previous);
        }
        pushed
    }

    fn commit(&mut self, previous: HistorySnapshot) -> bool {
        // A burst that ended where it started is not a change.
        if self.observed.as_ref() == Some(&previous) {
            return false;
        }
        self.past.push(previous);
        self.future.clear();

        // Limit history size
        while self.past.len() > self.config.max_history {
            self.past.remove(0);
        }
        log::debug!("📝 History: recorded snapshot ({} undo steps)", self.past.len());
        true
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty() || self.pending.is_pending(&())
    }

    /// Check if redo is available
    ///
    /// A pending change will clear the redo stack when it is recorded, so
    /// it blocks redo already.
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty() && !self.has_pending_change()
    }

    fn has_pending_change(&self) -> bool {
        self.pending
            .pending_value(&())
            .is_some_and(|previous| self.observed.as_ref() != Some(previous))
    }

    /// Step back. `current` is the snapshot being left; it becomes redoable.
    ///
    /// Returns the snapshot to apply, or None if there is nothing to undo.
    pub fn undo(&mut self, current: &HistorySnapshot) -> Option<HistorySnapshot> {
        self.flush();
        let previous = self.past.pop()?;
        self.future.push(current.clone());
        self.observed = Some(previous.clone());
        log::debug!("⏪ Undo ({} left)", self.past.len());
        Some(previous)
    }

    /// Step forward. `current` is the snapshot being left; it becomes undoable.
    ///
    /// Returns the snapshot to apply, or None if there is nothing to redo.
    pub fn redo(&mut self, current: &HistorySnapshot) -> Option<HistorySnapshot> {
        self.flush();
        let next = self.future.pop()?;
        self.past.push(current.clone());
        self.observed = Some(next.clone());
        log::debug!("⏩ Redo ({} left)", self.future.len());
        Some(next)
    }

    /// Accept `current` as the baseline without recording a step.
    pub fn rebase(&mut self, current: &HistorySnapshot) {
        self.pending.clear();
        self.observed = Some(current.clone());
    }

    /// Clear all history (editing context changed)
    pub fn reset(&mut self) {
        self.past.clear();
        self.future.clear();
        self.pending.clear();
        self.observed = None;
        log::debug!("🗑️ History cleared");
    }

    /// Get the number of snapshots in undo history
    pub fn undo_count(&self) -> usize {
        self.past.len()
    }

    /// Get the number of snapshots in redo history
    pub fn redo_count(&self) -> usize {
        self.future.len()
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChartFit, ElementOverride};

    const DEBOUNCE: Duration = Duration::from_millis(300);

    fn snap(dx: f64) -> HistorySnapshot {
        HistorySnapshot {
            fit: ChartFit::new(dx, 0.0, 1.0, 0.0),
            ..Default::default()
        }
    }

    /// Observe `snapshot` and let the debounce interval pass.
    fn settle(history: &mut HistoryManager, snapshot: &HistorySnapshot, at: &mut Instant) {
        history.observe(snapshot, *at);
        *at += DEBOUNCE;
        history.poll(*at);
    }

    #[test]
    fn test_first_observation_is_baseline() {
        let mut history = HistoryManager::new();
        let mut at = Instant::now();
        settle(&mut history, &snap(0.0), &mut at);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_change_recorded_after_quiet_interval() {
        let mut history = HistoryManager::new();
        let start = Instant::now();
        history.observe(&snap(0.0), start);
        history.observe(&snap(1.0), start);
        assert!(!history.poll(start + Duration::from_millis(299)));
        assert!(history.poll(start + DEBOUNCE));
        assert_eq!(history.undo_count(), 1);
    }

    #[test]
    fn test_burst_records_single_step() {
        let mut history = HistoryManager::new();
        let start = Instant::now();
        history.observe(&snap(0.0), start);
        for i in 1..=5 {
            history.observe(&snap(f64::from(i)), start + Duration::from_millis(100 * i as u64));
        }
        history.poll(start + Duration::from_millis(500) + DEBOUNCE);
        assert_eq!(history.undo_count(), 1);

        let back = history.undo(&snap(5.0)).unwrap();
        assert_eq!(back, snap(0.0));
    }

    #[test]
    fn test_burst_returning_to_start_is_not_recorded() {
        let mut history = HistoryManager::new();
        let start = Instant::now();
        history.observe(&snap(0.0), start);
        history.observe(&snap(1.0), start);
        history.observe(&snap(0.0), start);
        history.poll(start + DEBOUNCE);
        assert_eq!(history.undo_count(), 0);
    }

    #[test]
    fn test_n_mutations_then_n_undos_restore_original() {
        let mut history = HistoryManager::new();
        let mut at = Instant::now();
        settle(&mut history, &snap(0.0), &mut at);

        for i in 1..=4 {
            settle(&mut history, &snap(f64::from(i)), &mut at);
        }
        let mut current = snap(4.0);
        assert_eq!(history.undo_count(), 4);

        for _ in 0..4 {
            current = history.undo(&current).unwrap();
        }
        assert_eq!(current, snap(0.0));
        assert!(!history.can_undo());
        assert_eq!(history.redo_count(), 4);
    }

    #[test]
    fn test_undo_then_redo_restores_mutation() {
        let mut history = HistoryManager::new();
        let mut at = Instant::now();
        settle(&mut history, &snap(0.0), &mut at);

        let mut mutated = snap(0.0);
        mutated
            .overrides
            .insert("sun".into(), ElementOverride::colored("#fff"));
        settle(&mut history, &mutated, &mut at);

        let undone = history.undo(&mutated).unwrap();
        assert_eq!(undone, snap(0.0));
        let redone = history.redo(&undone).unwrap();
        assert_eq!(redone, mutated);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_applied_entry_is_not_recorded_again() {
        let mut history = HistoryManager::new();
        let mut at = Instant::now();
        settle(&mut history, &snap(0.0), &mut at);
        settle(&mut history, &snap(1.0), &mut at);

        let undone = history.undo(&snap(1.0)).unwrap();
        // The watcher sees the applied snapshot: no new step.
        settle(&mut history, &undone, &mut at);
        assert_eq!(history.undo_count(), 0);
        assert_eq!(history.redo_count(), 1);
    }

    #[test]
    fn test_undo_commits_pending_change_first() {
        let mut history = HistoryManager::new();
        let start = Instant::now();
        history.observe(&snap(0.0), start);
        history.observe(&snap(1.0), start);
        assert!(history.can_undo());
        assert_eq!(history.undo(&snap(1.0)), Some(snap(0.0)));
    }

    #[test]
    fn test_new_change_clears_redo() {
        let mut history = HistoryManager::new();
        let mut at = Instant::now();
        settle(&mut history, &snap(0.0), &mut at);
        settle(&mut history, &snap(1.0), &mut at);
        let undone = history.undo(&snap(1.0)).unwrap();
        assert!(history.can_redo());

        settle(&mut history, &undone, &mut at);
        settle(&mut history, &snap(2.0), &mut at);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_redo_after_pending_edit_is_unavailable() {
        let mut history = HistoryManager::new();
        let mut at = Instant::now();
        settle(&mut history, &snap(0.0), &mut at);
        settle(&mut history, &snap(1.0), &mut at);
        settle(&mut history, &snap(2.0), &mut at);

        let undone = history.undo(&snap(2.0)).unwrap();
        assert_eq!(undone, snap(1.0));
        settle(&mut history, &undone, &mut at);

        // New edit still inside its quiet interval
        history.observe(&snap(5.0), at);
        assert!(!history.can_redo());
        assert_eq!(history.redo(&snap(5.0)), None);

        // The edit was recorded in order: undo walks 5 -> 1 -> 0.
        at += DEBOUNCE;
        history.poll(at);
        let mut current = snap(5.0);
        let mut walk = Vec::new();
        while let Some(previous) = history.undo(&current) {
            walk.push(previous.fit.dx);
            current = previous;
        }
        assert_eq!(walk, vec![1.0, 0.0]);
    }

    #[test]
    fn test_max_history() {
        let mut history = HistoryManager::with_config(HistoryConfig {
            max_history: 3,
            debounce: DEBOUNCE,
        });
        let mut at = Instant::now();
        for i in 0..6 {
            settle(&mut history, &snap(f64::from(i)), &mut at);
        }
        assert_eq!(history.undo_count(), 3);
    }

    #[test]
    fn test_reset_empties_both_stacks() {
        let mut history = HistoryManager::new();
        let mut at = Instant::now();
        settle(&mut history, &snap(0.0), &mut at);
        settle(&mut history, &snap(1.0), &mut at);
        settle(&mut history, &snap(2.0), &mut at);
        history.undo(&snap(2.0));

        history.reset();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
