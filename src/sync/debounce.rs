//! Keyed coalescing debounce timers.
//!
//! Each key has at most one pending task. Scheduling again before the quiet
//! interval has elapsed cancels the previous task and starts a new interval,
//! so only the last value of a burst is ever delivered.
//!
//! Timers are deadline-based and driven by the caller's event loop through
//! [`Debouncer::take_due`]; nothing runs in the background.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use web_time::Instant;

#[derive(Debug, Clone)]
struct Pending<V> {
    deadline: Instant,
    value: V,
}

/// Pending debounced tasks, one per key.
#[derive(Debug, Clone)]
pub struct Debouncer<K, V> {
    /// Quiet interval after the last trigger before a task fires.
    delay: Duration,

    /// Pending tasks by key.
    pending: HashMap<K, Pending<V>>,
}

impl<K: Eq + Hash + Clone, V> Debouncer<K, V> {
    /// Create a debouncer with the given quiet interval.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    /// The configured quiet interval.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `value` for `key`, replacing and rescheduling any pending task.
    pub fn schedule(&mut self, key: K, value: V, now: Instant) {
        let deadline = now + self.delay;
        if self.pending.insert(key, Pending { deadline, value }).is_some() {
            log::trace!("Debounce: rescheduled pending task");
        }
    }

    /// Push back the deadline of a pending task, keeping its value.
    ///
    /// Returns false if nothing was pending for `key`.
    pub fn extend(&mut self, key: &K, now: Instant) -> bool {
        match self.pending.get_mut(key) {
            Some(pending) => {
                pending.deadline = now + self.delay;
                true
            }
            None => false,
        }
    }

    /// Cancel the pending task for `key`, returning its value.
    pub fn cancel(&mut self, key: &K) -> Option<V> {
        self.pending.remove(key).map(|p| p.value)
    }

    /// Whether a task is pending for `key`.
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Borrow the value pending for `key`.
    pub fn pending_value(&self, key: &K) -> Option<&V> {
        self.pending.get(key).map(|p| &p.value)
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no task is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest pending deadline, for scheduling the next wake-up.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Remove and return every task whose quiet interval has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, V)> {
        let due: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, _)| k.clone())
            .collect();
        due.into_iter()
            .filter_map(|key| self.pending.remove(&key).map(|p| (key, p.value)))
            .collect()
    }

    /// Remove and return every pending task regardless of deadline.
    pub fn take_all(&mut self) -> Vec<(K, V)> {
        self.pending.drain().map(|(k, p)| (k, p.value)).collect()
    }

    /// Drop every pending task.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(400);

    #[test]
    fn test_initial_state() {
        let debouncer: Debouncer<&str, u32> = Debouncer::new(DELAY);
        assert!(debouncer.is_empty());
        assert_eq!(debouncer.next_deadline(), None);
        assert_eq!(debouncer.delay(), DELAY);
    }

    #[test]
    fn test_not_due_before_quiet_interval() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.schedule("a", 1, start);
        assert!(debouncer.take_due(start + Duration::from_millis(399)).is_empty());
        assert_eq!(debouncer.take_due(start + DELAY), vec![("a", 1)]);
        assert!(debouncer.is_empty());
    }

    #[test]
    fn test_reschedule_coalesces_to_last_value() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.schedule("a", 1, start);
        debouncer.schedule("a", 2, start + Duration::from_millis(300));

        // The first deadline has passed but the task was rescheduled.
        assert!(debouncer.take_due(start + DELAY).is_empty());

        let due = debouncer.take_due(start + Duration::from_millis(700));
        assert_eq!(due, vec![("a", 2)]);
    }

    #[test]
    fn test_keys_are_independent() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.schedule("a", 1, start);
        debouncer.schedule("b", 2, start + Duration::from_millis(200));

        assert_eq!(debouncer.take_due(start + DELAY), vec![("a", 1)]);
        assert!(debouncer.is_pending(&"b"));
    }

    #[test]
    fn test_extend_keeps_value() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.schedule("a", 1, start);
        assert!(debouncer.extend(&"a", start + Duration::from_millis(300)));
        assert!(!debouncer.extend(&"b", start));
        assert!(debouncer.take_due(start + DELAY).is_empty());
        assert_eq!(debouncer.pending_value(&"a"), Some(&1));
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.schedule("a", 1, start);
        assert_eq!(debouncer.cancel(&"a"), Some(1));
        assert_eq!(debouncer.cancel(&"a"), None);
        assert!(debouncer.take_due(start + DELAY).is_empty());
    }
}
