//! Bounded change history
//!
//! Keeps the newest change events for the change log pane. Retention is the
//! only policy here; nothing is persisted.

use crate::constants::DEFAULT_CHANGE_LOG_SIZE;
use crate::diff::ChangeEvent;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Receiver of change events, in the order a comparison produced them
pub trait ChangeSink: Send {
    fn append_changes(&mut self, events: &[ChangeEvent]);
}

/// Newest-first list of the last `capacity` changes
#[derive(Debug, Clone)]
pub struct ChangeLog {
    entries: VecDeque<ChangeEvent>,
    capacity: usize,
    total: u64,
}

impl Default for ChangeLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CHANGE_LOG_SIZE)
    }
}

impl ChangeLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            total: 0,
        }
    }

    /// Record one event as the newest entry
    pub fn push(&mut self, event: ChangeEvent) {
        self.entries.push_front(event);
        self.entries.truncate(self.capacity);
        self.total += 1;
    }

    /// Entries, newest first
    pub fn iter(&self) -> impl Iterator<Item = &ChangeEvent> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events recorded since the last clear, including evicted ones
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total = 0;
    }
}

impl ChangeSink for ChangeLog {
    fn append_changes(&mut self, events: &[ChangeEvent]) {
        for event in events {
            self.push(event.clone());
        }
    }
}

impl ChangeSink for Arc<Mutex<ChangeLog>> {
    fn append_changes(&mut self, events: &[ChangeEvent]) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append_changes(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{ResourceState, StateCache};
    use crate::snapshot::NodeSnapshot;
    use chrono::Utc;

    fn added(name: &str) -> ChangeEvent {
        let cache = StateCache::new();
        let node = Arc::new(NodeSnapshot::new(name, true, "v1.30.0", Utc::now()));
        cache
            .compare(name, ResourceState::present(node, Utc::now()))
            .remove(0)
    }

    #[test]
    fn test_newest_first_and_bounded() {
        let mut log = ChangeLog::with_capacity(3);
        let events: Vec<ChangeEvent> = ["a", "b", "c", "d"].iter().map(|n| added(n)).collect();
        log.append_changes(&events);

        let keys: Vec<&str> = log.iter().map(|e| e.resource_key.as_str()).collect();
        assert_eq!(keys, vec!["d", "c", "b"]);
        assert_eq!(log.len(), 3);
        assert_eq!(log.total(), 4);
    }

    #[test]
    fn test_shared_log_is_a_sink() {
        let shared = Arc::new(Mutex::new(ChangeLog::default()));
        let mut sink = Arc::clone(&shared);
        sink.append_changes(&[added("n1")]);

        let log = shared.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.capacity(), DEFAULT_CHANGE_LOG_SIZE);
    }

    #[test]
    fn test_clear_resets_total() {
        let mut log = ChangeLog::with_capacity(2);
        log.append_changes(&[added("a"), added("b"), added("c")]);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.total(), 0);

        log.push(added("d"));
        assert_eq!(log.total(), 1);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut log = ChangeLog::with_capacity(0);
        log.push(added("a"));
        log.push(added("b"));
        assert_eq!(log.len(), 1);
    }
}
