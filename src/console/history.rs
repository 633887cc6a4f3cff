//! Bounded conversation history kept in the key-value store.

use serde_json::Value;

use crate::error::Result;
use crate::observability::HISTORY_EVICTIONS;
use crate::store::{HISTORY_KEY, Storage};
use crate::types::HistoryEntry;

/// Default number of turns kept.
pub const DEFAULT_HISTORY_SIZE: usize = 10;

/// A fixed-capacity FIFO log of conversation turns.
///
/// Every operation is a read-modify-write of the `history` key; two writers
/// racing on the same storage resolve last-writer-wins.
#[derive(Clone)]
pub struct History {
    storage: Storage,
    capacity: usize,
}

impl History {
    /// A history holding at most `capacity` entries (at least one).
    pub fn new(storage: Storage, capacity: usize) -> Self {
        Self {
            storage,
            capacity: capacity.max(1),
        }
    }

    /// The bound on the number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All entries, oldest first.
    pub fn all(&self) -> Vec<HistoryEntry> {
        match self.storage.get(HISTORY_KEY) {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => match serde_json::from_value(value) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(error = %err, "stored history is unreadable; treating as empty");
                    Vec::new()
                }
            },
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.all().len()
    }

    /// True when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    /// Record a turn, evicting the oldest entries beyond the bound.
    pub fn append(&self, entry: HistoryEntry) -> Result<()> {
        let mut entries = self.all();
        entries.push(entry);
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
            HISTORY_EVICTIONS.count(excess as u64);
        }
        self.store(&entries)
    }

    /// Drop every entry.
    pub fn clear(&self) -> Result<()> {
        self.store(&[])
    }

    fn store(&self, entries: &[HistoryEntry]) -> Result<()> {
        self.storage.set(HISTORY_KEY, serde_json::to_value(entries)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use serde_json::json;

    fn history(capacity: usize) -> History {
        History::new(Storage::in_memory(), capacity)
    }

    #[test]
    fn empty_by_default() {
        let history = history(DEFAULT_HISTORY_SIZE);
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 10);
    }

    #[test]
    fn keeps_the_most_recent_entries_in_order() {
        let history = history(3);
        for i in 0..7 {
            history.append(HistoryEntry::user(format!("m{i}"))).unwrap();
            assert!(history.len() <= 3);
        }
        let contents: Vec<_> = history.all().into_iter().map(|e| e.content).collect();
        assert_eq!(contents, vec!["m4", "m5", "m6"]);
    }

    #[test]
    fn bound_is_never_exceeded_for_any_prefix() {
        for capacity in 1..=12 {
            let history = history(capacity);
            for i in 0..25 {
                history.append(HistoryEntry::assistant(i.to_string())).unwrap();
                let all = history.all();
                let expected_len = (i + 1).min(capacity);
                assert_eq!(all.len(), expected_len);
                assert_eq!(all.last().map(|e| e.content.clone()), Some(i.to_string()));
            }
        }
    }

    #[test]
    fn clear_empties_history() {
        let history = history(DEFAULT_HISTORY_SIZE);
        history.append(HistoryEntry::user("a")).unwrap();
        history.append(HistoryEntry::assistant("b")).unwrap();
        history.clear().unwrap();
        assert_eq!(history.all(), Vec::new());
    }

    #[test]
    fn persisted_shape_matches_entries() {
        let storage = Storage::in_memory();
        let history = History::new(storage.clone(), DEFAULT_HISTORY_SIZE);
        history
            .append(HistoryEntry::user("hi").with_timestamp("t0"))
            .unwrap();
        assert_eq!(
            storage.get(HISTORY_KEY),
            Some(json!([{"role": "user", "content": "hi", "timestamp": "t0"}]))
        );
    }

    #[test]
    fn unreadable_history_is_treated_as_empty() {
        let storage = Storage::in_memory();
        storage.set(HISTORY_KEY, json!({"not": "a list"})).unwrap();
        let history = History::new(storage, DEFAULT_HISTORY_SIZE);
        assert!(history.all().is_empty());
        history.append(HistoryEntry::user("fresh")).unwrap();
        assert_eq!(history.all()[0].role, Role::User);
    }
}
