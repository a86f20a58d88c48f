/// Ordered-map event queue.
///
/// `EventKey` orders by `(time, uid)`, so a `BTreeMap` keyed on it is
/// already a priority queue with O(log n) removal.

use std::collections::BTreeMap;

use super::{EventQueue, QueueEntry};
use crate::event::EventKey;

#[derive(Debug, Clone, Default)]
pub struct MapQueue {
    entries: BTreeMap<EventKey, u32>,
}

impl MapQueue {
    pub fn new() -> Self {
        MapQueue {
            entries: BTreeMap::new(),
        }
    }
}

impl EventQueue for MapQueue {
    fn insert(&mut self, entry: QueueEntry) {
        let prev = self.entries.insert(entry.key, entry.slot);
        debug_assert!(prev.is_none(), "duplicate key {:?} in map", entry.key);
    }

    fn peek(&self) -> Option<QueueEntry> {
        self.entries
            .first_key_value()
            .map(|(key, slot)| QueueEntry::new(*key, *slot))
    }

    fn pop(&mut self) -> Option<QueueEntry> {
        self.entries
            .pop_first()
            .map(|(key, slot)| QueueEntry::new(key, slot))
    }

    fn remove(&mut self, key: &EventKey) -> Option<QueueEntry> {
        self.entries
            .remove(key)
            .map(|slot| QueueEntry::new(*key, slot))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}
