/// Sorted-list event queue.
///
/// Entries are kept in ascending `(time, uid)` order. Insertion searches
/// for its position and shifts; popping takes the front. Cheap when most
/// events are scheduled in time order, which is the common case for
/// timer-driven models.

use std::collections::VecDeque;

use super::{EventQueue, QueueEntry};
use crate::event::EventKey;

#[derive(Debug, Clone, Default)]
pub struct ListQueue {
    entries: VecDeque<QueueEntry>,
}

impl ListQueue {
    pub fn new() -> Self {
        ListQueue {
            entries: VecDeque::new(),
        }
    }

    fn position(&self, key: &EventKey) -> Result<usize, usize> {
        self.entries.binary_search_by(|e| e.key.cmp(key))
    }
}

impl EventQueue for ListQueue {
    fn insert(&mut self, entry: QueueEntry) {
        // Fast path: appending in time order.
        if self.entries.back().map_or(true, |last| last.key < entry.key) {
            self.entries.push_back(entry);
            return;
        }
        match self.position(&entry.key) {
            Ok(_) => debug_assert!(false, "duplicate key {:?} in list", entry.key),
            Err(at) => self.entries.insert(at, entry),
        }
    }

    fn peek(&self) -> Option<QueueEntry> {
        self.entries.front().copied()
    }

    fn pop(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    fn remove(&mut self, key: &EventKey) -> Option<QueueEntry> {
        let at = self.position(key).ok()?;
        self.entries.remove(at)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries = VecDeque::new();
    }
}
