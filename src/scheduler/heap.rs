/// Indexed binary min-heap keyed by `(time, uid)`.
///
/// A plain `BinaryHeap` cannot remove an arbitrary element, so this heap
/// keeps its own array plus a `uid -> position` index that every swap
/// maintains. Keys are unique, so there are no ties inside the heap and
/// the pop order is fully determined by `(time, uid)`.

use std::collections::HashMap;

use super::{EventQueue, QueueEntry};
use crate::event::EventKey;

#[derive(Debug, Clone, Default)]
pub struct HeapQueue {
    heap: Vec<QueueEntry>,
    /// Position of each uid inside `heap`.
    positions: HashMap<u64, usize>,
}

impl HeapQueue {
    pub fn new() -> Self {
        HeapQueue {
            heap: Vec::new(),
            positions: HashMap::new(),
        }
    }

    #[inline]
    fn less(&self, a: usize, b: usize) -> bool {
        self.heap[a].key < self.heap[b].key
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.positions.insert(self.heap[a].key.uid, a);
        self.positions.insert(self.heap[b].key.uid, b);
    }

    /// Move the entry at `i` toward the root. Returns its final position.
    fn sift_up(&mut self, mut i: usize) -> usize {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !self.less(i, parent) {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
        i
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * i + 1;
            let right = left + 1;
            let mut smallest = i;
            if left < len && self.less(left, smallest) {
                smallest = left;
            }
            if right < len && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }

    /// Remove the entry at position `i`, restoring heap order.
    fn remove_at(&mut self, i: usize) -> QueueEntry {
        let last = self.heap.len() - 1;
        if i != last {
            self.swap(i, last);
        }
        let removed = match self.heap.pop() {
            Some(e) => e,
            None => unreachable!("remove_at on an empty heap"),
        };
        self.positions.remove(&removed.key.uid);

        if i < self.heap.len() && self.sift_up(i) == i {
            self.sift_down(i);
        }
        removed
    }

    /// Check the heap property and the position index. Test helper.
    #[cfg(test)]
    fn assert_invariants(&self) {
        assert_eq!(self.heap.len(), self.positions.len());
        for (i, e) in self.heap.iter().enumerate() {
            assert_eq!(self.positions.get(&e.key.uid), Some(&i));
            if i > 0 {
                let parent = (i - 1) / 2;
                assert!(self.heap[parent].key < e.key, "heap order broken at {i}");
            }
        }
    }
}

impl EventQueue for HeapQueue {
    fn insert(&mut self, entry: QueueEntry) {
        debug_assert!(
            !self.positions.contains_key(&entry.key.uid),
            "duplicate uid {} in heap",
            entry.key.uid
        );
        let i = self.heap.len();
        self.heap.push(entry);
        self.positions.insert(entry.key.uid, i);
        self.sift_up(i);
    }

    fn peek(&self) -> Option<QueueEntry> {
        self.heap.first().copied()
    }

    fn pop(&mut self) -> Option<QueueEntry> {
        if self.heap.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    fn remove(&mut self, key: &EventKey) -> Option<QueueEntry> {
        let i = *self.positions.get(&key.uid)?;
        if self.heap[i].key != *key {
            return None;
        }
        Some(self.remove_at(i))
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn clear(&mut self) {
        self.heap = Vec::new();
        self.positions = HashMap::new();
    }
}
