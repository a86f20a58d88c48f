//! Event queues: the ordering structures behind the kernel.
//!
//! Every queue orders [`QueueEntry`]s by `(time, uid)`: earliest time first,
//! and among equal times the entry scheduled first. Three interchangeable
//! implementations are provided; they differ only in cost profile.
//!
//! | Queue | insert | pop | remove |
//! |---|---|---|---|
//! | [`HeapQueue`] | O(log n) | O(log n) | O(log n) |
//! | [`MapQueue`] | O(log n) | O(log n) | O(log n) |
//! | [`ListQueue`] | O(n) | O(1) | O(n) |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::event::EventKey;

pub mod heap;
pub mod list;
pub mod map;

pub use heap::HeapQueue;
pub use list::ListQueue;
pub use map::MapQueue;

/// A queued reference to an event: its ordering key and arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub key: EventKey,
    pub slot: u32,
}

impl QueueEntry {
    #[inline]
    pub fn new(key: EventKey, slot: u32) -> Self {
        QueueEntry { key, slot }
    }
}

/// The ordering structure the kernel schedules into.
///
/// # Contract
///
/// Implementations **must**:
/// - Return entries from `pop` in strictly ascending `(time, uid)` order.
/// - Keep the relative order of remaining entries intact on `remove`.
/// - Treat keys as unique; the kernel never inserts the same uid twice.
pub trait EventQueue: fmt::Debug {
    fn insert(&mut self, entry: QueueEntry);

    /// The minimum entry, without removing it.
    fn peek(&self) -> Option<QueueEntry>;

    /// Remove and return the minimum entry.
    fn pop(&mut self) -> Option<QueueEntry>;

    /// Remove the entry with `key`, if present.
    fn remove(&mut self, key: &EventKey) -> Option<QueueEntry>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and release storage.
    fn clear(&mut self);
}

// ── Queue selection ───────────────────────────────────────────────────

/// Which [`EventQueue`] implementation a kernel is built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    #[default]
    Heap,
    Map,
    List,
}

impl QueueKind {
    pub const ALL: [QueueKind; 3] = [QueueKind::Heap, QueueKind::Map, QueueKind::List];

    pub fn build(self) -> Box<dyn EventQueue> {
        match self {
            QueueKind::Heap => Box::new(HeapQueue::new()),
            QueueKind::Map => Box::new(MapQueue::new()),
            QueueKind::List => Box::new(ListQueue::new()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QueueKind::Heap => "heap",
            QueueKind::Map => "map",
            QueueKind::List => "list",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QueueKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heap" => Ok(QueueKind::Heap),
            "map" => Ok(QueueKind::Map),
            "list" => Ok(QueueKind::List),
            other => Err(SimError::UnknownQueue(other.to_string())),
        }
    }
}
