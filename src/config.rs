//! Kernel configuration.

use serde::{Deserialize, Serialize};

use crate::scheduler::QueueKind;
use crate::time::Time;

/// Configuration a [`Simulator`](crate::Simulator) is built from.
///
/// ```rust
/// use netsim::{QueueKind, SimConfig, Time};
///
/// let config = SimConfig::default()
///     .with_queue(QueueKind::Map)
///     .with_max_events(10_000)
///     .with_stop_at(Time::from_secs(30));
/// assert_eq!(config.queue, QueueKind::Map);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Event-queue implementation.
    pub queue: QueueKind,
    /// Stop `run()` after this many dispatched events.
    pub max_events: Option<u64>,
    /// Schedule a stop at this absolute time when the kernel is built.
    pub stop_at: Option<Time>,
}

impl SimConfig {
    pub fn with_queue(mut self, queue: QueueKind) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_max_events(mut self, max_events: u64) -> Self {
        self.max_events = Some(max_events);
        self
    }

    pub fn with_stop_at(mut self, at: Time) -> Self {
        self.stop_at = Some(at);
        self
    }
}
