/// Event records and handles for the simulation kernel.
///
/// Every unit of deferred work is an `Event`: a boxed callback plus the
/// bookkeeping the kernel needs to order, cancel and attribute it. Callers
/// never hold an `Event`; they hold an [`EventId`], a non-owning handle
/// that can only query or cancel.

use std::cmp::Ordering;
use std::fmt;

use crate::context::Context;
use crate::simulation::Simulator;
use crate::time::Time;

// ── Event key ─────────────────────────────────────────────────────────

/// The ordering key of a scheduled event: `(time, uid)`.
///
/// Uids are strictly increasing per kernel, so two events at the same
/// time are ordered by when they were scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub time: Time,
    pub uid: u64,
}

impl EventKey {
    #[inline]
    pub fn new(time: Time, uid: u64) -> Self {
        EventKey { time, uid }
    }
}

/// Natural order: earliest time first, then lowest uid.
impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.uid.cmp(&other.uid))
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ── Uid generator ─────────────────────────────────────────────────────

/// Deterministic, strictly-increasing uid generator.
///
/// Each `Simulator` owns exactly one. Uid 0 is never handed out so that
/// the default `EventId` can never match a real event.
#[derive(Debug, Clone)]
pub(crate) struct UidGen {
    next: u64,
}

impl UidGen {
    pub(crate) fn new() -> Self {
        UidGen { next: 1 }
    }

    pub(crate) fn next_uid(&mut self) -> u64 {
        let uid = self.next;
        self.next += 1;
        uid
    }

    #[cfg(test)]
    pub(crate) fn peek(&self) -> u64 {
        self.next
    }
}

// ── Handler ───────────────────────────────────────────────────────────

/// The work an event performs when dispatched.
///
/// Implemented for every `FnOnce(&mut Simulator) + 'static` closure, so
/// most callers pass a closure that captures its arguments by move.
pub trait EventHandler: 'static {
    /// Consume the handler and run it against the kernel.
    fn invoke(self: Box<Self>, sim: &mut Simulator);
}

impl<F> EventHandler for F
where
    F: FnOnce(&mut Simulator) + 'static,
{
    fn invoke(self: Box<Self>, sim: &mut Simulator) {
        (*self)(sim)
    }
}

// ── Event kind ────────────────────────────────────────────────────────

/// Whether an event runs during normal dispatch or only at teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ordinary,
    Destroy,
}

// ── Event ─────────────────────────────────────────────────────────────

/// A scheduled event, owned by the kernel's arena.
pub(crate) struct Event {
    pub(crate) key: EventKey,
    pub(crate) kind: EventKind,
    pub(crate) context: Context,
    /// Set when the context was given explicitly via
    /// `schedule_with_context` rather than inherited.
    pub(crate) explicit_context: bool,
    /// `None` once cancelled; the callback is dropped on cancel.
    pub(crate) handler: Option<Box<dyn EventHandler>>,
}

impl Event {
    #[inline]
    pub(crate) fn is_cancelled(&self) -> bool {
        self.handler.is_none()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("context", &self.context)
            .field("explicit_context", &self.explicit_context)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ── EventId ───────────────────────────────────────────────────────────

/// A non-owning handle to a scheduled event.
///
/// Carries the arena slot and generation the event was stored under, so
/// the kernel can tell in O(1) whether the handle still refers to a live
/// event. A handle whose slot has been reused is simply expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
    uid: u64,
    time: Time,
    context: Context,
}

impl EventId {
    pub(crate) const INVALID_SLOT: u32 = u32::MAX;

    pub(crate) fn new(slot: u32, generation: u32, uid: u64, time: Time, context: Context) -> Self {
        EventId {
            slot,
            generation,
            uid,
            time,
            context,
        }
    }

    /// The uid assigned at schedule time (0 for an invalid handle).
    #[inline]
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// The absolute time the event was scheduled for.
    #[inline]
    pub fn time(&self) -> Time {
        self.time
    }

    /// The context the event will run under.
    #[inline]
    pub fn context(&self) -> Context {
        self.context
    }

    /// `false` for a default-constructed handle.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.slot != Self::INVALID_SLOT
    }
}

impl Default for EventId {
    fn default() -> Self {
        EventId {
            slot: Self::INVALID_SLOT,
            generation: 0,
            uid: 0,
            time: Time::ZERO,
            context: Context::NONE,
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E#{}@{}", self.uid, self.time)
    }
}
