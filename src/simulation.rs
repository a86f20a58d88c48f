/// The simulation kernel.
///
/// `Simulator` owns the event queue, the event arena and the virtual clock.
/// The dispatch loop pops the earliest live event, advances the clock to
/// its time, runs its callback under the event's context, and repeats. The
/// loop is synchronous and single-threaded: a callback always finishes
/// before the next event starts.

use serde::Serialize;
use tracing::{debug, error, info, trace};

use crate::arena::EventArena;
use crate::config::SimConfig;
use crate::context::{Context, ContextStack};
use crate::error::{SimError, SimResult};
use crate::event::{Event, EventHandler, EventId, EventKey, EventKind, UidGen};
use crate::scheduler::{EventQueue, QueueEntry};
use crate::time::Time;

// ── Lifecycle ─────────────────────────────────────────────────────────

/// Lifecycle state of a [`Simulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimState {
    /// Built; events may be queued; never run.
    Ready,
    /// Inside `run()`, `run_until()` or `step()`.
    Running,
    /// A run returned. Calling `run()` again resumes.
    Stopped,
    /// Torn down. Scheduling or running is a fatal error.
    Destroyed,
}

/// Counters describing a kernel at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub state: SimState,
    pub now: Time,
    pub events_processed: u64,
    pub pending: usize,
}

/// Kernel-owned handler behind `stop_at` / `stop_after`.
struct StopEvent;

impl EventHandler for StopEvent {
    fn invoke(self: Box<Self>, sim: &mut Simulator) {
        sim.stop();
    }
}

/// Log and abort on a violated kernel precondition.
#[cold]
fn fatal(err: SimError) -> ! {
    error!(%err, "fatal simulator error");
    panic!("{err}")
}

// ── Simulator ─────────────────────────────────────────────────────────

/// The discrete-event simulation kernel.
///
/// Callbacks receive `&mut Simulator`, so they can read the clock and
/// schedule or cancel further events.
///
/// ```rust
/// use netsim::{Simulator, Time};
///
/// let mut sim = Simulator::new();
/// sim.schedule(Time::from_millis(5), |sim| {
///     assert_eq!(sim.now(), Time::from_millis(5));
/// });
/// sim.run();
/// sim.destroy();
/// ```
#[derive(Debug)]
pub struct Simulator {
    config: SimConfig,
    queue: Box<dyn EventQueue>,
    arena: EventArena,
    /// Destroy events in registration order; run back to front.
    destroy_events: Vec<EventId>,
    uid_gen: UidGen,
    now: Time,
    contexts: ContextStack,
    state: SimState,
    /// Set while destroy events run.
    destroying: bool,
    stop_requested: bool,
    events_processed: u64,
    /// Ordinary events in the queue that are not cancelled.
    pending: usize,
}

impl Simulator {
    /// Create a kernel with the default configuration, at time zero.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Self {
        let mut sim = Simulator {
            queue: config.queue.build(),
            config,
            arena: EventArena::new(),
            destroy_events: Vec::new(),
            uid_gen: UidGen::new(),
            now: Time::ZERO,
            contexts: ContextStack::new(),
            state: SimState::Ready,
            destroying: false,
            stop_requested: false,
            events_processed: 0,
            pending: 0,
        };
        if let Some(at) = sim.config.stop_at {
            sim.stop_at(at);
        }
        sim
    }

    // ── Inspection ────────────────────────────────────────────────

    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> Time {
        self.now
    }

    /// Context of the event currently being dispatched, or
    /// [`Context::NONE`] outside any callback.
    #[inline]
    pub fn context(&self) -> Context {
        self.contexts.current()
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Number of events dispatched so far.
    pub fn event_count(&self) -> u64 {
        self.events_processed
    }

    /// Number of ordinary events still waiting to fire.
    pub fn pending_count(&self) -> usize {
        self.pending
    }

    /// `true` when no live events remain or a stop has been requested.
    pub fn is_finished(&self) -> bool {
        self.pending == 0 || self.stop_requested
    }

    /// The latest time an event can be scheduled for.
    pub fn maximum_simulation_time(&self) -> Time {
        Time::MAX
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            state: self.state,
            now: self.now,
            events_processed: self.events_processed,
            pending: self.pending,
        }
    }

    // ── Scheduling ────────────────────────────────────────────────

    /// Schedule `f` to run `delay` after now, under the current context.
    ///
    /// # Panics
    /// Panics if `delay` is negative or the kernel has been destroyed.
    pub fn schedule<F>(&mut self, delay: Time, f: F) -> EventId
    where
        F: FnOnce(&mut Simulator) + 'static,
    {
        self.try_schedule(delay, f).unwrap_or_else(|e| fatal(e))
    }

    pub fn try_schedule<F>(&mut self, delay: Time, f: F) -> SimResult<EventId>
    where
        F: FnOnce(&mut Simulator) + 'static,
    {
        let at = self.absolute(delay)?;
        let context = self.context();
        self.insert(at, context, false, EventKind::Ordinary, Box::new(f))
    }

    /// Schedule `f` at an absolute time.
    ///
    /// # Panics
    /// Panics if `at` is before now or the kernel has been destroyed.
    pub fn schedule_at<F>(&mut self, at: Time, f: F) -> EventId
    where
        F: FnOnce(&mut Simulator) + 'static,
    {
        self.try_schedule_at(at, f).unwrap_or_else(|e| fatal(e))
    }

    pub fn try_schedule_at<F>(&mut self, at: Time, f: F) -> SimResult<EventId>
    where
        F: FnOnce(&mut Simulator) + 'static,
    {
        self.check_at(at)?;
        let context = self.context();
        self.insert(at, context, false, EventKind::Ordinary, Box::new(f))
    }

    /// Schedule `f` at the current time. It still goes through the queue
    /// and runs after the current callback returns, never inline.
    pub fn schedule_now<F>(&mut self, f: F) -> EventId
    where
        F: FnOnce(&mut Simulator) + 'static,
    {
        self.schedule(Time::ZERO, f)
    }

    /// Schedule `f` to run `delay` after now under `context`.
    pub fn schedule_with_context<F>(&mut self, context: Context, delay: Time, f: F) -> EventId
    where
        F: FnOnce(&mut Simulator) + 'static,
    {
        self.try_schedule_with_context(context, delay, f)
            .unwrap_or_else(|e| fatal(e))
    }

    pub fn try_schedule_with_context<F>(
        &mut self,
        context: Context,
        delay: Time,
        f: F,
    ) -> SimResult<EventId>
    where
        F: FnOnce(&mut Simulator) + 'static,
    {
        let at = self.absolute(delay)?;
        self.insert(at, context, true, EventKind::Ordinary, Box::new(f))
    }

    /// Schedule a struct handler `delay` after now.
    pub fn schedule_handler<H: EventHandler>(&mut self, delay: Time, handler: H) -> EventId {
        let context = self.context();
        self.absolute(delay)
            .and_then(|at| self.insert(at, context, false, EventKind::Ordinary, Box::new(handler)))
            .unwrap_or_else(|e| fatal(e))
    }

    /// Register `f` to run during [`Simulator::destroy`], after all
    /// ordinary events have been discarded. Destroy events run in reverse
    /// registration order.
    pub fn schedule_destroy<F>(&mut self, f: F) -> EventId
    where
        F: FnOnce(&mut Simulator) + 'static,
    {
        self.try_schedule_destroy(f).unwrap_or_else(|e| fatal(e))
    }

    pub fn try_schedule_destroy<F>(&mut self, f: F) -> SimResult<EventId>
    where
        F: FnOnce(&mut Simulator) + 'static,
    {
        let context = self.context();
        self.insert(self.now, context, false, EventKind::Destroy, Box::new(f))
    }

    fn absolute(&self, delay: Time) -> SimResult<Time> {
        if delay.is_negative() {
            return Err(SimError::NegativeDelay { delay });
        }
        self.now
            .checked_add(delay)
            .ok_or(SimError::TimeOverflow { op: "schedule" })
    }

    fn check_at(&self, at: Time) -> SimResult<()> {
        if at < self.now {
            return Err(SimError::InPast {
                requested: at,
                now: self.now,
            });
        }
        Ok(())
    }

    fn insert(
        &mut self,
        at: Time,
        context: Context,
        explicit_context: bool,
        kind: EventKind,
        handler: Box<dyn EventHandler>,
    ) -> SimResult<EventId> {
        if self.state == SimState::Destroyed {
            return Err(SimError::Destroyed);
        }

        let uid = self.uid_gen.next_uid();
        let key = EventKey::new(at, uid);
        let (slot, generation) = self.arena.insert(Event {
            key,
            kind,
            context,
            explicit_context,
            handler: Some(handler),
        });
        let id = EventId::new(slot, generation, uid, at, context);

        match kind {
            EventKind::Ordinary => {
                self.queue.insert(QueueEntry::new(key, slot));
                self.pending += 1;
            }
            EventKind::Destroy => self.destroy_events.push(id),
        }

        trace!(uid, at = %at, context = %context, explicit_context, ?kind, "scheduled event");
        Ok(id)
    }

    // ── Handles ───────────────────────────────────────────────────

    /// Prevent a pending event from firing. Its callback is dropped now;
    /// the queue entry is discarded lazily when it reaches the front.
    ///
    /// A no-op for events that already fired, were already cancelled or
    /// removed, or never existed.
    pub fn cancel(&mut self, id: EventId) {
        let Some(event) = self.arena.get_mut(&id) else {
            return;
        };
        if event.handler.take().is_none() {
            return;
        }
        let kind = event.kind;
        match kind {
            EventKind::Ordinary => self.pending -= 1,
            EventKind::Destroy => self.forget_destroy_event(id),
        }
        trace!(uid = id.uid(), "cancelled event");
    }

    /// Like [`Simulator::cancel`], but also removes the event from the
    /// queue immediately.
    pub fn remove(&mut self, id: EventId) {
        let Some(event) = self.arena.get(&id) else {
            return;
        };
        let (key, kind, live) = (event.key, event.kind, !event.is_cancelled());

        match kind {
            EventKind::Ordinary => {
                let removed = self.queue.remove(&key);
                debug_assert!(removed.is_some(), "arena event {key:?} missing from queue");
                self.arena.take(id.slot);
                if live {
                    self.pending -= 1;
                }
            }
            EventKind::Destroy => self.forget_destroy_event(id),
        }
        trace!(uid = id.uid(), "removed event");
    }

    fn forget_destroy_event(&mut self, id: EventId) {
        self.destroy_events.retain(|d| *d != id);
        self.arena.remove(&id);
    }

    /// `true` unless the event is still waiting to fire.
    pub fn is_expired(&self, id: EventId) -> bool {
        self.arena.get(&id).map_or(true, Event::is_cancelled)
    }

    /// Time remaining until a pending event fires; zero once expired.
    /// Destroy events report zero.
    pub fn delay_left(&self, id: EventId) -> Time {
        match self.arena.get(&id) {
            Some(event) if !event.is_cancelled() && event.kind == EventKind::Ordinary => {
                event.key.time - self.now
            }
            _ => Time::ZERO,
        }
    }

    // ── Dispatch ──────────────────────────────────────────────────

    /// Run until the queue is empty or a stop is requested.
    ///
    /// # Panics
    /// Panics if the kernel has been destroyed, or if called from inside
    /// a callback.
    #[tracing::instrument(level = "debug", skip(self), fields(queue = %self.config.queue))]
    pub fn run(&mut self) {
        self.begin_run("run");
        let start = self.events_processed;
        info!(now = %self.now, pending = self.pending, "simulation run started");

        while self.may_continue() && self.dispatch_next(None) {}

        self.end_run();
        info!(
            events = self.events_processed - start,
            now = %self.now,
            pending = self.pending,
            "simulation run finished"
        );
    }

    /// Run every live event with time `<= until`. If the run was not cut
    /// short by `stop()` or the event limit, the clock is left at `until`.
    ///
    /// # Panics
    /// Panics if `until` is before now, the kernel has been destroyed, or
    /// it is called from inside a callback.
    pub fn run_until(&mut self, until: Time) {
        if let Err(e) = self.check_at(until) {
            fatal(e);
        }
        self.begin_run("run_until");
        let start = self.events_processed;

        while self.may_continue() && self.dispatch_next(Some(until)) {}

        if self.may_continue() {
            self.now = until;
        }
        self.end_run();
        debug!(
            events = self.events_processed - start,
            now = %self.now,
            "run_until finished"
        );
    }

    /// Dispatch exactly one live event. Returns `false` if none remained.
    pub fn step(&mut self) -> bool {
        self.begin_run("step");
        let ran = self.dispatch_next(None);
        self.end_run();
        ran
    }

    /// Ask the running loop to return once the current callback finishes.
    /// Ignored when the kernel is not running.
    pub fn stop(&mut self) {
        if self.state == SimState::Running {
            debug!(now = %self.now, "stop requested");
            self.stop_requested = true;
        } else {
            trace!(state = ?self.state, "stop outside a run ignored");
        }
    }

    /// Schedule a kernel-owned event at `at` that calls `stop()`.
    pub fn stop_at(&mut self, at: Time) -> EventId {
        self.check_at(at)
            .and_then(|()| self.insert(at, Context::NONE, true, EventKind::Ordinary, Box::new(StopEvent)))
            .unwrap_or_else(|e| fatal(e))
    }

    /// Schedule a kernel-owned event `delay` from now that calls `stop()`.
    pub fn stop_after(&mut self, delay: Time) -> EventId {
        self.absolute(delay)
            .and_then(|at| self.insert(at, Context::NONE, true, EventKind::Ordinary, Box::new(StopEvent)))
            .unwrap_or_else(|e| fatal(e))
    }

    fn begin_run(&mut self, op: &'static str) {
        match self.state {
            SimState::Destroyed => fatal(SimError::Destroyed),
            SimState::Running => fatal(SimError::Reentrant { op }),
            _ if self.destroying => fatal(SimError::Reentrant { op }),
            _ => {}
        }
        self.state = SimState::Running;
        self.stop_requested = false;
    }

    /// A callback may have destroyed the kernel; that state is terminal.
    fn end_run(&mut self) {
        if self.state != SimState::Destroyed {
            self.state = SimState::Stopped;
        }
    }

    fn may_continue(&self) -> bool {
        if self.stop_requested || self.state == SimState::Destroyed {
            return false;
        }
        match self.config.max_events {
            Some(max) if self.events_processed >= max => {
                debug!(max, "event limit reached");
                false
            }
            _ => true,
        }
    }

    /// The earliest live entry, discarding cancelled entries at the front.
    fn peek_live(&mut self) -> Option<QueueEntry> {
        while let Some(entry) = self.queue.peek() {
            if self.arena.is_live(entry.slot) {
                return Some(entry);
            }
            self.queue.pop();
            self.arena.take(entry.slot);
            trace!(uid = entry.key.uid, "discarded cancelled event");
        }
        None
    }

    /// Pop and run the earliest live event, unless it lies after `limit`.
    fn dispatch_next(&mut self, limit: Option<Time>) -> bool {
        let Some(entry) = self.peek_live() else {
            return false;
        };
        if limit.is_some_and(|until| entry.key.time > until) {
            return false;
        }
        self.queue.pop();
        let Some(Event {
            key,
            context,
            handler: Some(handler),
            ..
        }) = self.arena.take(entry.slot)
        else {
            unreachable!("peek_live returned a dead slot");
        };

        // Virtual time must never go backward.
        assert!(
            key.time >= self.now,
            "time went backward: now={}, event={}",
            self.now,
            key.time
        );
        self.now = key.time;
        self.pending -= 1;
        self.events_processed += 1;

        debug!(uid = key.uid, now = %self.now, context = %context, "dispatching event");
        let depth = self.contexts.depth();
        self.contexts.enter(context);
        handler.invoke(self);
        self.contexts.exit();
        debug_assert_eq!(self.contexts.depth(), depth, "unbalanced context stack");
        true
    }

    // ── Teardown ──────────────────────────────────────────────────

    /// Tear the kernel down: discard every pending ordinary event without
    /// running it, run the destroy events newest-first, release storage.
    ///
    /// Events and destroy events registered from inside destroy callbacks
    /// are discarded unrun. Calling `destroy` from a callback ends the
    /// enclosing run once that callback returns; the kernel stays
    /// destroyed. Calling `destroy` twice is a no-op. Dropping a kernel
    /// that was never destroyed destroys it.
    pub fn destroy(&mut self) {
        if self.state == SimState::Destroyed || self.destroying {
            return;
        }
        self.destroying = true;
        let discarded = self.discard_pending();
        info!(
            now = %self.now,
            discarded,
            destroy_events = self.destroy_events.len(),
            "destroying simulator"
        );

        // Destroy events registered from here on are released unrun.
        let registered = std::mem::take(&mut self.destroy_events);
        for id in registered.into_iter().rev() {
            // Gone if an earlier destroy callback cancelled it.
            let Some(Event {
                context,
                handler: Some(handler),
                ..
            }) = self.arena.remove(&id)
            else {
                continue;
            };
            debug!(uid = id.uid(), "running destroy event");
            self.contexts.enter(context);
            handler.invoke(self);
            self.contexts.exit();
        }

        self.release();
        self.destroying = false;
        self.state = SimState::Destroyed;
    }

    /// Drop every queued ordinary event. Returns how many were live.
    fn discard_pending(&mut self) -> usize {
        let live = self.pending;
        while let Some(entry) = self.queue.pop() {
            self.arena.take(entry.slot);
        }
        self.pending = 0;
        live
    }

    fn release(&mut self) {
        self.queue.clear();
        self.arena.clear();
        self.destroy_events = Vec::new();
        self.pending = 0;
        debug_assert!(self.queue.is_empty() && self.arena.is_empty());
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        if self.state == SimState::Destroyed {
            return;
        }
        if std::thread::panicking() {
            // Never run user callbacks while unwinding.
            self.release();
            self.state = SimState::Destroyed;
        } else {
            self.destroy();
        }
    }
}
