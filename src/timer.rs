//! `Timer`: a restartable single-shot timeout built on schedule/cancel.
//!
//! The kernel has no native notion of a timeout. Models express one by
//! scheduling an expiry and cancelling it if the awaited condition shows
//! up first; `Timer` packages that pattern around a single `EventId`.

use crate::event::EventId;
use crate::simulation::Simulator;
use crate::time::Time;

/// A single pending expiry with a configured delay.
///
/// Arming a running timer cancels the previous expiry first, so at most
/// one expiry is ever pending per timer.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    delay: Time,
    event: EventId,
}

impl Timer {
    pub fn new(delay: Time) -> Self {
        Timer {
            delay,
            event: EventId::default(),
        }
    }

    pub fn delay(&self) -> Time {
        self.delay
    }

    /// Change the delay used by later calls to [`Timer::arm`].
    pub fn set_delay(&mut self, delay: Time) {
        self.delay = delay;
    }

    /// Schedule `f` after the configured delay, replacing any pending
    /// expiry.
    pub fn arm<F>(&mut self, sim: &mut Simulator, f: F) -> EventId
    where
        F: FnOnce(&mut Simulator) + 'static,
    {
        self.arm_with_delay(sim, self.delay, f)
    }

    /// Like [`Timer::arm`] with a one-off delay.
    pub fn arm_with_delay<F>(&mut self, sim: &mut Simulator, delay: Time, f: F) -> EventId
    where
        F: FnOnce(&mut Simulator) + 'static,
    {
        sim.cancel(self.event);
        self.event = sim.schedule(delay, f);
        self.event
    }

    pub fn cancel(&mut self, sim: &mut Simulator) {
        sim.cancel(self.event);
    }

    /// `true` while an expiry is pending.
    pub fn is_running(&self, sim: &Simulator) -> bool {
        !sim.is_expired(self.event)
    }

    pub fn delay_left(&self, sim: &Simulator) -> Time {
        sim.delay_left(self.event)
    }

    /// Handle of the most recently armed expiry.
    pub fn event(&self) -> EventId {
        self.event
    }
}
