//! # netsim: Discrete-Event Simulation Kernel
//!
//! The scheduling core of a network simulator. Models schedule callbacks
//! at future virtual times; the kernel runs them one at a time in
//! `(time, uid)` order, advancing a nanosecond clock between them. No
//! async, no threads, no wall-clock time.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────┐
//! │          Simulator             │ ← clock, lifecycle, dispatch loop
//! │  ┌─────────────────────────┐  │
//! │  │  EventQueue (pluggable)  │  │ ← heap / map / list, (time, uid) order
//! │  └─────────────────────────┘  │
//! │  ┌─────────────────────────┐  │
//! │  │  EventArena              │  │ ← owns callbacks, generational slots
//! │  └─────────────────────────┘  │
//! │  ┌─────────────────────────┐  │
//! │  │  ContextStack            │  │ ← node attribution during callbacks
//! │  └─────────────────────────┘  │
//! │  ┌─────────────────────────┐  │
//! │  │  Time                    │  │ ← i64 nanosecond ticks
//! │  └─────────────────────────┘  │
//! └───────────────────────────────┘
//!        ▲               ▲
//!     EventId          Timer        ← caller-held handles
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use netsim::{Simulator, Time};
//!
//! let mut sim = Simulator::new();
//! let id = sim.schedule(Time::from_millis(2), |sim| sim.stop());
//! assert!(!sim.is_expired(id));
//! sim.run();
//! assert_eq!(sim.now(), Time::from_millis(2));
//! assert!(sim.is_expired(id));
//! ```

mod arena;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod scenario;
pub mod scheduler;
pub mod simulation;
pub mod time;
pub mod timer;

#[cfg(test)]
mod tests;

// Re-exports for convenience.
pub use config::SimConfig;
pub use context::Context;
pub use error::{SimError, SimResult};
pub use event::{EventHandler, EventId, EventKey, EventKind};
pub use scenario::{PingConfig, PingReport, PingScenario, TraceEntry, TraceKind};
pub use scheduler::{EventQueue, QueueEntry, QueueKind};
pub use simulation::{RunSummary, SimState, Simulator};
pub use time::{Time, Unit};
pub use timer::Timer;
