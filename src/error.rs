//! Structured error types for the simulation kernel.
//!
//! Fallible APIs (`try_schedule*`, parsing) return `Result<T, SimError>`.
//! The infallible scheduling calls treat the same conditions as fatal
//! programming errors and panic with the error's message.

use thiserror::Error;

use crate::time::Time;

/// The top-level error type for the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    // ── Scheduling errors ─────────────────────────────────

    /// A relative delay was negative.
    #[error("cannot schedule in the past: negative delay {delay}")]
    NegativeDelay { delay: Time },

    /// An absolute time was before the current time.
    #[error("cannot schedule in the past: requested {requested} when now is {now}")]
    InPast { requested: Time, now: Time },

    /// The kernel has been destroyed; no further scheduling or running.
    #[error("simulator has been destroyed")]
    Destroyed,

    /// `run`, `run_until` or `step` was called from inside a callback.
    #[error("cannot {op} from inside an event callback")]
    Reentrant { op: &'static str },

    // ── Time errors ───────────────────────────────────────

    /// Time arithmetic left the representable range.
    #[error("virtual time overflow in {op}")]
    TimeOverflow { op: &'static str },

    /// A time string could not be parsed.
    #[error("invalid time literal: {0:?}")]
    InvalidTime(String),

    // ── Config errors ─────────────────────────────────────

    /// An unknown event-queue implementation was requested.
    #[error("unknown event queue {0:?} (expected heap, map or list)")]
    UnknownQueue(String),
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;
