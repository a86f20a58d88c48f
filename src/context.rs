//! Execution context: which simulated node an event runs on behalf of.

use serde::{Deserialize, Serialize};

/// An opaque execution-context identifier, conventionally a node index.
///
/// `Context` is a newtype rather than a bare integer so it cannot be mixed
/// up with event uids or tick counts at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(u32);

impl Context {
    /// No node is attributed. Events scheduled from outside any callback
    /// carry this context.
    pub const NONE: Context = Context(u32::MAX);

    /// Create a context from a raw node index.
    ///
    /// `u32::MAX` is reserved: `Context::new(u32::MAX)` is [`Context::NONE`].
    #[inline]
    pub const fn new(id: u32) -> Self {
        Context(id)
    }

    /// Return the underlying integer.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::NONE
    }
}

impl From<u32> for Context {
    fn from(id: u32) -> Self {
        Context(id)
    }
}

impl std::fmt::Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            write!(f, "N-")
        } else {
            write!(f, "N{}", self.0)
        }
    }
}

// ── Context stack ─────────────────────────────────────────────────────

/// Save/restore stack for the current context.
///
/// The kernel pushes before invoking a callback and pops afterward, so the
/// current context is scoped to exactly one callback's execution window.
#[derive(Debug, Clone, Default)]
pub(crate) struct ContextStack {
    current: Context,
    saved: Vec<Context>,
}

impl ContextStack {
    pub(crate) fn new() -> Self {
        ContextStack {
            current: Context::NONE,
            saved: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn current(&self) -> Context {
        self.current
    }

    pub(crate) fn enter(&mut self, ctx: Context) {
        self.saved.push(self.current);
        self.current = ctx;
    }

    pub(crate) fn exit(&mut self) {
        debug_assert!(!self.saved.is_empty(), "context stack underflow");
        if let Some(prev) = self.saved.pop() {
            self.current = prev;
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.saved.len()
    }
}
