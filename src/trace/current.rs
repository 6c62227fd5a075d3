//! Explicit tracking of the trace context in scope.

use crate::trace::context::TraceContext;
use crate::trace::span_map::lock;
use std::sync::{Arc, Mutex};

/// A caller-held slot for the trace context currently in scope.
///
/// There is no ambient global: the handle is created by whoever owns the
/// execution context, usually middleware, cloned wherever the current
/// context is needed, and updated through [`Scope`] guards so every enter
/// has a matching close.
///
/// ```
/// use zipkin_tracer::{CurrentTraceContext, SamplingFlags, TraceContext};
///
/// let current = CurrentTraceContext::new();
/// let context = TraceContext::new_root(SamplingFlags::SAMPLED, false);
///
/// let scope = current.new_scope(Some(context.clone()));
/// assert_eq!(current.current(), Some(context));
/// scope.close();
/// assert_eq!(current.current(), None);
/// ```
#[derive(Clone, Debug, Default)]
pub struct CurrentTraceContext {
    slot: Arc<Mutex<Option<TraceContext>>>,
}

impl CurrentTraceContext {
    /// Creates an empty slot.
    pub fn new() -> Self {
        CurrentTraceContext::default()
    }

    /// The context currently in scope, if any.
    pub fn current(&self) -> Option<TraceContext> {
        lock(&self.slot).clone()
    }

    /// Makes `context` current and returns the closer restoring whatever
    /// was in scope before. Passing `None` clears the slot for the
    /// duration of the scope.
    pub fn new_scope(&self, context: Option<TraceContext>) -> Scope {
        let previous = std::mem::replace(&mut *lock(&self.slot), context);
        Scope {
            slot: Arc::clone(&self.slot),
            previous,
            closed: false,
        }
    }
}

/// Restores the previously current context when closed or dropped.
#[derive(Debug)]
pub struct Scope {
    slot: Arc<Mutex<Option<TraceContext>>>,
    previous: Option<TraceContext>,
    closed: bool,
}

impl Scope {
    /// Restores the context that was current when this scope was entered.
    pub fn close(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if !self.closed {
            *lock(&self.slot) = self.previous.take();
            self.closed = true;
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.restore();
    }
}
