//! Trace contexts.

use crate::trace::id::{SpanId, TraceId};
use crate::trace::sampling::SamplingFlags;

/// The position of a span within a trace, as propagated across processes.
///
/// A `TraceContext` consists of the trace id, the span id, the id of the
/// parent span when there is one, the [`SamplingFlags`], and a `shared`
/// marker set when a server reuses the span id minted by its client.
///
/// Contexts are immutable: the `with_` methods return modified copies, and
/// equality is structural over every field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TraceContext {
    trace_id: TraceId,
    span_id: SpanId,
    parent_id: Option<SpanId>,
    flags: SamplingFlags,
    shared: bool,
}

impl TraceContext {
    /// Returns a builder used to construct a `TraceContext`, e.g. from
    /// values read off the wire.
    pub fn builder() -> TraceContextBuilder {
        TraceContextBuilder {
            parent_id: None,
            flags: SamplingFlags::EMPTY,
            shared: false,
        }
    }

    /// Create the context of a new root span with fresh random ids.
    ///
    /// A 64-bit root trace id reuses the span id value; a 128-bit one draws
    /// 16 fresh bytes. The width is recorded on the trace id itself.
    pub fn new_root(flags: SamplingFlags, uses_128bit_trace_id: bool) -> Self {
        let span_id = SpanId::random();
        let trace_id = if uses_128bit_trace_id {
            TraceId::random_128()
        } else {
            TraceId::from(span_id)
        };
        TraceContext {
            trace_id,
            span_id,
            parent_id: None,
            flags,
            shared: false,
        }
    }

    /// Create the context of a child of this span: same trace id, fresh
    /// span id, parent set to this span's id.
    pub fn child(&self) -> Self {
        let mut span_id = SpanId::random();
        // a span id must differ from its parent
        while span_id == self.span_id {
            span_id = SpanId::random();
        }
        TraceContext {
            trace_id: self.trace_id,
            span_id,
            parent_id: Some(self.span_id),
            flags: self.flags,
            shared: false,
        }
    }

    /// The id of the trace this context belongs to.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The id of the span this context addresses.
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// The id of the parent span, absent for root spans.
    pub fn parent_id(&self) -> Option<SpanId> {
        self.parent_id
    }

    /// The sampling flags carried by this context.
    pub fn sampling_flags(&self) -> SamplingFlags {
        self.flags
    }

    /// The sampling decision, or `None` while it is deferred.
    pub fn sampled(&self) -> Option<bool> {
        self.flags.sampled()
    }

    /// Returns `true` if collection was requested regardless of sampling
    /// policy.
    pub fn debug(&self) -> bool {
        self.flags.debug()
    }

    /// Returns `true` if this span id is shared between a client and the
    /// server that joined it.
    pub fn shared(&self) -> bool {
        self.shared
    }

    /// Returns `true` if the trace id is 128 bits wide.
    pub fn uses_128bit_trace_id(&self) -> bool {
        self.trace_id.is_128bit()
    }

    /// Returns a copy of this context with the sampling decision resolved.
    pub fn with_sampled(&self, sampled: bool) -> Self {
        TraceContext {
            flags: self.flags.with_sampled(sampled),
            ..self.clone()
        }
    }

    /// Returns a copy of this context with the shared marker set.
    pub fn with_shared(&self, shared: bool) -> Self {
        TraceContext {
            shared,
            ..self.clone()
        }
    }
}

/// A builder type for [`TraceContext`]s.
#[derive(Clone, Debug)]
pub struct TraceContextBuilder {
    parent_id: Option<SpanId>,
    flags: SamplingFlags,
    shared: bool,
}

impl TraceContextBuilder {
    /// Sets the id of the parent span. Defaults to `None`.
    ///
    /// A parent id equal to the span id passed to [`build`] is dropped:
    /// a span cannot be its own parent.
    ///
    /// [`build`]: TraceContextBuilder::build
    pub fn parent_id(mut self, parent_id: SpanId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets the sampling flags. Defaults to [`SamplingFlags::EMPTY`].
    pub fn sampling_flags(mut self, flags: SamplingFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the shared marker. Defaults to `false`.
    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    /// Constructs a `TraceContext` for the given identity.
    pub fn build(self, trace_id: TraceId, span_id: SpanId) -> TraceContext {
        let parent_id = match self.parent_id {
            Some(parent_id) if parent_id == span_id => {
                tracing::debug!(
                    span_id = %span_id,
                    "dropping parent id equal to the span id"
                );
                None
            }
            parent_id => parent_id,
        };
        TraceContext {
            trace_id,
            span_id,
            parent_id,
            flags: self.flags,
            shared: self.shared,
        }
    }
}
