//! The mutable record backing an in-flight span.

use crate::report::SpanData;
use crate::trace::context::TraceContext;
use crate::trace::endpoint::Endpoint;
use crate::trace::span::Kind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A timestamped event explaining latency within a span.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Microseconds since the unix epoch.
    pub timestamp: u64,
    /// What happened at that time.
    pub value: String,
}

/// The recorder-owned state of one in-flight span.
///
/// Records are created lazily on first mutation and addressed through
/// their [`TraceContext`]. Tags are last-write-wins per key; annotations
/// keep call order, not timestamp order. Finish is idempotent: the first
/// call fixes the duration, later calls are ignored.
#[derive(Debug)]
pub(crate) struct SpanRecord {
    context: TraceContext,
    local_endpoint: Endpoint,
    timestamp: Option<u64>,
    duration: Option<u64>,
    name: Option<String>,
    kind: Option<Kind>,
    remote_endpoint: Option<Endpoint>,
    tags: HashMap<String, String>,
    annotations: Vec<Annotation>,
    error: Option<String>,
    finished: bool,
}

impl SpanRecord {
    pub(crate) fn new(context: TraceContext, local_endpoint: Endpoint) -> Self {
        SpanRecord {
            context,
            local_endpoint,
            timestamp: None,
            duration: None,
            name: None,
            kind: None,
            remote_endpoint: None,
            tags: HashMap::new(),
            annotations: Vec::new(),
            error: None,
            finished: false,
        }
    }

    pub(crate) fn start(&mut self, timestamp: u64) {
        self.timestamp = Some(timestamp);
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_owned());
    }

    pub(crate) fn set_kind(&mut self, kind: Kind) {
        self.kind = Some(kind);
    }

    pub(crate) fn tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_owned(), value.to_owned());
    }

    pub(crate) fn annotate(&mut self, timestamp: u64, value: &str) {
        self.annotations.push(Annotation {
            timestamp,
            value: value.to_owned(),
        });
    }

    pub(crate) fn set_remote_endpoint(&mut self, endpoint: Endpoint) {
        self.remote_endpoint = Some(endpoint);
    }

    pub(crate) fn set_error(&mut self, message: &str) {
        self.error = Some(message.to_owned());
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// Marks the span finished, computing the duration when the start time
    /// is known. Only the first call has any effect.
    pub(crate) fn finish(&mut self, finish_timestamp: u64) {
        if self.finished {
            return;
        }
        self.duration = self
            .timestamp
            .and_then(|start| finish_timestamp.checked_sub(start));
        self.finished = true;
    }

    /// A read-only copy of the current state, in the shape reporters and
    /// serializers consume.
    pub(crate) fn to_span_data(&self) -> SpanData {
        SpanData {
            trace_id: self.context.trace_id(),
            span_id: self.context.span_id(),
            parent_id: self.context.parent_id(),
            debug: self.context.debug(),
            shared: self.context.shared(),
            name: self.name.clone(),
            kind: self.kind,
            timestamp: self.timestamp,
            duration: self.duration,
            local_endpoint: self.local_endpoint.clone(),
            remote_endpoint: self.remote_endpoint.clone(),
            tags: self.tags.clone(),
            annotations: self.annotations.clone(),
            error: self.error.clone(),
        }
    }
}
