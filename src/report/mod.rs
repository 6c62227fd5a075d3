//! Terminal sinks for finished spans.
//!
//! A [`Reporter`] receives batches of read-only [`SpanData`] and moves
//! them out of the process. Reporters are fail-open: a tracing failure
//! must not fail the traced operation, so transport and serialization
//! problems are logged and counted, never surfaced to instrumented code.

use crate::trace::{lock, Annotation, Endpoint, Kind, SpanId, TraceId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

pub mod aggregate;
pub mod http;
mod model;

pub use aggregate::{AggregatingReporter, AggregationStore, InMemoryStore, StoreError};
pub use http::{HttpClient, HttpReporter, HttpReporterBuilder};

/// The read-only view of a finished (or flushed) span handed to reporters
/// and serializers, decoupling them from the recorder's mutable state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpanData {
    /// The trace this span belongs to.
    pub trace_id: TraceId,
    /// The identity of this span within the trace.
    pub span_id: SpanId,
    /// The parent span, absent for roots.
    pub parent_id: Option<SpanId>,
    /// Whether collection was requested regardless of sampling policy.
    pub debug: bool,
    /// Whether the span id is shared with the remote client that minted it.
    pub shared: bool,
    /// The operation name, if one was set.
    pub name: Option<String>,
    /// The role in a remote interaction, if one was set.
    pub kind: Option<Kind>,
    /// Start time in microseconds since the epoch, unset if the span never
    /// started.
    pub timestamp: Option<u64>,
    /// Critical path duration in microseconds, unset until finished.
    pub duration: Option<u64>,
    /// The endpoint of the service that recorded this span.
    pub local_endpoint: Endpoint,
    /// The endpoint the span talked to, for client and producer spans.
    pub remote_endpoint: Option<Endpoint>,
    /// Key/value metadata, last write per key.
    pub tags: HashMap<String, String>,
    /// Timestamped events in call order.
    pub annotations: Vec<Annotation>,
    /// The message of the error that failed the span, if any.
    pub error: Option<String>,
}

/// The terminal sink finished spans are handed to.
///
/// `report` takes a whole batch and must not panic or block the hot path;
/// implementations absorb their own failures.
pub trait Reporter: fmt::Debug + Send + Sync {
    /// Consumes a batch of finished spans.
    fn report(&self, spans: Vec<SpanData>);
}

/// A reporter that discards every span.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&self, _spans: Vec<SpanData>) {}
}

/// A reporter that stores spans in memory.
///
/// Useful for tests and debugging: reported spans can be read back with
/// [`finished_spans`](InMemoryReporter::finished_spans). Clones share the
/// same storage.
#[derive(Clone, Debug, Default)]
pub struct InMemoryReporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
}

impl InMemoryReporter {
    /// Creates an empty reporter.
    pub fn new() -> Self {
        InMemoryReporter::default()
    }

    /// Returns every span reported so far.
    pub fn finished_spans(&self) -> Vec<SpanData> {
        lock(&self.spans).clone()
    }

    /// Clears the internal storage of finished spans.
    pub fn reset(&self) {
        lock(&self.spans).clear();
    }
}

impl Reporter for InMemoryReporter {
    fn report(&self, mut spans: Vec<SpanData>) {
        lock(&self.spans).append(&mut spans);
    }
}

/// A reporter that writes serialized spans to the process log through
/// [`tracing`], one event per batch.
#[derive(Debug)]
pub struct LogReporter {
    serializer: Box<dyn SpanSerializer>,
}

impl LogReporter {
    /// Creates a reporter logging the plain-text form.
    pub fn new() -> Self {
        LogReporter {
            serializer: Box::new(TextSerializer),
        }
    }

    /// Creates a reporter logging through `serializer` instead.
    pub fn with_serializer(serializer: Box<dyn SpanSerializer>) -> Self {
        LogReporter { serializer }
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        LogReporter::new()
    }
}

impl Reporter for LogReporter {
    fn report(&self, spans: Vec<SpanData>) {
        if spans.is_empty() {
            return;
        }
        tracing::info!(
            spans = spans.len(),
            "{}",
            self.serializer.serialize(&spans)
        );
    }
}

/// Pure serialization of a span batch to a string payload.
pub trait SpanSerializer: fmt::Debug + Send + Sync {
    /// Serializes the batch.
    fn serialize(&self, spans: &[SpanData]) -> String;
}

/// Serializes spans as a zipkin api v2 json array.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonV2Serializer;

impl SpanSerializer for JsonV2Serializer {
    fn serialize(&self, spans: &[SpanData]) -> String {
        let spans: Vec<_> = spans.iter().map(model::into_json_span).collect();
        serde_json::to_string(&spans).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to serialize span batch");
            "[]".to_owned()
        })
    }
}

/// Serializes spans as human-readable log lines, one per span.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextSerializer;

impl SpanSerializer for TextSerializer {
    fn serialize(&self, spans: &[SpanData]) -> String {
        spans
            .iter()
            .map(span_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn span_line(span: &SpanData) -> String {
    let mut line = format!("{}/{}", span.trace_id, span.span_id);
    if let Some(kind) = span.kind {
        line.push_str(&format!(" {kind:?}").to_uppercase());
    }
    line.push(' ');
    line.push_str(span.name.as_deref().unwrap_or("unknown"));
    if let Some(duration) = span.duration {
        line.push_str(&format!(" took {duration}us"));
    }
    let mut tags: Vec<_> = span.tags.iter().collect();
    tags.sort();
    for (key, value) in tags {
        line.push_str(&format!(" {key}={value}"));
    }
    if let Some(error) = &span.error {
        line.push_str(&format!(" error={error}"));
    }
    line
}

#[cfg(test)]
pub(crate) fn test_span_data() -> SpanData {
    use crate::trace::{SamplingFlags, TraceContext};

    let context = TraceContext::builder()
        .sampling_flags(SamplingFlags::SAMPLED)
        .build(
            TraceId::from_hex("186f11b67460db4d").unwrap(),
            SpanId::from_hex("186f11b67460db4d").unwrap(),
        );
    SpanData {
        trace_id: context.trace_id(),
        span_id: context.span_id(),
        parent_id: None,
        debug: false,
        shared: false,
        name: Some("Test".to_owned()),
        kind: Some(Kind::Client),
        timestamp: Some(1_594_044_779_509_687),
        duration: Some(1000),
        local_endpoint: Endpoint::new("test-service".to_owned(), None),
        remote_endpoint: None,
        tags: HashMap::from([("test_key".to_owned(), "test_value".to_owned())]),
        annotations: Vec::new(),
        error: Some("test_error".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_reporter_captures_and_resets() {
        let reporter = InMemoryReporter::new();
        reporter.report(vec![test_span_data()]);
        reporter.report(vec![test_span_data()]);
        assert_eq!(reporter.finished_spans().len(), 2);

        // clones share storage
        let clone = reporter.clone();
        assert_eq!(clone.finished_spans().len(), 2);

        reporter.reset();
        assert!(clone.finished_spans().is_empty());
    }

    #[test]
    fn text_serializer_is_deterministic() {
        let mut span = test_span_data();
        span.tags.insert("zeta".to_owned(), "1".to_owned());
        span.tags.insert("alpha".to_owned(), "2".to_owned());

        let line = TextSerializer.serialize(&[span]);
        assert_eq!(
            line,
            "186f11b67460db4d/186f11b67460db4d CLIENT Test took 1000us \
             alpha=2 test_key=test_value zeta=1 error=test_error"
        );
    }

    #[test]
    fn json_serializer_emits_an_array() {
        let payload = JsonV2Serializer.serialize(&[test_span_data()]);
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value.as_array().map(|spans| spans.len()), Some(1));
    }
}
