//! Mutation of in-flight span records, addressed by trace context.

use crate::report::{Reporter, SpanData};
use crate::trace::context::TraceContext;
use crate::trace::endpoint::Endpoint;
use crate::trace::span::Kind;
use crate::trace::span_map::{lock, SpanMap};
use crate::trace::timestamp;

/// Applies span mutations to the record addressed by a [`TraceContext`]
/// and hands finished state to the [`Reporter`].
///
/// Every mutator is a silent no-op for unknown contexts, and all of them
/// except [`start`] and the removal operations short-circuit when the
/// recorder is disabled. Reporting failures never propagate back through
/// the recorder: the reporter absorbs them.
///
/// [`start`]: Recorder::start
#[derive(Debug)]
pub struct Recorder {
    span_map: SpanMap,
    local_endpoint: Endpoint,
    reporter: Box<dyn Reporter>,
    noop: bool,
}

impl Recorder {
    pub(crate) fn new(local_endpoint: Endpoint, reporter: Box<dyn Reporter>, noop: bool) -> Self {
        Recorder {
            span_map: SpanMap::default(),
            local_endpoint,
            reporter,
            noop,
        }
    }

    /// The endpoint recorded as `localEndpoint` on every span.
    pub fn local_endpoint(&self) -> &Endpoint {
        &self.local_endpoint
    }

    /// Creates the record for `context` if needed and sets its start time.
    ///
    /// Unlike the other mutators this runs even when the recorder is
    /// disabled, so a record keeps its timing if recording is enabled
    /// before the span finishes.
    pub fn start(&self, context: &TraceContext, timestamp: u64) {
        lock(&self.span_map.get_or_create(context, &self.local_endpoint)).start(timestamp);
    }

    /// Sets the operation name of the span addressed by `context`.
    pub fn set_name(&self, context: &TraceContext, name: &str) {
        if self.noop {
            return;
        }
        lock(&self.span_map.get_or_create(context, &self.local_endpoint)).set_name(name);
    }

    /// Sets the kind of the span addressed by `context`.
    pub fn set_kind(&self, context: &TraceContext, kind: Kind) {
        if self.noop {
            return;
        }
        lock(&self.span_map.get_or_create(context, &self.local_endpoint)).set_kind(kind);
    }

    /// Tags the span addressed by `context`; the last write per key wins.
    pub fn tag(&self, context: &TraceContext, key: &str, value: &str) {
        if self.noop {
            return;
        }
        lock(&self.span_map.get_or_create(context, &self.local_endpoint)).tag(key, value);
    }

    /// Appends a timestamped annotation to the span addressed by `context`.
    pub fn annotate(&self, context: &TraceContext, timestamp: u64, value: &str) {
        if self.noop {
            return;
        }
        lock(&self.span_map.get_or_create(context, &self.local_endpoint)).annotate(timestamp, value);
    }

    /// Sets the remote endpoint of the span addressed by `context`.
    pub fn set_remote_endpoint(&self, context: &TraceContext, endpoint: Endpoint) {
        if self.noop {
            return;
        }
        lock(&self.span_map.get_or_create(context, &self.local_endpoint))
            .set_remote_endpoint(endpoint);
    }

    /// Records the error that failed the span addressed by `context`.
    pub fn set_error(&self, context: &TraceContext, message: &str) {
        if self.noop {
            return;
        }
        lock(&self.span_map.get_or_create(context, &self.local_endpoint)).set_error(message);
    }

    /// Marks the record finished, fixing its duration when the start time
    /// is known. Does not create a record; the first call wins.
    ///
    /// The finished record stays in the table until the tracer flushes, so
    /// late tags are still possible and nothing reports twice.
    pub fn finish(&self, context: &TraceContext, finish_timestamp: u64) {
        if let Some(record) = self.span_map.get(context) {
            lock(&record).finish(finish_timestamp);
        }
    }

    /// Discards the record without reporting it, regardless of whether the
    /// recorder is disabled.
    pub fn abandon(&self, context: &TraceContext) {
        self.span_map.remove(context);
    }

    /// Removes the record and reports it immediately as a one-element
    /// batch, force-finishing it first if needed.
    pub fn flush(&self, context: &TraceContext) {
        let Some(record) = self.span_map.remove(context) else {
            return;
        };
        if self.noop {
            return;
        }
        let mut record = lock(&record);
        if !record.is_finished() {
            record.finish(timestamp::now());
        }
        self.reporter.report(vec![record.to_span_data()]);
    }

    /// Drains every in-flight record, finished or not, and reports the
    /// batch. Supports graceful shutdown with orphaned spans still open.
    pub fn flush_all(&self) {
        let records = self.span_map.remove_all();
        if self.noop {
            return;
        }
        let batch: Vec<SpanData> = records
            .into_iter()
            .map(|record| lock(&record).to_span_data())
            .collect();
        if !batch.is_empty() {
            self.reporter.report(batch);
        }
    }
}
