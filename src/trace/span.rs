//! The user-facing span handle.

use crate::error::TraceError;
use crate::trace::context::TraceContext;
use crate::trace::endpoint::Endpoint;
use crate::trace::recorder::Recorder;
use crate::trace::timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The role a span played in a remote interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    /// The span covers an outgoing request and the wait for its response.
    Client,
    /// The span covers handling a request received from a client.
    Server,
    /// The span covers sending a message to a broker.
    Producer,
    /// The span covers consuming a message from a broker.
    Consumer,
}

/// A handle on one named, timed unit of work.
///
/// Handles are either recording, forwarding every mutation to the
/// [`Recorder`], or no-ops handed out when the trace is unsampled or
/// tracing is disabled. A no-op handle ignores mutations but still carries
/// a valid [`TraceContext`], so injecting it into outgoing requests keeps
/// trace continuity for downstream services.
///
/// The lifecycle is caller-driven: an optional explicit [`start`], any
/// number of mutations in any order, then one of the terminal operations
/// [`finish`], [`abandon`], or [`flush`]. Finishing twice is harmless; the
/// first call wins.
///
/// [`start`]: Span::start
/// [`finish`]: Span::finish
/// [`abandon`]: Span::abandon
/// [`flush`]: Span::flush
#[derive(Debug)]
pub struct Span {
    context: TraceContext,
    inner: SpanInner,
}

enum SpanInner {
    Real { recorder: Arc<Recorder> },
    Noop,
}

impl fmt::Debug for SpanInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanInner::Real { .. } => f.write_str("Real"),
            SpanInner::Noop => f.write_str("Noop"),
        }
    }
}

impl Span {
    pub(crate) fn real(context: TraceContext, recorder: Arc<Recorder>) -> Self {
        Span {
            context,
            inner: SpanInner::Real { recorder },
        }
    }

    pub(crate) fn noop(context: TraceContext) -> Self {
        Span {
            context,
            inner: SpanInner::Noop,
        }
    }

    /// The trace position of this span, valid even for no-op handles.
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// Returns `true` if this handle records nothing.
    pub fn is_noop(&self) -> bool {
        matches!(self.inner, SpanInner::Noop)
    }

    fn recorder(&self) -> Option<&Recorder> {
        match &self.inner {
            SpanInner::Real { recorder } => Some(recorder),
            SpanInner::Noop => None,
        }
    }

    /// Records the current time as the start of the span.
    pub fn start(&self) {
        if let Some(recorder) = self.recorder() {
            recorder.start(&self.context, timestamp::now());
        }
    }

    /// Records an explicit start time, in microseconds since the epoch.
    pub fn start_with_timestamp(&self, timestamp: u64) -> Result<(), TraceError> {
        let Some(recorder) = self.recorder() else {
            return Ok(());
        };
        if !timestamp::is_valid(timestamp) {
            return Err(TraceError::InvalidTimestamp(timestamp));
        }
        recorder.start(&self.context, timestamp);
        Ok(())
    }

    /// Names the operation this span measures, e.g. `get /users/{id}`.
    pub fn set_name(&self, name: &str) {
        if let Some(recorder) = self.recorder() {
            recorder.set_name(&self.context, name);
        }
    }

    /// Sets the role this span played in a remote interaction.
    pub fn set_kind(&self, kind: Kind) {
        if let Some(recorder) = self.recorder() {
            recorder.set_kind(&self.context, kind);
        }
    }

    /// Tags the span with a key/value pair; the last write per key wins.
    pub fn tag(&self, key: &str, value: &str) {
        if let Some(recorder) = self.recorder() {
            recorder.tag(&self.context, key, value);
        }
    }

    /// Annotates the span with an event at the current time.
    pub fn annotate(&self, value: &str) -> Result<(), TraceError> {
        self.annotate_with_timestamp(value, timestamp::now())
    }

    /// Annotates the span with an event at an explicit time.
    pub fn annotate_with_timestamp(&self, value: &str, timestamp: u64) -> Result<(), TraceError> {
        let Some(recorder) = self.recorder() else {
            return Ok(());
        };
        if value.is_empty() {
            return Err(TraceError::EmptyAnnotationValue);
        }
        if !timestamp::is_valid(timestamp) {
            return Err(TraceError::InvalidTimestamp(timestamp));
        }
        recorder.annotate(&self.context, timestamp, value);
        Ok(())
    }

    /// Sets the endpoint this span talked to, for client and producer
    /// spans.
    pub fn set_remote_endpoint(&self, endpoint: Endpoint) {
        if let Some(recorder) = self.recorder() {
            recorder.set_remote_endpoint(&self.context, endpoint);
        }
    }

    /// Records the error that failed this span. Serializers surface it as
    /// an `error` tag unless one was set explicitly.
    pub fn set_error(&self, error: impl fmt::Display) {
        if let Some(recorder) = self.recorder() {
            recorder.set_error(&self.context, &error.to_string());
        }
    }

    /// Finishes the span at the current time. Idempotent.
    pub fn finish(&self) {
        if let Some(recorder) = self.recorder() {
            recorder.finish(&self.context, timestamp::now());
        }
    }

    /// Finishes the span at an explicit time. Idempotent.
    pub fn finish_with_timestamp(&self, timestamp: u64) -> Result<(), TraceError> {
        let Some(recorder) = self.recorder() else {
            return Ok(());
        };
        if !timestamp::is_valid(timestamp) {
            return Err(TraceError::InvalidTimestamp(timestamp));
        }
        recorder.finish(&self.context, timestamp);
        Ok(())
    }

    /// Discards the span without reporting it.
    pub fn abandon(&self) {
        if let Some(recorder) = self.recorder() {
            recorder.abandon(&self.context);
        }
    }

    /// Reports the span in whatever state it currently has, without
    /// requiring [`finish`] to have run.
    ///
    /// This supports one-way spans whose start and finish happen in
    /// different processes.
    ///
    /// [`finish`]: Span::finish
    pub fn flush(&self) {
        if let Some(recorder) = self.recorder() {
            recorder.flush(&self.context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::InMemoryReporter;
    use crate::trace::sampling::SamplingFlags;

    fn real_span() -> (Span, InMemoryReporter, Arc<Recorder>) {
        let reporter = InMemoryReporter::new();
        let recorder = Arc::new(Recorder::new(
            Endpoint::default(),
            Box::new(reporter.clone()),
            false,
        ));
        let context = TraceContext::new_root(SamplingFlags::SAMPLED, false);
        (
            Span::real(context, Arc::clone(&recorder)),
            reporter,
            recorder,
        )
    }

    #[test]
    fn annotation_values_must_be_non_empty() {
        let (span, _reporter, _recorder) = real_span();
        assert!(matches!(
            span.annotate(""),
            Err(TraceError::EmptyAnnotationValue)
        ));
        assert!(span.annotate("cache miss").is_ok());
    }

    #[test]
    fn explicit_timestamps_are_validated() {
        let (span, _reporter, _recorder) = real_span();
        assert!(matches!(
            span.start_with_timestamp(123),
            Err(TraceError::InvalidTimestamp(123))
        ));
        assert!(span.start_with_timestamp(1_594_044_779_509_687).is_ok());
        assert!(matches!(
            span.finish_with_timestamp(123),
            Err(TraceError::InvalidTimestamp(123))
        ));
        assert!(matches!(
            span.annotate_with_timestamp("late", 42),
            Err(TraceError::InvalidTimestamp(42))
        ));
    }

    #[test]
    fn flush_reports_without_finish() {
        let (span, reporter, _recorder) = real_span();
        span.start();
        span.set_name("one-way");
        span.flush();

        let spans = reporter.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name.as_deref(), Some("one-way"));
    }

    #[test]
    fn noop_span_mutators_leave_no_state_behind() {
        let reporter = InMemoryReporter::new();
        let recorder = Arc::new(Recorder::new(
            Endpoint::default(),
            Box::new(reporter.clone()),
            false,
        ));
        let context = TraceContext::new_root(SamplingFlags::NOT_SAMPLED, false);
        let span = Span::noop(context.clone());

        assert!(span.is_noop());
        span.start();
        span.set_name("ignored");
        span.set_kind(Kind::Client);
        span.tag("a", "b");
        assert!(span.annotate("ignored").is_ok());
        assert!(span.annotate("").is_ok()); // no validation on no-op handles
        span.set_remote_endpoint(Endpoint::default());
        span.finish();
        span.flush();

        // the context stays usable for propagation
        assert_eq!(span.context(), &context);

        recorder.flush_all();
        assert!(reporter.finished_spans().is_empty());
    }
}
