//! The tracing entry point.

use crate::propagation::Extracted;
use crate::report::{LogReporter, Reporter};
use crate::trace::context::TraceContext;
use crate::trace::endpoint::Endpoint;
use crate::trace::recorder::Recorder;
use crate::trace::sampler::{AlwaysSampler, Sampler};
use crate::trace::sampling::SamplingFlags;
use crate::trace::span::Span;
use std::sync::Arc;

/// Creates spans, applying the sampling policy exactly once per trace.
///
/// A tracer owns the [`Recorder`] all of its spans write through and the
/// [`Sampler`] consulted whenever a new span's sampling decision is still
/// deferred. Spans of unsampled traces come back as no-op handles that
/// keep propagation working at zero recording cost.
#[derive(Debug)]
pub struct Tracer {
    recorder: Arc<Recorder>,
    sampler: Box<dyn Sampler>,
    uses_128bit_trace_ids: bool,
    noop: bool,
}

impl Tracer {
    /// Returns a builder used to configure a `Tracer`.
    pub fn builder() -> TracerBuilder {
        TracerBuilder::default()
    }

    /// Starts the trace of a new request arriving without trace state.
    pub fn new_trace(&self) -> Span {
        self.new_trace_with_flags(SamplingFlags::EMPTY)
    }

    /// Starts a new trace carrying sampling state decided elsewhere, e.g.
    /// flags extracted from headers that had no trace identity.
    pub fn new_trace_with_flags(&self, flags: SamplingFlags) -> Span {
        let context = TraceContext::new_root(flags, self.uses_128bit_trace_ids);
        self.to_span(self.ensure_sampled(context))
    }

    /// Starts a span within the trace of `parent`, one level down.
    pub fn new_child(&self, parent: &TraceContext) -> Span {
        self.to_span(self.ensure_sampled(parent.child()))
    }

    /// Continues the span started by the remote client that sent
    /// `context`, sharing its span id.
    ///
    /// Used by servers so that both halves of an RPC land on one span.
    pub fn join_span(&self, context: TraceContext) -> Span {
        self.to_span(self.ensure_sampled(context.with_shared(true)))
    }

    /// Starts the right span for an extraction result: a child of the
    /// extracted context, a new trace carrying extracted flags, or a plain
    /// new trace when nothing was extracted.
    pub fn next_span(&self, extracted: Option<&Extracted>) -> Span {
        match extracted {
            Some(Extracted::Context(context)) => self.new_child(context),
            Some(Extracted::Flags(flags)) => self.new_trace_with_flags(*flags),
            None => self.new_trace(),
        }
    }

    /// The recorder spans created by this tracer write through.
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Drains and reports every in-flight span, finished or not.
    ///
    /// Callers typically flush once the surrounding unit of work, e.g. an
    /// http request, has been answered, keeping transport off the hot
    /// path.
    pub fn flush(&self) {
        self.recorder.flush_all();
    }

    fn ensure_sampled(&self, context: TraceContext) -> TraceContext {
        match context.sampled() {
            Some(_) => context,
            None => {
                let sampled = self.sampler.is_sampled(context.trace_id());
                context.with_sampled(sampled)
            }
        }
    }

    fn to_span(&self, context: TraceContext) -> Span {
        if self.noop || context.sampled() != Some(true) {
            Span::noop(context)
        } else {
            Span::real(context, Arc::clone(&self.recorder))
        }
    }
}

/// Configures and builds a [`Tracer`].
#[derive(Debug, Default)]
pub struct TracerBuilder {
    local_endpoint: Option<Endpoint>,
    sampler: Option<Box<dyn Sampler>>,
    reporter: Option<Box<dyn Reporter>>,
    uses_128bit_trace_ids: bool,
    noop: bool,
}

impl TracerBuilder {
    /// Sets the endpoint recorded as `localEndpoint` on every span.
    /// Defaults to the `unknown` service with no address.
    pub fn with_local_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.local_endpoint = Some(endpoint);
        self
    }

    /// Sets the sampling policy for new traces. Defaults to sampling
    /// everything.
    pub fn with_sampler(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Sets the sink finished spans are handed to. Defaults to the
    /// [`LogReporter`].
    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// When `true`, root trace ids are 128 bits wide. Defaults to `false`.
    pub fn with_128bit_trace_ids(mut self, uses_128bit_trace_ids: bool) -> Self {
        self.uses_128bit_trace_ids = uses_128bit_trace_ids;
        self
    }

    /// When `true`, the tracer hands out no-op spans regardless of
    /// sampling, disabling all recording. Defaults to `false`.
    pub fn with_noop(mut self, noop: bool) -> Self {
        self.noop = noop;
        self
    }

    /// Constructs the tracer.
    pub fn build(self) -> Tracer {
        let noop = self.noop;
        let recorder = Recorder::new(
            self.local_endpoint.unwrap_or_default(),
            self.reporter
                .unwrap_or_else(|| Box::new(LogReporter::new())),
            noop,
        );
        Tracer {
            recorder: Arc::new(recorder),
            sampler: self.sampler.unwrap_or_else(|| Box::new(AlwaysSampler)),
            uses_128bit_trace_ids: self.uses_128bit_trace_ids,
            noop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::InMemoryReporter;
    use crate::trace::sampler::NeverSampler;

    fn tracer_with_reporter() -> (Tracer, InMemoryReporter) {
        let reporter = InMemoryReporter::new();
        let tracer = Tracer::builder()
            .with_local_endpoint(Endpoint::new("frontend".to_owned(), None))
            .with_reporter(Box::new(reporter.clone()))
            .build();
        (tracer, reporter)
    }

    #[test]
    fn root_span_round_trip() {
        let (tracer, reporter) = tracer_with_reporter();

        let span = tracer.new_trace();
        // the sampler ran: the deferred decision is resolved
        assert_eq!(span.context().sampled(), Some(true));

        span.start_with_timestamp(1_594_044_779_509_687).unwrap();
        span.tag("http.method", "GET");
        span.finish_with_timestamp(1_594_044_779_510_687).unwrap();
        tracer.flush();

        let spans = reporter.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].duration, Some(1000));
        assert_eq!(spans[0].tags.len(), 1);
        assert_eq!(
            spans[0].tags.get("http.method").map(String::as_str),
            Some("GET")
        );
        assert_eq!(spans[0].local_endpoint.service_name(), "frontend");
    }

    #[test]
    fn unsampled_traces_get_noop_spans() {
        let reporter = InMemoryReporter::new();
        let tracer = Tracer::builder()
            .with_sampler(Box::new(NeverSampler))
            .with_reporter(Box::new(reporter.clone()))
            .build();

        let span = tracer.new_trace();
        assert!(span.is_noop());
        assert_eq!(span.context().sampled(), Some(false));

        span.start();
        span.finish();
        tracer.flush();
        assert!(reporter.finished_spans().is_empty());
    }

    #[test]
    fn debug_flags_force_sampling_past_the_sampler() {
        let (mut tracer, _reporter) = tracer_with_reporter();
        tracer.sampler = Box::new(NeverSampler);

        let span = tracer.new_trace_with_flags(SamplingFlags::DEBUG);
        assert!(!span.is_noop());
        assert_eq!(span.context().sampled(), Some(true));
        assert!(span.context().debug());
    }

    #[test]
    fn children_extend_the_parent_trace() {
        let (tracer, _reporter) = tracer_with_reporter();
        let parent = tracer.new_trace();
        let child = tracer.new_child(parent.context());

        assert_eq!(child.context().trace_id(), parent.context().trace_id());
        assert_eq!(child.context().parent_id(), Some(parent.context().span_id()));
    }

    #[test]
    fn joined_spans_share_identity_and_are_marked_shared() {
        let (tracer, _reporter) = tracer_with_reporter();
        let client_context = TraceContext::new_root(SamplingFlags::SAMPLED, false);
        let server = tracer.join_span(client_context.clone());

        assert_eq!(server.context().span_id(), client_context.span_id());
        assert_eq!(server.context().trace_id(), client_context.trace_id());
        assert!(server.context().shared());
    }

    #[test]
    fn next_span_follows_the_extraction_result() {
        let (tracer, _reporter) = tracer_with_reporter();

        let upstream = TraceContext::new_root(SamplingFlags::SAMPLED, false);
        let child = tracer.next_span(Some(&Extracted::Context(upstream.clone())));
        assert_eq!(child.context().parent_id(), Some(upstream.span_id()));

        let from_flags = tracer.next_span(Some(&Extracted::Flags(SamplingFlags::NOT_SAMPLED)));
        assert!(from_flags.is_noop());
        assert!(from_flags.context().parent_id().is_none());

        let fresh = tracer.next_span(None);
        assert!(fresh.context().parent_id().is_none());
    }

    #[test]
    fn noop_tracer_keeps_context_continuity() {
        let reporter = InMemoryReporter::new();
        let tracer = Tracer::builder()
            .with_noop(true)
            .with_reporter(Box::new(reporter.clone()))
            .build();

        let span = tracer.new_trace();
        assert!(span.is_noop());
        // identity still flows even though nothing records
        assert_eq!(span.context().sampled(), Some(true));
        let child = tracer.new_child(span.context());
        assert_eq!(child.context().trace_id(), span.context().trace_id());

        tracer.flush();
        assert!(reporter.finished_spans().is_empty());
    }

    #[test]
    fn root_trace_ids_can_be_128bit() {
        let reporter = InMemoryReporter::new();
        let tracer = Tracer::builder()
            .with_128bit_trace_ids(true)
            .with_reporter(Box::new(reporter.clone()))
            .build();
        let span = tracer.new_trace();
        assert!(span.context().uses_128bit_trace_id());
    }
}
