//! Client-side [Zipkin] distributed tracing instrumentation.
//!
//! This crate creates, annotates, and reports spans describing units of work
//! across a distributed system, and propagates trace identity over process
//! boundaries using [B3 headers].
//!
//! # Getting started
//!
//! A [`Tracer`] is built once per service and shared. It owns the sampling
//! policy, the local [`Endpoint`] reported on every span, and the
//! [`Reporter`] finished spans are handed to:
//!
//! ```
//! use zipkin_tracer::{report::InMemoryReporter, Endpoint, Tracer};
//!
//! let reporter = InMemoryReporter::new();
//! let tracer = Tracer::builder()
//!     .with_local_endpoint(Endpoint::new("frontend".to_owned(), None))
//!     .with_reporter(Box::new(reporter.clone()))
//!     .build();
//!
//! let span = tracer.new_trace();
//! span.start();
//! span.tag("http.method", "GET");
//! span.finish();
//!
//! // Finished spans stay in flight until the tracer is flushed, typically
//! // once the surrounding request has been answered.
//! tracer.flush();
//! assert_eq!(reporter.finished_spans().len(), 1);
//! ```
//!
//! # Propagation
//!
//! Trace identity crosses the wire through the [`propagation`] module. The
//! [`B3Propagator`] writes and reads the `x-b3-*` header family as well as
//! the combined single `b3` header:
//!
//! ```
//! use std::collections::HashMap;
//! use zipkin_tracer::propagation::{B3Propagator, Extracted};
//! use zipkin_tracer::Tracer;
//!
//! let tracer = Tracer::builder().build();
//! let propagator = B3Propagator::new();
//!
//! let span = tracer.new_trace();
//! let mut headers = HashMap::new();
//! propagator.inject(span.context(), &mut headers);
//!
//! // ...on the receiving side:
//! let span = match propagator.extract(&headers) {
//!     Extracted::Context(context) => tracer.join_span(context),
//!     Extracted::Flags(flags) => tracer.new_trace_with_flags(flags),
//! };
//! # drop(span);
//! ```
//!
//! Spans that are not sampled come back as no-op handles: mutations cost
//! nothing, but the span context stays valid so downstream services still
//! receive consistent trace identity.
//!
//! [Zipkin]: https://zipkin.io
//! [B3 headers]: https://github.com/openzipkin/b3-propagation
//! [`Reporter`]: crate::report::Reporter
//! [`B3Propagator`]: crate::propagation::B3Propagator
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
pub mod propagation;
pub mod report;
pub mod trace;

pub use error::TraceError;
pub use trace::{
    CurrentTraceContext, Endpoint, Kind, Recorder, SamplingFlags, Scope, Span, SpanId,
    TraceContext, TraceId, Tracer, TracerBuilder,
};
