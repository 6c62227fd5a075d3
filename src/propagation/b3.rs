//! # B3 propagation
//!
//! Encodes a [`TraceContext`] into B3 headers and decodes B3 headers back
//! into a context. Both forms are supported:
//!  1. Single header:
//!     `b3: {trace_id}-{span_id}-{sampling_state}[-{parent_span_id}]`
//!  2. Multiple headers:
//!     `X-B3-TraceId`, `X-B3-SpanId`, `X-B3-ParentSpanId`, `X-B3-Sampled`,
//!     `X-B3-Flags`
//!
//! The sampling state is `1` (sampled), `0` (not sampled), or `d` (debug);
//! a deferred decision is encoded by omitting the state entirely. Debug
//! supersedes sampled on the wire: when the debug flag is set, the
//! `X-B3-Flags: 1` header is written and the sampled header is not.
//!
//! Extraction is lenient: upstream senders cannot be controlled, so a
//! malformed field is dropped with a diagnostic rather than failing the
//! request, and the rest of the carrier is still used.

use crate::propagation::{Extracted, Extractor, Injector, RemoteInjector};
use crate::trace::{Kind, SamplingFlags, SpanId, TraceContext, TraceId};

const B3_SINGLE_HEADER: &str = "b3";
/// Header names are case-insensitive on the wire but different protocols
/// canonicalize differently, e.g. `X-B3-TraceId` over http/1 and
/// `x-b3-traceid` over grpc. Lower case is used here and carriers are
/// expected to look keys up case-insensitively.
const B3_TRACE_ID_HEADER: &str = "x-b3-traceid";
const B3_SPAN_ID_HEADER: &str = "x-b3-spanid";
const B3_PARENT_SPAN_ID_HEADER: &str = "x-b3-parentspanid";
const B3_SAMPLED_HEADER: &str = "x-b3-sampled";
const B3_DEBUG_FLAG_HEADER: &str = "x-b3-flags";

const B3_SINGLE_FIELDS: &[&str] = &[B3_SINGLE_HEADER];
const B3_MULTI_FIELDS: &[&str] = &[
    B3_TRACE_ID_HEADER,
    B3_SPAN_ID_HEADER,
    B3_PARENT_SPAN_ID_HEADER,
    B3_SAMPLED_HEADER,
    B3_DEBUG_FLAG_HEADER,
];
const B3_SINGLE_AND_MULTI_FIELDS: &[&str] = &[
    B3_SINGLE_HEADER,
    B3_TRACE_ID_HEADER,
    B3_SPAN_ID_HEADER,
    B3_PARENT_SPAN_ID_HEADER,
    B3_SAMPLED_HEADER,
    B3_DEBUG_FLAG_HEADER,
];

/// The header form written on injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum B3Encoding {
    /// Write the `x-b3-*` header family.
    MultipleHeader,
    /// Write the single compact `b3` header.
    SingleHeader,
    /// Write both forms. Extraction gives the single header precedence.
    SingleAndMultiHeader,
}

impl B3Encoding {
    fn injects_single(self) -> bool {
        matches!(self, B3Encoding::SingleHeader | B3Encoding::SingleAndMultiHeader)
    }

    fn injects_multi(self) -> bool {
        matches!(self, B3Encoding::MultipleHeader | B3Encoding::SingleAndMultiHeader)
    }
}

/// Injects and extracts trace contexts using B3 headers.
///
/// The injected form defaults to the multiple `x-b3-*` headers and can be
/// overridden globally or per remote span kind; messaging transports
/// commonly prefer the compact single header:
///
/// ```
/// use zipkin_tracer::propagation::{B3Encoding, B3Propagator};
/// use zipkin_tracer::Kind;
///
/// let propagator = B3Propagator::new()
///     .with_kind_encoding(Kind::Producer, B3Encoding::SingleHeader)
///     .with_kind_encoding(Kind::Consumer, B3Encoding::SingleHeader);
/// # drop(propagator);
/// ```
#[derive(Clone, Debug)]
pub struct B3Propagator {
    inject_encoding: B3Encoding,
    kind_encodings: [Option<B3Encoding>; 4],
}

impl Default for B3Propagator {
    fn default() -> Self {
        B3Propagator {
            inject_encoding: B3Encoding::MultipleHeader,
            kind_encodings: [None; 4],
        }
    }
}

fn kind_index(kind: Kind) -> usize {
    match kind {
        Kind::Client => 0,
        Kind::Server => 1,
        Kind::Producer => 2,
        Kind::Consumer => 3,
    }
}

impl B3Propagator {
    /// Create a propagator that injects the multiple `x-b3-*` headers.
    pub fn new() -> Self {
        B3Propagator::default()
    }

    /// Create a propagator that injects `encoding`.
    pub fn with_encoding(encoding: B3Encoding) -> Self {
        B3Propagator {
            inject_encoding: encoding,
            kind_encodings: [None; 4],
        }
    }

    /// Overrides the injected encoding for one remote span kind.
    pub fn with_kind_encoding(mut self, kind: Kind, encoding: B3Encoding) -> Self {
        self.kind_encodings[kind_index(kind)] = Some(encoding);
        self
    }

    /// The complete set of header names this propagator may write, letting
    /// reusable carriers clear stale values before injection.
    pub fn fields(&self) -> &'static [&'static str] {
        let encodings = std::iter::once(self.inject_encoding)
            .chain(self.kind_encodings.iter().flatten().copied());
        let (mut single, mut multi) = (false, false);
        for encoding in encodings {
            single |= encoding.injects_single();
            multi |= encoding.injects_multi();
        }
        match (single, multi) {
            (true, true) => B3_SINGLE_AND_MULTI_FIELDS,
            (true, false) => B3_SINGLE_FIELDS,
            _ => B3_MULTI_FIELDS,
        }
    }

    /// Writes `context` to the carrier using the configured encoding.
    pub fn inject(&self, context: &TraceContext, injector: &mut dyn Injector) {
        self.inject_encoded(context, self.inject_encoding, injector);
    }

    /// Writes `context` using the encoding configured for `kind`.
    pub fn inject_with_kind(&self, context: &TraceContext, kind: Kind, injector: &mut dyn Injector) {
        let encoding = self.kind_encodings[kind_index(kind)].unwrap_or(self.inject_encoding);
        self.inject_encoded(context, encoding, injector);
    }

    /// Writes `context` to a carrier that knows its remote span kind.
    pub fn inject_remote<T: RemoteInjector>(&self, context: &TraceContext, carrier: &mut T) {
        let kind = carrier.kind();
        self.inject_with_kind(context, kind, carrier);
    }

    fn inject_encoded<I: Injector + ?Sized>(
        &self,
        context: &TraceContext,
        encoding: B3Encoding,
        injector: &mut I,
    ) {
        let debug = context.debug();
        let sampled = context.sampled();

        if encoding.injects_single() {
            let mut value = format!("{}-{}", context.trace_id(), context.span_id());
            let state = if debug {
                Some("d")
            } else {
                sampled.map(|sampled| if sampled { "1" } else { "0" })
            };
            if let Some(state) = state {
                value.push('-');
                value.push_str(state);
                // the grammar only allows a parent after a sampling state
                if let Some(parent_id) = context.parent_id() {
                    value.push('-');
                    value.push_str(&parent_id.to_string());
                }
            }
            injector.set(B3_SINGLE_HEADER, value);
        }

        if encoding.injects_multi() {
            injector.set(B3_TRACE_ID_HEADER, context.trace_id().to_string());
            injector.set(B3_SPAN_ID_HEADER, context.span_id().to_string());
            if let Some(parent_id) = context.parent_id() {
                injector.set(B3_PARENT_SPAN_ID_HEADER, parent_id.to_string());
            }
            if debug {
                injector.set(B3_DEBUG_FLAG_HEADER, "1".to_string());
            } else if let Some(sampled) = sampled {
                injector.set(
                    B3_SAMPLED_HEADER,
                    if sampled { "1" } else { "0" }.to_string(),
                );
            }
        }
    }

    /// Reads trace state off the carrier.
    ///
    /// The single `b3` header takes precedence when usable, falling back
    /// to the multiple headers otherwise. Carriers without a usable trace
    /// identity extract to bare [`SamplingFlags`].
    pub fn extract(&self, extractor: &dyn Extractor) -> Extracted {
        if let Some(value) = extractor.get(B3_SINGLE_HEADER) {
            if let Some(extracted) = extract_single_header(value) {
                return extracted;
            }
        }
        extract_multi_header(extractor)
    }
}

/// Parses the sampling state character of the single header form.
fn parse_sampling_state(state: &str) -> Option<SamplingFlags> {
    match state {
        "0" => Some(SamplingFlags::NOT_SAMPLED),
        "1" => Some(SamplingFlags::SAMPLED),
        "d" => Some(SamplingFlags::DEBUG),
        _ => None,
    }
}

/// Parses an `x-b3-sampled` value. `true`/`false` are accepted for interop
/// with older tracers.
fn parse_sampled_header(value: &str) -> Option<bool> {
    match value {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => {
            tracing::debug!(value, "unreadable x-b3-sampled value treated as deferred");
            None
        }
    }
}

fn extract_single_header(value: &str) -> Option<Extracted> {
    if value.is_empty() {
        return None;
    }
    // a lone sampling state is valid, e.g. "b3: 0" from an unsampled
    // upstream that carries no identity
    if value.len() == 1 {
        return parse_sampling_state(value).map(Extracted::Flags);
    }

    let parts: Vec<&str> = value.split('-').collect();
    if !(2..=4).contains(&parts.len()) {
        tracing::debug!(value, "unreadable b3 header");
        return None;
    }

    let trace_id = match TraceId::from_hex(parts[0]) {
        Ok(trace_id) => trace_id,
        Err(_) => {
            tracing::debug!(value = parts[0], "malformed trace id in b3 header");
            return None;
        }
    };
    let span_id = match SpanId::from_hex(parts[1]) {
        Ok(span_id) => span_id,
        Err(_) => {
            tracing::debug!(value = parts[1], "malformed span id in b3 header");
            return None;
        }
    };

    let mut builder = TraceContext::builder();
    if parts.len() > 2 {
        match parse_sampling_state(parts[2]) {
            Some(flags) => builder = builder.sampling_flags(flags),
            None => tracing::debug!(value = parts[2], "malformed sampling state in b3 header"),
        }
    }
    if parts.len() == 4 {
        match SpanId::from_hex(parts[3]) {
            Ok(parent_id) => builder = builder.parent_id(parent_id),
            Err(_) => tracing::debug!(value = parts[3], "malformed parent id in b3 header"),
        }
    }

    Some(Extracted::Context(builder.build(trace_id, span_id)))
}

fn extract_multi_header(extractor: &dyn Extractor) -> Extracted {
    // when debug is set the sampled header should not have been sent, and
    // is ignored if it was
    let flags = if matches!(extractor.get(B3_DEBUG_FLAG_HEADER), Some("1")) {
        SamplingFlags::DEBUG
    } else {
        match extractor
            .get(B3_SAMPLED_HEADER)
            .and_then(parse_sampled_header)
        {
            Some(true) => SamplingFlags::SAMPLED,
            Some(false) => SamplingFlags::NOT_SAMPLED,
            None => SamplingFlags::EMPTY,
        }
    };

    let trace_id = match extractor.get(B3_TRACE_ID_HEADER) {
        Some(value) => match TraceId::from_hex(value) {
            Ok(trace_id) => trace_id,
            Err(_) => {
                tracing::debug!(value, "malformed x-b3-traceid treated as absent");
                return Extracted::Flags(flags);
            }
        },
        None => return Extracted::Flags(flags),
    };
    let span_id = match extractor.get(B3_SPAN_ID_HEADER) {
        Some(value) => match SpanId::from_hex(value) {
            Ok(span_id) => span_id,
            Err(_) => {
                tracing::debug!(value, "malformed x-b3-spanid treated as absent");
                return Extracted::Flags(flags);
            }
        },
        None => return Extracted::Flags(flags),
    };

    let mut builder = TraceContext::builder().sampling_flags(flags);
    if let Some(value) = extractor.get(B3_PARENT_SPAN_ID_HEADER) {
        match SpanId::from_hex(value) {
            Ok(parent_id) => builder = builder.parent_id(parent_id),
            Err(_) => tracing::debug!(value, "malformed x-b3-parentspanid dropped"),
        }
    }

    Extracted::Context(builder.build(trace_id, span_id))
}
