use thiserror::Error;

/// Errors returned by the tracing API.
///
/// These surface direct API misuse only. Transport failures never reach the
/// instrumented application: they are absorbed at the reporter boundary and
/// routed to logging instead.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TraceError {
    /// Sampling rates are a probability and must stay within `[0, 1]`.
    #[error("sampling rate {0} is out of range, expected a value within [0, 1]")]
    InvalidSamplingRate(f64),

    /// Annotation values carry the event description and must be non-empty.
    #[error("annotation values must be non-empty")]
    EmptyAnnotationValue,

    /// Explicit timestamps are microseconds since the unix epoch.
    #[error("timestamp {0} is not a plausible microsecond epoch value")]
    InvalidTimestamp(u64),

    /// Trace ids are 1 to 32 lower-hex characters.
    #[error("{0:?} is not a valid hex trace id")]
    InvalidTraceId(String),

    /// Span ids are 1 to 16 lower-hex characters.
    #[error("{0:?} is not a valid hex span id")]
    InvalidSpanId(String),

    /// The configured collector endpoint could not be parsed as a uri.
    #[error("invalid collector endpoint: {0}")]
    InvalidCollectorEndpoint(#[from] http::uri::InvalidUri),

    /// No http client implementation found. Users should provide one or
    /// enable the `reqwest-blocking-client` feature.
    #[error("http client must be set, enable the reqwest-blocking-client feature or provide one")]
    NoHttpClient,
}
