//! Samplers decide whether a new trace is recorded.

use crate::error::TraceError;
use crate::trace::id::{with_rng, TraceId};
use rand::Rng;
use std::fmt;

/// The decision function applied to every root span whose sampling state
/// was not decided upstream.
///
/// Samplers run at most once per trace: the decision made for the root is
/// propagated to children and across the wire. Implementations may use the
/// trace id or independent randomness, but must not block.
pub trait Sampler: fmt::Debug + Send + Sync {
    /// Returns `true` if spans of the trace identified by `trace_id` should
    /// be recorded and reported.
    fn is_sampled(&self, trace_id: TraceId) -> bool;
}

/// Sample every trace.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysSampler;

impl Sampler for AlwaysSampler {
    fn is_sampled(&self, _trace_id: TraceId) -> bool {
        true
    }
}

/// Sample no traces. Debug requests still force recording.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverSampler;

impl Sampler for NeverSampler {
    fn is_sampled(&self, _trace_id: TraceId) -> bool {
        false
    }
}

/// Sample a given fraction of traces, drawing a fresh uniform variate per
/// decision.
#[derive(Clone, Copy, Debug)]
pub struct PercentageSampler {
    rate: f64,
}

impl PercentageSampler {
    /// Create a sampler recording approximately `rate` of all traces.
    ///
    /// Returns [`TraceError::InvalidSamplingRate`] unless `rate` is within
    /// `[0, 1]`.
    pub fn new(rate: f64) -> Result<Self, TraceError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(TraceError::InvalidSamplingRate(rate));
        }
        Ok(PercentageSampler { rate })
    }

    /// The configured sampling rate.
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Sampler for PercentageSampler {
    fn is_sampled(&self, _trace_id: TraceId) -> bool {
        if self.rate == 0.0 {
            false
        } else if self.rate == 1.0 {
            true
        } else {
            with_rng(|rng| rng.gen::<f64>()) < self.rate
        }
    }
}
