//! Trace context propagation across process boundaries.
//!
//! Propagation reads and writes trace identity to *carriers*, typically
//! the headers of a request. Carrier types implement [`Injector`] and
//! [`Extractor`] to describe how key/value pairs land in them; the
//! [`B3Propagator`] decides which keys and values.

use crate::trace::{Kind, SamplingFlags, TraceContext};
use std::collections::HashMap;

mod b3;

pub use b3::{B3Encoding, B3Propagator};

/// Injector provides an interface for adding fields to an underlying
/// carrier such as a header map.
pub trait Injector {
    /// Add a key and value to the underlying data.
    fn set(&mut self, key: &str, value: String);
}

/// Extractor provides an interface for reading fields from an underlying
/// carrier such as a header map. Lookups are case-insensitive.
pub trait Extractor {
    /// Get a value for a key from the underlying data.
    fn get(&self, key: &str) -> Option<&str>;

    /// Collect all the keys from the underlying data.
    fn keys(&self) -> Vec<&str>;
}

/// An [`Injector`] that knows the role of the remote interaction it
/// carries, letting propagators vary their encoding per span kind, e.g.
/// the compact single header for messaging.
pub trait RemoteInjector: Injector {
    /// The role the remote side plays in this interaction.
    fn kind(&self) -> Kind;
}

impl<S: std::hash::BuildHasher> Injector for HashMap<String, String, S> {
    /// Set a key and value in the HashMap.
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_lowercase(), value);
    }
}

impl<S: std::hash::BuildHasher> Extractor for HashMap<String, String, S> {
    /// Get a value for a key from the HashMap.
    fn get(&self, key: &str) -> Option<&str> {
        self.get(&key.to_lowercase()).map(|v| v.as_str())
    }

    /// Collect all the keys from the HashMap.
    fn keys(&self) -> Vec<&str> {
        self.keys().map(|k| k.as_str()).collect::<Vec<_>>()
    }
}

/// The result of reading trace state off a carrier.
///
/// Carriers without a usable trace identity still may carry sampling
/// state, e.g. an upstream load balancer that only decides sampling; such
/// carriers extract to bare flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Extracted {
    /// The carrier held a complete trace position.
    Context(TraceContext),
    /// The carrier held sampling state alone, or nothing.
    Flags(SamplingFlags),
}

impl Extracted {
    /// The extracted context, when identity was present.
    pub fn context(&self) -> Option<&TraceContext> {
        match self {
            Extracted::Context(context) => Some(context),
            Extracted::Flags(_) => None,
        }
    }

    /// The sampling state, regardless of whether identity was present.
    pub fn sampling_flags(&self) -> SamplingFlags {
        match self {
            Extracted::Context(context) => context.sampling_flags(),
            Extracted::Flags(flags) => *flags,
        }
    }
}
