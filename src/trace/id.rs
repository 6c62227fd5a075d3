//! Trace and span identifiers.
//!
//! Both ids are random values rendered as lower-hex on the wire. A trace id
//! is either 64 or 128 bits wide (16 or 32 hex characters) and remembers
//! which, so that it round-trips through headers unchanged; a span id is
//! always 64 bits (16 hex characters).

use crate::error::TraceError;
use rand::{rngs, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<rngs::StdRng> = RefCell::new(rngs::StdRng::from_entropy());
}

pub(crate) fn with_rng<T>(f: impl FnOnce(&mut rngs::StdRng) -> T) -> T {
    CURRENT_RNG.with(|rng| f(&mut rng.borrow_mut()))
}

/// A 64-bit value which identifies a span within a trace.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(u64);

impl SpanId {
    /// Generate a new span id from 8 random bytes.
    pub fn random() -> Self {
        SpanId(with_rng(|rng| rng.gen::<u64>()))
    }

    /// Converts a string of 1 to 16 hex characters into a span id.
    pub fn from_hex(hex: &str) -> Result<Self, TraceError> {
        if !Self::is_valid_hex(hex) {
            return Err(TraceError::InvalidSpanId(hex.to_owned()));
        }
        u64::from_str_radix(hex, 16)
            .map(SpanId)
            .map_err(|_| TraceError::InvalidSpanId(hex.to_owned()))
    }

    /// Returns `true` if `hex` is 1 to 16 hex characters.
    pub fn is_valid_hex(hex: &str) -> bool {
        !hex.is_empty() && hex.len() <= 16 && hex.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Return the representation of this span id as a byte array.
    pub const fn to_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl From<u64> for SpanId {
    fn from(value: u64) -> Self {
        SpanId(value)
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:016x}", self.0))
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:016x}", self.0))
    }
}

impl fmt::LowerHex for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// A value which identifies a trace, either 64 or 128 bits wide.
///
/// The width is fixed when the id is created and preserved through
/// hex round trips, so a 64-bit id received from an upstream service is
/// re-emitted as 16 characters rather than zero-padded to 32. Equality is
/// structural over both the value and the width.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId {
    value: u128,
    is_128bit: bool,
}

impl TraceId {
    /// Generate a new 128-bit trace id from 16 random bytes.
    pub fn random_128() -> Self {
        TraceId {
            value: with_rng(|rng| rng.gen::<u128>()),
            is_128bit: true,
        }
    }

    /// Generate a new 64-bit trace id, reusing the span id generator.
    pub fn random_64() -> Self {
        TraceId::from(SpanId::random())
    }

    /// Converts a string of 1 to 32 hex characters into a trace id.
    ///
    /// Values longer than 16 characters produce a 128-bit id.
    pub fn from_hex(hex: &str) -> Result<Self, TraceError> {
        if !Self::is_valid_hex(hex) {
            return Err(TraceError::InvalidTraceId(hex.to_owned()));
        }
        u128::from_str_radix(hex, 16)
            .map(|value| TraceId {
                value,
                is_128bit: hex.len() > 16,
            })
            .map_err(|_| TraceError::InvalidTraceId(hex.to_owned()))
    }

    /// Returns `true` if `hex` is 1 to 32 hex characters.
    pub fn is_valid_hex(hex: &str) -> bool {
        !hex.is_empty() && hex.len() <= 32 && hex.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Returns `true` for 128-bit trace ids.
    pub fn is_128bit(&self) -> bool {
        self.is_128bit
    }

    /// Return the representation of this trace id as a byte array.
    pub const fn to_bytes(self) -> [u8; 16] {
        self.value.to_be_bytes()
    }
}

impl From<SpanId> for TraceId {
    fn from(id: SpanId) -> Self {
        TraceId {
            value: u64::from_be_bytes(id.to_bytes()) as u128,
            is_128bit: false,
        }
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_128bit {
            f.write_fmt(format_args!("{:032x}", self.value))
        } else {
            f.write_fmt(format_args!("{:016x}", self.value))
        }
    }
}

impl fmt::LowerHex for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.value, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_span_ids_are_16_lower_hex_chars() {
        for _ in 0..32 {
            let hex = SpanId::random().to_string();
            assert_eq!(hex.len(), 16);
            assert!(hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        }
    }

    #[test]
    fn generated_trace_ids_have_the_requested_width() {
        for _ in 0..32 {
            let hex = TraceId::random_128().to_string();
            assert_eq!(hex.len(), 32);
            assert!(hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));

            assert_eq!(TraceId::random_64().to_string().len(), 16);
        }
    }

    #[test]
    fn validation_rejects_empty_non_hex_and_over_length() {
        assert!(!TraceId::is_valid_hex(""));
        assert!(!TraceId::is_valid_hex("qw000000000000000000000000000000"));
        assert!(!TraceId::is_valid_hex("ab0000000000000000000000000000000")); // 33 chars
        assert!(TraceId::is_valid_hex("42"));
        assert!(TraceId::is_valid_hex("4bf92f3577b34da6a3ce929d0e0e4736"));

        assert!(!SpanId::is_valid_hex(""));
        assert!(!SpanId::is_valid_hex("00f067aa0ba902b7ff")); // 18 chars
        assert!(!SpanId::is_valid_hex("00f067aa0ba902bz"));
        assert!(SpanId::is_valid_hex("00f067aa0ba902b7"));
    }

    #[test]
    fn hex_round_trip_preserves_width() {
        let short = TraceId::from_hex("bd7a977555f6b982").unwrap();
        assert!(!short.is_128bit());
        assert_eq!(short.to_string(), "bd7a977555f6b982");

        let long = TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap();
        assert!(long.is_128bit());
        assert_eq!(long.to_string(), "4bf92f3577b34da6a3ce929d0e0e4736");

        // same value, different width: distinct ids
        let padded = TraceId::from_hex("0000000000000000bd7a977555f6b982").unwrap();
        assert_ne!(short, padded);
    }

    #[test]
    fn short_hex_is_left_padded() {
        let id = SpanId::from_hex("2a").unwrap();
        assert_eq!(id.to_string(), "000000000000002a");
    }
}
