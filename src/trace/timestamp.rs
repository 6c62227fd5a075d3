//! Microsecond timestamps.
//!
//! Zipkin records times as microseconds since the unix epoch. Explicit
//! timestamps supplied by callers are checked against a plausibility window
//! (16 decimal digits) before they are recorded.

use std::time::{Duration, SystemTime};

const LOWER_BOUND: u64 = 1_000_000_000_000_000;
const UPPER_BOUND: u64 = 10_000_000_000_000_000;

/// The current time in microseconds since the unix epoch.
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_micros() as u64
}

/// Returns `true` if `timestamp` is a plausible microsecond epoch value.
pub fn is_valid(timestamp: u64) -> bool {
    (LOWER_BOUND..UPPER_BOUND).contains(&timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_valid() {
        assert!(is_valid(now()));
    }

    #[test]
    fn rejects_second_and_millisecond_precision() {
        assert!(!is_valid(0));
        assert!(!is_valid(1_594_044_779)); // seconds
        assert!(!is_valid(1_594_044_779_509)); // milliseconds
        assert!(is_valid(1_594_044_779_509_687));
    }
}
