//! Sampling flags.

/// The portion of a trace position that is known before trace identity is.
///
/// `SamplingFlags` carry the sampling decision and the debug request alone,
/// e.g. as defaults applied before headers are read, or when an upstream
/// sent a decision without ids. [`TraceContext`](crate::TraceContext) adds
/// identity on top of these flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SamplingFlags {
    sampled: Option<bool>,
    debug: bool,
}

impl SamplingFlags {
    /// Flags with the sampling decision deferred to a later tier.
    pub const EMPTY: SamplingFlags = SamplingFlags {
        sampled: None,
        debug: false,
    };

    /// Flags requesting the trace be recorded.
    pub const SAMPLED: SamplingFlags = SamplingFlags {
        sampled: Some(true),
        debug: false,
    };

    /// Flags requesting the trace not be recorded.
    pub const NOT_SAMPLED: SamplingFlags = SamplingFlags {
        sampled: Some(false),
        debug: false,
    };

    /// Flags requesting the trace be recorded and kept regardless of
    /// collection-tier policy.
    pub const DEBUG: SamplingFlags = SamplingFlags {
        sampled: Some(true),
        debug: true,
    };

    /// Returns a builder used to construct `SamplingFlags`.
    pub fn builder() -> SamplingFlagsBuilder {
        SamplingFlagsBuilder {
            flags: SamplingFlags::EMPTY,
        }
    }

    /// The sampling decision, or `None` when it is deferred.
    ///
    /// Debug requests are always sampled, regardless of any recorded
    /// decision.
    pub fn sampled(&self) -> Option<bool> {
        if self.debug {
            Some(true)
        } else {
            self.sampled
        }
    }

    /// Returns `true` if this trace was requested regardless of sampling
    /// policy.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Returns a copy of these flags with the sampling decision resolved.
    pub fn with_sampled(self, sampled: bool) -> Self {
        SamplingFlags {
            sampled: Some(sampled),
            debug: self.debug,
        }
    }
}

/// A builder type for [`SamplingFlags`].
#[derive(Clone, Debug)]
pub struct SamplingFlagsBuilder {
    flags: SamplingFlags,
}

impl SamplingFlagsBuilder {
    /// Sets the sampling decision. Defaults to deferred.
    pub fn sampled(mut self, sampled: bool) -> Self {
        self.flags.sampled = Some(sampled);
        self
    }

    /// Sets the debug flag. Defaults to `false`.
    pub fn debug(mut self, debug: bool) -> Self {
        self.flags.debug = debug;
        self
    }

    /// Constructs the flags.
    pub fn build(self) -> SamplingFlags {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        assert_eq!(SamplingFlags::EMPTY.sampled(), None);
        assert_eq!(SamplingFlags::SAMPLED.sampled(), Some(true));
        assert_eq!(SamplingFlags::NOT_SAMPLED.sampled(), Some(false));
        assert_eq!(SamplingFlags::DEBUG.sampled(), Some(true));
        assert!(SamplingFlags::DEBUG.debug());
        assert_eq!(SamplingFlags::default(), SamplingFlags::EMPTY);
    }

    #[test]
    fn debug_overrides_a_negative_decision() {
        let flags = SamplingFlags::builder().sampled(false).debug(true).build();
        assert_eq!(flags.sampled(), Some(true));
    }

    #[test]
    fn with_sampled_keeps_debug() {
        let flags = SamplingFlags::DEBUG.with_sampled(false);
        assert!(flags.debug());
        assert_eq!(flags.sampled(), Some(true));
    }
}
