//! Profiling configuration.

use crate::diagnostics::ViolationPolicy;

/// Configuration for a [`StatContext`](crate::StatContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatConfig {
    /// Whether phases are measured at all (default: true).
    ///
    /// When false the context uses the no-op backend.
    pub enabled: bool,

    /// Whether allocation events are counted from the start (default: true).
    ///
    /// When false the context starts paused, as if `pause_tracking` had been called.
    pub track_memory: bool,

    /// Maximum length in bytes of titles, stat keys and stat values (default: unlimited)
    pub max_text_len: Option<usize>,

    /// What to do on a contract violation (default: abort)
    pub on_violation: ViolationPolicy,
}

impl Default for StatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            track_memory: true,
            max_text_len: None,
            on_violation: ViolationPolicy::Abort,
        }
    }
}

impl StatConfig {
    /// Create a config with fixed-size text fields.
    ///
    /// Titles, keys and values are cut to 63 bytes, which keeps exported
    /// documents small for very chatty instrumentation.
    pub fn compact() -> Self {
        Self {
            max_text_len: Some(63),
            ..Self::default()
        }
    }

    /// Create a config that turns profiling off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Create the default config, overridden from the environment.
    ///
    /// - `STATPHASE_DISABLED`: "1"/"true" turns profiling off
    /// - `STATPHASE_ON_VIOLATION`: "abort" or "panic"
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("STATPHASE_DISABLED") {
            if matches!(val.to_lowercase().as_str(), "1" | "true" | "yes") {
                config.enabled = false;
            }
        }

        if let Ok(val) = std::env::var("STATPHASE_ON_VIOLATION") {
            match ViolationPolicy::parse(&val) {
                Some(policy) => config.on_violation = policy,
                None => log::warn!("ignoring unknown STATPHASE_ON_VIOLATION value {:?}", val),
            }
        }

        config
    }

    /// Builder pattern: enable or disable profiling.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder pattern: start with memory tracking on or off.
    pub fn with_memory_tracking(mut self, track: bool) -> Self {
        self.track_memory = track;
        self
    }

    /// Builder pattern: limit text field length.
    pub fn with_max_text_len(mut self, max: usize) -> Self {
        self.max_text_len = Some(max);
        self
    }

    /// Builder pattern: set the violation policy.
    pub fn with_violation_policy(mut self, policy: ViolationPolicy) -> Self {
        self.on_violation = policy;
        self
    }
}
