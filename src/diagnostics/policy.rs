//! What happens after a contract violation has been reported.

/// Behavior on a phase API contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViolationPolicy {
    /// Report and abort the process.
    #[default]
    Abort,
    /// Report and panic. Useful for tests that expect a violation.
    Panic,
}

impl ViolationPolicy {
    /// Parse a policy name as used by `STATPHASE_ON_VIOLATION`.
    ///
    /// - "abort" or "0" -> Abort
    /// - "panic" or "1" -> Panic
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "abort" | "0" => Some(ViolationPolicy::Abort),
            "panic" | "1" => Some(ViolationPolicy::Panic),
            _ => None,
        }
    }
}
