//! Diagnostic codes and core types.
//!
//! Every diagnostic here describes a misuse of the phase API. They are
//! fatal: continuing would silently produce wrong measurements.

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `SP0xx` - Phase API contract violations
/// - `SP9xx` - Internal errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostic {
    /// Diagnostic code (e.g., "SP001").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub const fn new(code: &'static str, message: &'static str) -> Self {
        Self {
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note to this diagnostic.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message to this diagnostic.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[statphase][{}] {}", self.code, self.message)
    }
}

// =============================================================================
// Predefined diagnostics (SP0xx - Phase API contract)
// =============================================================================

/// SP001: Phase finished out of order.
pub const SP001: Diagnostic = Diagnostic::new(
    "SP001",
    "phase finished while it is not the current phase"
).with_note("phases must finish in reverse order of opening")
 .with_help("finish or drop inner phases before their parent");

/// SP002: Stat logged on a finished phase.
pub const SP002: Diagnostic = Diagnostic::new(
    "SP002",
    "stat logged on a phase that is no longer open"
).with_note("a finished phase is immutable once attached to its parent");

/// SP003: Phase split out of order.
pub const SP003: Diagnostic = Diagnostic::new(
    "SP003",
    "phase split while it is not the current phase"
).with_note("split ends the current phase and starts its sibling")
 .with_help("finish inner phases before splitting their parent");

/// SP004: Stale phase handle.
pub const SP004: Diagnostic = Diagnostic::new(
    "SP004",
    "phase handle refers to a released phase tree"
).with_note("a root's tree is released when the root finishes")
 .with_help("export the tree with StatPhase::finish before it is released");

/// SP005: Extension registered while phases are open.
pub const SP005: Diagnostic = Diagnostic::new(
    "SP005",
    "extension registered while a phase is open"
).with_note("open phases would have no instance of the new extension")
 .with_help("register extensions before starting the first phase");

/// SP006: Allocator binding released out of order.
pub const SP006: Diagnostic = Diagnostic::new(
    "SP006",
    "allocator binding released out of order"
).with_note("bindings on one thread form a stack")
 .with_help("drop the most recent AllocatorBinding first");

/// SP007: Re-entrant engine call.
pub const SP007: Diagnostic = Diagnostic::new(
    "SP007",
    "phase engine re-entered during its own bookkeeping"
).with_note("extension callbacks must not start, finish or log phases");

// =============================================================================
// Predefined diagnostics (SP9xx - Internal)
// =============================================================================

/// SP901: Internal engine error.
pub const SP901: Diagnostic = Diagnostic::new(
    "SP901",
    "internal phase engine error"
).with_note("the parent chain of the current phase is broken")
 .with_help("please report this issue at the statphase repository");
