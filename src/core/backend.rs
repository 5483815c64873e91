//! The capability interface shared by the active engine and the no-op backend.

use std::fmt::Display;

use crate::api::document::PhaseDocument;
use crate::api::extension::ExtensionHooks;
use crate::core::record::{PhaseCounters, PhaseId};

/// Phase tracking operations.
///
/// [`StatContext`](crate::StatContext) and [`StatPhase`](crate::StatPhase)
/// forward every call to a backend, so instrumented code is identical
/// whether profiling is on or off.
///
/// All methods take `&self`: backends are driven re-entrantly by the
/// allocator bridge while their own operations run.
pub trait PhaseBackend {
    /// Whether this backend measures anything.
    fn is_active(&self) -> bool;

    /// Open a phase as a child of the current one and make it current.
    fn start(&self, title: &str) -> PhaseId;

    /// Close `phase`, which must be the current phase.
    ///
    /// Returns the document of the finished subtree if `export` is set.
    fn finish(&self, phase: PhaseId, export: bool) -> Option<PhaseDocument>;

    /// Close `phase` and open a sibling that continues its memory baseline.
    fn split(&self, phase: PhaseId, new_title: &str) -> PhaseId;

    /// Append a stat to an open phase.
    fn log_stat(&self, phase: PhaseId, key: &str, value: &dyn Display);

    /// Append a stat to the current phase, if there is one.
    fn log_current(&self, key: &str, value: &dyn Display);

    /// Export `phase` and its finished sub-phases.
    fn export(&self, phase: PhaseId) -> Option<PhaseDocument>;

    /// Live memory counters of `phase`.
    fn counters(&self, phase: PhaseId) -> Option<PhaseCounters>;

    /// The current phase.
    fn current(&self) -> Option<PhaseId>;

    /// Attribute an allocation to the current phase and its ancestors.
    fn track_alloc(&self, bytes: usize);

    /// Attribute a deallocation to the current phase and its ancestors.
    fn track_free(&self, bytes: usize);

    /// Ignore allocation events until `resume`.
    fn pause(&self);

    /// Count allocation events again.
    fn resume(&self);

    /// Whether allocation events are currently ignored by user request.
    fn is_paused(&self) -> bool;

    /// Add an extension to every phase started from now on.
    fn register_extension(&self, hooks: ExtensionHooks);

    /// Ignore allocation events until the matching `exit_untracked`.
    ///
    /// Calls nest. Independent of `pause`/`resume`.
    fn enter_untracked(&self);

    /// Undo one `enter_untracked`.
    fn exit_untracked(&self);
}

