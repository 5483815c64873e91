//! Backend used when profiling is off.

use std::fmt::Display;

use crate::api::document::PhaseDocument;
use crate::api::extension::ExtensionHooks;
use crate::core::backend::PhaseBackend;
use crate::core::record::{PhaseCounters, PhaseId};

/// A backend that measures nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBackend;

impl PhaseBackend for NoopBackend {
    #[inline]
    fn is_active(&self) -> bool {
        false
    }

    #[inline]
    fn start(&self, _title: &str) -> PhaseId {
        PhaseId::INERT
    }

    #[inline]
    fn finish(&self, _phase: PhaseId, _export: bool) -> Option<PhaseDocument> {
        None
    }

    #[inline]
    fn split(&self, _phase: PhaseId, _new_title: &str) -> PhaseId {
        PhaseId::INERT
    }

    #[inline]
    fn log_stat(&self, _phase: PhaseId, _key: &str, _value: &dyn Display) {}

    #[inline]
    fn log_current(&self, _key: &str, _value: &dyn Display) {}

    #[inline]
    fn export(&self, _phase: PhaseId) -> Option<PhaseDocument> {
        None
    }

    #[inline]
    fn counters(&self, _phase: PhaseId) -> Option<PhaseCounters> {
        None
    }

    #[inline]
    fn current(&self) -> Option<PhaseId> {
        None
    }

    #[inline]
    fn track_alloc(&self, _bytes: usize) {}

    #[inline]
    fn track_free(&self, _bytes: usize) {}

    #[inline]
    fn pause(&self) {}

    #[inline]
    fn resume(&self) {}

    #[inline]
    fn is_paused(&self) -> bool {
        false
    }

    #[inline]
    fn register_extension(&self, _hooks: ExtensionHooks) {}

    #[inline]
    fn enter_untracked(&self) {}

    #[inline]
    fn exit_untracked(&self) {}
}
