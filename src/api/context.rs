//! The profiling context.

use std::fmt::{self, Display};
use std::rc::Rc;

use crate::api::allocator::AllocatorBinding;
use crate::api::config::StatConfig;
use crate::api::extension::{ExtensionHooks, PhaseExtension};
use crate::api::phase::StatPhase;
use crate::core::backend::PhaseBackend;
use crate::core::clock::{Clock, MonotonicClock};
use crate::core::engine::PhaseEngine;
use crate::core::noop::NoopBackend;
use crate::core::record::PhaseId;

/// Owner of one phase stack.
///
/// All phases started from a context form a single stack: the most recently
/// started open phase is the current one, and allocation events are
/// attributed to it and its ancestors. Contexts are independent of each
/// other and confined to the thread that created them.
///
/// # Example
///
/// ```rust
/// use statphase::StatContext;
///
/// let ctx = StatContext::with_defaults();
///
/// let root = ctx.start("compress");
/// {
///     let mut step = ctx.start("parse");
///     ctx.note_alloc(1024);
///     step.log_stat("tokens", 17);
///     step.split("encode");
/// }
///
/// let doc = root.finish().unwrap();
/// assert_eq!(doc.sub.len(), 2);
/// assert_eq!(doc.sub[1].mem_off, 1024);
/// ```
pub struct StatContext {
    backend: Rc<dyn PhaseBackend>,
    config: StatConfig,
}

impl StatContext {
    /// Create a context with the given configuration.
    pub fn new(config: StatConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }

    /// Create a context with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(StatConfig::default())
    }

    /// Create a context that measures nothing.
    pub fn disabled() -> Self {
        Self::new(StatConfig::disabled())
    }

    /// Create a context reading timestamps from `clock`.
    pub fn with_clock<C: Clock + 'static>(config: StatConfig, clock: C) -> Self {
        let backend: Rc<dyn PhaseBackend> = if config.enabled && !cfg!(feature = "disabled") {
            Rc::new(PhaseEngine::new(config, Box::new(clock)))
        } else {
            Rc::new(NoopBackend)
        };
        Self { backend, config }
    }

    /// Create a context around a custom backend.
    pub fn from_backend(backend: Rc<dyn PhaseBackend>, config: StatConfig) -> Self {
        Self { backend, config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &StatConfig {
        &self.config
    }

    /// Whether phases started from this context are measured.
    pub fn is_enabled(&self) -> bool {
        self.backend.is_active()
    }

    /// The backend all operations are forwarded to.
    pub fn backend(&self) -> &dyn PhaseBackend {
        &*self.backend
    }

    pub(crate) fn shared_backend(&self) -> Rc<dyn PhaseBackend> {
        Rc::clone(&self.backend)
    }

    /// Start a phase nested in the current one.
    pub fn start(&self, title: &str) -> StatPhase {
        StatPhase::new(self, title)
    }

    /// Run `f` inside a phase and finish it afterwards.
    pub fn wrap<R>(&self, title: &str, f: impl FnOnce(&mut StatPhase) -> R) -> R {
        StatPhase::wrap(self, title, f)
    }

    /// The current phase, if any.
    pub fn current_phase(&self) -> Option<PhaseId> {
        self.backend.current()
    }

    /// Log a statistic to the current phase. Does nothing without a phase.
    pub fn log<V: Display>(&self, key: &str, value: V) {
        self.backend.log_current(key, &value);
    }

    /// Report an allocation of `bytes` that did not go through the allocator.
    pub fn note_alloc(&self, bytes: usize) {
        self.backend.track_alloc(bytes);
    }

    /// Report a deallocation of `bytes` that did not go through the allocator.
    pub fn note_free(&self, bytes: usize) {
        self.backend.track_free(bytes);
    }

    /// Stop counting allocation events.
    pub fn pause_tracking(&self) {
        self.backend.pause();
    }

    /// Count allocation events again.
    pub fn resume_tracking(&self) {
        self.backend.resume();
    }

    /// Whether allocation events are currently ignored.
    pub fn is_tracking_paused(&self) -> bool {
        self.backend.is_paused()
    }

    /// Pause tracking until the returned guard is dropped.
    pub fn paused(&self) -> TrackingPause<'_> {
        TrackingPause::new(self.backend())
    }

    /// Attach extension `E` to every phase started from now on.
    ///
    /// Must be called while no phase is open.
    pub fn register_extension<E: PhaseExtension>(&self) {
        self.backend.register_extension(ExtensionHooks::of::<E>());
    }

    /// Attribute this thread's heap allocations to this context.
    ///
    /// Requires [`TrackingAllocator`](crate::TrackingAllocator) as the global
    /// allocator. The binding lasts until the returned guard is dropped.
    pub fn bind_allocator(&self) -> AllocatorBinding {
        AllocatorBinding::bind(self.shared_backend(), self.config.on_violation)
    }
}

impl Default for StatContext {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for StatContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatContext")
            .field("config", &self.config)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Ignores allocation events while alive, then restores the previous state.
pub struct TrackingPause<'a> {
    backend: &'a dyn PhaseBackend,
    was_paused: bool,
}

impl<'a> TrackingPause<'a> {
    fn new(backend: &'a dyn PhaseBackend) -> Self {
        let was_paused = backend.is_paused();
        backend.pause();
        Self {
            backend,
            was_paused,
        }
    }
}

impl Drop for TrackingPause<'_> {
    fn drop(&mut self) {
        if !self.was_paused {
            self.backend.resume();
        }
    }
}
