//! Time sources for phase timestamps.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::Instant;

/// Provides the current time in milliseconds.
///
/// Implementations must be monotonic. The engine only ever compares
/// timestamps taken from the same clock.
pub trait Clock {
    /// Milliseconds elapsed since the clock's origin.
    fn now_millis(&self) -> f64;
}

/// Process-wide origin so timestamps from different contexts are comparable.
static ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Monotonic wall clock measuring from the first time any clock was created.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock {
    _private: (),
}

impl MonotonicClock {
    /// Create a monotonic clock.
    pub fn new() -> Self {
        ORIGIN.get_or_init(Instant::now);
        Self { _private: () }
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> f64 {
        let origin = ORIGIN.get_or_init(Instant::now);
        origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one clone and hand the
/// other to a context.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    /// Create a manual clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current time.
    pub fn set(&self, millis: f64) {
        self.now.set(millis);
    }

    /// Move the current time forward.
    pub fn advance(&self, millis: f64) {
        self.now.set(self.now.get() + millis);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> f64 {
        self.now.get()
    }
}
