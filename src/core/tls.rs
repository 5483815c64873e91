//! Thread-local allocator binding.
//!
//! The tracking allocator has no state of its own. It forwards each event to
//! whatever backend the current thread bound through
//! [`StatContext::bind_allocator`](crate::StatContext::bind_allocator).

use std::cell::Cell;

use crate::core::backend::PhaseBackend;

/// Raw pointer to a bound backend. Kept alive by the owning `AllocatorBinding`.
pub(crate) type BackendPtr = *const dyn PhaseBackend;

thread_local! {
    // A plain pointer in a const-initialized Cell: no destructor runs at thread
    // exit, so the allocator can consult it at any point of the thread's life.
    static BOUND: Cell<Option<BackendPtr>> = const { Cell::new(None) };
}

/// The backend bound to this thread.
#[inline]
pub(crate) fn bound() -> Option<BackendPtr> {
    BOUND.with(Cell::get)
}

/// Bind `backend` to this thread, returning the previous binding.
pub(crate) fn replace(backend: Option<BackendPtr>) -> Option<BackendPtr> {
    BOUND.with(|cell| cell.replace(backend))
}

/// Report an allocation to the bound backend.
#[inline]
pub(crate) fn track_alloc(bytes: usize) {
    if let Some(backend) = bound() {
        // SAFETY: a bound pointer comes from `Rc::into_raw` and is only released
        // after it was removed from this thread's binding.
        unsafe { (*backend).track_alloc(bytes) }
    }
}

/// Report a deallocation to the bound backend.
#[inline]
pub(crate) fn track_free(bytes: usize) {
    if let Some(backend) = bound() {
        // SAFETY: see `track_alloc`.
        unsafe { (*backend).track_free(bytes) }
    }
}

/// Run `f` with the bound backend ignoring allocation events.
///
/// Used for memory that belongs to the profiler but may be created or
/// released outside of the engine's own operations.
pub(crate) fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let Some(backend) = bound() else {
        return f();
    };
    // SAFETY: see `track_alloc`.
    unsafe { (*backend).enter_untracked() };
    let result = f();
    // Only undo the suspension if `f` left the binding in place.
    if bound().is_some_and(|current| same_backend(current, backend)) {
        // SAFETY: still bound, so still alive.
        unsafe { (*backend).exit_untracked() };
    }
    result
}

/// Whether two backend pointers refer to the same object.
#[inline]
pub(crate) fn same_backend(a: BackendPtr, b: BackendPtr) -> bool {
    a as *const () == b as *const ()
}
