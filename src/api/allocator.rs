//! Global allocator bridge.
//!
//! Install [`TrackingAllocator`] as the `#[global_allocator]`, then bind a
//! context to the thread whose allocations should be attributed to phases:
//!
//! ```rust,no_run
//! use statphase::{StatContext, TrackingAllocator};
//!
//! #[global_allocator]
//! static ALLOCATOR: TrackingAllocator<std::alloc::System> = TrackingAllocator::system();
//!
//! fn main() {
//!     let ctx = StatContext::with_defaults();
//!     let _binding = ctx.bind_allocator();
//!
//!     let phase = ctx.start("build");
//!     let data = vec![0u8; 4096];
//!     drop(data);
//!     println!("{}", phase.finish().unwrap());
//! }
//! ```

use std::alloc::{GlobalAlloc, Layout};
use std::fmt;
use std::rc::Rc;

use crate::core::backend::PhaseBackend;
use crate::core::tls::{self, BackendPtr};
use crate::diagnostics::{violation, DiagContext, ViolationPolicy, SP006};

/// A global allocator that reports every allocation to the phase engine
/// bound to the calling thread.
///
/// Threads without a binding pay one thread-local read per event.
pub struct TrackingAllocator<A: GlobalAlloc> {
    inner: A,
}

impl<A: GlobalAlloc> fmt::Debug for TrackingAllocator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingAllocator")
            .field("inner", &"<allocator>")
            .finish()
    }
}

impl TrackingAllocator<std::alloc::System> {
    /// Wrap the system allocator.
    #[must_use]
    #[inline]
    pub const fn system() -> Self {
        Self {
            inner: std::alloc::System,
        }
    }
}

impl<A: GlobalAlloc> TrackingAllocator<A> {
    /// Wrap `allocator`.
    #[must_use]
    #[inline]
    pub const fn new(allocator: A) -> Self {
        Self { inner: allocator }
    }
}

// SAFETY: every operation is forwarded to the inner allocator unchanged; the
// tracking calls neither allocate (the engine suppresses itself) nor touch
// the returned memory.
unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAllocator<A> {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: forwarded with the caller's layout.
        let ptr = unsafe { self.inner.alloc(layout) };
        if !ptr.is_null() {
            tls::track_alloc(layout.size());
        }
        ptr
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: forwarded with the caller's layout.
        let ptr = unsafe { self.inner.alloc_zeroed(layout) };
        if !ptr.is_null() {
            tls::track_alloc(layout.size());
        }
        ptr
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: the caller guarantees `ptr` was allocated by us with `layout`.
        unsafe { self.inner.dealloc(ptr, layout) };
        tls::track_free(layout.size());
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: the caller upholds the `GlobalAlloc::realloc` contract.
        let new_ptr = unsafe { self.inner.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            tls::track_free(layout.size());
            tls::track_alloc(new_size);
        }
        new_ptr
    }
}

/// Keeps a backend bound to the current thread's tracking allocator.
///
/// Bindings nest: dropping one restores the binding that was active when it
/// was created. They must be dropped in reverse creation order.
#[must_use = "the allocator is unbound as soon as the binding is dropped"]
pub struct AllocatorBinding {
    backend: BackendPtr,
    previous: Option<BackendPtr>,
    policy: ViolationPolicy,
}

impl AllocatorBinding {
    pub(crate) fn bind(backend: Rc<dyn PhaseBackend>, policy: ViolationPolicy) -> Self {
        let backend = Rc::into_raw(backend);
        let previous = tls::replace(Some(backend));
        Self {
            backend,
            previous,
            policy,
        }
    }
}

impl Drop for AllocatorBinding {
    fn drop(&mut self) {
        let on_top = tls::bound().is_some_and(|top| tls::same_backend(top, self.backend));
        if !on_top {
            if !std::thread::panicking() {
                violation(&SP006, &DiagContext::capture(), self.policy);
            }
            // Leak the backend: a newer binding may still restore a pointer to it.
            return;
        }

        // Unbind first so the backend's own teardown is not reported to itself.
        tls::replace(None);
        // SAFETY: the pointer came from `Rc::into_raw` in `bind` and is
        // released exactly once, here.
        drop(unsafe { Rc::from_raw(self.backend) });
        tls::replace(self.previous);
    }
}

impl fmt::Debug for AllocatorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocatorBinding")
            .field("nested", &self.previous.is_some())
            .finish()
    }
}
