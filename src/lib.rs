//! # statphase
//!
//! Nested phase profiling: wall-clock time and heap memory per named phase
//! of a program, exported as a tree.
//!
//! ## Features
//!
//! - Nested phases with exact per-phase memory attribution
//! - Phase splitting for sequential steps that share a memory baseline
//! - Global allocator bridge, or manual `note_alloc`/`note_free` reporting
//! - Pause/resume of memory tracking
//! - User statistics and custom per-phase extensions
//! - JSON tree export for visualization tools
//! - No-op backend when profiling is turned off
//!
//! ## Quick Start
//!
//! ```rust
//! use statphase::StatContext;
//!
//! let ctx = StatContext::with_defaults();
//!
//! let root = ctx.start("root");
//! ctx.note_alloc(100);
//! {
//!     let sub = ctx.start("sub");
//!     ctx.note_alloc(50);
//!     sub.log_stat("items", 42);
//! }
//!
//! let doc = root.finish().unwrap();
//! assert_eq!(doc.mem_peak, 150);
//! assert_eq!(doc.sub[0].mem_off, 100);
//! println!("{}", doc.to_json_pretty().unwrap());
//! ```
//!
//! ## Allocator bridge
//!
//! With [`TrackingAllocator`] installed as the global allocator, every heap
//! allocation of a thread bound through [`StatContext::bind_allocator`] is
//! attributed to that context's current phase.

pub mod api;
pub mod diagnostics;

mod core;
mod util;

// Re-export public API at crate root for convenience
pub use api::allocator::{AllocatorBinding, TrackingAllocator};
pub use api::config::StatConfig;
pub use api::context::{StatContext, TrackingPause};
pub use api::document::{ExportError, PhaseDocument, StatEntry};
pub use api::extension::{ExtensionHooks, PhaseExtension, StatWriter};
pub use api::phase::StatPhase;

// Backends
pub use crate::core::backend::PhaseBackend;
pub use crate::core::engine::PhaseEngine;
pub use crate::core::noop::NoopBackend;
pub use crate::core::record::{PhaseCounters, PhaseId};

// Time sources
pub use crate::core::clock::{Clock, ManualClock, MonotonicClock};

// Diagnostics
pub use diagnostics::{Diagnostic, ViolationPolicy};

// Utilities
pub use crate::util::size::format_bytes;
