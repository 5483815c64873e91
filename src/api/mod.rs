//! Public API for statphase.
//!
//! This module contains all user-facing types and functions.
//! Most users should only interact with types re-exported at the crate root.

pub mod allocator;
pub mod config;
pub mod context;
pub mod document;
pub mod extension;
pub mod phase;
