//! Phase tracking internals.

pub mod backend;
pub mod clock;
pub mod engine;
pub mod noop;
pub(crate) mod record;
pub(crate) mod tls;
