//! Contract violation diagnostics.
//!
//! Misusing the phase API (finishing phases out of order, touching a
//! released tree, ...) is reported with a code, then the process aborts or
//! panics according to [`ViolationPolicy`].
//!
//! ## Diagnostic Codes
//!
//! | Code  | Meaning                        |
//! |-------|--------------------------------|
//! | SP0xx | Phase API contract violations  |
//! | SP9xx | Internal errors                |

pub mod context;
pub mod emit;
pub mod kind;
pub mod policy;

pub use context::DiagContext;
pub use emit::violation;
pub use kind::Diagnostic;
pub use kind::{SP001, SP002, SP003, SP004, SP005, SP006, SP007, SP901};
pub use policy::ViolationPolicy;
