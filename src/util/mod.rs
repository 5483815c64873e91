//! Small shared helpers.

pub(crate) mod size;
