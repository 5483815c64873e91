//! Custom per-phase measurements.
//!
//! An extension is instantiated for every phase when it starts. When the
//! phase finishes, the instance writes its measurements into the phase's
//! stats, then hands them to the parent's instance through `propagate`.
//!
//! # Example
//!
//! ```rust
//! use statphase::{PhaseExtension, StatContext, StatWriter};
//!
//! /// Counts how many phases a subtree contains.
//! #[derive(Default)]
//! struct PhaseCount(u32);
//!
//! impl PhaseExtension for PhaseCount {
//!     fn write(&self, out: &mut StatWriter<'_>) {
//!         out.log("nested_phases", self.0);
//!     }
//!
//!     fn propagate(&mut self, sub: &Self) {
//!         self.0 += sub.0 + 1;
//!     }
//! }
//!
//! let ctx = StatContext::with_defaults();
//! ctx.register_extension::<PhaseCount>();
//! ```

use std::any::Any;
use std::fmt::Display;

use crate::api::document::StatEntry;
use crate::util::size::truncate_text;

/// Custom data attached to every phase of a context.
pub trait PhaseExtension: Default + 'static {
    /// Write this phase's measurements. Called once, when the phase finishes.
    fn write(&self, out: &mut StatWriter<'_>);

    /// Fold in the instance of a finished sub-phase.
    fn propagate(&mut self, sub: &Self);
}

/// Appends stats to a phase record.
pub struct StatWriter<'a> {
    stats: &'a mut Vec<StatEntry>,
    max_len: Option<usize>,
}

impl<'a> StatWriter<'a> {
    pub(crate) fn new(stats: &'a mut Vec<StatEntry>, max_len: Option<usize>) -> Self {
        Self { stats, max_len }
    }

    /// Log a statistic. The value is converted to text immediately.
    pub fn log<V: Display>(&mut self, key: &str, value: V) -> &mut Self {
        self.push(key, value.to_string());
        self
    }

    pub(crate) fn push(&mut self, key: &str, value: String) {
        self.stats.push(StatEntry {
            key: truncate_text(key.to_string(), self.max_len),
            value: truncate_text(value, self.max_len),
        });
    }
}

/// Type-erased function set of one registered extension.
#[derive(Clone, Copy)]
pub struct ExtensionHooks {
    name: &'static str,
    construct: fn() -> Box<dyn Any>,
    write: fn(&dyn Any, &mut StatWriter<'_>),
    propagate: fn(&mut dyn Any, &dyn Any),
}

impl ExtensionHooks {
    /// Function set for extension type `E`.
    pub fn of<E: PhaseExtension>() -> Self {
        Self {
            name: std::any::type_name::<E>(),
            construct: construct::<E>,
            write: write::<E>,
            propagate: propagate::<E>,
        }
    }

    /// Type name of the extension.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Debug for ExtensionHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionHooks").field("name", &self.name).finish()
    }
}

fn construct<E: PhaseExtension>() -> Box<dyn Any> {
    Box::new(E::default())
}

fn write<E: PhaseExtension>(ext: &dyn Any, out: &mut StatWriter<'_>) {
    if let Some(ext) = ext.downcast_ref::<E>() {
        ext.write(out);
    }
}

fn propagate<E: PhaseExtension>(ext: &mut dyn Any, sub: &dyn Any) {
    if let (Some(ext), Some(sub)) = (ext.downcast_mut::<E>(), sub.downcast_ref::<E>()) {
        ext.propagate(sub);
    }
}

/// Extensions registered with one engine, in registration order.
#[derive(Debug, Default)]
pub(crate) struct ExtensionRegistry {
    hooks: Vec<ExtensionHooks>,
}

impl ExtensionRegistry {
    pub fn register(&mut self, hooks: ExtensionHooks) {
        self.hooks.push(hooks);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// One fresh instance per registered extension.
    pub fn construct_all(&self) -> Vec<Box<dyn Any>> {
        self.hooks.iter().map(|hooks| (hooks.construct)()).collect()
    }

    /// Let every instance write into `out`.
    pub fn write_all(&self, instances: &[Box<dyn Any>], out: &mut StatWriter<'_>) {
        for (hooks, ext) in self.hooks.iter().zip(instances) {
            (hooks.write)(ext.as_ref(), out);
        }
    }

    /// Fold `subs` into the matching `parents`.
    pub fn propagate_all(&self, parents: &mut [Box<dyn Any>], subs: &[Box<dyn Any>]) {
        for ((hooks, parent), sub) in self.hooks.iter().zip(parents.iter_mut()).zip(subs) {
            (hooks.propagate)(parent.as_mut(), sub.as_ref());
        }
    }
}
