//! Phase records and the arena that owns them.
//!
//! Records reference each other by [`PhaseId`] instead of pointers. The
//! arena of a context holds the records of exactly one phase tree; it is
//! released when the root of that tree finishes.

use std::any::Any;

use crate::api::document::{PhaseDocument, StatEntry};

/// Handle to a phase record inside a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhaseId {
    index: usize,
    epoch: u32,
}

impl PhaseId {
    /// The id handed out by the no-op backend.
    pub const INERT: PhaseId = PhaseId {
        index: usize::MAX,
        epoch: u32::MAX,
    };

    /// Whether this id belongs to no record at all.
    pub fn is_inert(&self) -> bool {
        *self == Self::INERT
    }
}

/// Live memory counters of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseCounters {
    /// Parent's running counter when this phase started.
    pub mem_off: i64,
    /// Net bytes allocated minus freed since the phase started.
    pub mem_current: i64,
    /// Highest value `mem_current` reached.
    pub mem_peak: i64,
}

/// Measurements of one phase plus its position in the tree.
pub(crate) struct PhaseRecord {
    pub title: String,
    pub time_start: f64,
    pub time_end: f64,
    pub mem_off: i64,
    pub mem_current: i64,
    pub mem_peak: i64,
    pub stats: Vec<StatEntry>,
    /// Finished sub-phases, oldest first.
    pub children: Vec<PhaseId>,
    pub parent: Option<PhaseId>,
    pub open: bool,
    /// One instance per registered extension, dropped when the phase finishes.
    pub extensions: Vec<Box<dyn Any>>,
}

impl PhaseRecord {
    pub fn open(
        title: String,
        parent: Option<PhaseId>,
        mem_off: i64,
        time_start: f64,
        extensions: Vec<Box<dyn Any>>,
    ) -> Self {
        Self {
            title,
            time_start,
            time_end: 0.0,
            mem_off,
            mem_current: 0,
            mem_peak: 0,
            stats: Vec::new(),
            children: Vec::new(),
            parent,
            open: true,
            extensions,
        }
    }

    #[inline]
    pub fn track_alloc(&mut self, bytes: i64) {
        self.mem_current = self.mem_current.saturating_add(bytes);
        self.mem_peak = self.mem_peak.max(self.mem_current);
    }

    #[inline]
    pub fn track_free(&mut self, bytes: i64) {
        self.mem_current = self.mem_current.saturating_sub(bytes);
    }

    pub fn counters(&self) -> PhaseCounters {
        PhaseCounters {
            mem_off: self.mem_off,
            mem_current: self.mem_current,
            mem_peak: self.mem_peak,
        }
    }
}

/// Owner of all records of the current phase tree.
pub(crate) struct PhaseArena {
    records: Vec<PhaseRecord>,
    epoch: u32,
}

impl PhaseArena {
    pub fn new() -> Self {
        Self {
            records: Vec::with_capacity(16),
            epoch: 0,
        }
    }

    pub fn insert(&mut self, record: PhaseRecord) -> PhaseId {
        let id = PhaseId {
            index: self.records.len(),
            epoch: self.epoch,
        };
        self.records.push(record);
        id
    }

    pub fn get(&self, id: PhaseId) -> Option<&PhaseRecord> {
        if id.epoch != self.epoch {
            return None;
        }
        self.records.get(id.index)
    }

    pub fn get_mut(&mut self, id: PhaseId) -> Option<&mut PhaseRecord> {
        if id.epoch != self.epoch {
            return None;
        }
        self.records.get_mut(id.index)
    }

    /// Number of records in the current tree.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Drop every record and invalidate all ids handed out so far.
    pub fn release(&mut self) {
        self.records.clear();
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == PhaseId::INERT.epoch {
            self.epoch = 0;
        }
    }

    /// Build the document of the subtree rooted at `id`.
    pub fn document(&self, id: PhaseId) -> Option<PhaseDocument> {
        let record = self.get(id)?;

        let sub = record
            .children
            .iter()
            .filter_map(|&child| self.document(child))
            .collect();

        Some(PhaseDocument {
            title: record.title.clone(),
            time_start: record.time_start,
            time_end: record.time_end,
            mem_off: record.mem_off,
            mem_peak: record.mem_peak,
            mem_final: record.mem_current,
            stats: record.stats.clone(),
            sub,
        })
    }
}
