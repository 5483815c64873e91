//! Phase tree documents.
//!
//! A [`PhaseDocument`] is the exported form of a phase and its finished
//! sub-phases. Its JSON shape is what external visualization tools read:
//!
//! ```json
//! {
//!   "title": "root", "timeStart": 0.0, "timeEnd": 12.5,
//!   "memOff": 0, "memPeak": 300, "memFinal": 0,
//!   "stats": [{ "key": "items", "value": "42" }],
//!   "sub": []
//! }
//! ```

use std::fmt;
use std::io;
use std::mem;

use serde::{Deserialize, Serialize};

use crate::core::tls;
use crate::util::size::format_bytes;

/// Errors from writing or reading documents.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The document could not be (de)serialized.
    #[error("phase document serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The output could not be written.
    #[error("failed to write phase document: {0}")]
    Io(#[from] io::Error),
}

/// A user-logged statistic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatEntry {
    /// Statistic name. Not unique within a phase.
    pub key: String,
    /// Value, already converted to text.
    pub value: String,
}

/// Exported measurements of one phase and its finished sub-phases.
///
/// Memory held by a document is profiler data: it is not attributed to any
/// phase when the document is exported, cloned, parsed or dropped.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDocument {
    /// Phase title.
    pub title: String,
    /// Start timestamp in milliseconds.
    pub time_start: f64,
    /// End timestamp in milliseconds (export time for an open phase).
    pub time_end: f64,
    /// Parent's memory counter when the phase started.
    pub mem_off: i64,
    /// Highest memory counter reached.
    pub mem_peak: i64,
    /// Memory counter when the phase ended.
    pub mem_final: i64,
    /// Statistics in logged order.
    pub stats: Vec<StatEntry>,
    /// Sub-phases, oldest first.
    pub sub: Vec<PhaseDocument>,
}

impl PhaseDocument {
    /// Wall-clock duration in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.time_end - self.time_start
    }

    /// Look up the first stat with the given key.
    pub fn stat(&self, key: &str) -> Option<&str> {
        self.stats
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    /// Depth-first search for a phase with the given title, including `self`.
    pub fn find(&self, title: &str) -> Option<&PhaseDocument> {
        if self.title == title {
            return Some(self);
        }
        self.sub.iter().find_map(|sub| sub.find(title))
    }

    /// Serialize to a JSON value.
    pub fn to_json_value(&self) -> Result<serde_json::Value, ExportError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Serialize to a compact JSON string.
    pub fn to_json_string(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to a human-friendly JSON string.
    pub fn to_json_pretty(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write compact JSON to `writer`.
    pub fn write_json<W: io::Write>(&self, mut writer: W) -> Result<(), ExportError> {
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Parse a document previously produced by this crate.
    pub fn from_json_str(json: &str) -> Result<Self, ExportError> {
        Ok(tls::untracked(|| serde_json::from_str::<Self>(json))?)
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}{}: {:.3} ms, peak {}, final {} (offset {})",
            "",
            self.title,
            self.duration_ms(),
            format_bytes(self.mem_peak),
            format_bytes(self.mem_final),
            format_bytes(self.mem_off),
            indent = depth * 2
        )?;
        for entry in &self.stats {
            writeln!(f, "{:indent$}- {} = {}", "", entry.key, entry.value, indent = depth * 2 + 2)?;
        }
        for sub in &self.sub {
            sub.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl Clone for PhaseDocument {
    fn clone(&self) -> Self {
        tls::untracked(|| Self {
            title: self.title.clone(),
            time_start: self.time_start,
            time_end: self.time_end,
            mem_off: self.mem_off,
            mem_peak: self.mem_peak,
            mem_final: self.mem_final,
            stats: self.stats.clone(),
            sub: self.sub.clone(),
        })
    }
}

impl Drop for PhaseDocument {
    fn drop(&mut self) {
        let title = mem::take(&mut self.title);
        let stats = mem::take(&mut self.stats);
        let sub = mem::take(&mut self.sub);
        tls::untracked(move || drop((title, stats, sub)));
    }
}

impl fmt::Display for PhaseDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}
