//! Phase handles.

use std::fmt::{self, Display};
use std::io;
use std::rc::Rc;

use crate::api::context::StatContext;
use crate::api::document::{ExportError, PhaseDocument};
use crate::core::backend::PhaseBackend;
use crate::core::noop::NoopBackend;
use crate::core::record::{PhaseCounters, PhaseId};

/// An open phase.
///
/// The phase finishes when the handle is consumed by [`finish`](Self::finish)
/// or dropped. Phases must finish in reverse start order.
pub struct StatPhase {
    backend: Rc<dyn PhaseBackend>,
    id: PhaseId,
    finished: bool,
}

impl StatPhase {
    /// Start a phase nested in the context's current phase.
    pub fn new(ctx: &StatContext, title: &str) -> Self {
        let backend = ctx.shared_backend();
        let id = backend.start(title);
        Self {
            backend,
            id,
            finished: false,
        }
    }

    /// A handle that belongs to no context and measures nothing.
    pub fn inert() -> Self {
        Self {
            backend: Rc::new(NoopBackend),
            id: PhaseId::INERT,
            finished: false,
        }
    }

    /// Run `f` inside a new phase and finish it afterwards.
    pub fn wrap<R>(ctx: &StatContext, title: &str, f: impl FnOnce(&mut StatPhase) -> R) -> R {
        let mut phase = Self::new(ctx, title);
        let result = f(&mut phase);
        drop(phase);
        result
    }

    /// The record this handle currently refers to.
    pub fn id(&self) -> PhaseId {
        self.id
    }

    /// Finish this phase and continue in a new sibling phase.
    ///
    /// Memory counted by the finished phase stays in the new phase's offset.
    /// Splitting a root finishes its tree, which is released without being
    /// exported; call [`to_document`](Self::to_document) first to keep it.
    pub fn split(&mut self, new_title: &str) {
        self.id = self.backend.split(self.id, new_title);
    }

    /// Append a statistic to this phase.
    pub fn log_stat<V: Display>(&self, key: &str, value: V) {
        self.backend.log_stat(self.id, key, &value);
    }

    /// Live memory counters. All zero when measuring is off.
    pub fn counters(&self) -> PhaseCounters {
        self.backend.counters(self.id).unwrap_or_default()
    }

    /// Export this phase and its finished sub-phases.
    ///
    /// The document's memory is never attributed to a phase.
    pub fn to_document(&self) -> Option<PhaseDocument> {
        self.backend.export(self.id)
    }

    /// Export as a JSON value; `null` when measuring is off.
    ///
    /// The returned value is ordinary caller memory and is counted like any
    /// other allocation, both when it is built and when it is dropped.
    pub fn to_json(&self) -> Result<serde_json::Value, ExportError> {
        match self.to_document() {
            Some(doc) => doc.to_json_value(),
            None => Ok(serde_json::Value::Null),
        }
    }

    /// Export as a compact JSON string. Counted like [`to_json`](Self::to_json).
    pub fn to_json_string(&self) -> Result<String, ExportError> {
        match self.to_document() {
            Some(doc) => doc.to_json_string(),
            None => Ok(serde_json::Value::Null.to_string()),
        }
    }

    /// Export as compact JSON to `writer`.
    pub fn write_json<W: io::Write>(&self, mut writer: W) -> Result<(), ExportError> {
        match self.to_document() {
            Some(doc) => doc.write_json(writer),
            None => {
                serde_json::to_writer(&mut writer, &serde_json::Value::Null)?;
                writer.flush()?;
                Ok(())
            }
        }
    }

    /// Finish this phase and export it.
    ///
    /// As with [`to_document`](Self::to_document), the document is not
    /// attributed to the parent phase.
    pub fn finish(mut self) -> Option<PhaseDocument> {
        self.finished = true;
        self.backend.finish(self.id, true)
    }
}

impl Drop for StatPhase {
    fn drop(&mut self) {
        // Leave the stack alone while unwinding from a violation.
        if !self.finished && !std::thread::panicking() {
            self.backend.finish(self.id, false);
        }
    }
}

impl fmt::Debug for StatPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatPhase")
            .field("id", &self.id)
            .field("active", &self.backend.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::config::StatConfig;
    use crate::core::clock::ManualClock;
    use crate::diagnostics::ViolationPolicy;

    fn ctx() -> (StatContext, ManualClock) {
        let clock = ManualClock::new();
        let config = StatConfig::default().with_violation_policy(ViolationPolicy::Panic);
        (StatContext::with_clock(config, clock.clone()), clock)
    }

    #[test]
    fn test_wrap_returns_closure_result() {
        let (ctx, _) = ctx();
        let root = ctx.start("root");
        let sum = StatPhase::wrap(&ctx, "sum", |phase| {
            phase.log_stat("n", 3);
            1 + 2
        });
        assert_eq!(sum, 3);

        let doc = root.finish().unwrap();
        assert_eq!(doc.sub[0].title, "sum");
        assert_eq!(doc.sub[0].stat("n"), Some("3"));
    }

    #[test]
    fn test_drop_finishes_phase() {
        let (ctx, clock) = ctx();
        let root = ctx.start("root");
        {
            let _sub = ctx.start("sub");
            clock.advance(2.0);
        }
        let doc = root.finish().unwrap();
        assert_eq!(doc.sub[0].duration_ms(), 2.0);
    }

    #[test]
    fn test_split_produces_siblings() {
        let (ctx, _) = ctx();
        let root = ctx.start("root");
        let mut step = ctx.start("step1");
        step.split("step2");
        step.split("step3");
        drop(step);

        let doc = root.finish().unwrap();
        let titles: Vec<_> = doc.sub.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, ["step1", "step2", "step3"]);
    }

    #[test]
    fn test_json_exports() {
        let (ctx, _) = ctx();
        let root = ctx.start("root");
        ctx.note_alloc(10);

        let value = root.to_json().unwrap();
        assert_eq!(value["title"], "root");
        assert_eq!(value["memPeak"], 10);

        let text = root.to_json_string().unwrap();
        assert!(text.contains("\"memFinal\":10"));

        let mut out = Vec::new();
        root.write_json(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), text);
    }

    #[test]
    fn test_inert_phase() {
        let phase = StatPhase::inert();
        phase.log_stat("ignored", 1);
        assert!(phase.id().is_inert());
        assert_eq!(phase.counters(), PhaseCounters::default());
        assert_eq!(phase.to_json().unwrap(), serde_json::Value::Null);
        assert_eq!(phase.to_json_string().unwrap(), "null");
        assert!(phase.finish().is_none());
    }
}
