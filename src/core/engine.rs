//! The active phase-tracking backend.
//!
//! The engine keeps the phase stack implicitly: `current` is the top and
//! every open record points to its parent. Allocation events walk that
//! chain, so a delta reported while N phases are open reaches all N.
//!
//! Everything the engine does on its own behalf (creating records, pushing
//! stats, building documents, logging) may allocate. Those allocations come
//! back through the allocator bridge, so every operation runs with the
//! suppression counter raised and the tracking path ignores events while it
//! is non-zero.

use std::cell::{Cell, RefCell, RefMut};
use std::fmt::{self, Display};

use crate::api::config::StatConfig;
use crate::api::document::PhaseDocument;
use crate::api::extension::{ExtensionHooks, ExtensionRegistry, StatWriter};
use crate::core::backend::PhaseBackend;
use crate::core::clock::Clock;
use crate::core::record::{PhaseArena, PhaseCounters, PhaseId, PhaseRecord};
use crate::core::tls;
use crate::diagnostics::{
    violation, DiagContext, Diagnostic, SP001, SP002, SP003, SP004, SP005, SP007, SP901,
};
use crate::util::size::{to_delta, truncate_text};

/// Mutable engine state, borrowed for the duration of one operation.
struct EngineState {
    arena: PhaseArena,
    current: Option<PhaseId>,
    depth: usize,
    extensions: ExtensionRegistry,
}

/// What a finished phase leaves behind for its caller.
struct Finished {
    mem_off: i64,
    mem_current: i64,
    document: Option<PhaseDocument>,
}

/// Raises the suppression counter while alive.
pub(crate) struct Suppressed<'a> {
    depth: &'a Cell<u32>,
}

impl<'a> Suppressed<'a> {
    fn new(depth: &'a Cell<u32>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for Suppressed<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

/// Phase tracking backend that measures time and memory.
pub struct PhaseEngine {
    config: StatConfig,
    clock: Box<dyn Clock>,
    suppression: Cell<u32>,
    user_paused: Cell<bool>,
    state: RefCell<EngineState>,
}

impl PhaseEngine {
    /// Create an engine reading timestamps from `clock`.
    pub fn new(config: StatConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            suppression: Cell::new(0),
            user_paused: Cell::new(!config.track_memory),
            state: RefCell::new(EngineState {
                arena: PhaseArena::new(),
                current: None,
                depth: 0,
                extensions: ExtensionRegistry::default(),
            }),
        }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &StatConfig {
        &self.config
    }

    pub(crate) fn suppress(&self) -> Suppressed<'_> {
        Suppressed::new(&self.suppression)
    }

    fn state_mut(&self) -> RefMut<'_, EngineState> {
        match self.state.try_borrow_mut() {
            Ok(state) => state,
            Err(_) => violation(&SP007, &DiagContext::capture(), self.config.on_violation),
        }
    }

    #[cold]
    fn fail(&self, state: &EngineState, diag: &Diagnostic) -> ! {
        let phase = state
            .current
            .and_then(|id| state.arena.get(id))
            .map(|record| record.title.as_str());
        let ctx = DiagContext::capture().with_phase(phase, state.depth);
        violation(diag, &ctx, self.config.on_violation)
    }

    /// Fail unless `phase` is a live, open record.
    fn check_open(&self, state: &EngineState, phase: PhaseId, diag: &Diagnostic) {
        match state.arena.get(phase) {
            None => self.fail(state, &SP004),
            Some(record) if !record.open => self.fail(state, diag),
            Some(_) => {}
        }
    }

    fn start_inner(&self, state: &mut EngineState, title: &str) -> PhaseId {
        let parent = state.current;
        let mem_off = match parent {
            Some(id) => match state.arena.get(id) {
                Some(record) => record.mem_current,
                None => self.fail(state, &SP901),
            },
            None => 0,
        };

        let title = truncate_text(title.to_string(), self.config.max_text_len);
        log::trace!("phase {:?} started at depth {}", title, state.depth + 1);

        let extensions = state.extensions.construct_all();
        let time_start = self.clock.now_millis();
        let id = state
            .arena
            .insert(PhaseRecord::open(title, parent, mem_off, time_start, extensions));

        state.current = Some(id);
        state.depth += 1;
        id
    }

    fn finish_inner(
        &self,
        state: &mut EngineState,
        phase: PhaseId,
        out_of_order: &Diagnostic,
        export: bool,
    ) -> Finished {
        if state.arena.get(phase).is_none() {
            self.fail(state, &SP004);
        }
        if state.current != Some(phase) {
            self.fail(state, out_of_order);
        }

        let time_end = self.clock.now_millis();
        let max_len = self.config.max_text_len;

        let Some(record) = state.arena.get_mut(phase) else {
            self.fail(state, &SP901);
        };
        record.time_end = time_end;
        record.open = false;

        let parent = record.parent;
        let mem_off = record.mem_off;
        let mem_current = record.mem_current;
        let instances = std::mem::take(&mut record.extensions);

        log::trace!(
            "phase {:?} finished after {:.3} ms, final {} bytes",
            record.title,
            time_end - record.time_start,
            mem_current
        );

        state
            .extensions
            .write_all(&instances, &mut StatWriter::new(&mut record.stats, max_len));

        if let Some(parent) = parent {
            let Some(parent_record) = state.arena.get_mut(parent) else {
                self.fail(state, &SP901);
            };
            state
                .extensions
                .propagate_all(&mut parent_record.extensions, &instances);
            parent_record.children.push(phase);
        }
        drop(instances);

        state.current = parent;
        state.depth = state.depth.saturating_sub(1);

        let document = if export {
            tls::untracked(|| state.arena.document(phase))
        } else {
            None
        };

        if parent.is_none() {
            log::debug!("phase tree of {} records complete", state.arena.len());
            state.arena.release();
        }

        Finished {
            mem_off,
            mem_current,
            document,
        }
    }

    fn log_inner(&self, state: &mut EngineState, phase: PhaseId, key: &str, value: &dyn Display) {
        self.check_open(state, phase, &SP002);
        if let Some(record) = state.arena.get_mut(phase) {
            StatWriter::new(&mut record.stats, self.config.max_text_len)
                .push(key, value.to_string());
        }
    }

    /// Apply a signed delta to the current phase and all of its ancestors.
    #[inline]
    fn attribute(&self, bytes: usize, alloc: bool) {
        if self.suppression.get() > 0 || self.user_paused.get() {
            return;
        }
        let _guard = self.suppress();

        // The state is only busy if we are called from inside one of our own
        // operations, which we never count.
        let Ok(mut state) = self.state.try_borrow_mut() else {
            return;
        };

        let delta = to_delta(bytes);
        let mut cursor = state.current;
        while let Some(id) = cursor {
            let Some(record) = state.arena.get_mut(id) else {
                break;
            };
            if alloc {
                record.track_alloc(delta);
            } else {
                record.track_free(delta);
            }
            cursor = record.parent;
        }
    }
}

impl PhaseBackend for PhaseEngine {
    fn is_active(&self) -> bool {
        true
    }

    fn start(&self, title: &str) -> PhaseId {
        let _guard = self.suppress();
        let mut state = self.state_mut();
        self.start_inner(&mut state, title)
    }

    fn finish(&self, phase: PhaseId, export: bool) -> Option<PhaseDocument> {
        let _guard = self.suppress();
        let mut state = self.state_mut();
        self.finish_inner(&mut state, phase, &SP001, export).document
    }

    fn split(&self, phase: PhaseId, new_title: &str) -> PhaseId {
        let _guard = self.suppress();
        let mut state = self.state_mut();

        let finished = self.finish_inner(&mut state, phase, &SP003, false);
        let id = self.start_inner(&mut state, new_title);
        if let Some(record) = state.arena.get_mut(id) {
            record.mem_off = finished.mem_off.saturating_add(finished.mem_current);
        }
        id
    }

    fn log_stat(&self, phase: PhaseId, key: &str, value: &dyn Display) {
        let _guard = self.suppress();
        let mut state = self.state_mut();
        self.log_inner(&mut state, phase, key, value);
    }

    fn log_current(&self, key: &str, value: &dyn Display) {
        let _guard = self.suppress();
        let mut state = self.state_mut();
        if let Some(phase) = state.current {
            self.log_inner(&mut state, phase, key, value);
        }
    }

    fn export(&self, phase: PhaseId) -> Option<PhaseDocument> {
        let _guard = self.suppress();
        let mut state = self.state_mut();

        if state.arena.get(phase).is_none() {
            self.fail(&state, &SP004);
        }
        let now = self.clock.now_millis();
        if let Some(record) = state.arena.get_mut(phase) {
            if record.open {
                record.time_end = now;
            }
        }
        // The allocator may be bound to another context.
        tls::untracked(|| state.arena.document(phase))
    }

    fn counters(&self, phase: PhaseId) -> Option<PhaseCounters> {
        let _guard = self.suppress();
        let state = self.state_mut();
        state.arena.get(phase).map(PhaseRecord::counters)
    }

    fn current(&self) -> Option<PhaseId> {
        let _guard = self.suppress();
        self.state_mut().current
    }

    #[inline]
    fn track_alloc(&self, bytes: usize) {
        self.attribute(bytes, true);
    }

    #[inline]
    fn track_free(&self, bytes: usize) {
        self.attribute(bytes, false);
    }

    fn pause(&self) {
        self.user_paused.set(true);
    }

    fn resume(&self) {
        self.user_paused.set(false);
    }

    fn is_paused(&self) -> bool {
        self.user_paused.get()
    }

    fn register_extension(&self, hooks: ExtensionHooks) {
        let _guard = self.suppress();
        let mut state = self.state_mut();
        if state.current.is_some() {
            self.fail(&state, &SP005);
        }
        state.extensions.register(hooks);
        log::trace!(
            "registered phase extension {} ({} total)",
            hooks.name(),
            state.extensions.len()
        );
    }

    fn enter_untracked(&self) {
        self.suppression.set(self.suppression.get() + 1);
    }

    fn exit_untracked(&self) {
        self.suppression.set(self.suppression.get().saturating_sub(1));
    }
}

impl fmt::Debug for PhaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseEngine")
            .field("config", &self.config)
            .field("suppression", &self.suppression.get())
            .field("user_paused", &self.user_paused.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::extension::PhaseExtension;
    use crate::core::clock::ManualClock;
    use crate::diagnostics::ViolationPolicy;

    fn engine() -> (PhaseEngine, ManualClock) {
        let clock = ManualClock::new();
        let config = StatConfig::default().with_violation_policy(ViolationPolicy::Panic);
        (PhaseEngine::new(config, Box::new(clock.clone())), clock)
    }

    #[test]
    fn test_single_allocation() {
        let (engine, _) = engine();
        let root = engine.start("root");
        engine.track_alloc(100);

        let doc = engine.finish(root, true).unwrap();
        assert_eq!((doc.mem_off, doc.mem_peak, doc.mem_final), (0, 100, 100));
    }

    #[test]
    fn test_sub_phase_offsets() {
        let (engine, _) = engine();
        let root = engine.start("root");
        engine.track_alloc(300);

        let sub1 = engine.start("sub1");
        engine.track_alloc(100);
        engine.finish(sub1, false);

        engine.track_free(300);
        let doc = engine.finish(root, true).unwrap();

        assert_eq!((doc.mem_peak, doc.mem_final), (400, 100));
        let sub1 = &doc.sub[0];
        assert_eq!((sub1.mem_off, sub1.mem_peak, sub1.mem_final), (300, 100, 100));
    }

    #[test]
    fn test_split_continues_baseline() {
        let (engine, _) = engine();
        let root = engine.start("root");
        engine.track_alloc(300);

        let sub1 = engine.start("sub1");
        engine.track_alloc(100);
        let sub2 = engine.split(sub1, "sub2");
        engine.track_free(100);
        engine.finish(sub2, false);

        let doc = engine.finish(root, true).unwrap();
        let titles: Vec<_> = doc.sub.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, ["sub1", "sub2"]);

        let (first, second) = (&doc.sub[0], &doc.sub[1]);
        assert_eq!((first.mem_final, first.mem_peak), (100, 100));
        assert_eq!((second.mem_off, second.mem_final, second.mem_peak), (400, -100, 0));
    }

    #[test]
    fn test_delta_reaches_every_ancestor() {
        let (engine, _) = engine();
        let root = engine.start("root");
        let a = engine.start("a");
        let b = engine.start("b");

        engine.track_alloc(64);
        for id in [root, a, b] {
            assert_eq!(engine.counters(id).unwrap().mem_current, 64);
        }

        engine.track_free(64);
        for id in [root, a, b] {
            let counters = engine.counters(id).unwrap();
            assert_eq!((counters.mem_current, counters.mem_peak), (0, 64));
        }

        engine.finish(b, false);
        engine.track_alloc(8);
        assert_eq!(engine.counters(a).unwrap().mem_current, 8);
        assert_eq!(engine.counters(root).unwrap().mem_current, 8);
    }

    #[test]
    fn test_offset_is_parent_counter_at_start() {
        let (engine, _) = engine();
        let root = engine.start("root");
        engine.track_alloc(10);
        let a = engine.start("a");
        engine.track_alloc(5);
        let b = engine.start("b");

        assert_eq!(engine.counters(root).unwrap().mem_off, 0);
        assert_eq!(engine.counters(a).unwrap().mem_off, 10);
        assert_eq!(engine.counters(b).unwrap().mem_off, 5);
    }

    #[test]
    fn test_pause_and_suppression_ignore_events() {
        let (engine, _) = engine();
        let root = engine.start("root");

        engine.pause();
        engine.track_alloc(500);
        engine.resume();
        assert_eq!(engine.counters(root).unwrap().mem_current, 0);

        {
            let _guard = engine.suppress();
            engine.track_alloc(500);
        }
        assert_eq!(engine.counters(root).unwrap().mem_current, 0);

        engine.enter_untracked();
        engine.enter_untracked();
        engine.track_alloc(500);
        engine.exit_untracked();
        engine.track_alloc(500);
        engine.exit_untracked();
        assert_eq!(engine.counters(root).unwrap().mem_current, 0);

        engine.track_alloc(500);
        assert_eq!(engine.counters(root).unwrap().mem_peak, 500);
    }

    #[test]
    fn test_untracked_config_starts_paused() {
        let config = StatConfig::default().with_memory_tracking(false);
        let engine = PhaseEngine::new(config, Box::new(ManualClock::new()));
        assert!(engine.is_paused());
    }

    #[test]
    fn test_events_without_phase_are_dropped() {
        let (engine, _) = engine();
        engine.track_alloc(100);
        let root = engine.start("root");
        assert_eq!(engine.counters(root).unwrap(), PhaseCounters::default());
    }

    #[test]
    fn test_timestamps_come_from_clock() {
        let (engine, clock) = engine();
        clock.set(1.0);
        let root = engine.start("root");
        clock.advance(4.0);

        let doc = engine.finish(root, true).unwrap();
        assert_eq!((doc.time_start, doc.time_end), (1.0, 5.0));
        assert_eq!(doc.duration_ms(), 4.0);
    }

    #[test]
    fn test_export_open_phase() {
        let (engine, clock) = engine();
        let root = engine.start("root");
        let done = engine.start("done");
        engine.finish(done, false);
        let _open = engine.start("open");

        clock.set(7.0);
        let doc = engine.export(root).unwrap();
        assert_eq!(doc.time_end, 7.0);
        assert_eq!(doc.sub.len(), 1);
        assert_eq!(doc.sub[0].title, "done");
    }

    #[test]
    fn test_export_finished_phase_is_stable() {
        let (engine, clock) = engine();
        let root = engine.start("root");
        let sub = engine.start("sub");
        engine.log_stat(sub, "n", &3);
        engine.finish(sub, false);

        clock.advance(1.0);
        let first = engine.export(sub).unwrap();
        clock.advance(1.0);
        assert_eq!(engine.export(sub).unwrap(), first);
        engine.finish(root, false);
    }

    #[test]
    fn test_root_finish_releases_tree() {
        let (engine, _) = engine();
        let root = engine.start("root");
        engine.start("sub");
        let sub = engine.current().unwrap();
        engine.finish(sub, false);
        engine.finish(root, false);

        assert_eq!(engine.current(), None);
        assert_eq!(engine.counters(root), None);
        assert_eq!(engine.state.borrow().arena.len(), 0);
    }

    #[test]
    fn test_stats_keep_order_and_duplicates() {
        let (engine, _) = engine();
        let root = engine.start("root");
        engine.log_stat(root, "k", &1);
        engine.log_current("k", &"two");

        let doc = engine.finish(root, true).unwrap();
        let values: Vec<_> = doc.stats.iter().map(|s| s.value.as_str()).collect();
        assert_eq!(values, ["1", "two"]);
    }

    #[test]
    fn test_text_is_truncated() {
        let config = StatConfig::default().with_max_text_len(4);
        let engine = PhaseEngine::new(config, Box::new(ManualClock::new()));
        let root = engine.start("compression");
        engine.log_stat(root, "ratio", &0.123456);

        let doc = engine.finish(root, true).unwrap();
        assert_eq!(doc.title, "comp");
        assert_eq!((doc.stats[0].key.as_str(), doc.stats[0].value.as_str()), ("rati", "0.12"));
    }

    #[derive(Default)]
    struct Depth(u32);

    impl PhaseExtension for Depth {
        fn write(&self, out: &mut StatWriter<'_>) {
            out.log("descendants", self.0);
        }

        fn propagate(&mut self, sub: &Self) {
            self.0 += sub.0 + 1;
        }
    }

    #[test]
    fn test_extensions_write_then_propagate() {
        let (engine, _) = engine();
        engine.register_extension(ExtensionHooks::of::<Depth>());

        let root = engine.start("root");
        let a = engine.start("a");
        let b = engine.start("b");
        engine.finish(b, false);
        engine.finish(a, false);
        let c = engine.start("c");
        engine.finish(c, false);

        let doc = engine.finish(root, true).unwrap();
        assert_eq!(doc.stat("descendants"), Some("3"));
        assert_eq!(doc.find("a").unwrap().stat("descendants"), Some("1"));
        assert_eq!(doc.find("b").unwrap().stat("descendants"), Some("0"));
    }

    #[test]
    #[should_panic(expected = "SP001")]
    fn test_finish_out_of_order_is_fatal() {
        let (engine, _) = engine();
        let root = engine.start("root");
        engine.start("sub");
        engine.finish(root, false);
    }

    #[test]
    #[should_panic(expected = "SP003")]
    fn test_split_out_of_order_is_fatal() {
        let (engine, _) = engine();
        let root = engine.start("root");
        engine.start("sub");
        engine.split(root, "next");
    }

    #[test]
    #[should_panic(expected = "SP002")]
    fn test_log_on_finished_phase_is_fatal() {
        let (engine, _) = engine();
        let _root = engine.start("root");
        let sub = engine.start("sub");
        engine.finish(sub, false);
        engine.log_stat(sub, "late", &1);
    }

    #[test]
    #[should_panic(expected = "SP004")]
    fn test_released_handle_is_fatal() {
        let (engine, _) = engine();
        let root = engine.start("root");
        engine.finish(root, false);
        engine.export(root);
    }

    #[test]
    #[should_panic(expected = "SP005")]
    fn test_register_while_open_is_fatal() {
        let (engine, _) = engine();
        engine.start("root");
        engine.register_extension(ExtensionHooks::of::<Depth>());
    }
}
