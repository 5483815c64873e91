//! Heap allocations reported through the global allocator.

use std::alloc::System;
use std::hint::black_box;

use statphase::{StatConfig, StatContext, TrackingAllocator, ViolationPolicy};

#[global_allocator]
static ALLOCATOR: TrackingAllocator<System> = TrackingAllocator::system();

fn context() -> StatContext {
    StatContext::new(StatConfig::default().with_violation_policy(ViolationPolicy::Panic))
}

#[test]
fn test_vec_allocation_is_attributed() {
    let ctx = context();
    let _binding = ctx.bind_allocator();

    let root = ctx.start("root");
    assert_eq!(root.counters().mem_current, 0);

    let data: Vec<u8> = black_box(Vec::with_capacity(1000));
    assert_eq!(root.counters().mem_current, 1000);

    drop(data);
    let counters = root.counters();
    assert_eq!((counters.mem_current, counters.mem_peak), (0, 1000));
}

#[test]
fn test_realloc_reports_free_then_alloc() {
    let ctx = context();
    let _binding = ctx.bind_allocator();

    let root = ctx.start("root");
    let mut data: Vec<u8> = black_box(Vec::with_capacity(100));
    data.reserve_exact(500);
    assert_eq!(data.capacity(), 500);

    let counters = root.counters();
    assert_eq!((counters.mem_current, counters.mem_peak), (500, 500));
    drop(data);
}

#[test]
fn test_nested_phases_see_real_allocations() {
    let ctx = context();
    let _binding = ctx.bind_allocator();

    let root = ctx.start("root");
    let kept = {
        let _sub = ctx.start("sub");
        black_box(vec![0u64; 32])
    };
    let doc = root.finish().unwrap();

    let sub = &doc.sub[0];
    assert_eq!((sub.mem_peak, sub.mem_final), (256, 256));
    assert_eq!(doc.mem_final, 256);
    drop(kept);
}

#[test]
fn test_unbound_thread_is_not_tracked() {
    let ctx = context();
    let root = ctx.start("root");

    let data: Vec<u8> = black_box(Vec::with_capacity(1000));
    assert_eq!(root.counters().mem_current, 0);
    drop(data);
}

#[test]
fn test_unbinding_stops_tracking() {
    let ctx = context();
    let binding = ctx.bind_allocator();
    let root = ctx.start("root");
    drop(binding);

    let data: Vec<u8> = black_box(Vec::with_capacity(1000));
    assert_eq!(root.counters().mem_current, 0);
    drop(data);
}

#[test]
fn test_pause_guard_hides_allocations() {
    let ctx = context();
    let _binding = ctx.bind_allocator();
    let root = ctx.start("root");

    let hidden = {
        let _pause = ctx.paused();
        black_box(Vec::<u8>::with_capacity(500))
    };
    assert_eq!(root.counters().mem_current, 0);

    let counted: Vec<u8> = black_box(Vec::with_capacity(500));
    assert_eq!(root.counters().mem_current, 500);

    drop(counted);
    drop(hidden);
}

#[test]
fn test_disabled_context_binding_is_harmless() {
    let ctx = StatContext::disabled();
    let _binding = ctx.bind_allocator();

    let root = ctx.start("root");
    let data = black_box(vec![1u8; 64]);
    assert_eq!(root.counters().mem_peak, 0);
    drop(data);
}

#[test]
fn test_exported_documents_are_not_attributed() {
    let ctx = context();
    let _binding = ctx.bind_allocator();

    let root = ctx.start("root");
    root.log_stat("k", "v");
    let data: Vec<u8> = black_box(Vec::with_capacity(100));
    let before = root.counters();

    let doc = root.to_document().unwrap();
    assert_eq!(root.counters(), before);
    let copy = doc.clone();
    drop(doc);
    drop(copy);
    assert_eq!(root.counters(), before);

    let sub = ctx.start("sub").finish().unwrap();
    assert_eq!(sub.title, "sub");
    drop(sub);
    assert_eq!(root.counters(), before);
    drop(data);
}

#[test]
fn test_json_export_counts_only_the_output() {
    let ctx = context();
    let _binding = ctx.bind_allocator();

    let root = ctx.start("root");
    ctx.wrap("sub", |phase| phase.log_stat("factors", 1234));
    let before = root.counters().mem_current;

    let json = root.to_json_string().unwrap();
    assert_eq!(root.counters().mem_current, before + json.capacity() as i64);
    drop(json);
    assert_eq!(root.counters().mem_current, before);

    drop(root.to_json().unwrap());
    assert_eq!(root.counters().mem_current, before);

    let mut out = Vec::new();
    root.write_json(&mut out).unwrap();
    assert_eq!(root.counters().mem_current, before + out.capacity() as i64);
    drop(out);
    assert_eq!(root.counters().mem_current, before);
}
