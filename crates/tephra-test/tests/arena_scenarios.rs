//! End-to-end allocation scenarios for the Tephra arena.
//!
//! These tests exercise the public surface the way request handlers and
//! query executors do: bursts of small allocations, typed construction with
//! destructor ordering, oversized requests, container integration, and
//! recovery from block-allocator failure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use allocator_api2::vec::Vec as ArenaVec;
use tephra_arena::{
    global_metrics, Arena, ArenaHooks, ArenaOptions, BlockAlloc, MetricsFlush,
    DEFAULT_INITIAL_BLOCK_SIZE,
};
use tephra_test::faults::{CountingBlockAlloc, FailingBlockAlloc};
use tephra_test::objects::{new_drop_log, CreateOnly, Tracked};

/// 1024 small allocations stay within the first two blocks and every
/// returned pointer is distinct and aligned.
#[test]
fn test_small_alloc_chain() {
    let arena = Arena::new();

    let mut addresses: Vec<usize> = (0..1024)
        .map(|_| arena.alloc_aligned(32, 8).unwrap().as_ptr() as usize)
        .collect();

    for &addr in &addresses {
        assert_eq!(addr % 8, 0);
    }
    addresses.sort_unstable();
    addresses.dedup();
    assert_eq!(addresses.len(), 1024, "pointers must be distinct");

    // 32 KiB served with no alignment slack.
    assert_eq!(arena.space_used(), 1024 * 32);
    assert!(arena.space_allocated() >= 1024 * 32);
    assert!(arena.space_allocated() >= DEFAULT_INITIAL_BLOCK_SIZE);
    assert!(arena.block_count() <= 2);
}

/// Destructors run in reverse creation order on reset.
#[test]
fn test_destructor_lifo_order() {
    let log = new_drop_log();
    let mut arena = Arena::new();

    for id in ['A', 'B', 'C'] {
        let _ = arena.create(Tracked::new(id, &log)).unwrap();
    }
    assert!(log.borrow().is_empty());

    arena.reset();
    assert_eq!(*log.borrow(), vec!['C', 'B', 'A']);
}

/// An oversized request gets a dedicated block and does not retire the
/// current small block.
#[test]
fn test_huge_request_gets_dedicated_block() {
    let arena = Arena::with_options(
        ArenaOptions::new().with_huge_block_size(1024 * 1024),
    )
    .unwrap();

    let first = arena.alloc_aligned(512, 8).unwrap();
    let huge = arena.alloc_aligned(2 * 1024 * 1024, 8).unwrap();
    let third = arena.alloc_aligned(512, 8).unwrap();

    // The small allocations are adjacent in the same block; the oversized
    // one landed elsewhere.
    let first = first.as_ptr() as usize;
    let third = third.as_ptr() as usize;
    let huge = huge.as_ptr() as usize;
    assert_eq!(third - first, 512);
    assert!(huge < first || huge >= first + DEFAULT_INITIAL_BLOCK_SIZE);

    assert_eq!(arena.block_count(), 2);
    assert!(arena.space_allocated() >= 2 * 1024 * 1024 + DEFAULT_INITIAL_BLOCK_SIZE);
}

/// Types that opt out of destructor registration never reach the cleanup
/// chain and their destructors never run.
#[test]
fn test_skip_destructor_types() {
    let log = new_drop_log();
    let mut arena = Arena::new();

    for _ in 0..10 {
        let value = arena.create(CreateOnly::new('s', &log)).unwrap();
        assert_eq!(value.id(), 's');
        assert_eq!(arena.cleanup_count(), 0);
    }

    arena.reset();
    assert!(log.borrow().is_empty(), "skipped destructors must not run");
}

/// A container bound to the arena's memory resource draws all storage from
/// arena blocks and reset reclaims it.
#[test]
fn test_container_draws_from_arena() {
    let counting = Arc::new(CountingBlockAlloc::new());
    let mut arena = Arena::with_options(
        ArenaOptions::new().with_block_alloc(Arc::clone(&counting) as Arc<dyn BlockAlloc>),
    )
    .unwrap();

    {
        let mut values = ArenaVec::new_in(arena.memory_resource());
        let mut last_used = 0;
        for i in 0..100i64 {
            values.push(i);
            let used = arena.space_used();
            assert!(used >= last_used, "space_used must grow monotonically");
            last_used = used;
        }
        assert_eq!(values.iter().sum::<i64>(), 4950);
    }

    // Every byte the container touched came through the arena's block
    // allocator, not piecemeal system allocation.
    assert_eq!(counting.bytes(), arena.space_allocated());
    assert_eq!(counting.allocations(), arena.block_count());
    assert!(arena.space_used() >= 100 * 8);

    let reclaimed = arena.reset();
    assert!(reclaimed >= 100 * 8);
    assert_eq!(arena.space_used(), 0);
}

/// Block-allocator failure surfaces as an error, leaves existing blocks
/// intact, and the arena keeps serving from the current block.
#[test]
fn test_oom_recovery() {
    let failing = Arc::new(FailingBlockAlloc::new(3));
    let arena = Arena::with_options(
        ArenaOptions::new()
            .with_initial_block_size(4096)
            .with_max_block_size(8192)
            .with_block_alloc(Arc::clone(&failing) as Arc<dyn BlockAlloc>),
    )
    .unwrap();

    // Fill the first block, then most of the second.
    let _ = arena.alloc_bytes(4096).unwrap();
    let _ = arena.alloc_bytes(4096).unwrap();
    let _ = arena.alloc_bytes(3000).unwrap();
    assert_eq!(arena.block_count(), 2);

    // The third block request fails.
    let err = arena.alloc_bytes(3000).unwrap_err();
    assert!(err.is_out_of_memory());
    assert_eq!(failing.requests(), 3);

    // No partial linkage: both blocks and their contents survive.
    assert_eq!(arena.block_count(), 2);
    assert_eq!(arena.space_allocated(), 4096 + 8192);

    // The current block still serves requests that fit its tail...
    let _ = arena.alloc_bytes(1000).unwrap();
    assert_eq!(arena.block_count(), 2);

    // ...and once it is exhausted, the next block request succeeds again.
    let _ = arena.alloc_bytes(1000).unwrap();
    assert_eq!(arena.block_count(), 3);
}

/// Requesting exactly the remaining bytes consumes the block; the next
/// request forces a new one.
#[test]
fn test_exact_fit_consumes_block() {
    let arena = Arena::with_options(
        ArenaOptions::new().with_initial_block_size(4096),
    )
    .unwrap();

    let _ = arena.alloc_bytes(4096).unwrap();
    assert_eq!(arena.block_count(), 1);
    assert_eq!(arena.space_used(), arena.space_allocated());

    let _ = arena.alloc_bytes(8).unwrap();
    assert_eq!(arena.block_count(), 2);
}

/// Alignments above the default are honored via padding within the block.
#[test]
fn test_alignment_padding_within_block() {
    let arena = Arena::new();

    let _ = arena.alloc_aligned(1, 1).unwrap();
    let aligned = arena.alloc_aligned(64, 1024).unwrap();
    assert_eq!(aligned.as_ptr() as usize % 1024, 0);
    assert_eq!(arena.block_count(), 1);

    // The padding is accounted as used space.
    assert!(arena.space_used() > 65);
    assert!(arena.space_used() <= arena.space_allocated());
}

/// Construct-then-drop fires init and destruction hooks exactly once each,
/// with no allocation in between.
#[test]
fn test_init_and_destruction_hooks_fire_once() {
    let inits = Arc::new(AtomicUsize::new(0));
    let drops = Arc::new(AtomicUsize::new(0));

    let hooks = {
        let inits = Arc::clone(&inits);
        let drops = Arc::clone(&drops);
        ArenaHooks::new()
            .on_init(move |arena| {
                assert_eq!(arena.space_allocated(), 0);
                inits.fetch_add(1, Ordering::SeqCst);
            })
            .on_destruction(move |_, reclaimed| {
                assert_eq!(reclaimed, 0);
                drops.fetch_add(1, Ordering::SeqCst);
            })
    };

    let arena = Arena::with_options(ArenaOptions::new().with_hooks(hooks)).unwrap();
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(arena);
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

/// The allocation hook sees a type tag for typed creation and none for raw
/// requests; the reset hook reports the bytes reclaimed.
#[test]
fn test_allocation_and_reset_hooks() {
    let tags: Arc<Mutex<Vec<Option<&'static str>>>> = Arc::new(Mutex::new(Vec::new()));
    let reclaimed_seen = Arc::new(AtomicUsize::new(0));

    let hooks = {
        let tags = Arc::clone(&tags);
        let reclaimed_seen = Arc::clone(&reclaimed_seen);
        ArenaHooks::new()
            .on_allocation(move |_, tag, _| tags.lock().unwrap().push(tag))
            .on_reset(move |_, reclaimed| {
                reclaimed_seen.store(reclaimed, Ordering::SeqCst);
            })
    };

    let mut arena = Arena::with_options(ArenaOptions::new().with_hooks(hooks)).unwrap();

    let _ = arena.alloc_bytes(64).unwrap();
    let _ = arena.alloc(9u32).unwrap();

    {
        let tags = tags.lock().unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0], None);
        assert_eq!(tags[1], Some(std::any::type_name::<u32>()));
    }

    let used = arena.space_used();
    let reclaimed = arena.reset();
    assert_eq!(reclaimed, used);
    assert_eq!(reclaimed_seen.load(Ordering::SeqCst), reclaimed);
}

/// `space_used` never exceeds `space_allocated` across a mixed workload,
/// and reset restores the empty-state counters.
#[test]
fn test_space_invariants_under_mixed_workload() {
    let mut arena = Arena::with_options(
        ArenaOptions::new()
            .with_initial_block_size(4096)
            .with_huge_block_size(64 * 1024),
    )
    .unwrap();

    let sizes = [16usize, 32, 8, 64, 16, 128, 32, 16, 8, 256, 70 * 1024];
    for round in 0..3 {
        for (i, &size) in sizes.iter().enumerate() {
            let align = 1 << (i % 7);
            let ptr = arena.alloc_aligned(size, align).unwrap();
            assert_eq!(ptr.as_ptr() as usize % align, 0);
            assert!(arena.space_used() <= arena.space_allocated());
        }

        let reclaimed = arena.reset();
        assert!(reclaimed > 0, "round {round} reclaimed nothing");
        assert_eq!(arena.space_used(), 0);
        assert_eq!(arena.cleanup_count(), 0);
    }
}

/// Arena lifecycles show up in the global metrics bank.
#[test]
fn test_metrics_reach_global_bank() {
    let before = global_metrics().snapshot();

    let mut arena = Arena::with_options(
        ArenaOptions::new().with_metrics_flush(MetricsFlush::OnReset),
    )
    .unwrap();
    let _ = arena.alloc_bytes(512).unwrap();
    arena.reset();
    drop(arena);

    let after = global_metrics().snapshot();
    assert!(after.arenas_created > before.arenas_created);
    assert!(after.arenas_destroyed > before.arenas_destroyed);
    assert!(after.bytes_served >= before.bytes_served + 512);
    assert!(after.resets > before.resets);
    assert!(after.blocks_allocated > before.blocks_allocated);
}

/// Typed creation keeps working after a reset, with fresh cleanup records.
#[test]
fn test_create_after_reset() {
    let log = new_drop_log();
    let mut arena = Arena::new();

    let _ = arena.create(Tracked::new('1', &log)).unwrap();
    arena.reset();
    assert_eq!(*log.borrow(), vec!['1']);

    let _ = arena.create(Tracked::new('2', &log)).unwrap();
    assert_eq!(arena.cleanup_count(), 1);
    drop(arena);
    assert_eq!(*log.borrow(), vec!['1', '2']);
}
