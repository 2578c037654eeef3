//! Arena metrics for monitoring and debugging.
//!
//! Two counter banks with the same shape:
//!
//! - [`GlobalArenaMetrics`]: one per process, relaxed atomics, safe to read
//!   from any thread. Readers may observe a slightly inconsistent snapshot
//!   across counters, which is acceptable for diagnostics.
//! - [`LocalArenaMetrics`]: one per thread, plain counters with no
//!   synchronization, merged into the global bank at a configurable boundary
//!   (arena reset, arena destruction, or an explicit
//!   [`flush_local_metrics`] call).

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time copy of the metric counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Arenas constructed.
    pub arenas_created: u64,
    /// Arenas destroyed.
    pub arenas_destroyed: u64,
    /// Blocks acquired from the block allocator.
    pub blocks_allocated: u64,
    /// Blocks released back to the block allocator.
    pub blocks_released: u64,
    /// Bytes reserved from the system across all blocks.
    pub bytes_reserved: u64,
    /// Bytes served to callers, including alignment slack.
    pub bytes_served: u64,
    /// Bytes lost to alignment slack and abandoned block tails.
    pub bytes_wasted: u64,
    /// Arena resets.
    pub resets: u64,
    /// Cleanup records executed.
    pub cleanups_run: u64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ArenaMetrics {{ arenas: {}/{} created/destroyed, blocks: {}/{} allocated/released, \
             bytes: {} reserved, {} served, {} wasted, resets: {}, cleanups: {} }}",
            self.arenas_created,
            self.arenas_destroyed,
            self.blocks_allocated,
            self.blocks_released,
            self.bytes_reserved,
            self.bytes_served,
            self.bytes_wasted,
            self.resets,
            self.cleanups_run
        )
    }
}

/// Process-wide arena metrics.
///
/// All updates use relaxed ordering; the counters are diagnostics, not a
/// synchronization mechanism.
#[derive(Debug)]
pub struct GlobalArenaMetrics {
    arenas_created: AtomicU64,
    arenas_destroyed: AtomicU64,
    blocks_allocated: AtomicU64,
    blocks_released: AtomicU64,
    bytes_reserved: AtomicU64,
    bytes_served: AtomicU64,
    bytes_wasted: AtomicU64,
    resets: AtomicU64,
    cleanups_run: AtomicU64,
}

static GLOBAL_METRICS: GlobalArenaMetrics = GlobalArenaMetrics::new();

/// Returns the process-wide metrics bank.
#[must_use]
pub fn global_metrics() -> &'static GlobalArenaMetrics {
    &GLOBAL_METRICS
}

impl GlobalArenaMetrics {
    const fn new() -> Self {
        Self {
            arenas_created: AtomicU64::new(0),
            arenas_destroyed: AtomicU64::new(0),
            blocks_allocated: AtomicU64::new(0),
            blocks_released: AtomicU64::new(0),
            bytes_reserved: AtomicU64::new(0),
            bytes_served: AtomicU64::new(0),
            bytes_wasted: AtomicU64::new(0),
            resets: AtomicU64::new(0),
            cleanups_run: AtomicU64::new(0),
        }
    }

    /// Merges a thread-local snapshot into the global counters.
    pub fn absorb(&self, local: &MetricsSnapshot) {
        self.arenas_created
            .fetch_add(local.arenas_created, Ordering::Relaxed);
        self.arenas_destroyed
            .fetch_add(local.arenas_destroyed, Ordering::Relaxed);
        self.blocks_allocated
            .fetch_add(local.blocks_allocated, Ordering::Relaxed);
        self.blocks_released
            .fetch_add(local.blocks_released, Ordering::Relaxed);
        self.bytes_reserved
            .fetch_add(local.bytes_reserved, Ordering::Relaxed);
        self.bytes_served
            .fetch_add(local.bytes_served, Ordering::Relaxed);
        self.bytes_wasted
            .fetch_add(local.bytes_wasted, Ordering::Relaxed);
        self.resets.fetch_add(local.resets, Ordering::Relaxed);
        self.cleanups_run
            .fetch_add(local.cleanups_run, Ordering::Relaxed);
    }

    /// Returns a copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            arenas_created: self.arenas_created.load(Ordering::Relaxed),
            arenas_destroyed: self.arenas_destroyed.load(Ordering::Relaxed),
            blocks_allocated: self.blocks_allocated.load(Ordering::Relaxed),
            blocks_released: self.blocks_released.load(Ordering::Relaxed),
            bytes_reserved: self.bytes_reserved.load(Ordering::Relaxed),
            bytes_served: self.bytes_served.load(Ordering::Relaxed),
            bytes_wasted: self.bytes_wasted.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            cleanups_run: self.cleanups_run.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.arenas_created.store(0, Ordering::Relaxed);
        self.arenas_destroyed.store(0, Ordering::Relaxed);
        self.blocks_allocated.store(0, Ordering::Relaxed);
        self.blocks_released.store(0, Ordering::Relaxed);
        self.bytes_reserved.store(0, Ordering::Relaxed);
        self.bytes_served.store(0, Ordering::Relaxed);
        self.bytes_wasted.store(0, Ordering::Relaxed);
        self.resets.store(0, Ordering::Relaxed);
        self.cleanups_run.store(0, Ordering::Relaxed);
    }
}

impl fmt::Display for GlobalArenaMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.snapshot().fmt(f)
    }
}

/// Per-thread arena metrics.
///
/// Updated from the arena hot path without atomics; flushed into
/// [`GlobalArenaMetrics`] in one batch.
#[derive(Debug, Default)]
pub struct LocalArenaMetrics {
    arenas_created: Cell<u64>,
    arenas_destroyed: Cell<u64>,
    blocks_allocated: Cell<u64>,
    blocks_released: Cell<u64>,
    bytes_reserved: Cell<u64>,
    bytes_served: Cell<u64>,
    bytes_wasted: Cell<u64>,
    resets: Cell<u64>,
    cleanups_run: Cell<u64>,
}

thread_local! {
    static LOCAL_METRICS: LocalArenaMetrics = LocalArenaMetrics::default();
}

/// Runs `f` with this thread's metrics instance.
pub fn with_local_metrics<R>(f: impl FnOnce(&LocalArenaMetrics) -> R) -> R {
    LOCAL_METRICS.with(f)
}

/// Flushes this thread's counters into the global bank.
pub fn flush_local_metrics() {
    LOCAL_METRICS.with(LocalArenaMetrics::flush_to_global);
}

impl LocalArenaMetrics {
    /// Records an arena construction.
    #[inline]
    pub fn record_arena_created(&self) {
        self.arenas_created.set(self.arenas_created.get() + 1);
    }

    /// Records an arena destruction.
    #[inline]
    pub fn record_arena_destroyed(&self) {
        self.arenas_destroyed.set(self.arenas_destroyed.get() + 1);
    }

    /// Records a block acquisition of `bytes` capacity.
    #[inline]
    pub fn record_block_allocated(&self, bytes: usize) {
        self.blocks_allocated.set(self.blocks_allocated.get() + 1);
        self.bytes_reserved
            .set(self.bytes_reserved.get() + bytes as u64);
    }

    /// Records a block release.
    #[inline]
    pub fn record_block_released(&self) {
        self.blocks_released.set(self.blocks_released.get() + 1);
    }

    /// Records `bytes` served to a caller.
    #[inline]
    pub fn record_bytes_served(&self, bytes: usize) {
        self.bytes_served
            .set(self.bytes_served.get() + bytes as u64);
    }

    /// Records `bytes` of alignment slack or abandoned block tail.
    #[inline]
    pub fn record_bytes_wasted(&self, bytes: usize) {
        self.bytes_wasted
            .set(self.bytes_wasted.get() + bytes as u64);
    }

    /// Records an arena reset.
    #[inline]
    pub fn record_reset(&self) {
        self.resets.set(self.resets.get() + 1);
    }

    /// Records `count` executed cleanup records.
    #[inline]
    pub fn record_cleanups(&self, count: usize) {
        self.cleanups_run
            .set(self.cleanups_run.get() + count as u64);
    }

    /// Returns a copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            arenas_created: self.arenas_created.get(),
            arenas_destroyed: self.arenas_destroyed.get(),
            blocks_allocated: self.blocks_allocated.get(),
            blocks_released: self.blocks_released.get(),
            bytes_reserved: self.bytes_reserved.get(),
            bytes_served: self.bytes_served.get(),
            bytes_wasted: self.bytes_wasted.get(),
            resets: self.resets.get(),
            cleanups_run: self.cleanups_run.get(),
        }
    }

    /// Merges the counters into the global bank and zeroes them.
    pub fn flush_to_global(&self) {
        global_metrics().absorb(&self.snapshot());
        self.arenas_created.set(0);
        self.arenas_destroyed.set(0);
        self.blocks_allocated.set(0);
        self.blocks_released.set(0);
        self.bytes_reserved.set(0);
        self.bytes_served.set(0);
        self.bytes_wasted.set(0);
        self.resets.set(0);
        self.cleanups_run.set(0);
    }
}

impl fmt::Display for LocalArenaMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.snapshot().fmt(f)
    }
}
