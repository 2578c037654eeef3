//! # tephra-arena
//!
//! Region-based memory allocator for bursty, short-lived allocation
//! patterns: request handling, parsing, query execution.
//!
//! An [`Arena`] replaces many fine-grained allocations with bump-pointer
//! allocation inside large pre-reserved blocks and releases everything at
//! once on [`reset`](Arena::reset) or drop. It provides:
//!
//! - **Raw aligned allocation**: [`Arena::alloc_bytes`] and
//!   [`Arena::alloc_aligned`]
//! - **Typed construction**: [`Arena::create`] / [`Arena::create_array`] for
//!   types opting in through [`ArenaManaged`], with destructor registration
//!   on a LIFO cleanup chain unless the type skips it
//! - **Instrumentation**: process-global and per-thread counters
//!   ([`global_metrics`], [`with_local_metrics`]) plus observer hooks
//! - **Container integration**: [`Arena::memory_resource`] yields an
//!   [`ArenaResource`] satisfying the `allocator-api2` allocator contract
//!
//! ## Example
//!
//! ```rust
//! use tephra_arena::{arena_managed, Arena};
//!
//! struct Request {
//!     body: String,
//! }
//! arena_managed!(Request);
//!
//! let mut arena = Arena::new();
//!
//! let request = arena
//!     .create(Request {
//!         body: "payload".to_string(),
//!     })
//!     .unwrap();
//! assert_eq!(request.body, "payload");
//!
//! // Runs Request's destructor and reclaims every block at once.
//! arena.reset();
//! assert_eq!(arena.space_used(), 0);
//! ```
//!
//! ## Thread model
//!
//! One arena, one thread: no locks or atomics on the allocation path. The
//! only shared state is the global metrics bank, updated with relaxed
//! atomics from per-thread counters.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod align;
mod arena;
mod block;
mod cleanup;
mod error;
mod managed;
mod metrics;
mod options;
mod resource;

pub use align::{align_up, is_aligned, BLOCK_ALIGNMENT, DEFAULT_ALIGNMENT, MAX_ALIGNMENT};
pub use arena::Arena;
pub use block::{BlockAlloc, SystemBlockAlloc};
pub use error::{ArenaError, ArenaResult};
pub use managed::{is_destructor_skippable, ArenaManaged};
pub use metrics::{
    flush_local_metrics, global_metrics, with_local_metrics, GlobalArenaMetrics,
    LocalArenaMetrics, MetricsSnapshot,
};
pub use options::{
    AllocationHook, ArenaHooks, ArenaOptions, InitHook, MetricsFlush, ReclaimHook,
    DEFAULT_HUGE_BLOCK_SIZE, DEFAULT_INITIAL_BLOCK_SIZE, DEFAULT_MAX_BLOCK_SIZE,
};
pub use resource::ArenaResource;
