//! Tephra arena benchmarks.
//!
//! This crate compares arena allocation against the system allocator across
//! the workload shapes the arena is built for:
//! - Small, medium, and large raw allocations
//! - Batch allocation followed by a reset
//! - Typed creation with and without destructor registration
//! - Allocator-aware container growth
//! - Mixed-size allocation patterns
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench -p tephra-bench
//! ```

pub mod utils;
