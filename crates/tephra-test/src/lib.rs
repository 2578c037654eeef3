//! # tephra-test
//!
//! Integration tests for the Tephra arena.
//!
//! This crate contains:
//! - Drop-observable fixture types for destructor-ordering tests
//! - Fault-injecting and instrumented block allocators
//! - End-to-end allocation scenarios in `tests/`

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Fixture types with observable destructors
pub mod objects;

/// Fault-injecting and instrumented block allocators
pub mod faults;
