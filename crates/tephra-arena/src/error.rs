//! Error handling for the arena.
//!
//! This module provides a unified error type and result alias used across
//! the allocator. Out-of-memory conditions are surfaced to the immediate
//! caller and leave the arena in a consistent, usable state; the remaining
//! variants are diagnostics for API misuse that the type system cannot
//! reject at compile time.

use thiserror::Error;

/// Result type alias for arena operations.
pub type ArenaResult<T> = std::result::Result<T, ArenaError>;

/// The error type for arena operations.
#[derive(Debug, Error)]
pub enum ArenaError {
    /// The underlying block allocator refused the request.
    ///
    /// The arena is left unchanged: no block is partially linked and
    /// subsequent allocations that fit the existing blocks still succeed.
    #[error("block allocation of {size} bytes failed")]
    OutOfMemory {
        /// Size of the failed block request in bytes.
        size: usize,
    },

    /// A zero-byte allocation was requested.
    #[error("allocation size must be greater than zero")]
    ZeroSizeAlloc,

    /// The requested alignment is zero or not a power of two.
    #[error("alignment {align} is not a power of two")]
    BadAlignment {
        /// The rejected alignment.
        align: usize,
    },

    /// The requested alignment exceeds what a block can guarantee.
    #[error("alignment {align} exceeds the maximum supported alignment {max}")]
    AlignmentTooLarge {
        /// The rejected alignment.
        align: usize,
        /// Largest supported alignment.
        max: usize,
    },

    /// Invalid arena configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },
}

impl ArenaError {
    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if this error is an out-of-memory condition.
    ///
    /// Out-of-memory is the only recoverable variant: the caller may retry
    /// with a smaller request or after freeing memory elsewhere. The other
    /// variants indicate misuse.
    #[must_use]
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}
