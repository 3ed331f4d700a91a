//! # Arena Error Types
//!
//! All errors that can occur while creating, allocating from, or freeing into
//! an arena chain.

use thiserror::Error;

/// Errors that can occur in the arena allocator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// A zero-byte allocation was requested.
    #[error("allocation size must be greater than zero")]
    ZeroSize,

    /// Arena creation with a size of zero or above the configured maximum.
    #[error("invalid arena size {size}: must be in 1..={max}")]
    InvalidArenaSize {
        /// The requested arena size.
        size: usize,
        /// The maximum arena size allowed by the configuration.
        max: usize,
    },

    /// The aligned block footprint does not fit in a single arena.
    #[error("allocation too large: block of {requested} bytes exceeds limit of {limit} bytes")]
    CapacityExceeded {
        /// Aligned footprint of the requested block, header included.
        requested: usize,
        /// The limit that was hit (arena size or maximum block size).
        limit: usize,
    },

    /// The handle does not designate a block of this chain.
    #[error("invalid block handle")]
    InvalidHandle,

    /// The block designated by the handle is already free.
    #[error("block already freed")]
    DoubleFree,

    /// Data access through a handle whose block has been freed.
    #[error("block used after free")]
    UseAfterFree,

    /// Configuration values failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    ConfigIo(String),

    /// The configuration file is not valid TOML for [`crate::ArenaConfig`].
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),
}

/// Result type for arena operations.
pub type ArenaResult<T> = Result<T, ArenaError>;
