//! # REGIO Core Engine
//!
//! Region-based ("arena") allocator: variably sized blocks handed out from a
//! preallocated buffer, freed individually, coalesced in batches, and
//! released all at once.
//!
//! ## Architecture Rules
//!
//! 1. **One owned buffer per arena** - never resized, never shared
//! 2. **Inline headers** - size and status live right before each block
//! 3. **Handles, not pointers** - blocks are addressed by `(arena, offset, epoch)`
//!
//! ## Example
//!
//! ```rust
//! use regio_core::{ArenaChain, ArenaConfig};
//!
//! let config = ArenaConfig::from_toml_str("merge_threshold = 4")?;
//! let mut chain = ArenaChain::create_with_config(4096, config)?;
//!
//! let handles = (0..8).map(|_| chain.allocate(100)).collect::<Result<Vec<_>, _>>()?;
//! for handle in handles {
//!     chain.free(handle)?;
//! }
//! assert_eq!(chain.stats().used_blocks, 0);
//! # Ok::<(), regio_core::ArenaError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod memory;

pub use config::{ArenaConfig, DEFAULT_ALIGNMENT, DEFAULT_MAX_ARENA_SIZE, DEFAULT_MERGE_THRESHOLD};
pub use diagnostics::{ArenaReport, BlockReport, ChainReport};
pub use error::{ArenaError, ArenaResult};
pub use memory::{
    Arena, ArenaChain, BlockHandle, BlockHeader, BlockInfo, ChainStats, HEADER_SIZE,
    MAX_BLOCK_SIZE,
};
