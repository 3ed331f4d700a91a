//! # Memory Management
//!
//! Region allocation over preallocated, owned buffers.
//!
//! ## Design Philosophy
//!
//! Every arena buffer is allocated once and never resized:
//! - Blocks carry an inline 8-byte header, nothing is tracked on the side
//! - Frees are O(1); coalescing is batched every `merge_threshold` frees
//! - A full arena chains a sibling of the same size instead of growing

pub mod arena;
pub mod chain;
pub mod header;

pub use arena::{Arena, BlockInfo, Blocks};
pub use chain::{ArenaChain, BlockHandle, ChainStats};
pub use header::{BlockHeader, HEADER_SIZE, MAX_BLOCK_SIZE};
