//! # Arena Chain
//!
//! The public face of the allocator: an ordered list of equally sized arenas
//! that grows by one arena whenever none of the existing ones can serve a
//! request.
//!
//! ```text
//!   ArenaChain
//!   ┌──────────┐   ┌──────────┐   ┌──────────┐
//!   │ arena #0 │──>│ arena #1 │──>│ arena #2 │   (appended lazily)
//!   └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! Blocks are addressed by [`BlockHandle`]s rather than pointers. A handle
//! names the arena, the data offset inside it, and the reset epoch it was
//! issued in, so handles from before a [`ArenaChain::reset`] are rejected.

use std::io;

use crate::config::ArenaConfig;
use crate::diagnostics::{ArenaReport, ChainReport};
use crate::error::{ArenaError, ArenaResult};
use crate::memory::arena::{Arena, BlockInfo};
use crate::memory::header::{HEADER_SIZE, MAX_BLOCK_SIZE};

/// Handle to a block allocated from an [`ArenaChain`].
///
/// Handles are plain values: copying one does not copy the block. Handles
/// issued before a [`ArenaChain::reset`] are always rejected. A handle kept
/// after [`ArenaChain::free`] is only caught while its block stays free; once
/// a later allocation reuses the same spot, the old handle aliases the new
/// block, just like a dangling pointer would.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    /// Index of the owning arena in the chain.
    arena: usize,
    /// Offset of the block's data in the arena buffer.
    offset: usize,
    /// Reset epoch of the owning arena at allocation time.
    epoch: u32,
}

impl BlockHandle {
    /// Index of the arena holding the block.
    #[inline]
    #[must_use]
    pub const fn arena_index(&self) -> usize {
        self.arena
    }

    /// Offset of the block's data within its arena buffer.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

/// Aggregate figures over every arena of a chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChainStats {
    /// Number of arenas in the chain.
    pub arenas: usize,
    /// Sum of arena sizes.
    pub total_bytes: usize,
    /// Bytes held by used blocks.
    pub used_bytes: usize,
    /// Bytes not held by used blocks.
    pub free_bytes: usize,
    /// Number of allocated blocks.
    pub used_blocks: usize,
    /// Number of free blocks below the bump cursors.
    pub free_blocks: usize,
}

/// A region allocator made of one or more chained arenas.
///
/// # Thread Safety
///
/// NOT thread-safe. Every mutating operation takes `&mut self`; share a chain
/// across threads only behind your own lock.
///
/// # Example
///
/// ```rust
/// use regio_core::ArenaChain;
///
/// let mut chain = ArenaChain::create(64 * 1024)?;
///
/// let handle = chain.allocate(5)?;
/// chain.get_mut(handle)?.copy_from_slice(b"hello");
/// assert_eq!(chain.get(handle)?, b"hello");
///
/// chain.free(handle)?;
/// chain.reset();
/// # Ok::<(), regio_core::ArenaError>(())
/// ```
#[derive(Debug)]
pub struct ArenaChain {
    /// Arena #0 followed by its descendants.
    arenas: Vec<Arena>,
    /// Nominal size shared by every arena.
    size: usize,
    config: ArenaConfig,
}

impl ArenaChain {
    /// Creates a chain holding one empty arena of `size` bytes, with the
    /// default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidArenaSize`] if `size` is zero or above
    /// the maximum arena size.
    pub fn create(size: usize) -> ArenaResult<Self> {
        Self::create_with_config(size, ArenaConfig::default())
    }

    /// Creates a chain holding one empty arena of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidConfig`] if `config` does not validate and
    /// [`ArenaError::InvalidArenaSize`] if `size` is zero or above
    /// `config.max_arena_size`.
    pub fn create_with_config(size: usize, config: ArenaConfig) -> ArenaResult<Self> {
        config.validate()?;
        if size == 0 || size > config.max_arena_size {
            tracing::warn!(size, max = config.max_arena_size, "invalid arena size");
            return Err(ArenaError::InvalidArenaSize {
                size,
                max: config.max_arena_size,
            });
        }

        tracing::debug!(size, alignment = config.alignment, "arena created");
        Ok(Self {
            arenas: vec![Arena::new(size, config)],
            size,
            config,
        })
    }

    /// Returns the nominal size of every arena.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Returns the configuration shared by the chain.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Returns the number of arenas in the chain (always at least one).
    #[inline]
    #[must_use]
    pub fn arena_count(&self) -> usize {
        self.arenas.len()
    }

    /// Returns the arena at `index` in chain order.
    #[inline]
    #[must_use]
    pub fn arena(&self, index: usize) -> Option<&Arena> {
        self.arenas.get(index)
    }

    /// Iterates over the arenas in chain order.
    pub fn arenas(&self) -> impl Iterator<Item = &Arena> {
        self.arenas.iter()
    }

    /// Aligned footprint of a block serving `size` bytes.
    fn footprint(&self, size: usize) -> ArenaResult<usize> {
        let total = size
            .checked_add(HEADER_SIZE)
            .and_then(|n| self.config.align_up(n))
            .unwrap_or(usize::MAX);

        let limit = if total > MAX_BLOCK_SIZE {
            MAX_BLOCK_SIZE
        } else if total > self.size {
            self.size
        } else {
            return Ok(total);
        };
        tracing::warn!(size, total, limit, "arena allocation too large");
        Err(ArenaError::CapacityExceeded {
            requested: total,
            limit,
        })
    }

    /// Allocates a zeroed block able to hold `size` bytes.
    ///
    /// Arenas are tried in chain order: first-fit over freed blocks, then
    /// bump allocation. When none can serve the request a new arena of the
    /// same size is appended and serves it.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::ZeroSize`] for `size == 0` and
    /// [`ArenaError::CapacityExceeded`] when the aligned block cannot fit in
    /// one arena. No state is modified on failure.
    pub fn allocate(&mut self, size: usize) -> ArenaResult<BlockHandle> {
        if size == 0 {
            tracing::warn!("zero-size allocation");
            return Err(ArenaError::ZeroSize);
        }
        let total = self.footprint(size)?;

        for (index, arena) in self.arenas.iter_mut().enumerate() {
            if let Some(offset) = arena.try_allocate(size, total) {
                return Ok(BlockHandle {
                    arena: index,
                    offset,
                    epoch: arena.epoch(),
                });
            }
        }

        let mut arena = Arena::new(self.size, self.config);
        let offset = arena
            .try_allocate(size, total)
            .ok_or(ArenaError::CapacityExceeded {
                requested: total,
                limit: self.size,
            })?;
        let handle = BlockHandle {
            arena: self.arenas.len(),
            offset,
            epoch: arena.epoch(),
        };
        self.arenas.push(arena);
        tracing::debug!(arenas = self.arenas.len(), size = self.size, "chained new arena");
        Ok(handle)
    }

    fn arena_of(&self, handle: BlockHandle) -> ArenaResult<&Arena> {
        self.arenas
            .get(handle.arena)
            .filter(|a| a.epoch() == handle.epoch)
            .ok_or(ArenaError::InvalidHandle)
    }

    fn arena_of_mut(&mut self, handle: BlockHandle) -> ArenaResult<&mut Arena> {
        self.arenas
            .get_mut(handle.arena)
            .filter(|a| a.epoch() == handle.epoch)
            .ok_or(ArenaError::InvalidHandle)
    }

    /// Frees the block behind `handle`.
    ///
    /// O(1): the block is zeroed and marked free. Its arena coalesces free
    /// blocks once every `merge_threshold` frees.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidHandle`] for handles not issued by this
    /// chain since its last reset and [`ArenaError::DoubleFree`] for blocks
    /// already free. Nothing is modified on failure.
    pub fn free(&mut self, handle: BlockHandle) -> ArenaResult<()> {
        let result = self
            .arena_of_mut(handle)
            .and_then(|arena| arena.free(handle.offset));
        if let Err(error) = &result {
            tracing::warn!(?handle, %error, "free rejected");
        }
        result
    }

    /// Runs the coalescing pass on every arena now.
    ///
    /// Returns the total number of blocks absorbed.
    pub fn merge_free_blocks(&mut self) -> usize {
        self.arenas.iter_mut().map(Arena::merge_free_blocks).sum()
    }

    /// Logically clears every arena of the chain.
    ///
    /// Buffers are kept and the chain keeps its length; all handles issued so
    /// far become invalid.
    pub fn reset(&mut self) {
        for arena in &mut self.arenas {
            arena.reset();
        }
        tracing::debug!(arenas = self.arenas.len(), "chain reset");
    }

    /// Releases every arena of the chain.
    ///
    /// Returns the number of arenas released. Dropping the chain is
    /// equivalent.
    pub fn delete(self) -> usize {
        let released = self.arenas.len();
        drop(self);
        tracing::debug!(released, "chain deleted");
        released
    }

    /// Data bytes of the block behind `handle`, as many as were requested.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidHandle`] for foreign or stale handles and
    /// [`ArenaError::UseAfterFree`] if the block has been freed.
    pub fn get(&self, handle: BlockHandle) -> ArenaResult<&[u8]> {
        self.arena_of(handle)?.data(handle.offset)
    }

    /// Mutable data bytes of the block behind `handle`.
    ///
    /// # Errors
    ///
    /// Same as [`ArenaChain::get`].
    pub fn get_mut(&mut self, handle: BlockHandle) -> ArenaResult<&mut [u8]> {
        self.arena_of_mut(handle)?.data_mut(handle.offset)
    }

    /// Header snapshot of the block behind `handle`, free or used.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidHandle`] for foreign or stale handles.
    pub fn block_info(&self, handle: BlockHandle) -> ArenaResult<BlockInfo> {
        self.arena_of(handle)?.lookup(handle.offset)
    }

    /// Usable bytes of the block behind `handle`: `block_size - header`.
    ///
    /// # Errors
    ///
    /// Same as [`ArenaChain::block_info`].
    pub fn capacity(&self, handle: BlockHandle) -> ArenaResult<usize> {
        self.block_info(handle).map(|info| info.capacity())
    }

    /// Aggregate figures over the whole chain.
    #[must_use]
    pub fn stats(&self) -> ChainStats {
        self.arenas.iter().fold(ChainStats::default(), |mut stats, arena| {
            stats.arenas += 1;
            stats.total_bytes += arena.size();
            stats.used_bytes += arena.used();
            stats.free_bytes += arena.space();
            for block in arena.blocks() {
                if block.used {
                    stats.used_blocks += 1;
                } else {
                    stats.free_blocks += 1;
                }
            }
            stats
        })
    }

    /// Snapshot of every arena for display.
    ///
    /// Block entries are always listed; their raw bytes only when
    /// `show_content` is set. Never modifies the chain.
    #[must_use]
    pub fn dump(&self, show_content: bool) -> ChainReport {
        ChainReport {
            arenas: self
                .arenas
                .iter()
                .enumerate()
                .map(|(index, arena)| ArenaReport::capture(index, arena, show_content))
                .collect(),
        }
    }

    /// Writes [`ArenaChain::dump`] to `sink`.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from `sink`.
    pub fn dump_to<W: io::Write>(&self, sink: &mut W, show_content: bool) -> io::Result<()> {
        write!(sink, "{}", self.dump(show_content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_validates_size() {
        assert_eq!(
            ArenaChain::create(0).unwrap_err(),
            ArenaError::InvalidArenaSize { size: 0, max: 1024 * 1024 }
        );
        assert!(ArenaChain::create(1024 * 1024 + 1).is_err());

        let chain = ArenaChain::create(1024 * 1024).unwrap();
        assert_eq!(chain.arena_count(), 1);
        assert_eq!(chain.arena(0).unwrap().space(), 1024 * 1024);
    }

    #[test]
    fn test_create_rejects_invalid_config() {
        let config = ArenaConfig {
            alignment: 12,
            ..ArenaConfig::default()
        };
        assert!(matches!(
            ArenaChain::create_with_config(1024, config),
            Err(ArenaError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_and_oversized_requests() {
        let mut chain = ArenaChain::create(256).unwrap();
        assert_eq!(chain.allocate(0), Err(ArenaError::ZeroSize));
        assert_eq!(
            chain.allocate(256),
            Err(ArenaError::CapacityExceeded { requested: 272, limit: 256 })
        );
        assert!(matches!(
            chain.allocate(usize::MAX),
            Err(ArenaError::CapacityExceeded { limit: MAX_BLOCK_SIZE, .. })
        ));
        assert_eq!(chain.arena(0).unwrap().offset(), 0);
        assert_eq!(chain.arena_count(), 1);
    }

    #[test]
    fn test_overflow_appends_arena() {
        let mut chain = ArenaChain::create(64).unwrap();
        let a = chain.allocate(40).unwrap();
        let b = chain.allocate(40).unwrap();

        assert_eq!(a.arena_index(), 0);
        assert_eq!(b.arena_index(), 1);
        assert_eq!(chain.arena_count(), 2);
    }

    #[test]
    fn test_stale_handle_after_reset() {
        let mut chain = ArenaChain::create(256).unwrap();
        let handle = chain.allocate(16).unwrap();
        chain.reset();

        assert_eq!(chain.free(handle), Err(ArenaError::InvalidHandle));
        assert_eq!(chain.get(handle), Err(ArenaError::InvalidHandle));

        let fresh = chain.allocate(16).unwrap();
        assert_eq!(fresh.offset(), handle.offset());
        assert_ne!(fresh, handle);
        assert!(chain.get(fresh).is_ok());
    }

    #[test]
    fn test_freed_handle_aliases_reused_block() {
        let mut chain = ArenaChain::create(256).unwrap();
        let a = chain.allocate(16).unwrap();
        let _b = chain.allocate(16).unwrap();
        chain.free(a).unwrap();
        assert_eq!(chain.get(a), Err(ArenaError::UseAfterFree));

        let c = chain.allocate(16).unwrap();
        assert_eq!(c, a);
        chain.get_mut(c).unwrap().fill(7);
        assert!(chain.get(a).unwrap().iter().all(|&b| b == 7));

        chain.reset();
        assert_eq!(chain.get(a), Err(ArenaError::InvalidHandle));
        assert_eq!(chain.get(c), Err(ArenaError::InvalidHandle));
    }

    #[test]
    fn test_capacity_and_info() {
        let mut chain = ArenaChain::create(256).unwrap();
        let handle = chain.allocate(20).unwrap();
        assert_eq!(chain.capacity(handle).unwrap(), 24);

        let info = chain.block_info(handle).unwrap();
        assert_eq!(info.data_size, 20);
        assert_eq!(info.block_size, 32);
        assert!(info.used);
        assert_eq!(chain.get(handle).unwrap().len(), 20);
    }

    #[test]
    fn test_delete_reports_released_arenas() {
        let mut chain = ArenaChain::create(64).unwrap();
        for _ in 0..5 {
            chain.allocate(40).unwrap();
        }
        assert_eq!(chain.delete(), 5);
    }
}
