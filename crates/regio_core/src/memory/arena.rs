//! # Arena
//!
//! One owned buffer of the chain: first-fit search, in-place splitting,
//! bump-pointer growth, O(1) frees and the deferred coalescing pass.
//!
//! ```text
//!   0                                        offset                   size
//!   ┌──────┬──────────────┬──────┬───────────┬───────────────────────────┐
//!   │ used │     free     │ used │   free    │     never claimed         │
//!   └──────┴──────────────┴──────┴───────────┴───────────────────────────┘
//!   ◄──────────── scanned by first-fit ─────►◄──── bump allocation ─────►
//! ```

use crate::config::ArenaConfig;
use crate::error::{ArenaError, ArenaResult};
use crate::memory::header::{self, BlockHeader, HEADER_SIZE, MAX_BLOCK_SIZE};

/// Snapshot of one block, as seen by diagnostics and handle lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset of the block's data within its arena buffer.
    pub data_offset: usize,
    /// Byte count the caller asked for (0 for free blocks).
    pub data_size: usize,
    /// Total footprint, header included.
    pub block_size: usize,
    /// Whether the block is allocated.
    pub used: bool,
}

impl BlockInfo {
    /// Offset of the block's header within its arena buffer.
    #[inline]
    #[must_use]
    pub const fn header_offset(&self) -> usize {
        self.data_offset - HEADER_SIZE
    }

    /// Usable bytes after the header.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.block_size - HEADER_SIZE
    }

    fn at(header_offset: usize, header: BlockHeader) -> Self {
        Self {
            data_offset: header_offset + HEADER_SIZE,
            data_size: header.data_size(),
            block_size: header.block_size(),
            used: !header.is_free(),
        }
    }
}

/// A single fixed-size region with inline block headers.
///
/// Arenas are created and mutated through [`crate::ArenaChain`]; this type
/// only exposes read-only views to callers.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. Use one chain per thread.
#[derive(Debug)]
pub struct Arena {
    /// The backing storage.
    memory: Box<[u8]>,
    /// First byte never claimed by a block since the last reset.
    offset: usize,
    /// `size - Σ block_size` of used blocks.
    space: usize,
    /// Frees since the last coalescing pass.
    free_count: u32,
    /// Bumped on reset; handles carry the epoch they were issued in.
    epoch: u32,
    config: ArenaConfig,
}

impl Arena {
    /// Creates an empty arena of `size` bytes.
    ///
    /// Size limits are enforced by the chain.
    pub(crate) fn new(size: usize, config: ArenaConfig) -> Self {
        let memory = vec![0u8; size].into_boxed_slice();
        Self {
            memory,
            offset: 0,
            space: size,
            free_count: 0,
            epoch: 0,
            config,
        }
    }

    /// Returns the total size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.memory.len()
    }

    /// Returns the bump cursor.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the bytes not held by used blocks.
    #[inline]
    #[must_use]
    pub const fn space(&self) -> usize {
        self.space
    }

    /// Returns the bytes held by used blocks, headers and padding included.
    #[inline]
    #[must_use]
    pub fn used(&self) -> usize {
        self.size() - self.space
    }

    /// Returns the number of frees since the last coalescing pass.
    #[inline]
    #[must_use]
    pub const fn free_count(&self) -> u32 {
        self.free_count
    }

    #[inline]
    pub(crate) const fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Raw view of the whole buffer, stale bytes past `offset` included.
    #[inline]
    #[must_use]
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Iterates over every block in `[0, offset)`.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks { arena: self, pos: 0 }
    }

    fn header_at(&self, pos: usize) -> Option<BlockHeader> {
        header::read(&self.memory, pos + HEADER_SIZE)
    }

    fn write_header(&mut self, pos: usize, header: BlockHeader) {
        let written = header::write(&mut self.memory, pos + HEADER_SIZE, header);
        debug_assert!(written, "header at {pos} outside the arena");
    }

    /// Smallest block worth carving out of a split remainder.
    fn min_block(&self) -> usize {
        let unit = HEADER_SIZE + self.config.alignment;
        unit.next_multiple_of(self.config.alignment)
    }

    /// First-fit scan for a free block of at least `total` bytes.
    ///
    /// Returns the header offset of the candidate.
    pub(crate) fn find_free_block(&self, total: usize) -> Option<usize> {
        self.blocks()
            .find(|b| !b.used && b.block_size >= total)
            .map(|b| b.header_offset())
    }

    /// Serves `size` bytes with a block of footprint `total` from this arena.
    ///
    /// Reuses the first fitting free block, splitting it when the remainder
    /// can hold a minimal block, and falls back to bump allocation. Returns the
    /// data offset, or `None` when this arena cannot serve the request.
    pub(crate) fn try_allocate(&mut self, size: usize, total: usize) -> Option<usize> {
        debug_assert!(total <= MAX_BLOCK_SIZE && size + HEADER_SIZE <= total);

        if let Some(pos) = self.find_free_block(total) {
            let available = self.header_at(pos)?.block_size();
            let footprint = if available >= total + self.min_block() {
                self.write_header(pos + total, BlockHeader::new(available - total, false, 0));
                tracing::trace!(pos, total, remainder = available - total, "split free block");
                total
            } else {
                tracing::trace!(pos, total, available, "reuse free block");
                available
            };
            self.write_header(pos, BlockHeader::new(footprint, true, size));
            self.memory[pos + HEADER_SIZE..pos + footprint].fill(0);
            self.space -= footprint;
            return Some(pos + HEADER_SIZE);
        }

        if self.offset + total > self.size() {
            return None;
        }

        let pos = self.offset;
        self.memory[pos..pos + total].fill(0);
        self.write_header(pos, BlockHeader::new(total, true, size));
        self.offset += total;
        self.space -= total;
        tracing::trace!(pos, total, offset = self.offset, "bump allocation");
        Some(pos + HEADER_SIZE)
    }

    /// Resolves a data offset to the header of a block of this arena.
    ///
    /// Rejects offsets that are not on a block boundary inside `[0, offset)`
    /// and headers whose footprint is not a whole number of alignment units.
    pub(crate) fn lookup(&self, data: usize) -> ArenaResult<BlockInfo> {
        let pos = data
            .checked_sub(HEADER_SIZE)
            .filter(|pos| pos % self.config.alignment == 0 && *pos < self.offset)
            .ok_or(ArenaError::InvalidHandle)?;
        let header = self.header_at(pos).ok_or(ArenaError::InvalidHandle)?;
        let block_size = header.block_size();
        if block_size <= HEADER_SIZE
            || block_size % self.config.alignment != 0
            || pos + block_size > self.offset
        {
            return Err(ArenaError::InvalidHandle);
        }
        Ok(BlockInfo::at(pos, header))
    }

    /// Data bytes of the used block at `data`, `data_size` long.
    pub(crate) fn data(&self, data: usize) -> ArenaResult<&[u8]> {
        let info = self.used_block(data)?;
        Ok(&self.memory[data..data + info.data_size])
    }

    /// Mutable data bytes of the used block at `data`, `data_size` long.
    pub(crate) fn data_mut(&mut self, data: usize) -> ArenaResult<&mut [u8]> {
        let info = self.used_block(data)?;
        Ok(&mut self.memory[data..data + info.data_size])
    }

    fn used_block(&self, data: usize) -> ArenaResult<BlockInfo> {
        let info = self.lookup(data)?;
        if info.used {
            Ok(info)
        } else {
            Err(ArenaError::UseAfterFree)
        }
    }

    /// Releases the block at `data`.
    ///
    /// Zeroes its data, marks it free and returns its footprint to `space`.
    /// Every `merge_threshold` frees the coalescing pass runs.
    pub(crate) fn free(&mut self, data: usize) -> ArenaResult<()> {
        let info = self.lookup(data)?;
        if !info.used {
            return Err(ArenaError::DoubleFree);
        }

        let pos = info.header_offset();
        self.memory[data..pos + info.block_size].fill(0);
        header::set_used(&mut self.memory, data, false);
        header::set_data_size(&mut self.memory, data, 0);
        self.space += info.block_size;
        self.free_count += 1;

        if self.free_count >= self.config.merge_threshold {
            self.merge_free_blocks();
        }
        Ok(())
    }

    /// Merges every run of adjacent free blocks into one block.
    ///
    /// Single forward pass over `[0, offset)`: a free block absorbs its free
    /// successor and is re-examined in place. Resets `free_count` and returns
    /// the number of headers absorbed.
    pub(crate) fn merge_free_blocks(&mut self) -> usize {
        let mut pos = 0;
        let mut absorbed = 0;

        while pos < self.offset {
            let Some(current) = self.header_at(pos) else { break };
            let size = current.block_size();
            if size == 0 {
                break;
            }
            let next = pos + size;
            if next >= self.offset {
                break;
            }
            let Some(successor) = self.header_at(next) else { break };

            let merged = size + successor.block_size();
            if current.is_free() && successor.is_free() && merged <= MAX_BLOCK_SIZE {
                self.memory[next..next + HEADER_SIZE].fill(0);
                header::set_block_size(&mut self.memory, pos + HEADER_SIZE, merged);
                absorbed += 1;
            } else {
                pos = next;
            }
        }

        self.free_count = 0;
        if absorbed > 0 {
            tracing::debug!(absorbed, offset = self.offset, "coalesced free blocks");
        }
        absorbed
    }

    /// Logically clears the arena. Buffer bytes are left as they are.
    pub(crate) fn reset(&mut self) {
        self.offset = 0;
        self.space = self.size();
        self.free_count = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Iterator over the blocks of an [`Arena`], in address order.
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    arena: &'a Arena,
    pos: usize,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.arena.offset {
            return None;
        }
        let header = self.arena.header_at(self.pos)?;
        let size = header.block_size();
        if size == 0 {
            // Corrupt header: stop rather than spin.
            self.pos = self.arena.offset;
            return None;
        }
        let info = BlockInfo::at(self.pos, header);
        self.pos += size;
        Some(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(size: usize) -> Arena {
        Arena::new(size, ArenaConfig::default())
    }

    fn footprint(size: usize) -> usize {
        ArenaConfig::default().align_up(size + HEADER_SIZE).unwrap()
    }

    #[test]
    fn test_bump_allocation() {
        let mut arena = arena(1024);
        let a = arena.try_allocate(16, footprint(16)).unwrap();
        let b = arena.try_allocate(100, footprint(100)).unwrap();

        assert_eq!(a, HEADER_SIZE);
        assert_eq!(b, 32 + HEADER_SIZE);
        assert_eq!(arena.offset(), 32 + 112);
        assert_eq!(arena.space(), 1024 - 144);
        assert_eq!(arena.used(), 144);

        let info = arena.lookup(b).unwrap();
        assert_eq!(info.data_size, 100);
        assert_eq!(info.block_size, 112);
        assert!(info.used);
    }

    #[test]
    fn test_bump_exhaustion() {
        let mut arena = arena(64);
        assert!(arena.try_allocate(40, footprint(40)).is_some());
        assert!(arena.try_allocate(8, footprint(8)).is_some());
        assert!(arena.try_allocate(1, footprint(1)).is_none());
        assert_eq!(arena.offset(), 64);
        assert_eq!(arena.space(), 0);
    }

    #[test]
    fn test_reuse_splits_large_free_block() {
        let mut arena = arena(1024);
        let big = arena.try_allocate(200, footprint(200)).unwrap();
        let _tail = arena.try_allocate(8, footprint(8)).unwrap();
        arena.free(big).unwrap();
        let offset = arena.offset();

        let small = arena.try_allocate(20, footprint(20)).unwrap();
        assert_eq!(small, big);
        assert_eq!(arena.offset(), offset);

        let blocks: Vec<_> = arena.blocks().collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].block_size, 32);
        assert!(blocks[0].used);
        assert_eq!(blocks[1].block_size, footprint(200) - 32);
        assert!(!blocks[1].used);
        assert_eq!(blocks[1].data_size, 0);
    }

    #[test]
    fn test_reuse_without_split_keeps_whole_block() {
        let mut arena = arena(1024);
        let a = arena.try_allocate(40, footprint(40)).unwrap();
        let _b = arena.try_allocate(8, footprint(8)).unwrap();
        arena.free(a).unwrap();

        // 48-byte block, 32-byte request: remainder of 16 is below a minimal block.
        let c = arena.try_allocate(20, footprint(20)).unwrap();
        assert_eq!(c, a);
        let info = arena.lookup(c).unwrap();
        assert_eq!(info.block_size, 48);
        assert_eq!(info.data_size, 20);
        assert_eq!(arena.space(), 1024 - 48 - 16);
    }

    #[test]
    fn test_reuse_splits_at_exact_minimum_remainder() {
        let mut arena = arena(1024);
        let a = arena.try_allocate(56, footprint(56)).unwrap();
        let _tail = arena.try_allocate(8, footprint(8)).unwrap();
        arena.free(a).unwrap();

        // 64-byte block, 32-byte request: the 32-byte remainder is exactly one minimal block.
        let c = arena.try_allocate(20, footprint(20)).unwrap();
        assert_eq!(c, a);

        let blocks: Vec<_> = arena.blocks().collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].block_size, 32);
        assert!(blocks[0].used);
        assert_eq!(blocks[1].block_size, 32);
        assert!(!blocks[1].used);
        assert_eq!(arena.space(), 1024 - 32 - 16);

        // A 48-byte footprint leaves 16 bytes, too small to carve.
        arena.free(c).unwrap();
        arena.merge_free_blocks();
        let d = arena.try_allocate(40, footprint(40)).unwrap();
        assert_eq!(d, a);
        assert_eq!(arena.lookup(d).unwrap().block_size, 64);
        assert_eq!(arena.blocks().count(), 2);
    }

    #[test]
    fn test_free_zeroes_and_restores_space() {
        let mut arena = arena(256);
        let a = arena.try_allocate(10, footprint(10)).unwrap();
        arena.memory[a..a + 10].copy_from_slice(b"0123456789");
        arena.free(a).unwrap();

        assert_eq!(arena.space(), 256);
        assert_eq!(arena.free_count(), 1);
        assert!(arena.memory[a..a + 24].iter().all(|&b| b == 0));
        assert_eq!(arena.lookup(a).unwrap().data_size, 0);
        assert_eq!(arena.free(a), Err(ArenaError::DoubleFree));
        assert_eq!(arena.data(a), Err(ArenaError::UseAfterFree));
    }

    #[test]
    fn test_lookup_rejects_foreign_offsets() {
        let mut arena = arena(256);
        let a = arena.try_allocate(40, footprint(40)).unwrap();

        assert_eq!(arena.lookup(0), Err(ArenaError::InvalidHandle));
        assert_eq!(arena.lookup(a + 1), Err(ArenaError::InvalidHandle));
        assert_eq!(arena.lookup(a + 16), Err(ArenaError::InvalidHandle));
        assert_eq!(arena.lookup(200), Err(ArenaError::InvalidHandle));
    }

    #[test]
    fn test_merge_coalesces_runs() {
        let mut arena = arena(1024);
        let handles: Vec<_> = (0..6)
            .map(|_| arena.try_allocate(8, footprint(8)).unwrap())
            .collect();
        for &h in &handles[1..4] {
            arena.free(h).unwrap();
        }
        arena.free(handles[5]).unwrap();

        let absorbed = arena.merge_free_blocks();
        assert_eq!(absorbed, 2);
        assert_eq!(arena.free_count(), 0);

        let blocks: Vec<_> = arena.blocks().collect();
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[1].block_size, 48);
        assert!(!blocks[1].used);
        assert!(blocks[2].used);
        assert!(!blocks[3].used);
        // Absorbed headers are wiped.
        assert!(arena.lookup(handles[2]).is_err());
    }

    #[test]
    fn test_threshold_triggers_merge() {
        let config = ArenaConfig {
            merge_threshold: 3,
            ..ArenaConfig::default()
        };
        let mut arena = Arena::new(1024, config);
        let handles: Vec<_> = (0..4)
            .map(|_| arena.try_allocate(8, footprint(8)).unwrap())
            .collect();

        arena.free(handles[0]).unwrap();
        arena.free(handles[1]).unwrap();
        assert_eq!(arena.blocks().count(), 4);
        arena.free(handles[2]).unwrap();

        assert_eq!(arena.free_count(), 0);
        let blocks: Vec<_> = arena.blocks().collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].block_size, 48);
    }

    #[test]
    fn test_reset_rewinds() {
        let mut arena = arena(256);
        let _ = arena.try_allocate(100, footprint(100)).unwrap();
        arena.reset();

        assert_eq!(arena.offset(), 0);
        assert_eq!(arena.space(), 256);
        assert_eq!(arena.epoch(), 1);
        assert_eq!(arena.blocks().count(), 0);
        assert_eq!(arena.try_allocate(8, footprint(8)), Some(HEADER_SIZE));
    }
}
