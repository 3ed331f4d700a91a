//! # Block Header
//!
//! The fixed-size descriptor stored immediately before every block's data.
//!
//! ## Layout
//!
//! ```text
//!   header offset                          data offset
//!   │                                      │
//!   ▼                                      ▼
//!   ┌──────────────────┬──────────────────┬───────────────────────────────┐
//!   │ data_size: u32   │ packed: u32      │ data ...                      │
//!   └──────────────────┴──────────────────┴───────────────────────────────┘
//!                       │
//!                       ├── bit 0      : used flag (1 = allocated)
//!                       └── bits 1..=31: block_size (header included)
//! ```
//!
//! Both words are native-endian; the buffer is never persisted.
//!
//! Nothing outside this module knows the bit layout. Arenas read and write
//! headers through [`read`] and [`write`], and the accessor functions below
//! address a block by its **data** offset, never by its header offset.

use bytemuck::{Pod, Zeroable};

/// Size in bytes of a block header.
pub const HEADER_SIZE: usize = std::mem::size_of::<BlockHeader>();

/// Largest footprint a header can encode: 2³¹ − 1.
pub const MAX_BLOCK_SIZE: usize = (1 << 31) - 1;

const USED_BIT: u32 = 1;
const SIZE_SHIFT: u32 = 1;

/// Packed block descriptor.
///
/// Total size: 8 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct BlockHeader {
    /// Exact byte count requested by the caller.
    data_size: u32,
    /// Used flag in bit 0, footprint in bits 1..=31.
    packed: u32,
}

impl BlockHeader {
    /// Creates a header for a block of `block_size` bytes.
    ///
    /// `block_size` is truncated to 31 bits; callers enforce
    /// [`MAX_BLOCK_SIZE`] before building a header.
    #[inline]
    #[must_use]
    pub fn new(block_size: usize, used: bool, data_size: usize) -> Self {
        let mut header = Self::zeroed();
        header.set_block_size(block_size);
        header.set_used(used);
        header.set_data_size(data_size);
        header
    }

    /// Total footprint of the block, header included.
    #[inline]
    #[must_use]
    pub const fn block_size(&self) -> usize {
        (self.packed >> SIZE_SHIFT) as usize
    }

    /// Sets the footprint, preserving the used flag.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn set_block_size(&mut self, block_size: usize) {
        debug_assert!(block_size <= MAX_BLOCK_SIZE, "block size overflows 31 bits");
        let size = (block_size & MAX_BLOCK_SIZE) as u32;
        self.packed = (size << SIZE_SHIFT) | (self.packed & USED_BIT);
    }

    /// Returns true if the block is not allocated.
    #[inline]
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.packed & USED_BIT == 0
    }

    /// Sets the used flag, preserving the footprint.
    #[inline]
    pub fn set_used(&mut self, used: bool) {
        if used {
            self.packed |= USED_BIT;
        } else {
            self.packed &= !USED_BIT;
        }
    }

    /// Byte count the caller asked for.
    #[inline]
    #[must_use]
    pub const fn data_size(&self) -> usize {
        self.data_size as usize
    }

    /// Sets the requested byte count.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn set_data_size(&mut self, data_size: usize) {
        debug_assert!(data_size <= MAX_BLOCK_SIZE, "data size overflows the header");
        self.data_size = data_size as u32;
    }
}

/// Header offset for a data offset, if a header fits before it.
#[inline]
fn header_range(buf_len: usize, data: usize) -> Option<std::ops::Range<usize>> {
    let start = data.checked_sub(HEADER_SIZE)?;
    (data <= buf_len).then_some(start..data)
}

/// Reads the header preceding the data at `data`.
///
/// Returns `None` when `data` cannot be preceded by a header inside `buf`.
#[inline]
#[must_use]
pub fn read(buf: &[u8], data: usize) -> Option<BlockHeader> {
    let range = header_range(buf.len(), data)?;
    Some(bytemuck::pod_read_unaligned(&buf[range]))
}

/// Writes `header` before the data at `data`.
///
/// Returns false, writing nothing, when the header would not fit in `buf`.
#[inline]
pub fn write(buf: &mut [u8], data: usize, header: BlockHeader) -> bool {
    match header_range(buf.len(), data) {
        Some(range) => {
            buf[range].copy_from_slice(bytemuck::bytes_of(&header));
            true
        }
        None => false,
    }
}

/// Reads a header, reporting an unaddressable data offset.
fn read_or_report(buf: &[u8], data: usize, op: &'static str) -> Option<BlockHeader> {
    let header = read(buf, data);
    if header.is_none() {
        tracing::error!(op, data, len = buf.len(), "block header out of range");
    }
    header
}

/// Rewrites a header through `f`, reporting an unaddressable data offset.
fn update(buf: &mut [u8], data: usize, op: &'static str, f: impl FnOnce(&mut BlockHeader)) {
    if let Some(mut header) = read_or_report(buf, data, op) {
        f(&mut header);
        write(buf, data, header);
    }
}

/// Footprint of the block whose data starts at `data`, or 0 if unaddressable.
#[must_use]
pub fn get_block_size(buf: &[u8], data: usize) -> usize {
    read_or_report(buf, data, "get_block_size").map_or(0, |h| h.block_size())
}

/// Sets the footprint of the block whose data starts at `data`.
pub fn set_block_size(buf: &mut [u8], data: usize, block_size: usize) {
    update(buf, data, "set_block_size", |h| h.set_block_size(block_size));
}

/// Whether the block whose data starts at `data` is free; false if unaddressable.
#[must_use]
pub fn is_free(buf: &[u8], data: usize) -> bool {
    read_or_report(buf, data, "is_free").is_some_and(|h| h.is_free())
}

/// Sets the used flag of the block whose data starts at `data`.
pub fn set_used(buf: &mut [u8], data: usize, used: bool) {
    update(buf, data, "set_used", |h| h.set_used(used));
}

/// Requested size of the block whose data starts at `data`, or 0 if unaddressable.
#[must_use]
pub fn get_data_size(buf: &[u8], data: usize) -> usize {
    read_or_report(buf, data, "get_data_size").map_or(0, |h| h.data_size())
}

/// Sets the requested size of the block whose data starts at `data`.
pub fn set_data_size(buf: &mut [u8], data: usize, data_size: usize) {
    update(buf, data, "set_data_size", |h| h.set_data_size(data_size));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_eight_bytes() {
        assert_eq!(HEADER_SIZE, 8);
    }

    #[test]
    fn test_packed_layout() {
        let header = BlockHeader::new(48, true, 30);
        let words: [u32; 2] = bytemuck::cast(header);
        assert_eq!(words[0], 30);
        assert_eq!(words[1], (48 << 1) | 1);
    }

    #[test]
    fn test_size_preserves_flag() {
        let mut header = BlockHeader::new(32, true, 0);
        header.set_block_size(MAX_BLOCK_SIZE);
        assert!(!header.is_free());
        assert_eq!(header.block_size(), MAX_BLOCK_SIZE);

        header.set_used(false);
        assert!(header.is_free());
        assert_eq!(header.block_size(), MAX_BLOCK_SIZE);
    }

    #[test]
    fn test_accessors_by_data_offset() {
        let mut buf = vec![0u8; 64];
        let data = 16 + HEADER_SIZE;

        set_block_size(&mut buf, data, 32);
        set_used(&mut buf, data, true);
        set_data_size(&mut buf, data, 20);

        assert_eq!(get_block_size(&buf, data), 32);
        assert!(!is_free(&buf, data));
        assert_eq!(get_data_size(&buf, data), 20);

        set_used(&mut buf, data, false);
        assert!(is_free(&buf, data));
        assert_eq!(get_block_size(&buf, data), 32);
        // The first 16 bytes are untouched.
        assert!(buf[..16].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_unaddressable_offsets_default() {
        let mut buf = vec![0xFFu8; 32];
        assert_eq!(get_block_size(&buf, 0), 0);
        assert_eq!(get_data_size(&buf, 4), 0);
        assert!(!is_free(&buf, 3));
        assert!(!is_free(&buf, 64));

        set_used(&mut buf, 2, false);
        set_block_size(&mut buf, 100, 16);
        assert!(buf.iter().all(|&b| b == 0xFF));
        assert!(read(&buf, 33).is_none());
        assert!(!write(&mut buf, 1, BlockHeader::default()));
    }
}
