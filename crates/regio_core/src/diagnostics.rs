//! # Diagnostics
//!
//! Read-only snapshots of a chain's arenas and blocks, rendered in the framed
//! text layout below.
//!
//! ```text
//! |-------------->>>
//! | Arena #0 (1/1)
//! | Size: 1024
//! | Free: 98.4375% Used: 1.5625%
//! | Free: 1008 byte Used: 16 byte
//! | Block at 0x00000000: data_size = 5, size = 16, status = used, content = 68 65 6c 6c 6f 00 00 00
//! |--------------<<<
//! ```

use std::fmt;

use crate::memory::arena::{Arena, BlockInfo};

/// Snapshot of one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockReport {
    /// Header fields of the block.
    pub info: BlockInfo,
    /// `block_size - header` bytes after the header, if content was requested.
    pub content: Option<Vec<u8>>,
}

/// Snapshot of one arena.
#[derive(Clone, Debug, PartialEq)]
pub struct ArenaReport {
    /// Position of the arena in its chain.
    pub index: usize,
    /// Arena size in bytes.
    pub size: usize,
    /// Bump cursor.
    pub offset: usize,
    /// Bytes not held by used blocks.
    pub free_bytes: usize,
    /// Bytes held by used blocks.
    pub used_bytes: usize,
    /// Frees since the last coalescing pass.
    pub free_count: u32,
    /// Every block below the bump cursor, in address order.
    pub blocks: Vec<BlockReport>,
}

impl ArenaReport {
    pub(crate) fn capture(index: usize, arena: &Arena, show_content: bool) -> Self {
        let blocks = arena
            .blocks()
            .map(|info| BlockReport {
                info,
                content: show_content.then(|| {
                    arena.memory()[info.data_offset..info.header_offset() + info.block_size]
                        .to_vec()
                }),
            })
            .collect();

        Self {
            index,
            size: arena.size(),
            offset: arena.offset(),
            free_bytes: arena.space(),
            used_bytes: arena.used(),
            free_count: arena.free_count(),
            blocks,
        }
    }

    /// Share of the arena not held by used blocks, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn free_percent(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        self.free_bytes as f64 * 100.0 / self.size as f64
    }

    /// Share of the arena held by used blocks, in percent.
    #[must_use]
    pub fn used_percent(&self) -> f64 {
        100.0 - self.free_percent()
    }

    /// Number of blocks currently allocated.
    #[must_use]
    pub fn used_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.info.used).count()
    }

    /// Number of free blocks below the bump cursor.
    #[must_use]
    pub fn free_blocks(&self) -> usize {
        self.blocks.len() - self.used_blocks()
    }
}

/// Snapshot of a whole chain, arena #0 first.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainReport {
    /// One report per arena, in chain order.
    pub arenas: Vec<ArenaReport>,
}

impl ChainReport {
    /// Iterates over every block of every arena.
    pub fn blocks(&self) -> impl Iterator<Item = &BlockReport> {
        self.arenas.iter().flat_map(|a| a.blocks.iter())
    }
}

impl fmt::Display for BlockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "| Block at {:#010x}: data_size = {}, size = {}, status = {}",
            self.info.header_offset(),
            self.info.data_size,
            self.info.block_size,
            if self.info.used { "used" } else { "free" },
        )?;
        if let Some(content) = &self.content {
            f.write_str(", content =")?;
            for byte in content {
                write!(f, " {byte:02x}")?;
            }
        }
        Ok(())
    }
}

impl ArenaReport {
    /// Renders the frame; `total` is the chain length when known.
    fn fmt_framed(&self, f: &mut fmt::Formatter<'_>, total: Option<usize>) -> fmt::Result {
        writeln!(f, "|-------------->>>")?;
        match total {
            Some(total) => writeln!(f, "| Arena #{} ({}/{})", self.index, self.index + 1, total)?,
            None => writeln!(f, "| Arena #{}", self.index)?,
        }
        writeln!(f, "| Size: {}", self.size)?;
        writeln!(
            f,
            "| Free: {:.4}% Used: {:.4}%",
            self.free_percent(),
            self.used_percent()
        )?;
        writeln!(
            f,
            "| Free: {} byte Used: {} byte",
            self.free_bytes, self.used_bytes
        )?;
        for block in &self.blocks {
            writeln!(f, "{block}")?;
        }
        writeln!(f, "|--------------<<<")
    }
}

impl fmt::Display for ArenaReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_framed(f, None)
    }
}

impl fmt::Display for ChainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for arena in &self.arenas {
            arena.fmt_framed(f, Some(self.arenas.len()))?;
            writeln!(f)?;
        }
        Ok(())
    }
}
