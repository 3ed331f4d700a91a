//! # Demo Walkthrough
//!
//! Two scripted stages over the public allocator API:
//!
//! 1. **Sixteen integers** - sixteen 8-byte blocks, the last five freed,
//!    dumped before and after.
//! 2. **Spill-over** - 110 blocks of 10018 bytes, enough to overflow a 1 MiB
//!    arena into a chained sibling.

use std::io::{self, Write};

use regio_core::{ArenaChain, ArenaConfig, ArenaError};
use thiserror::Error;

/// Number of integer blocks in the first stage.
const INTEGER_BLOCKS: usize = 16;

/// Blocks freed at the end of the first stage.
const FREED_TAIL: usize = 5;

/// Block count and size of the spill-over stage.
const SPILL_BLOCKS: usize = 110;
const SPILL_BLOCK_SIZE: usize = 10_018;

/// Errors that abort the walkthrough.
#[derive(Error, Debug)]
pub enum DemoError {
    /// The allocator rejected an operation.
    #[error(transparent)]
    Arena(#[from] ArenaError),

    /// The report sink failed.
    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),

    /// A block did not hold the bytes written into it.
    #[error("block {index} corrupted: expected {expected}, found {found}")]
    Corrupted {
        /// Position of the block in the stage.
        index: usize,
        /// Value written.
        expected: u64,
        /// Value read back.
        found: u64,
    },
}

/// Result type for the walkthrough.
pub type DemoResult<T> = Result<T, DemoError>;

/// Walkthrough settings.
#[derive(Clone, Copy, Debug, Default)]
pub struct DemoOptions {
    /// Allocator configuration; arenas are created at `max_arena_size`.
    pub config: ArenaConfig,
    /// Include raw block bytes in the dumps.
    pub show_content: bool,
}

/// What the walkthrough observed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DemoSummary {
    /// Used blocks after freeing the tail of the first stage.
    pub used_blocks: usize,
    /// Free blocks after freeing the tail of the first stage.
    pub free_blocks: usize,
    /// Arenas in the chain at the end of the spill-over stage.
    pub spill_arenas: usize,
    /// Spill-over allocations that did not fit in an arena.
    pub spill_rejected: usize,
}

/// Runs both stages, writing every dump to `out`.
///
/// # Errors
///
/// Returns [`DemoError`] if the allocator rejects a create / allocate / free
/// it should accept, if a block loses its contents, or if `out` fails.
pub fn run<W: Write>(options: &DemoOptions, out: &mut W) -> DemoResult<DemoSummary> {
    let mut summary = DemoSummary::default();
    sixteen_integers(options, out, &mut summary)?;
    spill_over(options, out, &mut summary)?;
    Ok(summary)
}

fn sixteen_integers<W: Write>(
    options: &DemoOptions,
    out: &mut W,
    summary: &mut DemoSummary,
) -> DemoResult<()> {
    let mut chain = ArenaChain::create_with_config(options.config.max_arena_size, options.config)?;

    let mut handles = Vec::with_capacity(INTEGER_BLOCKS);
    for value in 0..INTEGER_BLOCKS as u64 {
        let handle = chain.allocate(std::mem::size_of::<u64>())?;
        chain.get_mut(handle)?.copy_from_slice(&value.to_le_bytes());
        handles.push(handle);
    }

    writeln!(out, "== {INTEGER_BLOCKS} integers allocated")?;
    chain.dump_to(out, options.show_content)?;

    for &handle in &handles[INTEGER_BLOCKS - FREED_TAIL..] {
        chain.free(handle)?;
    }

    writeln!(out, "== last {FREED_TAIL} freed")?;
    chain.dump_to(out, options.show_content)?;

    for (index, &handle) in handles[..INTEGER_BLOCKS - FREED_TAIL].iter().enumerate() {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(chain.get(handle)?);
        let found = u64::from_le_bytes(bytes);
        if found != index as u64 {
            return Err(DemoError::Corrupted {
                index,
                expected: index as u64,
                found,
            });
        }
    }

    let stats = chain.stats();
    summary.used_blocks = stats.used_blocks;
    summary.free_blocks = stats.free_blocks;
    chain.delete();
    Ok(())
}

fn spill_over<W: Write>(
    options: &DemoOptions,
    out: &mut W,
    summary: &mut DemoSummary,
) -> DemoResult<()> {
    let mut chain = ArenaChain::create_with_config(options.config.max_arena_size, options.config)?;

    for _ in 0..SPILL_BLOCKS {
        match chain.allocate(SPILL_BLOCK_SIZE) {
            Ok(handle) => chain.get_mut(handle)?[..5].copy_from_slice(b"allo\n"),
            Err(ArenaError::CapacityExceeded { .. }) => summary.spill_rejected += 1,
            Err(error) => return Err(error.into()),
        }
    }

    writeln!(
        out,
        "== {SPILL_BLOCKS} blocks of {SPILL_BLOCK_SIZE} bytes over {} arena(s)",
        chain.arena_count()
    )?;
    chain.dump_to(out, options.show_content)?;

    summary.spill_arenas = chain.arena_count();
    let released = chain.delete();
    tracing::debug!(released, "demo chain released");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_walkthrough() {
        let mut out = Vec::new();
        let summary = run(&DemoOptions::default(), &mut out).unwrap();

        assert_eq!(summary.used_blocks, 11);
        assert_eq!(summary.free_blocks, 5);
        assert_eq!(summary.spill_arenas, 2);
        assert_eq!(summary.spill_rejected, 0);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("status = free").count(), 5);
        assert!(text.contains("== 110 blocks of 10018 bytes over 2 arena(s)"));
    }

    #[test]
    fn test_small_arenas_reject_spill_blocks() {
        let options = DemoOptions {
            config: ArenaConfig {
                max_arena_size: 4096,
                ..ArenaConfig::default()
            },
            show_content: true,
        };
        let summary = run(&options, &mut io::sink()).unwrap();

        assert_eq!(summary.used_blocks, 11);
        assert_eq!(summary.spill_arenas, 1);
        assert_eq!(summary.spill_rejected, SPILL_BLOCKS);
    }
}
