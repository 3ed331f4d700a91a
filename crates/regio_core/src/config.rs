//! # Arena Configuration
//!
//! The three host constants of the allocator, with compiled-in defaults and
//! optional loading from a TOML file.
//!
//! ```toml
//! # regio.toml
//! max_arena_size = 1048576
//! alignment = 16
//! merge_threshold = 10
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, ArenaResult};
use crate::memory::header::MAX_BLOCK_SIZE;

/// Default upper bound on the size of a single arena (1 MiB).
pub const DEFAULT_MAX_ARENA_SIZE: usize = 1024 * 1024;

/// Default alignment unit for block footprints.
pub const DEFAULT_ALIGNMENT: usize = 16;

/// Default number of frees between two coalescing passes.
pub const DEFAULT_MERGE_THRESHOLD: u32 = 10;

/// Smallest accepted alignment unit. Must hold a whole block header.
pub const MIN_ALIGNMENT: usize = 8;

/// Largest accepted alignment unit.
pub const MAX_ALIGNMENT: usize = 4096;

/// Allocator configuration.
///
/// Every arena of a chain shares the configuration of the chain it was
/// created in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArenaConfig {
    /// Largest size accepted by arena creation, in bytes.
    pub max_arena_size: usize,
    /// Alignment unit of every block footprint. Power of two.
    pub alignment: usize,
    /// Frees on one arena before its free blocks are coalesced.
    pub merge_threshold: u32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            max_arena_size: DEFAULT_MAX_ARENA_SIZE,
            alignment: DEFAULT_ALIGNMENT,
            merge_threshold: DEFAULT_MERGE_THRESHOLD,
        }
    }
}

impl ArenaConfig {
    /// Checks that the values describe a usable allocator.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> ArenaResult<()> {
        if !self.alignment.is_power_of_two()
            || !(MIN_ALIGNMENT..=MAX_ALIGNMENT).contains(&self.alignment)
        {
            return Err(ArenaError::InvalidConfig(format!(
                "alignment {} must be a power of two in {MIN_ALIGNMENT}..={MAX_ALIGNMENT}",
                self.alignment
            )));
        }
        if self.max_arena_size == 0 || self.max_arena_size > MAX_BLOCK_SIZE {
            return Err(ArenaError::InvalidConfig(format!(
                "max_arena_size {} must be in 1..={MAX_BLOCK_SIZE}",
                self.max_arena_size
            )));
        }
        if self.merge_threshold == 0 {
            return Err(ArenaError::InvalidConfig(
                "merge_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses and validates a configuration from TOML text.
    ///
    /// Keys that are absent keep their default value.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::ConfigParse`] on malformed TOML or unknown keys,
    /// and [`ArenaError::InvalidConfig`] when validation fails.
    pub fn from_toml_str(text: &str) -> ArenaResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ArenaError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::ConfigIo`] when the file cannot be read, plus the
    /// errors of [`ArenaConfig::from_toml_str`].
    pub fn from_toml_path(path: impl AsRef<Path>) -> ArenaResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ArenaError::ConfigIo(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Rounds `value` up to the next multiple of the alignment unit.
    ///
    /// Returns `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn align_up(&self, value: usize) -> Option<usize> {
        let mask = self.alignment - 1;
        match value.checked_add(mask) {
            Some(v) => Some(v & !mask),
            None => None,
        }
    }
}
