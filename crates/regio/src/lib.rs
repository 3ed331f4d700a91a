//! # REGIO
//!
//! Region-based arena allocator. This crate re-exports the engine from
//! `regio_core` and hosts the demonstration walkthrough used by the
//! `regio_demo` binary.
//!
//! ## Modules
//!
//! - `demo`: scripted walkthrough of create / allocate / free / dump / delete

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod demo;

// Re-export the engine
pub use regio_core as core;

// Re-export commonly used types
pub use regio_core::{
    ArenaChain, ArenaConfig, ArenaError, ArenaResult, BlockHandle, ChainReport, ChainStats,
};
pub use demo::{DemoError, DemoOptions, DemoSummary};
