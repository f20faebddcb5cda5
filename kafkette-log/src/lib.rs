//! Append-only, per-key commit log over an external key-value store.
//!
//! The log holds no durable state of its own. Log bodies live in a
//! linearizable store and are extended with optimistic compare-and-swap;
//! consumer checkpoints live in a sequentially-consistent store.
//!
//! # Key Types
//!
//! - [`KvStore`] - Storage adapter trait implemented by external stores
//! - [`InMemoryKv`] - Single-process store for tests and local runs
//! - [`AppendEngine`] - Assigns contiguous offsets under concurrent writers
//! - [`PollEngine`] - Reads entries at or after a start offset
//! - [`OffsetEngine`] - Commits and lists consumer checkpoints
//! - [`LogService`] - The three engines behind one handle

pub mod append;
pub mod config;
pub mod error;
pub mod memory;
pub mod offsets;
pub mod poll;
pub mod service;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-exports
pub use append::AppendEngine;
pub use config::{LogConfig, OffsetConfig, PollConfig, RegressionPolicy, RetryConfig};
pub use error::{Error, Result};
pub use memory::InMemoryKv;
pub use offsets::OffsetEngine;
pub use poll::{PollEngine, Polled};
pub use service::LogService;
pub use traits::{CasOutcome, KvStore, KvStoreExt, LogEntry, Offset};
