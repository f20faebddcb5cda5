//! The log service: the append, poll and offset engines behind one handle.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::append::AppendEngine;
use crate::config::LogConfig;
use crate::error::Result;
use crate::memory::InMemoryKv;
use crate::offsets::OffsetEngine;
use crate::poll::{PollEngine, Polled};
use crate::traits::{KvStore, Offset};

/// Entry point used by request handlers.
///
/// Holds no log state of its own; every call goes to the stores.
pub struct LogService {
    append: AppendEngine,
    poll: PollEngine,
    offsets: OffsetEngine,
}

impl LogService {
    /// Build the service over a linearizable store for logs and a
    /// sequentially-consistent store for committed offsets.
    #[must_use]
    pub fn new(logs: Arc<dyn KvStore>, offsets: Arc<dyn KvStore>, config: LogConfig) -> Self {
        Self {
            append: AppendEngine::new(Arc::clone(&logs), config.append.clone()),
            poll: PollEngine::new(logs, config.poll.max_entries),
            offsets: OffsetEngine::new(offsets, config.offsets.regression, config.append),
        }
    }

    /// Single-process service backed by two in-memory stores.
    #[must_use]
    pub fn in_memory(config: LogConfig) -> Self {
        Self::new(
            Arc::new(InMemoryKv::new("memory-logs")),
            Arc::new(InMemoryKv::new("memory-offsets")),
            config,
        )
    }

    /// Append `value` to the log of `key`, returning its offset.
    pub async fn send(&self, key: &str, value: i64) -> Result<Offset> {
        self.append.append(key, value).await
    }

    /// Entries at or after each requested start offset.
    pub async fn poll(
        &self,
        offsets: &BTreeMap<String, Offset>,
    ) -> Result<BTreeMap<String, Polled>> {
        self.poll.poll(offsets).await
    }

    /// Record consumer checkpoints.
    pub async fn commit_offsets(&self, offsets: &BTreeMap<String, Offset>) -> Result<()> {
        self.offsets.commit_all(offsets).await
    }

    /// Checkpoints of the requested keys that have one.
    pub async fn list_committed_offsets(
        &self,
        keys: &[String],
    ) -> Result<BTreeMap<String, Offset>> {
        self.offsets.list(keys).await
    }
}
