//! Range reads over per-key logs.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::{KvStore, KvStoreExt, LogEntry, Offset};

/// Entries returned for one key, as `(offset, value)` pairs in ascending order.
pub type Polled = Vec<(Offset, i64)>;

/// Serves polls from the store holding log bodies.
pub struct PollEngine {
    store: Arc<dyn KvStore>,
    max_entries: Option<usize>,
}

impl PollEngine {
    /// Create a poll engine; `max_entries` caps each key's result.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, max_entries: Option<usize>) -> Self {
        Self { store, max_entries }
    }

    /// Entries at or after each key's start offset.
    ///
    /// Every requested key appears in the result; an unknown key maps to an
    /// empty list. Keys are read concurrently and independently.
    pub async fn poll(
        &self,
        requests: &BTreeMap<String, Offset>,
    ) -> Result<BTreeMap<String, Polled>> {
        let reads = requests.iter().map(|(key, start)| async move {
            let polled = self.poll_key(key, *start).await?;
            Ok::<_, Error>((key.clone(), polled))
        });

        Ok(try_join_all(reads).await?.into_iter().collect())
    }

    /// Entries of a single key at or after `start`.
    pub async fn poll_key(&self, key: &str, start: Offset) -> Result<Polled> {
        let entries: Vec<LogEntry> = self.store.read_as(key).await?.unwrap_or_default();

        let polled: Polled = entries
            .iter()
            .filter(|entry| entry.offset >= start)
            .take(self.max_entries.unwrap_or(usize::MAX))
            .map(LogEntry::pair)
            .collect();

        debug!(
            store = %self.store.name(),
            key,
            start,
            returned = polled.len(),
            "polled"
        );
        Ok(polled)
    }
}
