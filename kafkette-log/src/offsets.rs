//! Consumer checkpoint commits and reads.
//!
//! Checkpoints live in a sequentially-consistent store and are advisory.
//! Commits never move a checkpoint backwards: the current value is read
//! first and only a greater offset is written. The read-then-write pair is
//! not atomic, which is acceptable for advisory data.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::config::{RegressionPolicy, RetryConfig};
use crate::error::{Error, Result};
use crate::traits::{KvStore, KvStoreExt, Offset};

/// Commits and lists consumer offsets.
pub struct OffsetEngine {
    store: Arc<dyn KvStore>,
    policy: RegressionPolicy,
    retry: RetryConfig,
}

impl OffsetEngine {
    /// Create an engine over the store holding committed offsets.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, policy: RegressionPolicy, retry: RetryConfig) -> Self {
        Self {
            store,
            policy,
            retry,
        }
    }

    /// Commit `offset` for `key` unless a greater or equal value is stored.
    ///
    /// Transient failures restart from the read, never from the write.
    pub async fn commit(&self, key: &str, offset: Offset) -> Result<()> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.try_commit(key, offset).await {
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        warn!(
                            store = %self.store.name(),
                            key,
                            offset,
                            attempts = attempt,
                            error = %e,
                            "commit retries exhausted"
                        );
                        return Err(e);
                    }
                    debug!(
                        store = %self.store.name(),
                        key,
                        offset,
                        attempt,
                        error = %e,
                        "commit hit transient store error"
                    );
                    tokio::time::sleep(self.retry.jittered_delay(attempt - 1)).await;
                }
                result => return result,
            }
        }
    }

    /// Commit every `(key, offset)` pair, concurrently across keys.
    pub async fn commit_all(&self, offsets: &BTreeMap<String, Offset>) -> Result<()> {
        try_join_all(offsets.iter().map(|(key, offset)| self.commit(key, *offset))).await?;
        Ok(())
    }

    async fn try_commit(&self, key: &str, offset: Offset) -> Result<()> {
        let current: Option<Offset> = self.store.read_as(key).await?;

        match current {
            Some(committed) if offset < committed => match self.policy {
                RegressionPolicy::Clamp => {
                    debug!(key, committed, requested = offset, "kept higher committed offset");
                    Ok(())
                }
                RegressionPolicy::Reject => Err(Error::OffsetRegression {
                    key: key.to_string(),
                    committed,
                    requested: offset,
                }),
            },
            Some(committed) if offset == committed => Ok(()),
            _ => {
                self.store.write_as(key, &offset).await?;
                debug!(store = %self.store.name(), key, offset, "committed offset");
                Ok(())
            }
        }
    }

    /// Committed offsets of the given keys; keys never committed are omitted.
    pub async fn list(&self, keys: &[String]) -> Result<BTreeMap<String, Offset>> {
        let reads = keys.iter().map(|key| async move {
            let committed: Option<Offset> = self.store.read_as(key).await?;
            Ok::<_, Error>(committed.map(|offset| (key.clone(), offset)))
        });

        Ok(try_join_all(reads).await?.into_iter().flatten().collect())
    }
}
