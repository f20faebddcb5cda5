//! Optimistic appends against a linearizable store.
//!
//! Each attempt reads the whole log for a key, extends it by one entry and
//! swaps it in only if nobody else appended in between. Losers re-read and
//! try again, so every successful append owns a distinct, contiguous offset.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::traits::{CasOutcome, KvStore, LogEntry, Offset};

/// Appends values to per-key logs.
pub struct AppendEngine {
    store: Arc<dyn KvStore>,
    config: RetryConfig,
}

impl AppendEngine {
    /// Create an engine over the store holding log bodies.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, config: RetryConfig) -> Self {
        Self { store, config }
    }

    /// Append `value` to the log at `key` and return its offset.
    ///
    /// Lost compare-and-swaps and transient store failures are retried from
    /// a fresh read, with backoff, up to `max_attempts` times.
    pub async fn append(&self, key: &str, value: i64) -> Result<Offset> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let failure = match self.try_append(key, value).await {
                Ok(Some(offset)) => {
                    debug!(store = %self.store.name(), key, offset, attempt, "appended");
                    return Ok(offset);
                }
                Ok(None) => {
                    debug!(
                        store = %self.store.name(),
                        key,
                        attempt,
                        "append lost compare-and-swap"
                    );
                    None
                }
                Err(e) if e.is_transient() => {
                    debug!(
                        store = %self.store.name(),
                        key,
                        attempt,
                        error = %e,
                        "append hit transient store error"
                    );
                    Some(e)
                }
                Err(e) => return Err(e),
            };

            attempt += 1;
            if attempt >= max_attempts {
                warn!(
                    store = %self.store.name(),
                    key,
                    attempts = attempt,
                    "append retries exhausted"
                );
                return Err(failure.unwrap_or_else(|| Error::AppendConflict {
                    key: key.to_string(),
                    attempts: attempt,
                }));
            }

            tokio::time::sleep(self.config.jittered_delay(attempt - 1)).await;
        }
    }

    /// One read + compare-and-swap round; `None` means another writer won.
    async fn try_append(&self, key: &str, value: i64) -> Result<Option<Offset>> {
        let (expected, mut entries) = self.load(key).await?;

        let offset = entries.len() as Offset;
        entries.push(LogEntry { offset, value });
        let candidate = serde_json::to_value(&entries)?;

        match self
            .store
            .compare_and_swap(key, expected, candidate, true)
            .await?
        {
            CasOutcome::Swapped => Ok(Some(offset)),
            CasOutcome::Conflict => Ok(None),
        }
    }

    /// Read the stored log, keeping the raw value as the swap precondition.
    async fn load(&self, key: &str) -> Result<(Value, Vec<LogEntry>)> {
        let Some(raw) = self.store.read(key).await? else {
            return Ok((Value::Array(Vec::new()), Vec::new()));
        };

        let entries: Vec<LogEntry> = serde_json::from_value(raw.clone())?;
        check_contiguous(key, &entries)?;
        Ok((raw, entries))
    }
}

/// Ensure `entries[i].offset == i` for every entry.
pub(crate) fn check_contiguous(key: &str, entries: &[LogEntry]) -> Result<()> {
    match entries
        .iter()
        .enumerate()
        .find(|(index, entry)| entry.offset != *index as Offset)
    {
        Some((index, entry)) => Err(Error::CorruptLog {
            key: key.to_string(),
            index,
            found: entry.offset,
        }),
        None => Ok(()),
    }
}
