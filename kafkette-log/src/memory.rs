//! In-memory KvStore implementation for testing.
//!
//! Stores values in a process-local map without persistence or replication.
//! Useful for tests and the single-process `--store memory` mode; it still
//! honors the compare-and-swap contract so append retries are exercised.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::trace;

use crate::error::Result;
use crate::traits::{CasOutcome, KvStore};

/// In-memory implementation of KvStore.
pub struct InMemoryKv {
    /// Store name used in logs.
    name: String,
    /// Stored values, guarded as a whole
    values: RwLock<HashMap<String, Value>>,
}

impl InMemoryKv {
    /// Create a new, empty in-memory store.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: RwLock::new(HashMap::new()),
        }
    }

    /// Get the number of keys in the store.
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

impl Default for InMemoryKv {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Value,
        new: Value,
        create_if_absent: bool,
    ) -> Result<CasOutcome> {
        let mut values = self.values.write().await;
        let outcome = match values.get_mut(key) {
            Some(current) if *current == expected => {
                *current = new;
                CasOutcome::Swapped
            }
            Some(_) => CasOutcome::Conflict,
            None if create_if_absent => {
                values.insert(key.to_string(), new);
                CasOutcome::Swapped
            }
            None => CasOutcome::Conflict,
        };
        trace!(store = %self.name, key, ?outcome, "cas");
        Ok(outcome)
    }
}
