//! Core types and the storage adapter traits.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Zero-based position of an entry within its key's log.
pub type Offset = u64;

/// A single immutable log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub offset: Offset,
    pub value: i64,
}

impl LogEntry {
    /// The `[offset, value]` pair sent to pollers.
    #[must_use]
    pub fn pair(&self) -> (Offset, i64) {
        (self.offset, self.value)
    }
}

/// Outcome of a compare-and-swap that reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The stored value matched and was replaced.
    Swapped,
    /// The stored value differed (or was absent without create).
    Conflict,
}

/// Raw access to an external key-value store.
///
/// Implementations backing logs must make `compare_and_swap` linearizable;
/// offsets only need sequential consistency.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Read the value at `key`, `None` when absent.
    async fn read(&self, key: &str) -> Result<Option<Value>>;

    /// Unconditionally store `value` at `key`.
    async fn write(&self, key: &str, value: Value) -> Result<()>;

    /// Replace `expected` with `new` at `key`.
    ///
    /// An absent key is created with `new` only when `create_if_absent` is set.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Value,
        new: Value,
        create_if_absent: bool,
    ) -> Result<CasOutcome>;
}

/// Typed helpers layered over any [`KvStore`].
#[async_trait]
pub trait KvStoreExt: KvStore {
    /// Read and decode the value at `key`.
    async fn read_as<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send;

    /// Encode and write `value` at `key`.
    async fn write_as<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync;
}

#[async_trait]
impl<S> KvStoreExt for S
where
    S: KvStore + ?Sized,
{
    async fn read_as<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.read(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn write_as<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value)?;
        self.write(key, value).await
    }
}
