//! Fault-injecting stores for unit tests.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::memory::InMemoryKv;
use crate::traits::{CasOutcome, KvStore, LogEntry};

/// Lets a rival writer append `value` right before each of the first
/// `rounds` compare-and-swaps, so those attempts lose.
pub struct ContendedKv {
    pub inner: InMemoryKv,
    rounds: AtomicU32,
    rival_value: i64,
}

impl ContendedKv {
    pub fn new(rounds: u32, rival_value: i64) -> Self {
        Self {
            inner: InMemoryKv::new("contended"),
            rounds: AtomicU32::new(rounds),
            rival_value,
        }
    }

    async fn rival_append(&self, key: &str) {
        let mut entries: Vec<LogEntry> = match self.inner.read(key).await.unwrap() {
            Some(raw) => serde_json::from_value(raw).unwrap(),
            None => Vec::new(),
        };
        entries.push(LogEntry {
            offset: entries.len() as u64,
            value: self.rival_value,
        });
        self.inner
            .write(key, serde_json::to_value(entries).unwrap())
            .await
            .unwrap();
    }
}

#[async_trait]
impl KvStore for ContendedKv {
    fn name(&self) -> &str {
        "contended"
    }

    async fn read(&self, key: &str) -> Result<Option<Value>> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: Value) -> Result<()> {
        self.inner.write(key, value).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Value,
        new: Value,
        create_if_absent: bool,
    ) -> Result<CasOutcome> {
        let remaining = self.rounds.load(Ordering::SeqCst);
        if remaining > 0 {
            self.rounds.store(remaining - 1, Ordering::SeqCst);
            self.rival_append(key).await;
        }
        self.inner
            .compare_and_swap(key, expected, new, create_if_absent)
            .await
    }
}

/// Fails the first `failures` calls of every kind with a transient error.
pub struct FlakyKv {
    pub inner: InMemoryKv,
    failures: AtomicU32,
    pub writes: AtomicU32,
}

impl FlakyKv {
    pub fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryKv::new("flaky"),
            failures: AtomicU32::new(failures),
            writes: AtomicU32::new(0),
        }
    }

    fn trip(&self) -> Result<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Unavailable("flaky".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FlakyKv {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn read(&self, key: &str) -> Result<Option<Value>> {
        self.trip()?;
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: Value) -> Result<()> {
        self.trip()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(key, value).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Value,
        new: Value,
        create_if_absent: bool,
    ) -> Result<CasOutcome> {
        self.trip()?;
        self.inner
            .compare_and_swap(key, expected, new, create_if_absent)
            .await
    }
}
