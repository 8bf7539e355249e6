//! In-process [`HashStore`] for tests and local development.
//!
//! Behaves like a single remote server: writes overwrite, reads return a copy
//! of the stored bytes. Knobs let tests inject latency, outages and corrupt
//! records without a real server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{HashStore, KvError};

#[derive(Debug, Default)]
struct Inner {
    hashes: Mutex<HashMap<String, HashMap<String, Vec<u8>>>>,
    unreachable: AtomicBool,
    failing_pings: AtomicU32,
    pings: AtomicU32,
    writes: AtomicU32,
}

/// Shared in-memory hash store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHashStore {
    inner: Arc<Inner>,
    read_latency: Option<Duration>,
    ping_latency: Option<Duration>,
}

impl InMemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every `hget` after it has taken its snapshot of the data.
    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = Some(latency);
        self
    }

    /// Delay every `ping` before it answers.
    pub fn with_ping_latency(mut self, latency: Duration) -> Self {
        self.ping_latency = Some(latency);
        self
    }

    /// Make the first `count` pings fail.
    pub fn with_failing_pings(self, count: u32) -> Self {
        self.inner.failing_pings.store(count, Ordering::SeqCst);
        self
    }

    /// Simulate the server going away (or coming back).
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Store raw bytes, bypassing any encoding.
    pub fn insert_raw(&self, key: &str, field: &str, value: Vec<u8>) {
        if let Ok(mut hashes) = self.inner.hashes.lock() {
            hashes
                .entry(key.to_string())
                .or_default()
                .insert(field.to_string(), value);
        }
    }

    /// Raw bytes currently stored, if any.
    pub fn raw(&self, key: &str, field: &str) -> Option<Vec<u8>> {
        self.inner
            .hashes
            .lock()
            .ok()
            .and_then(|hashes| hashes.get(key).and_then(|h| h.get(field)).cloned())
    }

    /// Number of keys holding at least one field.
    pub fn key_count(&self) -> usize {
        self.inner.hashes.lock().map(|h| h.len()).unwrap_or(0)
    }

    /// Number of pings received, successful or not.
    pub fn ping_count(&self) -> u32 {
        self.inner.pings.load(Ordering::SeqCst)
    }

    /// Number of successful `hset` calls.
    pub fn write_count(&self) -> u32 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn ensure_reachable(&self) -> Result<(), KvError> {
        if self.inner.unreachable.load(Ordering::SeqCst) {
            return Err(KvError::Connection("connection refused".to_string()));
        }
        Ok(())
    }

    fn lock_poisoned(command: &'static str) -> KvError {
        KvError::Command {
            command,
            reason: "in-memory store lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl HashStore for InMemoryHashStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, KvError> {
        self.ensure_reachable()?;
        let value = {
            let hashes = self
                .inner
                .hashes
                .lock()
                .map_err(|_| Self::lock_poisoned("HGET"))?;
            hashes.get(key).and_then(|h| h.get(field)).cloned()
        };
        if let Some(latency) = self.read_latency {
            tokio::time::sleep(latency).await;
        }
        Ok(value)
    }

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<(), KvError> {
        self.ensure_reachable()?;
        let mut hashes = self
            .inner
            .hashes
            .lock()
            .map_err(|_| Self::lock_poisoned("HSET"))?;
        hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_vec());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<(), KvError> {
        self.inner.pings.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.ping_latency {
            tokio::time::sleep(latency).await;
        }
        self.ensure_reachable()?;

        let remaining = self.inner.failing_pings.load(Ordering::SeqCst);
        if remaining > 0 {
            self.inner.failing_pings.store(remaining - 1, Ordering::SeqCst);
            return Err(KvError::Connection("server starting".to_string()));
        }
        Ok(())
    }
}
