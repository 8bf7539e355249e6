//! Hash-field key-value access for the durable cart store.
//!
//! The durable store only needs three remote operations: read one field of a
//! hash, overwrite one field of a hash, and a liveness probe. [`HashStore`]
//! captures exactly that so the cart logic can run against Redis in
//! production and against [`InMemoryHashStore`] in tests.

pub mod memory;
pub mod remote;

pub use self::memory::InMemoryHashStore;
pub use self::remote::{ConnectionTarget, RedisHashStore};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for key-value operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvError {
    /// No connection could be obtained.
    #[error("Connection unavailable: {0}")]
    Connection(String),

    /// The server rejected or failed the command.
    #[error("Command {command} failed: {reason}")]
    Command {
        command: &'static str,
        reason: String,
    },

    /// The command did not complete in time.
    #[error("Command {command} timed out after {after:?}")]
    Timeout {
        command: &'static str,
        after: Duration,
    },
}

/// Minimal hash-field store used by the durable cart store.
///
/// Writes are unconditional overwrites; there is no compare-and-set.
#[async_trait]
pub trait HashStore: Send + Sync {
    /// Read `field` of the hash at `key`. `Ok(None)` when absent.
    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, KvError>;

    /// Overwrite `field` of the hash at `key`.
    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<(), KvError>;

    /// Round-trip a liveness probe.
    async fn ping(&self) -> Result<(), KvError>;
}
