//! Redis-backed [`HashStore`].
//!
//! Uses a `deadpool-redis` connection pool. The pool is created lazily, so
//! constructing a store never touches the network; the first command (usually
//! the startup probe) opens the first connection.
//!
//! # Connection strings
//!
//! Two forms are accepted:
//! - a URL (`redis://[user:pass@]host[:port][/db]`, `rediss://...`), which
//!   keeps the URL's own settings and the standard pool defaults;
//! - a bare `host[:port]` address, which gets
//!   [`ConnectionOptions::for_shared_backend`] applied. IPv6 hosts must be
//!   bracketed (`[::1]:6379`).
//!
//! Anything that is neither fails with `StorageError::InvalidConnectionString`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use cartkeep_core::{normalize_redis_addr, ConnectionOptions, StorageError, DEFAULT_REDIS_PORT};
use deadpool_redis::redis::{self, FromRedisValue, IntoConnectionInfo};
use deadpool_redis::{Config, Pool, PoolConfig, Runtime, Timeouts};

use super::{HashStore, KvError};

// ============================================================================
// CONNECTION TARGET
// ============================================================================

/// A parsed connection string.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// A full Redis URL.
    Url(String),
    /// A plain `host:port` address.
    Address { host: String, port: u16 },
}

impl ConnectionTarget {
    /// Parse a connection string, falling back to a plain address when it is
    /// not a Redis URL.
    pub fn parse(conn_str: &str) -> Result<Self, StorageError> {
        let trimmed = conn_str.trim();
        let invalid = |reason: &str| StorageError::InvalidConnectionString {
            value: redact(trimmed),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("empty connection string"));
        }
        if trimmed.into_connection_info().is_ok() {
            return Ok(ConnectionTarget::Url(trimmed.to_string()));
        }

        let normalized = if is_bracketed(trimmed) {
            format!("{}:{}", trimmed, DEFAULT_REDIS_PORT)
        } else {
            normalize_redis_addr(trimmed)
        };
        let (host, port) = normalized
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;
        if host.is_empty() || host.contains('/') || host.contains(char::is_whitespace) {
            return Err(invalid("not a redis URL and not a valid host:port address"));
        }
        if host.contains(':') && !is_bracketed(host) {
            return Err(invalid("IPv6 hosts must be bracketed, as in [::1]:6379"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| invalid("port must be a number between 0 and 65535"))?;

        Ok(ConnectionTarget::Address {
            host: host.to_string(),
            port,
        })
    }

    /// URL handed to the client library.
    pub fn url(&self) -> String {
        match self {
            ConnectionTarget::Url(url) => url.clone(),
            ConnectionTarget::Address { host, port } => format!("redis://{}:{}/", host, port),
        }
    }

    /// Connection parameters used when the caller does not supply any.
    pub fn default_options(&self) -> ConnectionOptions {
        match self {
            ConnectionTarget::Url(_) => ConnectionOptions::default(),
            ConnectionTarget::Address { .. } => ConnectionOptions::for_shared_backend(),
        }
    }
}

/// Display never shows credentials.
impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionTarget::Url(url) => write!(f, "{}", redact(url)),
            ConnectionTarget::Address { host, port } => write!(f, "{}:{}", host, port),
        }
    }
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionTarget({})", self)
    }
}

fn is_bracketed(host: &str) -> bool {
    host.len() > 2 && host.starts_with('[') && host.ends_with(']')
}

/// Hide the userinfo part of a URL.
fn redact(conn_str: &str) -> String {
    match (conn_str.find("://"), conn_str.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &conn_str[..scheme_end], &conn_str[at + 1..])
        }
        _ => conn_str.to_string(),
    }
}

// ============================================================================
// REDIS HASH STORE
// ============================================================================

/// Pooled Redis client speaking `HGET`, `HSET` and `PING`.
pub struct RedisHashStore {
    pool: Pool,
    target: ConnectionTarget,
    options: ConnectionOptions,
}

impl RedisHashStore {
    /// Create a store for `conn_str` with the defaults for its form.
    pub fn connect(conn_str: &str) -> Result<Self, StorageError> {
        let target = ConnectionTarget::parse(conn_str)?;
        let options = target.default_options();
        Self::with_options(target, options)
    }

    /// Create a store with explicit connection parameters.
    pub fn with_options(
        target: ConnectionTarget,
        options: ConnectionOptions,
    ) -> Result<Self, StorageError> {
        let mut timeouts = Timeouts::default();
        timeouts.wait = Some(options.pool_timeout);
        timeouts.create = Some(options.dial_timeout);
        timeouts.recycle = Some(options.read_timeout);

        let mut pool_config = PoolConfig::new(options.pool_size);
        pool_config.timeouts = timeouts;

        let mut cfg = Config::from_url(target.url());
        cfg.pool = Some(pool_config);

        let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            StorageError::InvalidConnectionString {
                value: target.to_string(),
                reason: format!("Failed to create pool: {}", e),
            }
        })?;

        tracing::info!(redis = %target, pool_size = options.pool_size, "Redis pool configured");

        Ok(Self {
            pool,
            target,
            options,
        })
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Connections currently held by the pool.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, KvError> {
        let idle_timeout = self.options.idle_timeout;
        let _ = self
            .pool
            .retain(|_, metrics| metrics.last_used() < idle_timeout);
        self.pool
            .get()
            .await
            .map_err(|e| KvError::Connection(e.to_string()))
    }

    async fn execute<T: FromRedisValue>(
        &self,
        command: &'static str,
        cmd: &redis::Cmd,
        timeout: Duration,
    ) -> Result<T, KvError> {
        let mut conn = self.connection().await?;
        match tokio::time::timeout(timeout, cmd.query_async(&mut conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(KvError::Command {
                command,
                reason: e.to_string(),
            }),
            Err(_) => Err(KvError::Timeout {
                command,
                after: timeout,
            }),
        }
    }
}

#[async_trait]
impl HashStore for RedisHashStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, KvError> {
        let mut cmd = redis::cmd("HGET");
        cmd.arg(key).arg(field);
        self.execute("HGET", &cmd, self.options.read_timeout).await
    }

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<(), KvError> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key).arg(field).arg(value);
        self.execute("HSET", &cmd, self.options.write_timeout).await
    }

    async fn ping(&self) -> Result<(), KvError> {
        let cmd = redis::cmd("PING");
        let _pong: String = self.execute("PING", &cmd, self.options.read_timeout).await?;
        Ok(())
    }
}
