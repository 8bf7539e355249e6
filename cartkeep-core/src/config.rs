//! Store configuration.
//!
//! Configuration is loaded from environment variables with defaults suited to
//! a moderately loaded shared deployment. Which backend runs is decided once,
//! here, at startup.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Port assumed for Redis addresses given without one.
pub const DEFAULT_REDIS_PORT: u16 = 6379;

// ============================================================================
// BACKEND SELECTION
// ============================================================================

/// Which cart store backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process map; contents are lost on restart.
    Memory,
    /// Remote key-value service.
    #[default]
    Redis,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "local" => Ok(BackendKind::Memory),
            "redis" => Ok(BackendKind::Redis),
            other => Err(ConfigError::InvalidValue {
                field: "CARTKEEP_STORE".to_string(),
                value: other.to_string(),
                reason: "expected one of: memory, redis".to_string(),
            }),
        }
    }
}

// ============================================================================
// STARTUP RETRY POLICY
// ============================================================================

/// How long `initialize` keeps probing a remote backend before giving up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupPolicy {
    /// Maximum number of liveness probes.
    pub max_attempts: u32,
    /// Wait after the first failed probe.
    pub initial_backoff: Duration,
    /// Upper bound on any single wait.
    pub max_backoff: Duration,
    /// Growth factor between consecutive waits.
    pub multiplier: u32,
}

impl Default for StartupPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

impl StartupPolicy {
    /// Wait before the probe following failed attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self
            .multiplier
            .checked_pow(exponent)
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Sum of every wait taken when all attempts fail.
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.delay_for_attempt(attempt))
            .sum()
    }
}

// ============================================================================
// CONNECTION OPTIONS
// ============================================================================

/// Client-side connection parameters for the remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Maximum pooled connections.
    pub pool_size: usize,
    /// How long a caller waits for a free pooled connection.
    pub pool_timeout: Duration,
    /// Timeout for establishing a new connection.
    pub dial_timeout: Duration,
    /// Timeout for a read command round trip.
    pub read_timeout: Duration,
    /// Timeout for a write command round trip.
    pub write_timeout: Duration,
    /// Pooled connections unused for longer than this are discarded.
    pub idle_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            pool_size: 16,
            pool_timeout: Duration::from_secs(4),
            dial_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(3),
            write_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

impl ConnectionOptions {
    /// Parameters applied to bare `host:port` addresses, tuned to tolerate a
    /// moderately loaded shared backend.
    pub fn for_shared_backend() -> Self {
        Self {
            pool_size: 10,
            pool_timeout: Duration::from_secs(4),
            dial_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(180),
        }
    }
}

/// Append the default Redis port to an address that has none.
///
/// URLs are returned unchanged.
pub fn normalize_redis_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.contains("://") || addr.contains(':') {
        addr.to_string()
    } else {
        format!("{}:{}", addr, DEFAULT_REDIS_PORT)
    }
}

// ============================================================================
// STORE CONFIGURATION
// ============================================================================

/// Everything needed to construct and start a cart store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Connection string for the Redis backend: a `redis://` URL or a bare
    /// `host[:port]` address.
    pub redis_addr: Option<String>,
    pub startup: StartupPolicy,
    /// Bound on a single liveness probe, independent of the caller's deadline.
    pub ping_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            redis_addr: None,
            startup: StartupPolicy::default(),
            ping_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    /// In-memory store configuration.
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Default::default()
        }
    }

    /// Redis store configuration for `addr`.
    pub fn redis(addr: impl AsRef<str>) -> Self {
        Self {
            backend: BackendKind::Redis,
            redis_addr: Some(normalize_redis_addr(addr.as_ref())),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CARTKEEP_STORE`: "redis" or "memory" (default: redis)
    /// - `REDIS_ADDR`: connection string, required for the redis backend
    /// - `CARTKEEP_PING_TIMEOUT_MS`: liveness probe timeout (default: 5000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match std::env::var("CARTKEEP_STORE") {
            Ok(value) if !value.trim().is_empty() => value.parse()?,
            _ => BackendKind::default(),
        };

        let redis_addr = std::env::var("REDIS_ADDR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| normalize_redis_addr(&s));

        let ping_timeout = match std::env::var("CARTKEEP_PING_TIMEOUT_MS") {
            Ok(value) => Duration::from_millis(value.trim().parse().map_err(|_| {
                ConfigError::InvalidValue {
                    field: "CARTKEEP_PING_TIMEOUT_MS".to_string(),
                    value: value.clone(),
                    reason: "must be a whole number of milliseconds".to_string(),
                }
            })?),
            Err(_) => Duration::from_secs(5),
        };

        let config = Self {
            backend,
            redis_addr,
            startup: StartupPolicy::default(),
            ping_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == BackendKind::Redis && self.redis_addr.is_none() {
            return Err(ConfigError::MissingRequired {
                field: "REDIS_ADDR".to_string(),
            });
        }
        if self.ping_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "ping_timeout".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.startup.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "startup.max_attempts".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
