//! API Configuration Module
//!
//! Listener address and per-request limits, loaded from environment variables
//! with defaults suitable for a container deployment.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

/// Port served when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 7070;

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Interface to bind.
    pub bind_host: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Deadline applied to every cart operation.
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CARTKEEP_API_BIND`: Interface to bind (default: 0.0.0.0)
    /// - `PORT`: Listening port (default: 7070)
    /// - `CARTKEEP_REQUEST_TIMEOUT_MS`: Per-request deadline (default: 10000)
    pub fn from_env() -> ApiResult<Self> {
        let defaults = Self::default();

        let bind_host = std::env::var("CARTKEEP_API_BIND")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.bind_host);

        let port = match std::env::var("PORT") {
            Ok(value) if !value.trim().is_empty() => parse_port(&value)?,
            _ => defaults.port,
        };

        let request_timeout = match std::env::var("CARTKEEP_REQUEST_TIMEOUT_MS") {
            Ok(value) if !value.trim().is_empty() => parse_request_timeout(&value)?,
            _ => defaults.request_timeout,
        };

        Ok(Self {
            bind_host,
            port,
            request_timeout,
        })
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
    }
}

fn parse_port(value: &str) -> ApiResult<u16> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", value)))
}

/// Milliseconds, strictly positive.
fn parse_request_timeout(value: &str) -> ApiResult<Duration> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ApiError::invalid_input(format!(
            "Invalid CARTKEEP_REQUEST_TIMEOUT_MS value: {}",
            value
        ))),
    }
}
