//! Health reporting types
//!
//! The store's `ping` is the only input to these; the facade turns them into
//! liveness/readiness responses.

use serde::{Deserialize, Serialize};

/// Serving status of the cart service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServingStatus {
    /// Backend answered its liveness probe
    Serving,
    /// Backend failed or timed out on its liveness probe
    NotServing,
    /// Not yet checked
    Unknown,
}

impl ServingStatus {
    pub fn from_ping(alive: bool) -> Self {
        if alive {
            ServingStatus::Serving
        } else {
            ServingStatus::NotServing
        }
    }

    pub fn is_serving(&self) -> bool {
        matches!(self, ServingStatus::Serving)
    }
}

/// Health check result for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: ServingStatus,
    /// Component name
    pub component: String,
    /// Probe round trip in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

impl HealthCheck {
    pub fn new(component: impl Into<String>, status: ServingStatus) -> Self {
        Self {
            status,
            component: component.into(),
            response_time_ms: None,
        }
    }

    /// Set the response time.
    pub fn with_response_time(mut self, ms: u64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }
}
