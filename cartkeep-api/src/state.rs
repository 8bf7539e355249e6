//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cartkeep_core::OpContext;
use cartkeep_storage::CartStore;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// The single cart store of this process.
    pub store: Arc<dyn CartStore>,
    /// Deadline given to each cart operation.
    pub request_timeout: Duration,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn CartStore>, request_timeout: Duration) -> Self {
        Self {
            store,
            request_timeout,
            start_time: Instant::now(),
        }
    }

    /// Fresh execution context for one request.
    pub fn request_context(&self) -> OpContext {
        OpContext::background().with_timeout(self.request_timeout)
    }
}
