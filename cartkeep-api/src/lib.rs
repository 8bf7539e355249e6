//! Cartkeep API - HTTP Facade for the Cart Store
//!
//! Exposes the cart store contract over JSON/HTTP together with
//! liveness and readiness endpoints driven by the store's `ping`.

pub mod config;
pub mod error;
pub mod routes;
pub mod shutdown;
pub mod state;
pub mod telemetry;

pub use config::{ApiConfig, DEFAULT_PORT};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use shutdown::ShutdownSignal;
pub use state::AppState;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
