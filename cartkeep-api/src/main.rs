//! Cartkeep API Server Entry Point
//!
//! Loads configuration, builds the configured cart store, waits for it to
//! become ready and starts the Axum HTTP server.

use cartkeep_api::{
    create_api_router, init_tracing, ApiConfig, ApiError, ApiResult, AppState, ShutdownSignal,
    TelemetryConfig,
};
use cartkeep_core::{OpContext, StoreConfig};
use cartkeep_storage::open_store;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let store_config = StoreConfig::from_env().map_err(|e| {
        tracing::error!(error = %e, "Invalid store configuration");
        ApiError::internal_error(e.to_string())
    })?;
    let api_config = ApiConfig::from_env()?;

    let store = open_store(&store_config)?;

    // SIGINT or SIGTERM aborts the startup backoff and later drains the server.
    let (shutdown_ctx, cancel) = OpContext::background().with_cancel();
    let signal = ShutdownSignal::install().map_err(|e| {
        ApiError::internal_error(format!("Failed to install signal handlers: {}", e))
    })?;
    tokio::spawn(signal.cancel_on_signal(cancel));

    store.initialize(&shutdown_ctx).await?;
    tracing::info!(backend = store.backend_name(), "Cart store ready");

    let app = create_api_router(AppState::new(store, api_config.request_timeout));

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting cartkeep API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_ctx.cancelled().await;
        })
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}
