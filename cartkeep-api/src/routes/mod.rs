//! REST API Routes
//!
//! - `/carts`  - cart operations
//! - `/health` - liveness and readiness

pub mod cart;
pub mod health;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .nest("/carts", cart::create_router())
        .nest("/health", health::create_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
