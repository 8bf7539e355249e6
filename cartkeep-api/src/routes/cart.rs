//! Cart REST API Routes
//!
//! - POST   /carts/:user_id/items  merge one line item
//! - GET    /carts/:user_id        current cart (empty if never written)
//! - DELETE /carts/:user_id        empty the cart

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use cartkeep_core::Cart;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Body of `POST /carts/:user_id/items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

impl AddItemRequest {
    fn validate(&self) -> ApiResult<()> {
        if self.product_id.trim().is_empty() {
            return Err(ApiError::missing_field("product_id"));
        }
        Ok(())
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /carts/:user_id/items
pub async fn add_item(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<AddItemRequest>,
) -> ApiResult<StatusCode> {
    req.validate()?;
    let ctx = state.request_context();
    state
        .store
        .add_item(&ctx, &user_id, &req.product_id, req.quantity)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /carts/:user_id
pub async fn get_cart(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Cart>> {
    let ctx = state.request_context();
    let cart = state.store.get_cart(&ctx, &user_id).await?;
    Ok(Json(cart))
}

/// DELETE /carts/:user_id
pub async fn empty_cart(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<StatusCode> {
    let ctx = state.request_context();
    state.store.empty_cart(&ctx, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/:user_id", get(get_cart).delete(empty_cart))
        .route("/:user_id/items", post(add_item))
}
