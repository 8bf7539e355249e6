//! The cart store contract.

use async_trait::async_trait;
use cartkeep_core::{Cart, CartResult, OpContext};

/// Pluggable storage for per-user carts.
///
/// Exactly one implementation is constructed per deployment and shared by
/// every request through an `Arc`. Implementations must be safe to call
/// concurrently and must honor the [`OpContext`] of each call.
///
/// # Errors
///
/// `add_item`, `empty_cart` and `get_cart` surface medium failures as
/// `CartError::Storage`. A user with no cart is never an error: reads see the
/// empty cart and writes create the cart. `initialize` fails with
/// `CartError::Unavailable` when the backend cannot become ready.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Prepare the backend for use.
    async fn initialize(&self, ctx: &OpContext) -> CartResult<()>;

    /// Merge `quantity` of `product_id` into the user's cart, creating the
    /// cart if needed.
    async fn add_item(
        &self,
        ctx: &OpContext,
        user_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> CartResult<()>;

    /// Replace the user's cart with one holding no items.
    async fn empty_cart(&self, ctx: &OpContext, user_id: &str) -> CartResult<()>;

    /// Current cart for the user, or the empty cart if there is none.
    async fn get_cart(&self, ctx: &OpContext, user_id: &str) -> CartResult<Cart>;

    /// Bounded liveness probe. Never fails; any fault reads as `false`.
    async fn ping(&self, ctx: &OpContext) -> bool;

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}
