//! In-process cart store.
//!
//! Carts live in a `HashMap` behind one `RwLock`. Writers take the lock
//! exclusively for their whole read-modify-write, so concurrent `add_item`
//! calls for the same user never lose an update; readers share the lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use cartkeep_core::{Cart, CartResult, OpContext, StorageError};

use crate::traits::CartStore;

/// Volatile cart store. Contents are lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct LocalCartStore {
    carts: Arc<RwLock<HashMap<String, Cart>>>,
}

impl LocalCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with a cart entry (including emptied carts).
    pub fn cart_count(&self) -> usize {
        self.carts.read().map(|carts| carts.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CartStore for LocalCartStore {
    async fn initialize(&self, _ctx: &OpContext) -> CartResult<()> {
        tracing::info!("Local cart store initialized");
        Ok(())
    }

    async fn add_item(
        &self,
        ctx: &OpContext,
        user_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> CartResult<()> {
        tracing::debug!(user_id, product_id, quantity, "add_item");
        ctx.check().map_err(StorageError::from)?;

        let mut carts = self.carts.write().map_err(|_| StorageError::LockPoisoned)?;
        carts
            .entry(user_id.to_string())
            .or_insert_with(|| Cart::empty(user_id))
            .add_item(product_id, quantity);
        Ok(())
    }

    async fn empty_cart(&self, ctx: &OpContext, user_id: &str) -> CartResult<()> {
        tracing::debug!(user_id, "empty_cart");
        ctx.check().map_err(StorageError::from)?;

        let mut carts = self.carts.write().map_err(|_| StorageError::LockPoisoned)?;
        carts.insert(user_id.to_string(), Cart::empty(user_id));
        Ok(())
    }

    async fn get_cart(&self, ctx: &OpContext, user_id: &str) -> CartResult<Cart> {
        tracing::debug!(user_id, "get_cart");
        ctx.check().map_err(StorageError::from)?;

        let carts = self.carts.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(carts.get(user_id).cloned().unwrap_or_default())
    }

    async fn ping(&self, _ctx: &OpContext) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
