//! Cart entity types.
//!
//! `Cart` and `CartItem` double as the record schema: the `prost` field tags
//! below define the binary layout written to the durable backend, so tags must
//! never be renumbered or reused.

use serde::{Deserialize, Serialize};

/// One line item in a cart.
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
pub struct CartItem {
    /// Product identifier, unique within a cart.
    #[prost(string, tag = "1")]
    pub product_id: String,

    /// Accumulated quantity for the product.
    #[prost(uint32, tag = "2")]
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A user's cart.
///
/// A cart with no items is the canonical empty cart. `Cart::default()` (empty
/// `user_id`, no items) is what readers get for a user that has never been
/// written.
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
pub struct Cart {
    /// Owning user. Empty when the cart was never written for anyone.
    #[prost(string, tag = "1")]
    pub user_id: String,

    /// Line items in first-seen order of `product_id`.
    #[prost(message, repeated, tag = "2")]
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart owned by `user_id`.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            items: Vec::new(),
        }
    }

    /// Create a cart holding exactly one item.
    pub fn with_item(
        user_id: impl Into<String>,
        product_id: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            items: vec![CartItem::new(product_id, quantity)],
        }
    }

    /// Merge one line item into the cart.
    ///
    /// If an item with the same `product_id` exists its quantity grows by
    /// `quantity`; otherwise a new item is appended. Carts hold tens of items,
    /// so this is a plain linear scan.
    pub fn add_item(&mut self, product_id: &str, quantity: u32) {
        match self.items.iter_mut().find(|item| item.product_id == product_id) {
            Some(item) => item.quantity = item.quantity.saturating_add(quantity),
            None => self.items.push(CartItem::new(product_id, quantity)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Quantity held for `product_id`, or 0 if the product is not in the cart.
    pub fn quantity_of(&self, product_id: &str) -> u32 {
        self.items
            .iter()
            .find(|item| item.product_id == product_id)
            .map(|item| item.quantity)
            .unwrap_or(0)
    }

    /// Sum of all item quantities.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}

// =============================================================================
// TESTS
// =============================================================================
