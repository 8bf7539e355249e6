//! Cartkeep Storage - Cart Store Contract and Backends
//!
//! Defines the [`CartStore`] contract and its two backends:
//! - [`LocalCartStore`]: in-process map, lost on restart, updates to one user
//!   are strictly serialized.
//! - [`DurableCartStore`]: records in a remote hash-field store (Redis in
//!   production). Concurrent `add_item` calls for one user may lose updates.
//!
//! Exactly one backend is built per process, through [`open_store`].

pub mod durable;
pub mod kv;
pub mod local;
pub mod startup;
pub mod traits;

pub use durable::{DurableCartStore, CART_FIELD};
pub use kv::{ConnectionTarget, HashStore, InMemoryHashStore, KvError, RedisHashStore};
pub use local::LocalCartStore;
pub use startup::{Startup, StartupState};
pub use traits::CartStore;

use std::sync::Arc;

use cartkeep_core::{BackendKind, CartResult, ConfigError, StoreConfig};

/// Build the cart store selected by `config`.
///
/// Performs no I/O; call [`CartStore::initialize`] before serving traffic.
/// A Redis backend without an address is a configuration error, never a
/// fallback to the local store.
pub fn open_store(config: &StoreConfig) -> CartResult<Arc<dyn CartStore>> {
    config.validate()?;

    match config.backend {
        BackendKind::Memory => {
            tracing::info!("Using in-memory cart store");
            Ok(Arc::new(LocalCartStore::new()))
        }
        BackendKind::Redis => {
            let addr = config
                .redis_addr
                .as_deref()
                .ok_or_else(|| ConfigError::MissingRequired {
                    field: "REDIS_ADDR".to_string(),
                })?;
            let store = RedisHashStore::connect(addr)?;
            tracing::info!(redis = %store.target(), "Using Redis cart store");
            Ok(Arc::new(DurableCartStore::with_config(store, config)))
        }
    }
}
