//! Cartkeep Core - Cart Types
//!
//! Data model, record codec, error hierarchy, configuration and the
//! cancellable operation context shared by every cartkeep crate. Storage
//! backends live in `cartkeep-storage`.

pub mod codec;
pub mod config;
pub mod context;
pub mod entities;
pub mod error;
pub mod health;

pub use codec::{decode_cart, empty_record, encode_cart, RecordError};
pub use config::{
    normalize_redis_addr, BackendKind, ConnectionOptions, StartupPolicy, StoreConfig,
    DEFAULT_REDIS_PORT,
};
pub use context::{CancelHandle, OpContext};
pub use entities::{Cart, CartItem};
pub use error::{
    CartError, CartResult, ConfigError, ContextError, StorageError, UnavailableError,
};
pub use health::{HealthCheck, ServingStatus};
