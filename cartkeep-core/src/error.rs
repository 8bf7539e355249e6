//! Error types for cart store operations

use thiserror::Error;

/// Why an operation context stopped an operation.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

/// Failures of the storage medium behind a cart store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Read failed for cart of {user_id}: {reason}")]
    ReadFailed { user_id: String, reason: String },

    #[error("Write failed for cart of {user_id}: {reason}")]
    WriteFailed { user_id: String, reason: String },

    #[error("Corrupt cart record for {user_id}: {reason}")]
    CorruptRecord { user_id: String, reason: String },

    #[error("Invalid connection string {value:?}: {reason}")]
    InvalidConnectionString { value: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Storage operation interrupted: {0}")]
    Interrupted(#[from] ContextError),
}

/// The backend could not become ready.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UnavailableError {
    #[error("Backend not ready after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("Backend initialization aborted after {attempts} attempts: {reason}")]
    Aborted { attempts: u32, reason: ContextError },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for cart store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unavailable: {0}")]
    Unavailable(#[from] UnavailableError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for cart store operations.
pub type CartResult<T> = Result<T, CartError>;

// =============================================================================
// TESTS
// =============================================================================
