//! Cache Error Enum
//!
//! Backend faults. These never reach callers on their own: the client wraps
//! them as the cause of an `internal` (or `cache_miss`) [`StructuredError`].
//!
//! [`StructuredError`]: crate::error::StructuredError

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// Rejected construction options
    #[error("Invalid cache options: {0}")]
    InvalidConfig(String),

    /// Operation issued after `close`
    #[error("Cache client is closed")]
    Closed,

    /// Operation exceeded the configured timeout
    #[error("Cache operation timed out: {0}")]
    Timeout(String),

    /// Expiry too large for the backend to represent
    #[error("TTL out of range: {0:?}")]
    TtlOutOfRange(std::time::Duration),

    /// Value could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Value is not valid UTF-8
    #[error("Cached value is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Command issued against a key holding another type
    #[error("Wrong value type for key: {0}")]
    WrongType(String),

    /// INCR against a value that is not an integer
    #[error("Value is not an integer: {0}")]
    NotAnInteger(String),

    /// Key (or hash field) not present
    #[error("Key not found: {0}")]
    Miss(String),

    /// Error reported by Redis
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Result type for backend calls.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
