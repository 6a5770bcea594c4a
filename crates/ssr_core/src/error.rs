//! Core SSR error types (pure - no I/O variants).

use thiserror::Error;

/// Maximum size for a serialized state payload (5MB).
pub const MAX_PAYLOAD_SIZE: usize = 5 * 1024 * 1024;

/// Core SSR errors (pure - no I/O variants).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SsrCoreError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Payload serialization failed: {0}")]
    Serialization(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Max concurrent renders must be at least 1")]
    InvalidConcurrency,

    #[error("Render timeout must be positive")]
    InvalidTimeout,

    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, SsrCoreError>;
