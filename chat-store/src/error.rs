//! Error types for chat-store.

use thiserror::Error;

/// Storage layer errors.
///
/// Persistence failures are surfaced to the caller as-is; they are never
/// retried automatically.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to encode a row payload.
    #[error("encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a row payload.
    #[error("decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}
