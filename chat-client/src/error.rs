//! Error types for chat-client.

use chat_types::QueryId;
use thiserror::Error;

use crate::api::ApiError;
use chat_store::StoreError;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network request failed (after the retry policy gave up).
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Local storage failed. Surfaced, never retried automatically.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// No authenticated user on this session.
    #[error("no authenticated user")]
    NotAuthenticated,

    /// The query id does not belong to this session.
    #[error("unknown query: {0}")]
    UnknownQuery(QueryId),
}
