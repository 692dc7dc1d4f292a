//! Network seam for the sync core.
//!
//! The core never talks to a concrete HTTP or socket client; it depends
//! on the [`ChatApi`] trait. Production backends wrap the platform's
//! network stack, tests use [`MockChatApi`].

mod mock;

pub use mock::MockChatApi;

use async_trait::async_trait;
use thiserror::Error;

use chat_types::{Channel, ChannelConfig, ChatEvent, Cid, Filter, SortSpec, Timestamp};

/// Network errors.
///
/// `retryable()` feeds the retry policy: transient failures may be
/// retried, everything else is surfaced immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The server throttled the client.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The server rejected the request.
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP-style status code.
        status: u16,
        /// Server-provided message.
        message: String,
    },

    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl ApiError {
    /// Whether the retry policy may retry this error.
    pub fn retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout | ApiError::RateLimited => true,
            ApiError::Server { status, .. } => *status >= 500,
            ApiError::NotFound(_) => false,
        }
    }
}

/// A paginated channel-list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryChannelsRequest {
    /// Channel predicate.
    pub filter: Filter,
    /// Result ordering.
    pub sort: SortSpec,
    /// Pagination offset.
    pub offset: usize,
    /// Page size.
    pub limit: usize,
    /// Messages to embed per channel.
    pub message_limit: usize,
    /// Members to embed per channel.
    pub member_limit: usize,
}

/// A channel-list page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryChannelsResponse {
    /// Matching channels, in the requested order.
    pub channels: Vec<Channel>,
    /// Channel-type configurations embedded in the response.
    pub configs: Vec<ChannelConfig>,
}

/// The network client contract the sync core consumes.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Fetch one page of a channel-list query.
    async fn query_channels(
        &self,
        request: &QueryChannelsRequest,
    ) -> Result<QueryChannelsResponse, ApiError>;

    /// Start watching a channel and return its current state.
    async fn watch_channel(&self, cid: &Cid) -> Result<Channel, ApiError>;

    /// Fetch the events missed since `since` for the given channels, in
    /// server order.
    async fn sync_events(
        &self,
        cids: &[Cid],
        since: Timestamp,
    ) -> Result<Vec<ChatEvent>, ApiError>;
}
