//! # chat-client
//!
//! Session, sync, and query orchestration for backchat.
//!
//! This is the crate applications embed. It keeps a locally cached
//! channel-list view consistent with a remote source of truth by
//! interpreting the pure decisions from `chat-core` against the
//! repositories from `chat-store` and the network behind [`ChatApi`].
//!
//! ## Architecture
//!
//! ```text
//! UI / socket → ChatSession → ChatApi → network
//!                   ↓
//!              chat-core (pure decision logic)
//!                   ↓
//!              chat-store (repositories)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use backchat_client::{ChatSession, SessionConfig, MockChatApi};
//! use backchat_store::RepositoryProvider;
//! use backchat_types::{Filter, SortSpec, User};
//!
//! let session = ChatSession::new(
//!     SessionConfig::default(),
//!     RepositoryProvider::in_memory(),
//!     std::sync::Arc::new(MockChatApi::new()),
//! );
//! session.connect_user(User::new("jo")).await?;
//! let query = session
//!     .query_channels(Filter::eq("team", "red"), SortSpec::default())
//!     .await?;
//! let channels = session.channels(query).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
mod dispatcher;
mod error;
mod query;
mod retry;
mod session;
mod state;
mod sync;

pub use api::{ApiError, ChatApi, MockChatApi, QueryChannelsRequest, QueryChannelsResponse};
pub use error::ClientError;
pub use query::{FetchOutcome, QueryState};
pub use retry::{DefaultRetryPolicy, RetryPolicy};
pub use session::{ChatSession, SessionConfig};
pub use sync::SyncOutcome;
