//! # chat-core
//!
//! Pure logic for backchat (no I/O, instant tests).
//!
//! This crate implements the decision logic keeping a locally cached
//! channel-list view consistent with a remote source of truth:
//! - [`ChannelComparator`] - composite multi-field sort order
//! - [`QueryChannelsSpec`] / [`QuerySpecCache`] - which channels satisfy
//!   which query, in sort order
//! - [`ChatEventHandler`] / [`DefaultChatEventHandler`] - per-event
//!   membership decisions
//! - [`ExponentialBackoff`] - retry delay computation
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce
//! output without side effects. Decisions consult only already-resident
//! state passed in by the caller; the actual I/O (network, storage) is
//! performed by `chat-client`, which interprets the returned
//! [`EventHandlingResult`] instructions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod comparator;
pub mod handler;
pub mod query_spec;
pub mod retry;

pub use comparator::ChannelComparator;
pub use handler::{
    merge_delta, ChatEventHandler, ChatEventHandlerFactory, DefaultChatEventHandler,
    DefaultChatEventHandlerFactory, EventHandlingResult,
};
pub use query_spec::{QueryChannelsSpec, QuerySpecCache};
pub use retry::ExponentialBackoff;
