//! # chat-types
//!
//! Domain models, typed events, and query filters for backchat.
//!
//! This crate provides the foundational types used across all backchat
//! crates:
//! - [`UserId`], [`Cid`], [`QueryId`], [`Timestamp`] - Identity and ordering types
//! - [`Channel`], [`Message`], [`User`], [`SelfUser`] - Domain models
//! - [`ChatEvent`] - Typed real-time events with wire decoding
//! - [`Filter`], [`SortSpec`] - Channel-list query descriptions
//! - [`SyncState`], [`QuerySpecSnapshot`] - Persisted sync bookkeeping

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod events;
mod filter;
mod ids;
mod models;
mod query;
mod sort;
mod sync;

pub use error::{CidParseError, EventParseError};
pub use events::ChatEvent;
pub use filter::Filter;
pub use ids::{Cid, QueryId, Timestamp, UserId};
pub use models::{
    Channel, ChannelConfig, ConnectionState, FieldValue, Member, Message, SelfUser, User,
};
pub use query::QuerySpecSnapshot;
pub use sort::{Direction, SortField, SortSpec};
pub use sync::SyncState;
