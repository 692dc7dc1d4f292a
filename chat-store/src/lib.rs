//! # chat-store
//!
//! Repository traits and storage backends for backchat.
//!
//! The sync core persists users, channels, messages, sync state, query
//! specs, and channel configs through the trait contracts in [`repos`];
//! it never depends on a specific storage engine. Two backends ship with
//! the crate:
//! - [`InMemoryRepositoryFactory`] - the default; thread-safe maps for
//!   tests and ephemeral sessions
//! - [`SqliteRepositoryFactory`] - durable storage over SQLite (WAL),
//!   rows encoded as MessagePack blobs
//!
//! [`RepositoryProvider`] owns the active factory and is passed
//! explicitly to consumers; swapping the factory never retroactively
//! affects repositories vended earlier.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod memory;
mod provider;
mod repos;
mod sqlite;

pub use error::StoreError;
pub use memory::{InMemoryRepositoryFactory, InMemoryStore};
pub use provider::{RepositoryFactory, RepositoryProvider};
pub use repos::{
    ChannelConfigRepository, ChannelRepository, MessageRepository, QuerySpecRepository,
    SyncStateRepository, UserRepository,
};
pub use sqlite::{SqliteRepositoryFactory, SqliteStore};
