//! Repository trait contracts.
//!
//! The sync core depends only on these method contracts, never on a
//! specific storage engine. Every trait is object-safe and `Send + Sync`
//! so backends can be swapped behind `Arc<dyn _>`.

use std::collections::HashMap;

use async_trait::async_trait;
use chat_types::{
    Channel, ChannelConfig, Cid, Filter, Message, QuerySpecSnapshot, SortSpec, SyncState, User,
    UserId,
};
use tokio::sync::watch;

use crate::error::StoreError;

/// User record persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Look up one user.
    async fn select_user(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    /// Look up several users; unknown ids are simply absent from the
    /// result.
    async fn select_users(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError>;

    /// Insert or replace user records.
    async fn insert_users(&self, users: &[User]) -> Result<(), StoreError>;

    /// A continuous feed of the latest known user records. The feed
    /// reflects inserts made through this repository instance.
    fn observe_latest_users(&self) -> watch::Receiver<HashMap<UserId, User>>;
}

/// Channel state persistence.
#[async_trait]
pub trait ChannelRepository: Send + Sync {
    /// Look up one channel.
    async fn select_channel(&self, cid: &Cid) -> Result<Option<Channel>, StoreError>;

    /// Look up several channels; unknown cids are absent from the result.
    async fn select_channels(&self, cids: &[Cid]) -> Result<Vec<Channel>, StoreError>;

    /// Insert or replace channel records.
    async fn upsert_channels(&self, channels: &[Channel]) -> Result<(), StoreError>;

    /// Delete a channel record. Unknown cids are a no-op.
    async fn delete_channel(&self, cid: &Cid) -> Result<(), StoreError>;
}

/// Message persistence.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Look up one message.
    async fn select_message(&self, id: &str) -> Result<Option<Message>, StoreError>;

    /// The newest messages of a channel, newest first.
    async fn select_messages_for_channel(
        &self,
        cid: &Cid,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError>;

    /// Insert or replace messages.
    async fn upsert_messages(&self, messages: &[Message]) -> Result<(), StoreError>;

    /// Remove a message record (hard deletion). Unknown ids are a no-op.
    async fn delete_message(&self, id: &str) -> Result<(), StoreError>;
}

/// Per-user sync-state persistence.
///
/// `insert_sync_state` completes only after the state is durably stored,
/// so a crash immediately after a successful sync cannot lose the
/// watermark.
#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    /// Look up the sync state for a user.
    async fn select_sync_state(&self, user_id: &UserId) -> Result<Option<SyncState>, StoreError>;

    /// Insert or replace the sync state, durably, before returning.
    async fn insert_sync_state(&self, state: &SyncState) -> Result<(), StoreError>;
}

/// Persisted query-spec records, keyed by (filter, sort).
#[async_trait]
pub trait QuerySpecRepository: Send + Sync {
    /// Look up the persisted record for a (filter, sort) pair.
    async fn select_query_spec(
        &self,
        filter: &Filter,
        sort: &SortSpec,
    ) -> Result<Option<QuerySpecSnapshot>, StoreError>;

    /// Insert or replace a query-spec record.
    async fn insert_query_spec(&self, snapshot: &QuerySpecSnapshot) -> Result<(), StoreError>;
}

/// Channel-type configuration cache.
#[async_trait]
pub trait ChannelConfigRepository: Send + Sync {
    /// Look up the configuration for a channel type.
    async fn select_channel_config(
        &self,
        channel_type: &str,
    ) -> Result<Option<ChannelConfig>, StoreError>;

    /// All cached configurations.
    async fn select_channel_configs(&self) -> Result<Vec<ChannelConfig>, StoreError>;

    /// Insert or replace configurations.
    async fn insert_channel_configs(
        &self,
        configs: &[ChannelConfig],
    ) -> Result<(), StoreError>;
}
