//! In-memory storage backend.
//!
//! The default backend: thread-safe maps behind a mutex, suitable for
//! tests and ephemeral sessions. Not persistent - all data is lost when
//! the store is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chat_types::{
    Channel, ChannelConfig, Cid, Filter, Message, QuerySpecSnapshot, SortSpec, SyncState, User,
    UserId,
};
use tokio::sync::watch;

use crate::error::StoreError;
use crate::provider::RepositoryFactory;
use crate::repos::{
    ChannelConfigRepository, ChannelRepository, MessageRepository, QuerySpecRepository,
    SyncStateRepository, UserRepository,
};

#[derive(Default)]
struct MemoryInner {
    users: HashMap<UserId, User>,
    channels: HashMap<Cid, Channel>,
    messages: HashMap<String, Message>,
    sync_states: HashMap<UserId, SyncState>,
    query_specs: Vec<QuerySpecSnapshot>,
    configs: HashMap<String, ChannelConfig>,
}

/// In-memory store implementing every repository trait.
///
/// Clones share state.
pub struct InMemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
    users_tx: Arc<watch::Sender<HashMap<UserId, User>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        let (users_tx, _) = watch::channel(HashMap::new());
        Self {
            inner: Arc::new(Mutex::new(MemoryInner::default())),
            users_tx: Arc::new(users_tx),
        }
    }
}

impl Clone for InMemoryStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            users_tx: Arc::clone(&self.users_tx),
        }
    }
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn select_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.get(id).cloned())
    }

    async fn select_users(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(ids.iter().filter_map(|id| inner.users.get(id).cloned()).collect())
    }

    async fn insert_users(&self, users: &[User]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for user in users {
            inner.users.insert(user.id.clone(), user.clone());
        }
        self.users_tx.send_replace(inner.users.clone());
        Ok(())
    }

    fn observe_latest_users(&self) -> watch::Receiver<HashMap<UserId, User>> {
        self.users_tx.subscribe()
    }
}

#[async_trait]
impl ChannelRepository for InMemoryStore {
    async fn select_channel(&self, cid: &Cid) -> Result<Option<Channel>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.channels.get(cid).cloned())
    }

    async fn select_channels(&self, cids: &[Cid]) -> Result<Vec<Channel>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(cids
            .iter()
            .filter_map(|cid| inner.channels.get(cid).cloned())
            .collect())
    }

    async fn upsert_channels(&self, channels: &[Channel]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for channel in channels {
            inner.channels.insert(channel.cid.clone(), channel.clone());
        }
        Ok(())
    }

    async fn delete_channel(&self, cid: &Cid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.channels.remove(cid);
        inner.messages.retain(|_, m| &m.cid != cid);
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn select_message(&self, id: &str) -> Result<Option<Message>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.messages.get(id).cloned())
    }

    async fn select_messages_for_channel(
        &self,
        cid: &Cid,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut messages: Vec<Message> = inner
            .messages
            .values()
            .filter(|m| &m.cid == cid)
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages.truncate(limit);
        Ok(messages)
    }

    async fn upsert_messages(&self, messages: &[Message]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for message in messages {
            inner.messages.insert(message.id.clone(), message.clone());
        }
        Ok(())
    }

    async fn delete_message(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.messages.remove(id);
        Ok(())
    }
}

#[async_trait]
impl SyncStateRepository for InMemoryStore {
    async fn select_sync_state(&self, user_id: &UserId) -> Result<Option<SyncState>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sync_states.get(user_id).cloned())
    }

    async fn insert_sync_state(&self, state: &SyncState) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .sync_states
            .insert(state.user_id().clone(), state.clone());
        Ok(())
    }
}

#[async_trait]
impl QuerySpecRepository for InMemoryStore {
    async fn select_query_spec(
        &self,
        filter: &Filter,
        sort: &SortSpec,
    ) -> Result<Option<QuerySpecSnapshot>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .query_specs
            .iter()
            .find(|s| &s.filter == filter && &s.sort == sort)
            .cloned())
    }

    async fn insert_query_spec(&self, snapshot: &QuerySpecSnapshot) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner
            .query_specs
            .iter_mut()
            .find(|s| s.filter == snapshot.filter && s.sort == snapshot.sort)
        {
            Some(existing) => *existing = snapshot.clone(),
            None => inner.query_specs.push(snapshot.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelConfigRepository for InMemoryStore {
    async fn select_channel_config(
        &self,
        channel_type: &str,
    ) -> Result<Option<ChannelConfig>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.configs.get(channel_type).cloned())
    }

    async fn select_channel_configs(&self) -> Result<Vec<ChannelConfig>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.configs.values().cloned().collect())
    }

    async fn insert_channel_configs(
        &self,
        configs: &[ChannelConfig],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for config in configs {
            inner
                .configs
                .insert(config.channel_type.clone(), config.clone());
        }
        Ok(())
    }
}

/// Factory vending repositories backed by one shared [`InMemoryStore`].
#[derive(Default, Clone)]
pub struct InMemoryRepositoryFactory {
    store: Arc<InMemoryStore>,
}

impl InMemoryRepositoryFactory {
    /// Create a factory with a fresh empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RepositoryFactory for InMemoryRepositoryFactory {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.store.clone()
    }

    fn channels(&self) -> Arc<dyn ChannelRepository> {
        self.store.clone()
    }

    fn messages(&self) -> Arc<dyn MessageRepository> {
        self.store.clone()
    }

    fn sync_state(&self) -> Arc<dyn SyncStateRepository> {
        self.store.clone()
    }

    fn query_specs(&self) -> Arc<dyn QuerySpecRepository> {
        self.store.clone()
    }

    fn channel_configs(&self) -> Arc<dyn ChannelConfigRepository> {
        self.store.clone()
    }
}
