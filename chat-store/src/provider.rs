//! Repository factory and provider.
//!
//! The provider is an owned value constructed once at session start and
//! passed explicitly to every consumer - there is no process-wide
//! singleton. Swapping the factory affects repositories vended
//! afterwards; instances vended earlier keep their original backend.

use std::sync::{Arc, RwLock};

use crate::memory::InMemoryRepositoryFactory;
use crate::repos::{
    ChannelConfigRepository, ChannelRepository, MessageRepository, QuerySpecRepository,
    SyncStateRepository, UserRepository,
};

/// Creates the repository family for one storage backend.
pub trait RepositoryFactory: Send + Sync {
    /// User records.
    fn users(&self) -> Arc<dyn UserRepository>;
    /// Channel state.
    fn channels(&self) -> Arc<dyn ChannelRepository>;
    /// Messages.
    fn messages(&self) -> Arc<dyn MessageRepository>;
    /// Per-user sync state.
    fn sync_state(&self) -> Arc<dyn SyncStateRepository>;
    /// Persisted query specs.
    fn query_specs(&self) -> Arc<dyn QuerySpecRepository>;
    /// Channel-type configurations.
    fn channel_configs(&self) -> Arc<dyn ChannelConfigRepository>;
}

/// Holds the currently active [`RepositoryFactory`] and vends
/// repositories from it.
///
/// Safe to use before any repository is constructed; defaults to the
/// in-memory backend.
pub struct RepositoryProvider {
    factory: RwLock<Arc<dyn RepositoryFactory>>,
}

impl RepositoryProvider {
    /// Create a provider over the given factory.
    pub fn new(factory: Arc<dyn RepositoryFactory>) -> Self {
        Self {
            factory: RwLock::new(factory),
        }
    }

    /// Create a provider over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRepositoryFactory::new()))
    }

    /// Swap the active factory. Repositories vended after this call use
    /// the new backend; previously vended instances are unaffected.
    pub fn change_repository_factory(&self, factory: Arc<dyn RepositoryFactory>) {
        *self.factory.write().unwrap() = factory;
    }

    fn factory(&self) -> Arc<dyn RepositoryFactory> {
        self.factory.read().unwrap().clone()
    }

    /// User records.
    pub fn users(&self) -> Arc<dyn UserRepository> {
        self.factory().users()
    }

    /// Channel state.
    pub fn channels(&self) -> Arc<dyn ChannelRepository> {
        self.factory().channels()
    }

    /// Messages.
    pub fn messages(&self) -> Arc<dyn MessageRepository> {
        self.factory().messages()
    }

    /// Per-user sync state.
    pub fn sync_state(&self) -> Arc<dyn SyncStateRepository> {
        self.factory().sync_state()
    }

    /// Persisted query specs.
    pub fn query_specs(&self) -> Arc<dyn QuerySpecRepository> {
        self.factory().query_specs()
    }

    /// Channel-type configurations.
    pub fn channel_configs(&self) -> Arc<dyn ChannelConfigRepository> {
        self.factory().channel_configs()
    }
}

impl Default for RepositoryProvider {
    fn default() -> Self {
        Self::in_memory()
    }
}
