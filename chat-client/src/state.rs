//! Shared session state.
//!
//! Everything mutated by the single writer lives here, behind one
//! `tokio::sync::Mutex` per session: the query-spec cache, the sync
//! state, the authenticated identity, and per-query fetch bookkeeping.
//! Real-time batches and fetch completions serialize on this lock;
//! reads clone snapshots out of it.

use std::collections::HashMap;
use std::sync::Arc;

use chat_core::QuerySpecCache;
use chat_types::{ConnectionState, QueryId, SelfUser, SyncState, UserId};
use tokio::sync::Mutex;

/// Per-query fetch bookkeeping.
#[derive(Debug, Clone, Default)]
pub(crate) struct FetchState {
    /// Bumped on cancellation; completions with a stale generation are
    /// dropped without touching the spec.
    pub generation: u64,
    /// Pagination offset for the next page.
    pub offset: usize,
    /// Whether the server has no further pages.
    pub end_of_channels: bool,
    /// Whether the last online fetch failed and needs recovery.
    pub recovery_needed: bool,
}

/// The mutable state of one session.
pub(crate) struct SessionState {
    pub specs: QuerySpecCache,
    pub sync_state: Option<SyncState>,
    pub self_user: Option<SelfUser>,
    pub connection: ConnectionState,
    pub fetches: HashMap<QueryId, FetchState>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            specs: QuerySpecCache::new(),
            sync_state: None,
            self_user: None,
            connection: ConnectionState::Offline,
            fetches: HashMap::new(),
        }
    }

    /// The authenticated user's id, if a user is connected.
    pub fn current_user_id(&self) -> Option<UserId> {
        self.self_user.as_ref().map(|u| u.user().id.clone())
    }
}

pub(crate) type SharedState = Arc<Mutex<SessionState>>;

pub(crate) fn shared_state() -> SharedState {
    Arc::new(Mutex::new(SessionState::new()))
}
