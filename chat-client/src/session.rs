//! The chat session: the entry point UI layers talk to.
//!
//! A session owns its repository provider (explicit dependency
//! injection, no process-wide state), the query-spec cache, the sync
//! manager, the event dispatcher, and the clear-state listener list.
//! Everything else reaches the session through method calls; the socket
//! component feeds it connection transitions and raw events.

use std::sync::{Arc, Mutex as StdMutex};

use chat_core::{ChatEventHandlerFactory, DefaultChatEventHandlerFactory};
use chat_store::{RepositoryProvider, SyncStateRepository};
use chat_types::{
    ChatEvent, Cid, ConnectionState, Filter, QueryId, SelfUser, SortSpec, SyncState, User,
};

use crate::api::ChatApi;
use crate::dispatcher::EventDispatcher;
use crate::error::ClientError;
use crate::query::{FetchOutcome, QueryChannelsLogic, QueryState};
use crate::retry::{DefaultRetryPolicy, RetryPolicy};
use crate::state::{shared_state, SharedState};
use crate::sync::{SyncManager, SyncOutcome};

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Channels per query page.
    pub channel_limit: usize,
    /// Messages embedded per channel in query results.
    pub message_limit: usize,
    /// Members embedded per channel in query results.
    pub member_limit: usize,
}

impl SessionConfig {
    /// Set the channel page size.
    pub fn with_channel_limit(mut self, limit: usize) -> Self {
        self.channel_limit = limit;
        self
    }

    /// Set the embedded message limit.
    pub fn with_message_limit(mut self, limit: usize) -> Self {
        self.message_limit = limit;
        self
    }

    /// Set the embedded member limit.
    pub fn with_member_limit(mut self, limit: usize) -> Self {
        self.member_limit = limit;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_limit: 30,
            message_limit: 1,
            member_limit: 30,
        }
    }
}

type ClearStateListener = Box<dyn FnOnce() + Send>;

/// One authenticated chat session.
pub struct ChatSession {
    provider: RepositoryProvider,
    state: SharedState,
    dispatcher: Arc<EventDispatcher>,
    queries: QueryChannelsLogic,
    sync: SyncManager,
    sync_states: Arc<dyn SyncStateRepository>,
    clear_listeners: StdMutex<Vec<ClearStateListener>>,
}

impl ChatSession {
    /// Create a session with the default event handler and retry policy.
    pub fn new(
        config: SessionConfig,
        provider: RepositoryProvider,
        api: Arc<dyn ChatApi>,
    ) -> Self {
        Self::with_parts(
            config,
            provider,
            api,
            Arc::new(DefaultChatEventHandlerFactory),
            Arc::new(DefaultRetryPolicy::default()),
        )
    }

    /// Create a session with a custom handler factory and retry policy.
    pub fn with_parts(
        config: SessionConfig,
        provider: RepositoryProvider,
        api: Arc<dyn ChatApi>,
        handler_factory: Arc<dyn ChatEventHandlerFactory>,
        retry: Arc<dyn RetryPolicy>,
    ) -> Self {
        let state = shared_state();
        // Repositories are vended once here; a later factory swap on the
        // provider does not retroactively rewire a running session.
        let sync_states = provider.sync_state();
        let dispatcher = Arc::new(EventDispatcher::new(
            state.clone(),
            provider.users(),
            provider.channels(),
            provider.messages(),
            provider.query_specs(),
            sync_states.clone(),
            api.clone(),
            handler_factory,
        ));
        let queries = QueryChannelsLogic::new(
            state.clone(),
            api.clone(),
            provider.channels(),
            provider.query_specs(),
            provider.channel_configs(),
            sync_states.clone(),
            retry.clone(),
            config,
        );
        let sync = SyncManager::new(
            state.clone(),
            api,
            sync_states.clone(),
            dispatcher.clone(),
            retry,
        );
        Self {
            provider,
            state,
            dispatcher,
            queries,
            sync,
            sync_states,
            clear_listeners: StdMutex::new(Vec::new()),
        }
    }

    /// Authenticate a user: install the identity and load (or create)
    /// their sync state.
    pub async fn connect_user(&self, user: User) -> Result<(), ClientError> {
        let user_id = user.id.clone();
        let existing = self.sync_states.select_sync_state(&user_id).await?;

        let mut state = self.state.lock().await;
        state.self_user = Some(SelfUser::Full(user));
        state.sync_state = Some(existing.unwrap_or_else(|| SyncState::new(user_id)));
        Ok(())
    }

    /// Register a channel-list query, seed it from offline storage, and
    /// fetch the first page online. An online failure is logged and the
    /// cached result stands (`recovery_needed` is set on the query).
    pub async fn query_channels(
        &self,
        filter: Filter,
        sort: SortSpec,
    ) -> Result<QueryId, ClientError> {
        {
            let state = self.state.lock().await;
            if state.self_user.is_none() {
                return Err(ClientError::NotAuthenticated);
            }
        }
        let id = self.queries.register(&filter, &sort).await?;
        match self.queries.query_first_page(id).await {
            Ok(_) => {}
            Err(ClientError::Api(error)) => {
                tracing::warn!(%error, query = %id, "online query failed; serving cached channels");
            }
            Err(other) => return Err(other),
        }
        Ok(id)
    }

    /// Fetch the next page of a query.
    pub async fn load_more(&self, query_id: QueryId) -> Result<FetchOutcome, ClientError> {
        self.queries.query_more(query_id).await
    }

    /// Stop watching a query: cancel in-flight fetches and unregister it
    /// from the sync state. The persisted spec is kept for the next
    /// session.
    pub async fn stop_watching(&self, query_id: QueryId) -> Result<(), ClientError> {
        self.queries.cancel(query_id).await;

        let mut state = self.state.lock().await;
        let snapshot = state.sync_state.as_mut().map(|sync| {
            sync.unregister_query(query_id);
            sync.clone()
        });
        if let Some(snapshot) = snapshot {
            self.sync_states.insert_sync_state(&snapshot).await?;
        }
        Ok(())
    }

    /// The current channels of a query, in sort order.
    pub async fn channels(&self, query_id: QueryId) -> Result<Vec<chat_types::Channel>, ClientError> {
        self.queries.channels(query_id).await
    }

    /// A read-only snapshot of a query's state.
    pub async fn query_state(&self, query_id: QueryId) -> Result<QueryState, ClientError> {
        self.queries.query_state(query_id).await
    }

    /// Apply typed events in delivery order.
    pub async fn handle_events(&self, events: &[ChatEvent]) -> usize {
        self.dispatcher.dispatch(events).await
    }

    /// Decode and apply raw wire events. Malformed payloads are logged
    /// and dropped; the rest of the batch is still applied.
    pub async fn handle_raw_events(&self, payloads: &[&str]) -> usize {
        let mut events = Vec::with_capacity(payloads.len());
        for payload in payloads {
            match ChatEvent::from_json(payload) {
                Ok(event) => events.push(event),
                Err(error) => tracing::warn!(%error, "dropping malformed event"),
            }
        }
        self.dispatcher.dispatch(&events).await
    }

    /// Feed a connection transition from the socket component. A
    /// transition to connected triggers a sync.
    pub async fn set_connection_state(
        &self,
        connection: ConnectionState,
    ) -> Result<(), ClientError> {
        self.sync.on_connection_changed(connection).await
    }

    /// Fetch and apply everything missed since the watermark.
    pub async fn perform_sync(&self) -> Result<SyncOutcome, ClientError> {
        self.sync.perform_sync().await
    }

    /// The current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        self.state.lock().await.connection
    }

    /// The authenticated identity, if any.
    pub async fn current_user(&self) -> Option<SelfUser> {
        self.state.lock().await.self_user.clone()
    }

    /// A snapshot of the sync state, if a user is connected.
    pub async fn sync_state(&self) -> Option<SyncState> {
        self.state.lock().await.sync_state.clone()
    }

    /// The channels currently watched for sync.
    pub async fn active_channels(&self) -> Vec<Cid> {
        self.state
            .lock()
            .await
            .sync_state
            .as_ref()
            .map(|s| s.active_channel_ids().to_vec())
            .unwrap_or_default()
    }

    /// Register a listener invoked synchronously on logout. The session
    /// owns its listeners; they are dropped after firing once.
    pub fn register_clear_state_listener(&self, listener: impl FnOnce() + Send + 'static) {
        self.clear_listeners.lock().unwrap().push(Box::new(listener));
    }

    /// Log out: drain and invoke the clear-state listeners in
    /// registration order, then discard all per-user state. A second
    /// logout is a no-op.
    pub async fn logout(&self) {
        let listeners: Vec<ClearStateListener> = {
            let mut guard = self.clear_listeners.lock().unwrap();
            guard.drain(..).collect()
        };
        for listener in listeners {
            listener();
        }

        let mut state = self.state.lock().await;
        state.specs.clear();
        state.fetches.clear();
        state.sync_state = None;
        state.self_user = None;
        state.connection = ConnectionState::Offline;
    }

    /// The session's repository provider.
    pub fn repositories(&self) -> &RepositoryProvider {
        &self.provider
    }
}
