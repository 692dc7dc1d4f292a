//! Watermark-driven history sync.
//!
//! After a reconnect the session asks the server for everything missed
//! since the last-synced watermark, replays it through the dispatcher,
//! and advances the watermark. The watermark is persisted before
//! `perform_sync` returns, so a crash immediately afterwards cannot
//! silently lose it.

use std::sync::Arc;

use chat_store::SyncStateRepository;
use chat_types::{Cid, ConnectionState};

use crate::api::ChatApi;
use crate::dispatcher::EventDispatcher;
use crate::error::ClientError;
use crate::retry::{with_retries, RetryPolicy};
use crate::state::SharedState;

/// What a sync attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Missed events were fetched and applied.
    Applied {
        /// Number of events applied.
        events: usize,
    },
    /// Not connected; sync is gated on the socket lifecycle.
    SkippedOffline,
    /// No watched channels; nothing to ask for.
    NothingToSync,
}

pub(crate) struct SyncManager {
    state: SharedState,
    api: Arc<dyn ChatApi>,
    sync_states: Arc<dyn SyncStateRepository>,
    dispatcher: Arc<EventDispatcher>,
    retry: Arc<dyn RetryPolicy>,
}

impl SyncManager {
    pub(crate) fn new(
        state: SharedState,
        api: Arc<dyn ChatApi>,
        sync_states: Arc<dyn SyncStateRepository>,
        dispatcher: Arc<EventDispatcher>,
        retry: Arc<dyn RetryPolicy>,
    ) -> Self {
        Self {
            state,
            api,
            sync_states,
            dispatcher,
            retry,
        }
    }

    /// Fetch and apply everything missed since the watermark.
    pub(crate) async fn perform_sync(&self) -> Result<SyncOutcome, ClientError> {
        let (user_id, since, mut cids) = {
            let state = self.state.lock().await;
            if !state.connection.is_connected() {
                tracing::debug!("sync skipped: not connected");
                return Ok(SyncOutcome::SkippedOffline);
            }
            let sync = state
                .sync_state
                .as_ref()
                .ok_or(ClientError::NotAuthenticated)?;
            (
                sync.user_id().clone(),
                sync.last_synced_at(),
                sync.active_channel_ids().to_vec(),
            )
        };

        if cids.is_empty() {
            // Fall back to the watch list persisted by an earlier
            // session.
            cids = self
                .sync_states
                .select_sync_state(&user_id)
                .await?
                .map(|s| s.active_channel_ids().to_vec())
                .unwrap_or_default();
        }
        if cids.is_empty() {
            tracing::debug!("sync skipped: no watched channels");
            return Ok(SyncOutcome::NothingToSync);
        }

        let cids: Vec<Cid> = cids;
        let mut events = with_retries(self.retry.as_ref(), || {
            self.api.sync_events(&cids, since)
        })
        .await
        .map_err(ClientError::Api)?;

        // Oldest first. The sort is stable, so per-channel delivery
        // order survives equal timestamps.
        events.sort_by_key(|e| e.created_at());
        tracing::debug!(count = events.len(), %since, "applying missed events");

        let applied = self.dispatcher.dispatch(&events).await;

        if let Some(latest) = events.last().map(|e| e.created_at()) {
            let mut state = self.state.lock().await;
            let snapshot = state.sync_state.as_mut().map(|sync| {
                sync.mark_synced(latest);
                sync.clone()
            });
            if let Some(snapshot) = snapshot {
                // Durable before return, under the session lock: see
                // module docs.
                self.sync_states.insert_sync_state(&snapshot).await?;
            }
        }

        Ok(SyncOutcome::Applied { events: applied })
    }

    /// Track a connection transition; a transition to connected triggers
    /// a sync, a loss persists the watch list for resume.
    pub(crate) async fn on_connection_changed(
        &self,
        connection: ConnectionState,
    ) -> Result<(), ClientError> {
        {
            let mut state = self.state.lock().await;
            state.connection = connection;
            if connection == ConnectionState::Offline {
                if let Some(sync) = state.sync_state.clone() {
                    // Persist the watch list so the next session can
                    // resume sync without re-querying.
                    self.sync_states.insert_sync_state(&sync).await?;
                }
            }
        }

        if connection.is_connected() {
            self.perform_sync().await?;
        }
        Ok(())
    }
}
