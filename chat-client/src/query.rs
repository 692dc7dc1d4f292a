//! Channel-list query orchestration.
//!
//! Queries are offline-first: registering one restores the persisted
//! spec and serves cached channels before any network round-trip. Online
//! fetches are paginated and carry a [`FetchTicket`] snapshotting the
//! fetch generation and the sync watermark at request time; at
//! completion, under the session lock:
//!
//! - a bumped generation (the query was cancelled or superseded) drops
//!   the result and leaves the cached set exactly as it was, and
//! - a watermark that advanced past the request-time snapshot means
//!   real-time sync already applied newer state - the result is
//!   discarded silently rather than resurrecting stale data.

use std::collections::HashMap;
use std::sync::Arc;

use chat_store::{
    ChannelConfigRepository, ChannelRepository, QuerySpecRepository, SyncStateRepository,
};
use chat_types::{Channel, Cid, Filter, QueryId, SortSpec, Timestamp};

use crate::api::{ChatApi, QueryChannelsRequest, QueryChannelsResponse};
use crate::error::ClientError;
use crate::retry::{with_retries, RetryPolicy};
use crate::session::SessionConfig;
use crate::state::SharedState;

/// What happened to a completed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page was applied to the query.
    Applied {
        /// Channels in the page.
        count: usize,
    },
    /// The sync watermark advanced past the fetch's request time; the
    /// result was dropped to avoid resurrecting stale data.
    Discarded,
    /// The query was cancelled while the fetch was in flight; the cached
    /// set is untouched.
    Cancelled,
}

/// A read-only view of one query's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    /// Matching cids, in sort order.
    pub cids: Vec<Cid>,
    /// Whether the server has no further pages.
    pub end_of_channels: bool,
    /// Whether the last online fetch failed and needs recovery.
    pub recovery_needed: bool,
}

/// Request-time snapshot carried across an in-flight fetch.
#[derive(Debug, Clone)]
pub(crate) struct FetchTicket {
    pub query_id: QueryId,
    pub generation: u64,
    pub watermark: Timestamp,
    pub first_page: bool,
    pub limit: usize,
}

pub(crate) struct QueryChannelsLogic {
    state: SharedState,
    api: Arc<dyn ChatApi>,
    channels: Arc<dyn ChannelRepository>,
    query_specs: Arc<dyn QuerySpecRepository>,
    channel_configs: Arc<dyn ChannelConfigRepository>,
    sync_states: Arc<dyn SyncStateRepository>,
    retry: Arc<dyn RetryPolicy>,
    config: SessionConfig,
}

impl QueryChannelsLogic {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        state: SharedState,
        api: Arc<dyn ChatApi>,
        channels: Arc<dyn ChannelRepository>,
        query_specs: Arc<dyn QuerySpecRepository>,
        channel_configs: Arc<dyn ChannelConfigRepository>,
        sync_states: Arc<dyn SyncStateRepository>,
        retry: Arc<dyn RetryPolicy>,
        config: SessionConfig,
    ) -> Self {
        Self {
            state,
            api,
            channels,
            query_specs,
            channel_configs,
            sync_states,
            retry,
            config,
        }
    }

    /// Register a (filter, sort) query: restore its persisted spec if
    /// one exists and record it in the sync state. Idempotent.
    pub(crate) async fn register(
        &self,
        filter: &Filter,
        sort: &SortSpec,
    ) -> Result<QueryId, ClientError> {
        let persisted = self.query_specs.select_query_spec(filter, sort).await?;

        let mut state = self.state.lock().await;
        let id = match persisted {
            Some(snapshot) => state.specs.restore(snapshot),
            None => state.specs.get(filter, sort).id(),
        };
        state.fetches.entry(id).or_default();

        let snapshot = state.sync_state.as_mut().map(|sync| {
            sync.register_query(id);
            sync.clone()
        });
        if let Some(snapshot) = snapshot {
            self.sync_states.insert_sync_state(&snapshot).await?;
        }
        Ok(id)
    }

    /// The cached channels of a query, in spec order.
    pub(crate) async fn channels(&self, query_id: QueryId) -> Result<Vec<Channel>, ClientError> {
        let cids = {
            let state = self.state.lock().await;
            let spec = state
                .specs
                .by_id(query_id)
                .ok_or(ClientError::UnknownQuery(query_id))?;
            spec.cids().to_vec()
        };
        let mut by_cid: HashMap<Cid, Channel> = self
            .channels
            .select_channels(&cids)
            .await?
            .into_iter()
            .map(|c| (c.cid.clone(), c))
            .collect();
        Ok(cids.iter().filter_map(|cid| by_cid.remove(cid)).collect())
    }

    /// A read-only snapshot of the query's state.
    pub(crate) async fn query_state(&self, query_id: QueryId) -> Result<QueryState, ClientError> {
        let state = self.state.lock().await;
        let spec = state
            .specs
            .by_id(query_id)
            .ok_or(ClientError::UnknownQuery(query_id))?;
        let fetch = state.fetches.get(&query_id).cloned().unwrap_or_default();
        Ok(QueryState {
            cids: spec.cids().to_vec(),
            end_of_channels: fetch.end_of_channels,
            recovery_needed: fetch.recovery_needed,
        })
    }

    /// Cancel any in-flight fetch for the query. Completions carrying an
    /// older generation will be dropped without touching the spec.
    pub(crate) async fn cancel(&self, query_id: QueryId) {
        let mut state = self.state.lock().await;
        state.fetches.entry(query_id).or_default().generation += 1;
    }

    /// Fetch and apply the first page.
    pub(crate) async fn query_first_page(
        &self,
        query_id: QueryId,
    ) -> Result<FetchOutcome, ClientError> {
        let (ticket, request) = self.begin_fetch(query_id, true).await?;
        self.run_fetch(ticket, request).await
    }

    /// Fetch and apply the next page.
    pub(crate) async fn query_more(
        &self,
        query_id: QueryId,
    ) -> Result<FetchOutcome, ClientError> {
        let (ticket, request) = self.begin_fetch(query_id, false).await?;
        self.run_fetch(ticket, request).await
    }

    async fn run_fetch(
        &self,
        ticket: FetchTicket,
        request: QueryChannelsRequest,
    ) -> Result<FetchOutcome, ClientError> {
        match with_retries(self.retry.as_ref(), || self.api.query_channels(&request)).await {
            Ok(response) => self.complete_fetch(ticket, response).await,
            Err(error) => {
                self.fail_fetch(&ticket).await;
                Err(ClientError::Api(error))
            }
        }
    }

    /// Snapshot the generation and watermark, build the page request.
    pub(crate) async fn begin_fetch(
        &self,
        query_id: QueryId,
        first_page: bool,
    ) -> Result<(FetchTicket, QueryChannelsRequest), ClientError> {
        let state = self.state.lock().await;
        let spec = state
            .specs
            .by_id(query_id)
            .ok_or(ClientError::UnknownQuery(query_id))?;
        let fetch = state.fetches.get(&query_id).cloned().unwrap_or_default();
        let watermark = state
            .sync_state
            .as_ref()
            .map(|s| s.last_synced_at())
            .unwrap_or_else(Timestamp::zero);

        let request = QueryChannelsRequest {
            filter: spec.filter().clone(),
            sort: spec.sort().clone(),
            offset: if first_page { 0 } else { fetch.offset },
            limit: self.config.channel_limit,
            message_limit: self.config.message_limit,
            member_limit: self.config.member_limit,
        };
        let ticket = FetchTicket {
            query_id,
            generation: fetch.generation,
            watermark,
            first_page,
            limit: self.config.channel_limit,
        };
        Ok((ticket, request))
    }

    /// Apply a completed page under the session lock, unless the fetch
    /// was cancelled or overtaken by sync.
    pub(crate) async fn complete_fetch(
        &self,
        ticket: FetchTicket,
        response: QueryChannelsResponse,
    ) -> Result<FetchOutcome, ClientError> {
        let mut state = self.state.lock().await;

        let fetch = state
            .fetches
            .get(&ticket.query_id)
            .cloned()
            .unwrap_or_default();
        if fetch.generation != ticket.generation {
            tracing::debug!(query = %ticket.query_id, "fetch cancelled; cached set untouched");
            return Ok(FetchOutcome::Cancelled);
        }

        let watermark_now = state
            .sync_state
            .as_ref()
            .map(|s| s.last_synced_at())
            .unwrap_or_else(Timestamp::zero);
        if watermark_now > ticket.watermark {
            tracing::debug!(
                query = %ticket.query_id,
                requested_at = %ticket.watermark,
                watermark = %watermark_now,
                "stale fetch discarded"
            );
            return Ok(FetchOutcome::Discarded);
        }

        // Persist the page before mutating the spec.
        self.channels.upsert_channels(&response.channels).await?;
        if !response.configs.is_empty() {
            self.channel_configs
                .insert_channel_configs(&response.configs)
                .await?;
        }

        let count = response.channels.len();
        let snapshot = if ticket.first_page {
            let spec = state
                .specs
                .by_id_mut(ticket.query_id)
                .ok_or(ClientError::UnknownQuery(ticket.query_id))?;
            spec.replace(&response.channels);
            spec.snapshot()
        } else {
            let existing_cids = {
                let spec = state
                    .specs
                    .by_id(ticket.query_id)
                    .ok_or(ClientError::UnknownQuery(ticket.query_id))?;
                spec.cids().to_vec()
            };
            let mut lookup: HashMap<Cid, Channel> = self
                .channels
                .select_channels(&existing_cids)
                .await?
                .into_iter()
                .map(|c| (c.cid.clone(), c))
                .collect();
            for channel in &response.channels {
                lookup.insert(channel.cid.clone(), channel.clone());
            }
            let spec = state
                .specs
                .by_id_mut(ticket.query_id)
                .ok_or(ClientError::UnknownQuery(ticket.query_id))?;
            spec.extend(&response.channels, |cid| lookup.get(cid).cloned());
            spec.snapshot()
        };

        let fetch = state.fetches.entry(ticket.query_id).or_default();
        fetch.recovery_needed = false;
        fetch.end_of_channels = count < ticket.limit;
        fetch.offset = if ticket.first_page {
            count
        } else {
            fetch.offset + count
        };

        let sync_snapshot = state.sync_state.as_mut().map(|sync| {
            for channel in &response.channels {
                sync.add_active_channel(channel.cid.clone());
            }
            sync.clone()
        });

        // Persist under the session lock so a concurrent batch cannot
        // overwrite this snapshot with an older one.
        self.query_specs.insert_query_spec(&snapshot).await?;
        if let Some(sync) = sync_snapshot {
            self.sync_states.insert_sync_state(&sync).await?;
        }

        Ok(FetchOutcome::Applied { count })
    }

    /// Record a failed fetch: the query needs recovery unless it was
    /// cancelled in the meantime.
    pub(crate) async fn fail_fetch(&self, ticket: &FetchTicket) {
        let mut state = self.state.lock().await;
        let fetch = state.fetches.entry(ticket.query_id).or_default();
        if fetch.generation == ticket.generation {
            fetch.recovery_needed = true;
        }
    }
}
