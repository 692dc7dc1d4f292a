//! Mock API for testing.
//!
//! Allows queueing responses and capturing requests for verification.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use chat_types::{Channel, ChatEvent, Cid, Timestamp};

use super::{ApiError, ChatApi, QueryChannelsRequest, QueryChannelsResponse};

/// Mock API for testing.
///
/// Allows queueing responses and capturing requests for verification.
/// Clones share state.
#[derive(Default)]
pub struct MockChatApi {
    inner: Arc<Mutex<MockChatApiInner>>,
}

#[derive(Default)]
struct MockChatApiInner {
    channel_pages: VecDeque<QueryChannelsResponse>,
    watchable: HashMap<Cid, Channel>,
    sync_batches: VecDeque<Vec<ChatEvent>>,
    fail_next_query: Option<ApiError>,
    fail_next_watch: Option<ApiError>,
    fail_next_sync: Option<ApiError>,
    query_requests: Vec<QueryChannelsRequest>,
    watch_requests: Vec<Cid>,
    sync_requests: Vec<(Vec<Cid>, Timestamp)>,
}

impl MockChatApi {
    /// Create a new mock API.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a page to be returned by the next `query_channels` call.
    /// With nothing queued, queries return an empty page.
    pub fn queue_page(&self, response: QueryChannelsResponse) {
        let mut inner = self.inner.lock().unwrap();
        inner.channel_pages.push_back(response);
    }

    /// Queue a page holding just channels.
    pub fn queue_channels(&self, channels: Vec<Channel>) {
        self.queue_page(QueryChannelsResponse {
            channels,
            configs: Vec::new(),
        });
    }

    /// Make a channel watchable; `watch_channel` returns it.
    pub fn put_watchable(&self, channel: Channel) {
        let mut inner = self.inner.lock().unwrap();
        inner.watchable.insert(channel.cid.clone(), channel);
    }

    /// Queue an event batch to be returned by the next `sync_events`
    /// call. With nothing queued, sync returns no events.
    pub fn queue_sync_batch(&self, events: Vec<ChatEvent>) {
        let mut inner = self.inner.lock().unwrap();
        inner.sync_batches.push_back(events);
    }

    /// Cause the next `query_channels` to fail with the given error.
    pub fn fail_next_query(&self, error: ApiError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_query = Some(error);
    }

    /// Cause the next `watch_channel` to fail with the given error.
    pub fn fail_next_watch(&self, error: ApiError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_watch = Some(error);
    }

    /// Cause the next `sync_events` to fail with the given error.
    pub fn fail_next_sync(&self, error: ApiError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_sync = Some(error);
    }

    /// All captured `query_channels` requests.
    pub fn query_requests(&self) -> Vec<QueryChannelsRequest> {
        self.inner.lock().unwrap().query_requests.clone()
    }

    /// All captured `watch_channel` requests.
    pub fn watch_requests(&self) -> Vec<Cid> {
        self.inner.lock().unwrap().watch_requests.clone()
    }

    /// All captured `sync_events` requests.
    pub fn sync_requests(&self) -> Vec<(Vec<Cid>, Timestamp)> {
        self.inner.lock().unwrap().sync_requests.clone()
    }

    /// Clear all state (queues, captures, forced failures).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockChatApiInner::default();
    }
}

impl Clone for MockChatApi {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn query_channels(
        &self,
        request: &QueryChannelsRequest,
    ) -> Result<QueryChannelsResponse, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.query_requests.push(request.clone());

        if let Some(error) = inner.fail_next_query.take() {
            return Err(error);
        }

        Ok(inner.channel_pages.pop_front().unwrap_or_default())
    }

    async fn watch_channel(&self, cid: &Cid) -> Result<Channel, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.watch_requests.push(cid.clone());

        if let Some(error) = inner.fail_next_watch.take() {
            return Err(error);
        }

        inner
            .watchable
            .get(cid)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(cid.to_string()))
    }

    async fn sync_events(
        &self,
        cids: &[Cid],
        since: Timestamp,
    ) -> Result<Vec<ChatEvent>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.sync_requests.push((cids.to_vec(), since));

        if let Some(error) = inner.fail_next_sync.take() {
            return Err(error);
        }

        Ok(inner.sync_batches.pop_front().unwrap_or_default())
    }
}
