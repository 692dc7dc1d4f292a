//! Event dispatcher: applies real-time batches to the cached state.
//!
//! One dispatcher per session. Batches serialize on the session lock,
//! so concurrent socket events and fetch completions never interleave
//! their writes. Within a batch the flow is:
//!
//! 1. Pre-resolve cached channels for every cid in the batch in one
//!    repository round-trip. Decisions then consult only this resident
//!    snapshot - no I/O mid-decision.
//! 2. For each event in delivery order: update local storage, then ask
//!    the handler for each watched query's membership decision and apply
//!    it. A failure on one event is logged and the loop continues.
//! 3. Post pass: re-place channels whose sort keys changed, fold users
//!    and the self-user, persist mutated specs and sync state.

use std::collections::HashMap;
use std::sync::Arc;

use chat_core::{merge_delta, ChatEventHandlerFactory, EventHandlingResult};
use chat_store::{
    ChannelRepository, MessageRepository, QuerySpecRepository, SyncStateRepository,
    UserRepository,
};
use chat_types::{Channel, ChatEvent, Cid, QueryId, SelfUser, User, UserId};

use crate::api::ChatApi;
use crate::state::{SessionState, SharedState};

pub(crate) struct EventDispatcher {
    state: SharedState,
    users: Arc<dyn UserRepository>,
    channels: Arc<dyn ChannelRepository>,
    messages: Arc<dyn MessageRepository>,
    query_specs: Arc<dyn QuerySpecRepository>,
    sync_states: Arc<dyn SyncStateRepository>,
    api: Arc<dyn ChatApi>,
    handler_factory: Arc<dyn ChatEventHandlerFactory>,
}

impl EventDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        state: SharedState,
        users: Arc<dyn UserRepository>,
        channels: Arc<dyn ChannelRepository>,
        messages: Arc<dyn MessageRepository>,
        query_specs: Arc<dyn QuerySpecRepository>,
        sync_states: Arc<dyn SyncStateRepository>,
        api: Arc<dyn ChatApi>,
        handler_factory: Arc<dyn ChatEventHandlerFactory>,
    ) -> Self {
        Self {
            state,
            users,
            channels,
            messages,
            query_specs,
            sync_states,
            api,
            handler_factory,
        }
    }

    /// Apply a batch of events in delivery order. Returns the number of
    /// events processed; without an authenticated user the batch is
    /// dropped.
    pub(crate) async fn dispatch(&self, events: &[ChatEvent]) -> usize {
        if events.is_empty() {
            return 0;
        }

        let mut state = self.state.lock().await;
        let Some(current_user) = state.current_user_id() else {
            tracing::warn!(count = events.len(), "dropping events: no authenticated user");
            return 0;
        };
        let handler = self.handler_factory.create(&current_user);

        // Pre-resolve every channel the batch touches, plus everything
        // the watched queries currently track so sorted inserts can
        // compare against their neighbors.
        let mut cids: Vec<Cid> = Vec::new();
        for event in events {
            if let Some(cid) = event.cid() {
                if !cids.contains(cid) {
                    cids.push(cid.clone());
                }
            }
        }
        for spec in state.specs.iter() {
            for cid in spec.cids() {
                if !cids.contains(cid) {
                    cids.push(cid.clone());
                }
            }
        }
        let mut resident: HashMap<Cid, Channel> = match self.channels.select_channels(&cids).await
        {
            Ok(list) => list.into_iter().map(|c| (c.cid.clone(), c)).collect(),
            Err(error) => {
                tracing::warn!(%error, "channel pre-resolution failed; continuing without cache");
                HashMap::new()
            }
        };

        let mut dirty: Vec<QueryId> = Vec::new();
        let mut touched: Vec<Cid> = Vec::new();
        let mut users_seen: Vec<User> = Vec::new();
        let mut sync_dirty = false;

        for event in events {
            self.update_storage(
                &mut state,
                &current_user,
                event,
                &mut resident,
                &mut touched,
                &mut users_seen,
                &mut sync_dirty,
            )
            .await;
            self.update_queries(&mut state, handler.as_ref(), event, &mut resident, &mut dirty)
                .await;
        }

        self.finish_batch(&mut state, &resident, &touched, &mut dirty, &users_seen)
            .await;

        if sync_dirty {
            if let Some(sync) = state.sync_state.clone() {
                if let Err(error) = self.sync_states.insert_sync_state(&sync).await {
                    tracing::warn!(%error, "failed to persist sync state");
                }
            }
        }

        events.len()
    }

    /// Local-storage effects of one event. Failures are logged; the
    /// batch continues.
    #[allow(clippy::too_many_arguments)]
    async fn update_storage(
        &self,
        state: &mut SessionState,
        current_user: &UserId,
        event: &ChatEvent,
        resident: &mut HashMap<Cid, Channel>,
        touched: &mut Vec<Cid>,
        users_seen: &mut Vec<User>,
        sync_dirty: &mut bool,
    ) {
        // Message payloads land in the message store.
        if let Some(message) = event.message() {
            let result = match event {
                ChatEvent::MessageDeleted { hard: true, .. } => {
                    self.messages.delete_message(&message.id).await
                }
                _ => {
                    self.messages
                        .upsert_messages(std::slice::from_ref(message))
                        .await
                }
            };
            if let Err(error) = result {
                tracing::warn!(%error, message = %message.id, "message write failed");
            }
        }

        match event {
            // Full snapshots replace the cached channel wholesale.
            ChatEvent::ChannelCreated { channel, .. }
            | ChatEvent::ChannelUpdated { channel, .. }
            | ChatEvent::NotificationAddedToChannel { channel, .. }
            | ChatEvent::NotificationMessageNew { channel, .. } => {
                if let Err(error) = self
                    .channels
                    .upsert_channels(std::slice::from_ref(channel))
                    .await
                {
                    tracing::warn!(%error, cid = %channel.cid, "channel write failed");
                }
                resident.insert(channel.cid.clone(), channel.clone());
                note_touched(touched, &channel.cid);
            }

            ChatEvent::ChannelDeleted { cid, .. } => {
                if let Err(error) = self.channels.delete_channel(cid).await {
                    tracing::warn!(%error, %cid, "channel delete failed");
                }
                resident.remove(cid);
            }

            // Delta events fold into the resident snapshot when one
            // exists. merge_delta is idempotent, so the handler merging
            // again on the already-merged snapshot is harmless.
            ChatEvent::NewMessage { cid, .. }
            | ChatEvent::MessageUpdated { cid, .. }
            | ChatEvent::MessageDeleted { cid, .. }
            | ChatEvent::ReactionNew { cid, .. }
            | ChatEvent::MemberAdded { cid, .. }
            | ChatEvent::MemberRemoved { cid, .. }
            | ChatEvent::ChannelTruncated { cid, .. }
            | ChatEvent::ChannelHidden { cid, .. }
            | ChatEvent::ChannelVisible { cid, .. }
            | ChatEvent::NotificationRemovedFromChannel { cid, .. } => {
                if let Some(cached) = resident.get(cid) {
                    let merged = merge_delta(cached, event);
                    if let Err(error) = self
                        .channels
                        .upsert_channels(std::slice::from_ref(&merged))
                        .await
                    {
                        tracing::warn!(%error, %cid, "channel write failed");
                    }
                    resident.insert(cid.clone(), merged);
                    note_touched(touched, cid);
                }
            }

            ChatEvent::UserUpdated { user, .. } => {
                users_seen.push(user.clone());
                if let Some(current) = state.self_user.take() {
                    state.self_user = Some(if &user.id == current_user {
                        current.merge(SelfUser::Full(user.clone()))
                    } else {
                        current
                    });
                }
            }

            ChatEvent::UserPresenceChanged { user, .. } => {
                users_seen.push(user.clone());
                if let Some(current) = state.self_user.take() {
                    state.self_user = Some(if &user.id == current_user {
                        current.merge(SelfUser::Part(user.clone()))
                    } else {
                        current
                    });
                }
            }

            ChatEvent::MarkAllRead {
                user_id,
                created_at,
            } => {
                if user_id == current_user {
                    if let Some(sync) = state.sync_state.as_mut() {
                        if sync.mark_all_read(*created_at) {
                            *sync_dirty = true;
                        }
                    }
                }
            }

            ChatEvent::HealthCheck { .. } => {}
        }
    }

    /// Membership decisions for one event across every watched query.
    async fn update_queries(
        &self,
        state: &mut SessionState,
        handler: &dyn chat_core::ChatEventHandler,
        event: &ChatEvent,
        resident: &mut HashMap<Cid, Channel>,
        dirty: &mut Vec<QueryId>,
    ) {
        let SessionState {
            specs, sync_state, ..
        } = state;

        for spec in specs.iter_mut() {
            let cached = event.cid().and_then(|cid| resident.get(cid));
            let decision = handler.handle_event(event, spec, cached);
            match decision {
                EventHandlingResult::Skip => {}

                EventHandlingResult::Add(channel) => {
                    if let Err(error) = self
                        .channels
                        .upsert_channels(std::slice::from_ref(&channel))
                        .await
                    {
                        tracing::warn!(%error, cid = %channel.cid, "channel write failed; skipping add");
                        continue;
                    }
                    spec.insert(&channel, |cid| resident.get(cid).cloned());
                    note_dirty(dirty, spec.id());
                    if let Some(sync) = sync_state.as_mut() {
                        sync.add_active_channel(channel.cid.clone());
                    }
                    resident.insert(channel.cid.clone(), channel);
                }

                EventHandlingResult::WatchAndAdd(cid) => match self.api.watch_channel(&cid).await
                {
                    Ok(channel) => {
                        // The watched state is fresher than the event;
                        // re-check the filter against it.
                        if spec.filter().matches(&channel) {
                            if let Err(error) = self
                                .channels
                                .upsert_channels(std::slice::from_ref(&channel))
                                .await
                            {
                                tracing::warn!(%error, %cid, "channel write failed; skipping add");
                                continue;
                            }
                            spec.insert(&channel, |c| resident.get(c).cloned());
                            note_dirty(dirty, spec.id());
                            if let Some(sync) = sync_state.as_mut() {
                                sync.add_active_channel(cid.clone());
                            }
                            resident.insert(cid, channel);
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%cid, %error, "watch failed; leaving query unchanged");
                    }
                },

                EventHandlingResult::Remove(cid) => {
                    spec.remove(&cid);
                    note_dirty(dirty, spec.id());
                }
            }
        }
    }

    /// Post pass: reposition, user inserts, spec persistence.
    async fn finish_batch(
        &self,
        state: &mut SessionState,
        resident: &HashMap<Cid, Channel>,
        touched: &[Cid],
        dirty: &mut Vec<QueryId>,
        users_seen: &[User],
    ) {
        for cid in touched {
            let Some(channel) = resident.get(cid) else {
                continue;
            };
            for spec in state.specs.iter_mut() {
                if spec.contains(cid) {
                    spec.reposition(channel, |c| resident.get(c).cloned());
                    note_dirty(dirty, spec.id());
                }
            }
        }

        if !users_seen.is_empty() {
            if let Err(error) = self.users.insert_users(users_seen).await {
                tracing::warn!(%error, "user write failed");
            }
        }

        for id in dirty.iter() {
            if let Some(spec) = state.specs.by_id(*id) {
                let snapshot = spec.snapshot();
                if let Err(error) = self.query_specs.insert_query_spec(&snapshot).await {
                    tracing::warn!(%error, query = %id, "query spec write failed");
                }
            }
        }
    }
}

fn note_touched(touched: &mut Vec<Cid>, cid: &Cid) {
    if !touched.contains(cid) {
        touched.push(cid.clone());
    }
}

fn note_dirty(dirty: &mut Vec<QueryId>, id: QueryId) {
    if !dirty.contains(&id) {
        dirty.push(id);
    }
}
