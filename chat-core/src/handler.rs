//! Event-handling decisions for channel-list queries.
//!
//! This is a pure state machine: given an incoming real-time event, one
//! watched query's current spec, and the cached channel snapshot (when
//! resident), it decides the event's effect on that query's membership.
//! The decision is an instruction - [`EventHandlingResult`] - interpreted
//! by the client layer, which performs the actual I/O. No decision ever
//! blocks or fails.

use chat_types::{Channel, ChatEvent, Cid, UserId};

use crate::query_spec::QueryChannelsSpec;

/// The effect of one event on one watched query.
#[derive(Debug, Clone, PartialEq)]
pub enum EventHandlingResult {
    /// Insert the channel at its sort-correct position.
    Add(Channel),
    /// The channel should join the result set, but it is not watched:
    /// watch it first, then add the fetched state (re-checking the
    /// filter against it).
    WatchAndAdd(Cid),
    /// Remove the channel from the result set.
    Remove(Cid),
    /// The event does not affect this query.
    Skip,
}

/// Decides how a real-time event mutates one query's membership.
///
/// Implementations must be pure and synchronous: they consult only the
/// arguments, never I/O.
pub trait ChatEventHandler: Send + Sync {
    /// Decide the effect of `event` on `spec`, given the cached snapshot
    /// of the event's channel (when one is resident).
    fn handle_event(
        &self,
        event: &ChatEvent,
        spec: &QueryChannelsSpec,
        cached: Option<&Channel>,
    ) -> EventHandlingResult;
}

/// Vends an event handler per authenticated user.
///
/// Swapping in a custom factory changes decision behavior for every
/// watched query; [`DefaultChatEventHandler`] remains exported so custom
/// handlers can delegate to it as a fallback.
pub trait ChatEventHandlerFactory: Send + Sync {
    /// Create a handler for the given user.
    fn create(&self, current_user: &UserId) -> std::sync::Arc<dyn ChatEventHandler>;
}

/// Factory for the default decision behavior.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultChatEventHandlerFactory;

impl ChatEventHandlerFactory for DefaultChatEventHandlerFactory {
    fn create(&self, current_user: &UserId) -> std::sync::Arc<dyn ChatEventHandler> {
        std::sync::Arc::new(DefaultChatEventHandler::new(current_user.clone()))
    }
}

/// Whether a joining channel can be added directly or must be watched
/// first.
#[derive(Clone, Copy)]
enum AddMode {
    Direct,
    Watch,
}

/// The default decision behavior.
///
/// Events carrying a full channel snapshot re-evaluate the filter against
/// that snapshot. Delta events re-evaluate against the cached snapshot
/// merged with the event's fields - the event wins for fields it carries,
/// the cache wins otherwise. Events about channels that are neither
/// relevant nor present are skipped without mutation.
#[derive(Debug, Clone)]
pub struct DefaultChatEventHandler {
    current_user: UserId,
}

impl DefaultChatEventHandler {
    /// Create a handler deciding on behalf of the given user.
    pub fn new(current_user: UserId) -> Self {
        Self { current_user }
    }

    fn add_or_remove(
        spec: &QueryChannelsSpec,
        channel: &Channel,
        mode: AddMode,
    ) -> EventHandlingResult {
        let matches = spec.filter().matches(channel);
        let present = spec.contains(&channel.cid);
        match (matches, present) {
            (true, false) => match mode {
                AddMode::Direct => EventHandlingResult::Add(channel.clone()),
                AddMode::Watch => EventHandlingResult::WatchAndAdd(channel.cid.clone()),
            },
            (false, true) => EventHandlingResult::Remove(channel.cid.clone()),
            _ => EventHandlingResult::Skip,
        }
    }

    fn remove_if_present(spec: &QueryChannelsSpec, cid: &Cid) -> EventHandlingResult {
        if spec.contains(cid) {
            EventHandlingResult::Remove(cid.clone())
        } else {
            EventHandlingResult::Skip
        }
    }

    fn delta(
        spec: &QueryChannelsSpec,
        cid: &Cid,
        cached: Option<&Channel>,
        event: &ChatEvent,
    ) -> EventHandlingResult {
        let Some(cached) = cached else {
            // No resident state to re-evaluate against. An absent channel
            // stays absent; a present one is left for the next fetch.
            return EventHandlingResult::Skip;
        };
        let merged = merge_delta(cached, event);
        let matches = spec.filter().matches(&merged);
        let present = spec.contains(cid);
        match (matches, present) {
            (true, false) => EventHandlingResult::Add(merged),
            (false, true) => EventHandlingResult::Remove(cid.clone()),
            _ => EventHandlingResult::Skip,
        }
    }
}

impl ChatEventHandler for DefaultChatEventHandler {
    fn handle_event(
        &self,
        event: &ChatEvent,
        spec: &QueryChannelsSpec,
        cached: Option<&Channel>,
    ) -> EventHandlingResult {
        match event {
            ChatEvent::ChannelCreated { channel, .. }
            | ChatEvent::ChannelUpdated { channel, .. } => {
                Self::add_or_remove(spec, channel, AddMode::Direct)
            }

            // Membership and message notifications arrive for channels
            // the user is not watching: joining ones must be watched
            // before their events flow.
            ChatEvent::NotificationAddedToChannel { channel, .. }
            | ChatEvent::NotificationMessageNew { channel, .. } => {
                Self::add_or_remove(spec, channel, AddMode::Watch)
            }

            ChatEvent::ChannelDeleted { cid, .. } => Self::remove_if_present(spec, cid),

            ChatEvent::ChannelHidden { cid, user_id, .. } => {
                if user_id == &self.current_user {
                    Self::remove_if_present(spec, cid)
                } else {
                    EventHandlingResult::Skip
                }
            }

            ChatEvent::ChannelVisible { cid, user_id, .. } => {
                if user_id != &self.current_user {
                    return EventHandlingResult::Skip;
                }
                match cached {
                    Some(_) => Self::delta(spec, cid, cached, event),
                    // Never cached: watch to obtain state, re-check then.
                    None if !spec.contains(cid) => {
                        EventHandlingResult::WatchAndAdd(cid.clone())
                    }
                    None => EventHandlingResult::Skip,
                }
            }

            ChatEvent::NotificationRemovedFromChannel { cid, user_id, .. } => {
                if user_id == &self.current_user {
                    Self::remove_if_present(spec, cid)
                } else {
                    Self::delta(spec, cid, cached, event)
                }
            }

            ChatEvent::NewMessage { cid, .. }
            | ChatEvent::MessageUpdated { cid, .. }
            | ChatEvent::MessageDeleted { cid, .. }
            | ChatEvent::ReactionNew { cid, .. }
            | ChatEvent::MemberAdded { cid, .. }
            | ChatEvent::MemberRemoved { cid, .. }
            | ChatEvent::ChannelTruncated { cid, .. } => Self::delta(spec, cid, cached, event),

            ChatEvent::UserPresenceChanged { .. }
            | ChatEvent::UserUpdated { .. }
            | ChatEvent::MarkAllRead { .. }
            | ChatEvent::HealthCheck { .. } => EventHandlingResult::Skip,
        }
    }
}

/// Merge an event's delta fields into a cached channel snapshot.
///
/// The event wins for every field it carries; the cache wins otherwise.
/// Returns the merged snapshot, leaving the input untouched.
pub fn merge_delta(cached: &Channel, event: &ChatEvent) -> Channel {
    let mut merged = cached.clone();
    match event {
        ChatEvent::NewMessage { message, .. }
        | ChatEvent::NotificationMessageNew { message, .. } => {
            merged.last_message_at = Some(match merged.last_message_at {
                Some(at) => at.max(message.created_at),
                None => message.created_at,
            });
            if !message.shadowed {
                merged.hidden = false;
            }
        }
        ChatEvent::MemberAdded { member, .. } => {
            if !merged.members.iter().any(|m| m.user_id == member.user_id) {
                merged.members.push(member.clone());
                merged.member_count = merged.member_count.saturating_add(1);
            }
        }
        ChatEvent::MemberRemoved { user_id, .. }
        | ChatEvent::NotificationRemovedFromChannel { user_id, .. } => {
            let before = merged.members.len();
            merged.members.retain(|m| &m.user_id != user_id);
            if merged.members.len() != before {
                merged.member_count = merged.member_count.saturating_sub(1);
            }
        }
        ChatEvent::ChannelTruncated { created_at, .. } => {
            merged.last_message_at = None;
            merged.updated_at = merged.updated_at.max(*created_at);
        }
        ChatEvent::ChannelHidden { .. } => merged.hidden = true,
        ChatEvent::ChannelVisible { .. } => merged.hidden = false,
        // Edits, deletions, and reactions carry no fields the channel
        // snapshot tracks; the cache wins wholesale.
        _ => {}
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_types::{Filter, Member, Message, SortField, SortSpec, Timestamp};

    fn handler() -> DefaultChatEventHandler {
        DefaultChatEventHandler::new(UserId::new("me"))
    }

    fn red_spec() -> QueryChannelsSpec {
        QueryChannelsSpec::new(
            Filter::eq("team", "red"),
            SortSpec::new([SortField::desc("last_message_at")]),
        )
    }

    fn channel(id: &str, team: &str, last_message_at: Option<i64>) -> Channel {
        let mut ch = Channel::new(Cid::new("messaging", id), Timestamp::from_millis(10));
        ch.team = team.to_string();
        ch.last_message_at = last_message_at.map(Timestamp::from_millis);
        ch
    }

    fn message(cid: &Cid, at: i64) -> Message {
        Message {
            id: format!("m-{at}"),
            cid: cid.clone(),
            user_id: UserId::new("sender"),
            text: "hi".to_string(),
            created_at: Timestamp::from_millis(at),
            deleted_at: None,
            shadowed: false,
        }
    }

    fn created(channel: &Channel) -> ChatEvent {
        ChatEvent::ChannelCreated {
            channel: channel.clone(),
            created_at: channel.created_at,
        }
    }

    #[test]
    fn matching_created_channel_is_added() {
        let spec = red_spec();
        let ch = channel("x", "red", None);

        let result = handler().handle_event(&created(&ch), &spec, None);
        assert_eq!(result, EventHandlingResult::Add(ch));
    }

    #[test]
    fn non_matching_created_channel_is_skipped() {
        let spec = red_spec();
        let ch = channel("x", "blue", None);

        let result = handler().handle_event(&created(&ch), &spec, None);
        assert_eq!(result, EventHandlingResult::Skip);
    }

    #[test]
    fn update_away_from_filter_removes() {
        let mut spec = red_spec();
        let mut ch = channel("x", "red", None);
        spec.replace(std::slice::from_ref(&ch));

        ch.team = "blue".to_string();
        let event = ChatEvent::ChannelUpdated {
            channel: ch.clone(),
            created_at: Timestamp::from_millis(20),
        };

        let result = handler().handle_event(&event, &spec, None);
        assert_eq!(result, EventHandlingResult::Remove(ch.cid));
    }

    #[test]
    fn present_and_still_matching_is_noop() {
        let mut spec = red_spec();
        let ch = channel("x", "red", None);
        spec.replace(std::slice::from_ref(&ch));

        let event = ChatEvent::ChannelUpdated {
            channel: ch,
            created_at: Timestamp::from_millis(20),
        };
        assert_eq!(
            handler().handle_event(&event, &spec, None),
            EventHandlingResult::Skip
        );
    }

    #[test]
    fn added_to_channel_notification_watches_before_adding() {
        let spec = red_spec();
        let ch = channel("x", "red", None);
        let event = ChatEvent::NotificationAddedToChannel {
            channel: ch.clone(),
            member: Member::new("me"),
            created_at: Timestamp::from_millis(20),
        };

        assert_eq!(
            handler().handle_event(&event, &spec, None),
            EventHandlingResult::WatchAndAdd(ch.cid)
        );
    }

    #[test]
    fn delete_removes_only_present_channels() {
        let mut spec = red_spec();
        let ch = channel("x", "red", None);
        spec.replace(std::slice::from_ref(&ch));

        let event = ChatEvent::ChannelDeleted {
            cid: ch.cid.clone(),
            created_at: Timestamp::from_millis(20),
        };
        assert_eq!(
            handler().handle_event(&event, &spec, None),
            EventHandlingResult::Remove(ch.cid.clone())
        );

        let absent = ChatEvent::ChannelDeleted {
            cid: Cid::new("messaging", "other"),
            created_at: Timestamp::from_millis(20),
        };
        assert_eq!(
            handler().handle_event(&absent, &spec, None),
            EventHandlingResult::Skip
        );
    }

    #[test]
    fn hidden_for_this_user_removes() {
        let mut spec = red_spec();
        let ch = channel("x", "red", None);
        spec.replace(std::slice::from_ref(&ch));

        let mine = ChatEvent::ChannelHidden {
            cid: ch.cid.clone(),
            user_id: UserId::new("me"),
            clear_history: false,
            created_at: Timestamp::from_millis(20),
        };
        assert_eq!(
            handler().handle_event(&mine, &spec, None),
            EventHandlingResult::Remove(ch.cid.clone())
        );

        let theirs = ChatEvent::ChannelHidden {
            cid: ch.cid,
            user_id: UserId::new("someone-else"),
            clear_history: false,
            created_at: Timestamp::from_millis(20),
        };
        assert_eq!(
            handler().handle_event(&theirs, &spec, None),
            EventHandlingResult::Skip
        );
    }

    #[test]
    fn visible_with_cached_state_readds() {
        let spec = red_spec();
        let mut cached = channel("x", "red", None);
        cached.hidden = true;

        let event = ChatEvent::ChannelVisible {
            cid: cached.cid.clone(),
            user_id: UserId::new("me"),
            created_at: Timestamp::from_millis(20),
        };
        match handler().handle_event(&event, &spec, Some(&cached)) {
            EventHandlingResult::Add(ch) => {
                assert_eq!(ch.cid, cached.cid);
                assert!(!ch.hidden);
            }
            other => panic!("expected Add, got {other:?}"),
        }
    }

    #[test]
    fn visible_without_cache_watches() {
        let spec = red_spec();
        let cid = Cid::new("messaging", "x");
        let event = ChatEvent::ChannelVisible {
            cid: cid.clone(),
            user_id: UserId::new("me"),
            created_at: Timestamp::from_millis(20),
        };
        assert_eq!(
            handler().handle_event(&event, &spec, None),
            EventHandlingResult::WatchAndAdd(cid)
        );
    }

    #[test]
    fn delta_without_cache_is_noop() {
        let spec = red_spec();
        let cid = Cid::new("messaging", "unknown");
        let event = ChatEvent::NewMessage {
            cid: cid.clone(),
            message: message(&cid, 50),
            created_at: Timestamp::from_millis(50),
        };
        assert_eq!(
            handler().handle_event(&event, &spec, None),
            EventHandlingResult::Skip
        );
    }

    #[test]
    fn member_delta_drives_membership_filters() {
        let spec = QueryChannelsSpec::new(
            Filter::contains("members", "me"),
            SortSpec::default(),
        );
        let cached = channel("x", "red", None);

        let join = ChatEvent::MemberAdded {
            cid: cached.cid.clone(),
            member: Member::new("me"),
            created_at: Timestamp::from_millis(20),
        };
        match handler().handle_event(&join, &spec, Some(&cached)) {
            EventHandlingResult::Add(ch) => {
                assert!(ch.member_ids().any(|id| id.as_str() == "me"));
                assert_eq!(ch.member_count, 1);
            }
            other => panic!("expected Add, got {other:?}"),
        }
    }

    #[test]
    fn member_removed_drops_from_membership_query() {
        let mut spec = QueryChannelsSpec::new(
            Filter::contains("members", "me"),
            SortSpec::default(),
        );
        let mut cached = channel("x", "red", None);
        cached.members.push(Member::new("me"));
        cached.member_count = 1;
        spec.replace(std::slice::from_ref(&cached));

        let leave = ChatEvent::MemberRemoved {
            cid: cached.cid.clone(),
            user_id: UserId::new("me"),
            created_at: Timestamp::from_millis(20),
        };
        assert_eq!(
            handler().handle_event(&leave, &spec, Some(&cached)),
            EventHandlingResult::Remove(cached.cid)
        );
    }

    #[test]
    fn presence_and_keepalive_are_skipped() {
        let spec = red_spec();
        let h = handler();
        let events = [
            ChatEvent::UserPresenceChanged {
                user: chat_types::User::new("someone"),
                created_at: Timestamp::from_millis(1),
            },
            ChatEvent::MarkAllRead {
                user_id: UserId::new("me"),
                created_at: Timestamp::from_millis(1),
            },
            ChatEvent::HealthCheck {
                created_at: Timestamp::from_millis(1),
            },
        ];
        for event in &events {
            assert_eq!(h.handle_event(event, &spec, None), EventHandlingResult::Skip);
        }
    }

    #[test]
    fn merge_keeps_cache_fields_the_event_lacks() {
        let mut cached = channel("x", "red", Some(100));
        cached.member_count = 7;
        let cid = cached.cid.clone();

        let event = ChatEvent::NewMessage {
            cid: cid.clone(),
            message: message(&cid, 500),
            created_at: Timestamp::from_millis(500),
        };
        let merged = merge_delta(&cached, &event);

        // Event wins for the field it carries...
        assert_eq!(merged.last_message_at, Some(Timestamp::from_millis(500)));
        // ...cache wins for everything else.
        assert_eq!(merged.team, "red");
        assert_eq!(merged.member_count, 7);
    }

    #[test]
    fn merge_never_moves_last_message_backward() {
        let cached = channel("x", "red", Some(900));
        let cid = cached.cid.clone();
        let event = ChatEvent::NewMessage {
            cid: cid.clone(),
            message: message(&cid, 200),
            created_at: Timestamp::from_millis(200),
        };
        assert_eq!(
            merge_delta(&cached, &event).last_message_at,
            Some(Timestamp::from_millis(900))
        );
    }

    #[test]
    fn shadowed_message_does_not_unhide() {
        let mut cached = channel("x", "red", None);
        cached.hidden = true;
        let cid = cached.cid.clone();

        let mut shadowed = message(&cid, 300);
        shadowed.shadowed = true;
        let event = ChatEvent::NewMessage {
            cid,
            message: shadowed,
            created_at: Timestamp::from_millis(300),
        };
        assert!(merge_delta(&cached, &event).hidden);
    }

    #[test]
    fn truncation_clears_last_message() {
        let cached = channel("x", "red", Some(900));
        let event = ChatEvent::ChannelTruncated {
            cid: cached.cid.clone(),
            created_at: Timestamp::from_millis(1_000),
        };
        let merged = merge_delta(&cached, &event);
        assert_eq!(merged.last_message_at, None);
        assert_eq!(merged.updated_at, Timestamp::from_millis(1_000));
    }

    /// Constructing a channel set purely through lifecycle events must
    /// leave the watched set equal to the filtered set.
    #[test]
    fn lifecycle_events_reconstruct_filtered_set() {
        let h = handler();
        let mut spec = red_spec();

        let channels = [
            channel("a", "red", Some(100)),
            channel("b", "blue", Some(200)),
            channel("c", "red", Some(300)),
            channel("d", "", None),
        ];

        let mut resident: Vec<Channel> = Vec::new();
        for ch in &channels {
            let event = created(ch);
            match h.handle_event(&event, &spec, None) {
                EventHandlingResult::Add(added) => {
                    let snapshot = resident.clone();
                    spec.insert(&added, move |cid| {
                        snapshot.iter().find(|c| &c.cid == cid).cloned()
                    });
                    resident.push(added);
                }
                EventHandlingResult::Skip => {}
                other => panic!("unexpected result {other:?}"),
            }
        }

        let expected: Vec<Cid> = channels
            .iter()
            .filter(|c| spec.filter().matches(c))
            .map(|c| c.cid.clone())
            .collect();
        let mut got: Vec<Cid> = spec.cids().to_vec();
        got.sort();
        let mut expected = expected;
        expected.sort();
        assert_eq!(got, expected);
    }

    /// X created, Y created with a newer message, X's team flips to
    /// blue: membership and ordering follow each step.
    #[test]
    fn red_team_scenario() {
        let h = handler();
        let mut spec = red_spec();
        let mut resident: Vec<Channel> = Vec::new();

        // "channel X created, team=red" → X present, first position.
        let x = channel("x", "red", Some(1_000));
        match h.handle_event(&created(&x), &spec, None) {
            EventHandlingResult::Add(added) => {
                spec.insert(&added, |_| None);
                resident.push(added);
            }
            other => panic!("expected Add, got {other:?}"),
        }
        assert_eq!(spec.cids()[0].channel_id(), "x");

        // "channel Y created, newer last_message_at" → Y before X.
        let y = channel("y", "red", Some(2_000));
        match h.handle_event(&created(&y), &spec, None) {
            EventHandlingResult::Add(added) => {
                let snapshot = resident.clone();
                spec.insert(&added, move |cid| {
                    snapshot.iter().find(|c| &c.cid == cid).cloned()
                });
                resident.push(added);
            }
            other => panic!("expected Add, got {other:?}"),
        }
        let ids: Vec<&str> = spec.cids().iter().map(Cid::channel_id).collect();
        assert_eq!(ids, vec!["y", "x"]);

        // "X's team changed to blue" → X removed, set = {Y}.
        let mut x_blue = x;
        x_blue.team = "blue".to_string();
        let event = ChatEvent::ChannelUpdated {
            channel: x_blue.clone(),
            created_at: Timestamp::from_millis(3_000),
        };
        match h.handle_event(&event, &spec, Some(&x_blue)) {
            EventHandlingResult::Remove(cid) => {
                spec.remove(&cid);
            }
            other => panic!("expected Remove, got {other:?}"),
        }
        let ids: Vec<&str> = spec.cids().iter().map(Cid::channel_id).collect();
        assert_eq!(ids, vec!["y"]);
    }

    #[test]
    fn factory_vends_default_handler() {
        let factory = DefaultChatEventHandlerFactory;
        let h = factory.create(&UserId::new("me"));
        let spec = red_spec();
        let ch = channel("x", "red", None);
        assert_eq!(
            h.handle_event(&created(&ch), &spec, None),
            EventHandlingResult::Add(ch)
        );
    }
}
