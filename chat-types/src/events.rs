//! Typed real-time events.
//!
//! Events arrive from the socket in server-delivery order and drive the
//! offline cache. Each variant carries the server-side `created_at`;
//! channel-scoped variants expose their [`Cid`], and some carry a full
//! channel snapshot that takes precedence over cached state.
//!
//! Wire payloads are JSON objects tagged by a `"type"` field. Decoding a
//! malformed payload yields an [`EventParseError`] value - consumers drop
//! the single event and keep processing.

use serde::{Deserialize, Serialize};

use crate::error::EventParseError;
use crate::ids::{Cid, Timestamp, UserId};
use crate::models::{Channel, Member, Message, User};

/// A real-time event from the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A channel was created.
    ChannelCreated {
        /// Full channel snapshot.
        channel: Channel,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// A channel's data changed.
    ChannelUpdated {
        /// Full channel snapshot.
        channel: Channel,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// A channel was deleted.
    ChannelDeleted {
        /// The deleted channel.
        cid: Cid,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// A user hid a channel from their channel list.
    ChannelHidden {
        /// The hidden channel.
        cid: Cid,
        /// The user the channel is hidden for.
        user_id: UserId,
        /// Whether history before the event is cleared.
        #[serde(default)]
        clear_history: bool,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// A previously hidden channel became visible again.
    ChannelVisible {
        /// The channel.
        cid: Cid,
        /// The user the channel is visible for.
        user_id: UserId,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// A channel's message history was truncated.
    ChannelTruncated {
        /// The truncated channel.
        cid: Cid,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// A message was posted to a watched channel.
    NewMessage {
        /// The channel.
        cid: Cid,
        /// The new message.
        message: Message,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// A message was edited.
    MessageUpdated {
        /// The channel.
        cid: Cid,
        /// The updated message.
        message: Message,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// A message was deleted.
    MessageDeleted {
        /// The channel.
        cid: Cid,
        /// The deleted message.
        message: Message,
        /// Hard deletions remove the record; soft ones keep a tombstone.
        #[serde(default)]
        hard: bool,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// A reaction was added to a message.
    ReactionNew {
        /// The channel.
        cid: Cid,
        /// The message carrying the new reaction.
        message: Message,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// A member joined a channel.
    MemberAdded {
        /// The channel.
        cid: Cid,
        /// The new member.
        member: Member,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// A member left (or was removed from) a channel.
    MemberRemoved {
        /// The channel.
        cid: Cid,
        /// The removed member's user id.
        user_id: UserId,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// The current user was added to a channel they are not watching.
    NotificationAddedToChannel {
        /// Full channel snapshot.
        channel: Channel,
        /// The membership record for the current user.
        member: Member,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// The current user was removed from a channel.
    NotificationRemovedFromChannel {
        /// The channel.
        cid: Cid,
        /// The removed user's id.
        user_id: UserId,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// A message was posted to a channel the user is not watching.
    NotificationMessageNew {
        /// Full channel snapshot.
        channel: Channel,
        /// The new message.
        message: Message,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// A user's presence changed. Partial payload: only presence fields
    /// are trustworthy.
    UserPresenceChanged {
        /// The user, presence fields current.
        user: User,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// A user's profile changed. Full payload.
    UserUpdated {
        /// The complete user record.
        user: User,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// The user marked all channels read.
    MarkAllRead {
        /// The acting user.
        user_id: UserId,
        /// Server-side event time.
        created_at: Timestamp,
    },
    /// Keepalive.
    HealthCheck {
        /// Server-side event time.
        created_at: Timestamp,
    },
}

/// Wire tags accepted by [`ChatEvent::from_json`], used to distinguish
/// unknown event types from malformed payloads.
const KNOWN_TYPES: &[&str] = &[
    "channel_created",
    "channel_updated",
    "channel_deleted",
    "channel_hidden",
    "channel_visible",
    "channel_truncated",
    "new_message",
    "message_updated",
    "message_deleted",
    "reaction_new",
    "member_added",
    "member_removed",
    "notification_added_to_channel",
    "notification_removed_from_channel",
    "notification_message_new",
    "user_presence_changed",
    "user_updated",
    "mark_all_read",
    "health_check",
];

impl ChatEvent {
    /// Server-side time this event was created.
    pub fn created_at(&self) -> Timestamp {
        match self {
            ChatEvent::ChannelCreated { created_at, .. }
            | ChatEvent::ChannelUpdated { created_at, .. }
            | ChatEvent::ChannelDeleted { created_at, .. }
            | ChatEvent::ChannelHidden { created_at, .. }
            | ChatEvent::ChannelVisible { created_at, .. }
            | ChatEvent::ChannelTruncated { created_at, .. }
            | ChatEvent::NewMessage { created_at, .. }
            | ChatEvent::MessageUpdated { created_at, .. }
            | ChatEvent::MessageDeleted { created_at, .. }
            | ChatEvent::ReactionNew { created_at, .. }
            | ChatEvent::MemberAdded { created_at, .. }
            | ChatEvent::MemberRemoved { created_at, .. }
            | ChatEvent::NotificationAddedToChannel { created_at, .. }
            | ChatEvent::NotificationRemovedFromChannel { created_at, .. }
            | ChatEvent::NotificationMessageNew { created_at, .. }
            | ChatEvent::UserPresenceChanged { created_at, .. }
            | ChatEvent::UserUpdated { created_at, .. }
            | ChatEvent::MarkAllRead { created_at, .. }
            | ChatEvent::HealthCheck { created_at } => *created_at,
        }
    }

    /// The channel this event is scoped to, if any.
    pub fn cid(&self) -> Option<&Cid> {
        match self {
            ChatEvent::ChannelCreated { channel, .. }
            | ChatEvent::ChannelUpdated { channel, .. }
            | ChatEvent::NotificationAddedToChannel { channel, .. }
            | ChatEvent::NotificationMessageNew { channel, .. } => Some(&channel.cid),
            ChatEvent::ChannelDeleted { cid, .. }
            | ChatEvent::ChannelHidden { cid, .. }
            | ChatEvent::ChannelVisible { cid, .. }
            | ChatEvent::ChannelTruncated { cid, .. }
            | ChatEvent::NewMessage { cid, .. }
            | ChatEvent::MessageUpdated { cid, .. }
            | ChatEvent::MessageDeleted { cid, .. }
            | ChatEvent::ReactionNew { cid, .. }
            | ChatEvent::MemberAdded { cid, .. }
            | ChatEvent::MemberRemoved { cid, .. }
            | ChatEvent::NotificationRemovedFromChannel { cid, .. } => Some(cid),
            ChatEvent::UserPresenceChanged { .. }
            | ChatEvent::UserUpdated { .. }
            | ChatEvent::MarkAllRead { .. }
            | ChatEvent::HealthCheck { .. } => None,
        }
    }

    /// The embedded channel snapshot, when the event carries one.
    pub fn channel(&self) -> Option<&Channel> {
        match self {
            ChatEvent::ChannelCreated { channel, .. }
            | ChatEvent::ChannelUpdated { channel, .. }
            | ChatEvent::NotificationAddedToChannel { channel, .. }
            | ChatEvent::NotificationMessageNew { channel, .. } => Some(channel),
            _ => None,
        }
    }

    /// The message payload, when the event carries one.
    pub fn message(&self) -> Option<&Message> {
        match self {
            ChatEvent::NewMessage { message, .. }
            | ChatEvent::MessageUpdated { message, .. }
            | ChatEvent::MessageDeleted { message, .. }
            | ChatEvent::ReactionNew { message, .. }
            | ChatEvent::NotificationMessageNew { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Decode a wire payload.
    pub fn from_json(payload: &str) -> Result<Self, EventParseError> {
        let value: serde_json::Value =
            serde_json::from_str(payload).map_err(EventParseError::Malformed)?;
        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .map(str::to_owned);

        match serde_json::from_value::<ChatEvent>(value) {
            Ok(event) => Ok(event),
            Err(err) => match kind {
                Some(kind) if !KNOWN_TYPES.contains(&kind.as_str()) => {
                    Err(EventParseError::UnknownType(kind))
                }
                _ => Err(EventParseError::Malformed(err)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_new_message() {
        let payload = r#"{
            "type": "new_message",
            "cid": "messaging:general",
            "message": {
                "id": "m1",
                "cid": "messaging:general",
                "user_id": "jo",
                "text": "hi",
                "created_at": 1000
            },
            "created_at": 1000
        }"#;

        let event = ChatEvent::from_json(payload).unwrap();
        match &event {
            ChatEvent::NewMessage { cid, message, .. } => {
                assert_eq!(cid.to_string(), "messaging:general");
                assert_eq!(message.text, "hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(event.created_at(), Timestamp::from_millis(1000));
        assert_eq!(event.cid().map(Cid::to_string), Some("messaging:general".into()));
    }

    #[test]
    fn decodes_channel_created_with_snapshot() {
        let payload = r#"{
            "type": "channel_created",
            "channel": {
                "cid": "messaging:alpha",
                "team": "red",
                "created_at": 500
            },
            "created_at": 500
        }"#;

        let event = ChatEvent::from_json(payload).unwrap();
        let channel = event.channel().expect("snapshot present");
        assert_eq!(channel.team, "red");
        assert_eq!(event.cid(), Some(&channel.cid));
    }

    #[test]
    fn unknown_type_is_distinguished() {
        let payload = r#"{"type": "poll_closed", "created_at": 1}"#;
        match ChatEvent::from_json(payload) {
            Err(EventParseError::UnknownType(kind)) => assert_eq!(kind, "poll_closed"),
            other => panic!("expected UnknownType, got {other:?}"),
        }
    }

    #[test]
    fn malformed_payload_is_an_error_value() {
        assert!(matches!(
            ChatEvent::from_json("not json"),
            Err(EventParseError::Malformed(_))
        ));
        // Known type, missing required fields.
        assert!(matches!(
            ChatEvent::from_json(r#"{"type": "new_message"}"#),
            Err(EventParseError::Malformed(_))
        ));
        // No type tag at all.
        assert!(matches!(
            ChatEvent::from_json(r#"{"created_at": 1}"#),
            Err(EventParseError::Malformed(_))
        ));
    }

    #[test]
    fn wire_roundtrip() {
        let event = ChatEvent::MarkAllRead {
            user_id: UserId::new("jo"),
            created_at: Timestamp::from_millis(7),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(ChatEvent::from_json(&json).unwrap(), event);
    }

    #[test]
    fn health_check_has_no_cid() {
        let event = ChatEvent::HealthCheck {
            created_at: Timestamp::from_millis(1),
        };
        assert_eq!(event.cid(), None);
        assert_eq!(event.channel(), None);
    }
}
