//! Domain models for backchat.
//!
//! These are plain serde structs mirroring the server's wire shapes. The
//! only behavior they carry is field access for filters and sorts; all
//! decision logic lives in backchat-core.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::{Cid, Timestamp, UserId};

/// A dynamically typed channel field value, as seen by filters and sorts.
///
/// No floating point: the derived `Ord` must be a total order so the
/// composite comparator stays total.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Point in time.
    Time(Timestamp),
    /// String value.
    Str(String),
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(v: Timestamp) -> Self {
        Self::Time(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// A chat user record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned user id.
    pub id: UserId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Server-side role (e.g. `"user"`, `"admin"`).
    #[serde(default)]
    pub role: String,
    /// Whether the user is currently online.
    #[serde(default)]
    pub online: bool,
    /// Last activity time, if known.
    #[serde(default)]
    pub last_active: Option<Timestamp>,
}

impl User {
    /// Create a user with only an id set.
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            role: String::new(),
            online: false,
            last_active: None,
        }
    }
}

/// A channel member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The member's user id.
    pub user_id: UserId,
    /// Channel-level role.
    #[serde(default)]
    pub role: String,
    /// Whether the member is banned in this channel.
    #[serde(default)]
    pub banned: bool,
}

impl Member {
    /// Create a member with the default role.
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            role: String::new(),
            banned: false,
        }
    }
}

/// A chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned message id.
    pub id: String,
    /// The channel this message belongs to.
    pub cid: Cid,
    /// The sender.
    pub user_id: UserId,
    /// Message text.
    #[serde(default)]
    pub text: String,
    /// Server-side creation time.
    pub created_at: Timestamp,
    /// Soft-deletion time, if deleted.
    #[serde(default)]
    pub deleted_at: Option<Timestamp>,
    /// Shadow-banned messages are delivered but must not unhide a channel.
    #[serde(default)]
    pub shadowed: bool,
}

/// The locally cached state of a channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Fully qualified channel id.
    pub cid: Cid,
    /// Team the channel belongs to (empty when unset).
    #[serde(default)]
    pub team: String,
    /// Server-side creation time.
    pub created_at: Timestamp,
    /// Last structural update time.
    #[serde(default)]
    pub updated_at: Timestamp,
    /// Creation time of the newest message, if any.
    #[serde(default)]
    pub last_message_at: Option<Timestamp>,
    /// Known members.
    #[serde(default)]
    pub members: Vec<Member>,
    /// Server-reported member count (may exceed `members.len()`).
    #[serde(default)]
    pub member_count: u32,
    /// Whether the current user has hidden this channel.
    #[serde(default)]
    pub hidden: bool,
    /// Custom fields set by the application.
    #[serde(default)]
    pub extra: BTreeMap<String, FieldValue>,
}

impl Channel {
    /// Create a minimal channel record.
    pub fn new(cid: Cid, created_at: Timestamp) -> Self {
        Self {
            cid,
            team: String::new(),
            created_at,
            updated_at: created_at,
            last_message_at: None,
            members: Vec::new(),
            member_count: 0,
            hidden: false,
            extra: BTreeMap::new(),
        }
    }

    /// Look up a field by name, as used by filters and sorts.
    ///
    /// Well-known names resolve to the corresponding struct field;
    /// anything else is looked up in `extra`. List-valued fields
    /// (`members`) are not reachable here - see `Filter::Contains`.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "cid" => Some(FieldValue::Str(self.cid.to_string())),
            "type" => Some(FieldValue::Str(self.cid.channel_type().to_string())),
            "id" => Some(FieldValue::Str(self.cid.channel_id().to_string())),
            "team" => {
                if self.team.is_empty() {
                    None
                } else {
                    Some(FieldValue::Str(self.team.clone()))
                }
            }
            "created_at" => Some(FieldValue::Time(self.created_at)),
            "updated_at" => Some(FieldValue::Time(self.updated_at)),
            "last_message_at" => self.last_message_at.map(FieldValue::Time),
            "member_count" => Some(FieldValue::Int(i64::from(self.member_count))),
            "hidden" => Some(FieldValue::Bool(self.hidden)),
            _ => self.extra.get(name).cloned(),
        }
    }

    /// Iterate over the user ids of the known members.
    pub fn member_ids(&self) -> impl Iterator<Item = &UserId> {
        self.members.iter().map(|m| &m.user_id)
    }

    /// The channel's most recent activity: the later of `updated_at` and
    /// `last_message_at`. This is the default channel-list sort key.
    pub fn last_updated(&self) -> Timestamp {
        match self.last_message_at {
            Some(at) => self.updated_at.max(at),
            None => self.updated_at,
        }
    }
}

/// Server-defined configuration for a channel type; read-only after fetch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// The channel type this configuration applies to.
    pub channel_type: String,
    /// Whether typing indicators are delivered.
    #[serde(default)]
    pub typing_events: bool,
    /// Whether read receipts are delivered.
    #[serde(default)]
    pub read_events: bool,
    /// Whether muting is available.
    #[serde(default)]
    pub mutes: bool,
    /// Whether threaded replies are available.
    #[serde(default)]
    pub replies: bool,
}

/// The currently authenticated identity.
///
/// `Part` is built from lightweight events that carry only presence
/// fields; it is replaced by a `Full` once a complete profile payload
/// arrives. Every consumer matches exhaustively.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelfUser {
    /// Complete profile.
    Full(User),
    /// Partial profile; only `online` and `last_active` are trustworthy.
    Part(User),
}

impl SelfUser {
    /// The underlying user record, complete or not.
    pub fn user(&self) -> &User {
        match self {
            SelfUser::Full(user) | SelfUser::Part(user) => user,
        }
    }

    /// Whether this identity carries a complete profile.
    pub fn is_full(&self) -> bool {
        matches!(self, SelfUser::Full(_))
    }

    /// Fold a new observation into the current identity.
    ///
    /// A `Full` observation replaces anything. A `Part` folded into a
    /// `Full` updates only the presence fields a partial payload carries;
    /// a `Part` folded into a `Part` replaces it.
    pub fn merge(self, incoming: SelfUser) -> SelfUser {
        match (self, incoming) {
            (_, full @ SelfUser::Full(_)) => full,
            (SelfUser::Full(mut current), SelfUser::Part(part)) => {
                current.online = part.online;
                if part.last_active.is_some() {
                    current.last_active = part.last_active;
                }
                SelfUser::Full(current)
            }
            (SelfUser::Part(_), part @ SelfUser::Part(_)) => part,
        }
    }
}

/// Connection lifecycle as observed by the sync layer.
///
/// Transitions are owned by the socket component; this layer only
/// consumes the state to gate sync operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    /// Socket is up and authenticated.
    Connected,
    /// Connection attempt in progress.
    Connecting,
    /// No connection.
    #[default]
    Offline,
}

impl ConnectionState {
    /// Whether sync operations may run.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(cid: &str) -> Channel {
        Channel::new(Cid::parse(cid).unwrap(), Timestamp::from_millis(1_000))
    }

    #[test]
    fn field_resolves_builtins() {
        let mut ch = channel("messaging:general");
        ch.team = "red".to_string();
        ch.member_count = 3;

        assert_eq!(ch.field("type"), Some(FieldValue::Str("messaging".into())));
        assert_eq!(ch.field("id"), Some(FieldValue::Str("general".into())));
        assert_eq!(ch.field("team"), Some(FieldValue::Str("red".into())));
        assert_eq!(ch.field("member_count"), Some(FieldValue::Int(3)));
        assert_eq!(ch.field("hidden"), Some(FieldValue::Bool(false)));
    }

    #[test]
    fn empty_team_is_absent() {
        let ch = channel("messaging:general");
        assert_eq!(ch.field("team"), None);
    }

    #[test]
    fn field_falls_back_to_extra() {
        let mut ch = channel("messaging:general");
        ch.extra
            .insert("color".to_string(), FieldValue::Str("blue".into()));

        assert_eq!(ch.field("color"), Some(FieldValue::Str("blue".into())));
        assert_eq!(ch.field("missing"), None);
    }

    #[test]
    fn last_updated_prefers_newest() {
        let mut ch = channel("messaging:general");
        ch.updated_at = Timestamp::from_millis(5_000);
        assert_eq!(ch.last_updated(), Timestamp::from_millis(5_000));

        ch.last_message_at = Some(Timestamp::from_millis(9_000));
        assert_eq!(ch.last_updated(), Timestamp::from_millis(9_000));

        ch.last_message_at = Some(Timestamp::from_millis(2_000));
        assert_eq!(ch.last_updated(), Timestamp::from_millis(5_000));
    }

    #[test]
    fn self_user_full_replaces_part() {
        let part = SelfUser::Part(User::new("u1"));
        let mut full_user = User::new("u1");
        full_user.name = "Jo".to_string();

        let merged = part.merge(SelfUser::Full(full_user.clone()));
        assert_eq!(merged, SelfUser::Full(full_user));
    }

    #[test]
    fn self_user_part_never_downgrades_full() {
        let mut full_user = User::new("u1");
        full_user.name = "Jo".to_string();
        full_user.role = "admin".to_string();

        let mut part_user = User::new("u1");
        part_user.online = true;
        part_user.last_active = Some(Timestamp::from_millis(42));

        let merged = SelfUser::Full(full_user).merge(SelfUser::Part(part_user));
        match merged {
            SelfUser::Full(user) => {
                assert_eq!(user.name, "Jo");
                assert_eq!(user.role, "admin");
                assert!(user.online);
                assert_eq!(user.last_active, Some(Timestamp::from_millis(42)));
            }
            SelfUser::Part(_) => panic!("merge downgraded Full to Part"),
        }
    }

    #[test]
    fn connection_state_gating() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Offline.is_connected());
    }

    #[test]
    fn connection_state_defaults_offline() {
        assert_eq!(ConnectionState::default(), ConnectionState::Offline);
    }
}
