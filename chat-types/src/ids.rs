//! Identity and ordering types for backchat.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CidParseError;

/// A unique identifier for a user, assigned by the server.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a UserId from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string form of this UserId.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

/// A fully qualified channel identifier: a channel type plus a channel id,
/// rendered as `"{type}:{id}"`.
///
/// Both components are non-empty; `parse` rejects anything else so a `Cid`
/// held by the cache is always well-formed.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid {
    channel_type: String,
    channel_id: String,
}

impl Cid {
    /// Create a Cid from its two components.
    pub fn new(channel_type: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            channel_type: channel_type.into(),
            channel_id: channel_id.into(),
        }
    }

    /// Parse a `"{type}:{id}"` string into a Cid.
    pub fn parse(value: &str) -> Result<Self, CidParseError> {
        match value.split_once(':') {
            Some((channel_type, channel_id))
                if !channel_type.is_empty() && !channel_id.is_empty() =>
            {
                Ok(Self::new(channel_type, channel_id))
            }
            _ => Err(CidParseError::new(value)),
        }
    }

    /// The channel type component (e.g. `"messaging"`).
    pub fn channel_type(&self) -> &str {
        &self.channel_type
    }

    /// The channel id component.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }
}

impl TryFrom<String> for Cid {
    type Error = CidParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Cid> for String {
    fn from(cid: Cid) -> Self {
        cid.to_string()
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel_type, self.channel_id)
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({}:{})", self.channel_type, self.channel_id)
    }
}

/// A unique identifier for a registered channel-list query.
///
/// Assigned when a (filter, sort) pair is first seen; stable for the
/// lifetime of the spec cache. UUID v4 format.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(uuid::Uuid);

impl QueryId {
    /// Create a new random QueryId.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryId({})", self.0)
    }
}

/// A server-assigned point in time, in milliseconds since the Unix epoch.
///
/// Timestamps come from the server clock, never the device clock, so the
/// sync watermark stays comparable with event timestamps under clock
/// drift.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a Timestamp from milliseconds since the epoch.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Get the millisecond value.
    pub fn millis(&self) -> i64 {
        self.0
    }

    /// The zero timestamp, representing "never".
    pub fn zero() -> Self {
        Self(0)
    }

    /// Check whether this is the zero timestamp.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The later of two timestamps.
    pub fn max(self, other: Self) -> Self {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }

    /// This timestamp advanced by the given number of milliseconds.
    pub fn plus_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cid_parse_roundtrip() {
        let cid = Cid::parse("messaging:general").unwrap();
        assert_eq!(cid.channel_type(), "messaging");
        assert_eq!(cid.channel_id(), "general");
        assert_eq!(cid.to_string(), "messaging:general");
    }

    #[test]
    fn cid_id_may_contain_colons() {
        let cid = Cid::parse("messaging:a:b").unwrap();
        assert_eq!(cid.channel_id(), "a:b");
    }

    #[test]
    fn cid_parse_rejects_malformed() {
        assert!(Cid::parse("no-separator").is_err());
        assert!(Cid::parse(":missing-type").is_err());
        assert!(Cid::parse("missing-id:").is_err());
        assert!(Cid::parse("").is_err());
    }

    #[test]
    fn cid_serde_uses_string_form() {
        let cid = Cid::new("team", "red");
        let json = serde_json::to_string(&cid).unwrap();
        assert_eq!(json, "\"team:red\"");
        let back: Cid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cid);
    }

    #[test]
    fn cid_serde_rejects_malformed() {
        let result: Result<Cid, _> = serde_json::from_str("\"oops\"");
        assert!(result.is_err());
    }

    #[test]
    fn query_id_is_uuid_v4() {
        let id = QueryId::random();
        assert_eq!(id.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn query_ids_are_unique() {
        assert_ne!(QueryId::random(), QueryId::random());
    }

    #[test]
    fn timestamp_ordering() {
        let t1 = Timestamp::from_millis(100);
        let t2 = Timestamp::from_millis(200);
        assert!(t1 < t2);
        assert_eq!(t1.max(t2), t2);
        assert_eq!(t2.max(t1), t2);
    }

    #[test]
    fn timestamp_zero() {
        assert!(Timestamp::zero().is_zero());
        assert!(!Timestamp::from_millis(1).is_zero());
    }

    #[test]
    fn timestamp_plus_millis_saturates() {
        let t = Timestamp::from_millis(i64::MAX);
        assert_eq!(t.plus_millis(1), t);
    }
}
