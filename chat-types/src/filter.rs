//! Channel query filters.
//!
//! A [`Filter`] is a predicate AST evaluated against locally cached
//! channel state. Filters hash and compare by structure so a
//! (filter, sort) pair can identify a query.

use serde::{Deserialize, Serialize};

use crate::models::{Channel, FieldValue};

/// A channel predicate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Filter {
    /// Matches every channel.
    Accept,
    /// Field equals the value. Absent fields never match.
    Eq {
        /// Field name (see `Channel::field`).
        field: String,
        /// Expected value.
        value: FieldValue,
    },
    /// Field differs from the value. Absent fields match.
    Neq {
        /// Field name.
        field: String,
        /// Rejected value.
        value: FieldValue,
    },
    /// Field equals one of the values.
    In {
        /// Field name.
        field: String,
        /// Accepted values.
        values: Vec<FieldValue>,
    },
    /// A list-valued field contains the value. The only list-valued
    /// field is `members`, which holds member user ids.
    Contains {
        /// Field name.
        field: String,
        /// Element to look for.
        value: FieldValue,
    },
    /// Field is present.
    Exists {
        /// Field name.
        field: String,
    },
    /// All sub-filters match. Empty matches everything.
    And(Vec<Filter>),
    /// At least one sub-filter matches. Empty matches nothing.
    Or(Vec<Filter>),
    /// The sub-filter does not match.
    Not(Box<Filter>),
}

impl Filter {
    /// Field equality.
    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field inequality.
    pub fn neq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Filter::Neq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field is one of the given values.
    pub fn is_in<V: Into<FieldValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// List field contains the value.
    pub fn contains(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Filter::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field is present.
    pub fn exists(field: impl Into<String>) -> Self {
        Filter::Exists {
            field: field.into(),
        }
    }

    /// Conjunction.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    /// Disjunction.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    /// Negation.
    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Evaluate this filter against a channel's current state.
    pub fn matches(&self, channel: &Channel) -> bool {
        match self {
            Filter::Accept => true,
            Filter::Eq { field, value } => channel.field(field).as_ref() == Some(value),
            Filter::Neq { field, value } => channel.field(field).as_ref() != Some(value),
            Filter::In { field, values } => channel
                .field(field)
                .map_or(false, |v| values.contains(&v)),
            Filter::Contains { field, value } => list_field_contains(channel, field, value),
            Filter::Exists { field } => channel.field(field).is_some(),
            Filter::And(filters) => filters.iter().all(|f| f.matches(channel)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(channel)),
            Filter::Not(filter) => !filter.matches(channel),
        }
    }
}

fn list_field_contains(channel: &Channel, field: &str, value: &FieldValue) -> bool {
    if field == "members" {
        return channel
            .member_ids()
            .any(|id| matches!(value, FieldValue::Str(s) if s == id.as_str()));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{Cid, Timestamp};
    use crate::models::Member;

    fn red_channel() -> Channel {
        let mut ch = Channel::new(
            Cid::parse("messaging:alpha").unwrap(),
            Timestamp::from_millis(1_000),
        );
        ch.team = "red".to_string();
        ch.members.push(Member::new("jo"));
        ch.member_count = 1;
        ch
    }

    #[test]
    fn eq_matches_field_value() {
        let ch = red_channel();
        assert!(Filter::eq("team", "red").matches(&ch));
        assert!(!Filter::eq("team", "blue").matches(&ch));
    }

    #[test]
    fn eq_on_absent_field_never_matches() {
        let ch = red_channel();
        assert!(!Filter::eq("topic", "rust").matches(&ch));
    }

    #[test]
    fn neq_matches_absent_field() {
        let ch = red_channel();
        assert!(Filter::neq("topic", "rust").matches(&ch));
        assert!(Filter::neq("team", "blue").matches(&ch));
        assert!(!Filter::neq("team", "red").matches(&ch));
    }

    #[test]
    fn in_matches_any_listed_value() {
        let ch = red_channel();
        assert!(Filter::is_in("team", ["blue", "red"]).matches(&ch));
        assert!(!Filter::is_in("team", ["blue", "green"]).matches(&ch));
    }

    #[test]
    fn contains_checks_member_ids() {
        let ch = red_channel();
        assert!(Filter::contains("members", "jo").matches(&ch));
        assert!(!Filter::contains("members", "sam").matches(&ch));
        // Only "members" is list-valued.
        assert!(!Filter::contains("team", "red").matches(&ch));
    }

    #[test]
    fn exists_checks_presence() {
        let ch = red_channel();
        assert!(Filter::exists("team").matches(&ch));
        assert!(!Filter::exists("topic").matches(&ch));
    }

    #[test]
    fn and_or_not_compose() {
        let ch = red_channel();
        let both = Filter::and([Filter::eq("team", "red"), Filter::eq("type", "messaging")]);
        assert!(both.matches(&ch));

        let either = Filter::or([Filter::eq("team", "blue"), Filter::eq("type", "messaging")]);
        assert!(either.matches(&ch));

        assert!(!Filter::not(both).matches(&ch));
    }

    #[test]
    fn empty_and_accepts_empty_or_rejects() {
        let ch = red_channel();
        assert!(Filter::and([]).matches(&ch));
        assert!(!Filter::or([]).matches(&ch));
    }

    #[test]
    fn accept_matches_everything() {
        assert!(Filter::Accept.matches(&red_channel()));
    }

    #[test]
    fn filters_hash_by_structure() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Filter::eq("team", "red"));
        assert!(set.contains(&Filter::eq("team", "red")));
        assert!(!set.contains(&Filter::eq("team", "blue")));
    }
}
