//! Composite channel comparator.
//!
//! Builds a single total order from a [`SortSpec`]: per-field comparisons
//! are evaluated in priority order and the first non-equal result wins.
//! All fields tying means the channels are equal under this order.

use std::cmp::Ordering;

use chat_types::{Channel, Direction, FieldValue, SortField, SortSpec};

/// A multi-field channel comparator composed from a sort description.
///
/// The order is total as long as every component field yields totally
/// ordered values, which `FieldValue`'s derived `Ord` guarantees. A
/// channel missing a field orders before one that has it (in the
/// ascending direction), so missing data cannot break totality.
#[derive(Debug, Clone)]
pub struct ChannelComparator {
    fields: Vec<SortField>,
}

impl ChannelComparator {
    /// Compose a comparator from a sort description.
    pub fn new(spec: &SortSpec) -> Self {
        Self {
            fields: spec.fields().to_vec(),
        }
    }

    /// Compare two channels under this order.
    pub fn compare(&self, a: &Channel, b: &Channel) -> Ordering {
        for field in &self.fields {
            let ordering = compare_field(a, b, &field.field);
            let ordering = match field.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Resolve a sort field on a channel. `"last_updated"` is synthetic:
/// the later of `updated_at` and `last_message_at`.
fn sort_value(channel: &Channel, field: &str) -> Option<FieldValue> {
    if field == "last_updated" {
        Some(FieldValue::Time(channel.last_updated()))
    } else {
        channel.field(field)
    }
}

fn compare_field(a: &Channel, b: &Channel, field: &str) -> Ordering {
    match (sort_value(a, field), sort_value(b, field)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_types::{Cid, Timestamp};

    fn channel(id: &str, last_message_at: Option<i64>) -> Channel {
        let mut ch = Channel::new(
            Cid::new("messaging", id),
            Timestamp::from_millis(100),
        );
        ch.last_message_at = last_message_at.map(Timestamp::from_millis);
        ch
    }

    fn by_last_message_desc() -> ChannelComparator {
        ChannelComparator::new(&SortSpec::new([SortField::desc("last_message_at")]))
    }

    #[test]
    fn first_non_equal_field_wins() {
        let spec = SortSpec::new([SortField::desc("last_message_at"), SortField::asc("id")]);
        let cmp = ChannelComparator::new(&spec);

        let newer = channel("z", Some(2_000));
        let older = channel("a", Some(1_000));

        // last_message_at decides before the id tie-breaker is consulted.
        assert_eq!(cmp.compare(&newer, &older), Ordering::Less);
        assert_eq!(cmp.compare(&older, &newer), Ordering::Greater);
    }

    #[test]
    fn later_fields_break_ties() {
        let spec = SortSpec::new([SortField::desc("last_message_at"), SortField::asc("id")]);
        let cmp = ChannelComparator::new(&spec);

        let a = channel("a", Some(1_000));
        let b = channel("b", Some(1_000));

        assert_eq!(cmp.compare(&a, &b), Ordering::Less);
        assert_eq!(cmp.compare(&b, &a), Ordering::Greater);
    }

    #[test]
    fn all_fields_tying_is_equal() {
        let cmp = by_last_message_desc();
        let a = channel("same", Some(1_000));
        let b = channel("same", Some(1_000));
        assert_eq!(cmp.compare(&a, &b), Ordering::Equal);
    }

    #[test]
    fn missing_field_orders_before_present_ascending() {
        let cmp = ChannelComparator::new(&SortSpec::new([SortField::asc("last_message_at")]));
        let missing = channel("a", None);
        let present = channel("b", Some(1));
        assert_eq!(cmp.compare(&missing, &present), Ordering::Less);
        // Descending reverses it: silent channels sort last.
        let desc = by_last_message_desc();
        assert_eq!(desc.compare(&missing, &present), Ordering::Greater);
    }

    #[test]
    fn transitive_over_equal_inputs() {
        // compare(a,b)=0 and compare(b,c)=0 implies compare(a,c)=0.
        let cmp = by_last_message_desc();
        let a = channel("a", Some(5));
        let b = channel("b", Some(5));
        let c = channel("c", Some(5));

        assert_eq!(cmp.compare(&a, &b), Ordering::Equal);
        assert_eq!(cmp.compare(&b, &c), Ordering::Equal);
        assert_eq!(cmp.compare(&a, &c), Ordering::Equal);
    }

    #[test]
    fn stable_under_repeated_application() {
        let cmp = by_last_message_desc();
        let a = channel("a", Some(5));
        let b = channel("b", Some(5));
        for _ in 0..10 {
            assert_eq!(cmp.compare(&a, &b), Ordering::Equal);
        }
    }

    #[test]
    fn total_order_sorts_consistently() {
        let cmp = by_last_message_desc();
        let mut channels = vec![
            channel("a", Some(3)),
            channel("b", None),
            channel("c", Some(9)),
            channel("d", Some(1)),
        ];
        channels.sort_by(|x, y| cmp.compare(x, y));

        let ids: Vec<&str> = channels.iter().map(|c| c.cid.channel_id()).collect();
        // Newest first, never-messaged channels last.
        assert_eq!(ids, vec!["c", "a", "d", "b"]);
    }

    #[test]
    fn default_sort_uses_last_updated() {
        let cmp = ChannelComparator::new(&SortSpec::default());

        let mut bumped = channel("a", None);
        bumped.updated_at = Timestamp::from_millis(50);
        let mut messaged = channel("b", Some(500));
        messaged.updated_at = Timestamp::from_millis(10);

        // The message is newer than the structural update.
        assert_eq!(cmp.compare(&messaged, &bumped), Ordering::Less);
    }
}
