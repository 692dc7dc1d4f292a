//! Persisted query-spec records.

use serde::{Deserialize, Serialize};

use crate::filter::Filter;
use crate::ids::{Cid, QueryId};
use crate::sort::SortSpec;

/// The persisted form of a channel-list query: its identity and the
/// ordered cids last known to satisfy it.
///
/// This is what the query-spec repository stores, and what an
/// offline-first query loads before going online.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpecSnapshot {
    /// Stable id assigned when the (filter, sort) pair was first seen.
    pub id: QueryId,
    /// The query's filter.
    pub filter: Filter,
    /// The query's sort description.
    pub sort: SortSpec,
    /// Cids satisfying the filter, in sort order.
    pub cids: Vec<Cid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_roundtrips_through_json() {
        let snapshot = QuerySpecSnapshot {
            id: QueryId::random(),
            filter: Filter::eq("team", "red"),
            sort: SortSpec::default(),
            cids: vec![Cid::new("messaging", "a"), Cid::new("messaging", "b")],
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: QuerySpecSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
