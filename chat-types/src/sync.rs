//! Per-user sync bookkeeping.

use serde::{Deserialize, Serialize};

use crate::ids::{Cid, QueryId, Timestamp, UserId};

/// Per-user sync state: the last-synced watermark plus the channels and
/// queries being actively observed.
///
/// Created at login, updated after every successful sync or visibility
/// change, discarded at logout. The watermark is a logical clock on
/// server time; it only ever moves forward.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    user_id: UserId,
    last_synced_at: Timestamp,
    active_channel_ids: Vec<Cid>,
    active_query_ids: Vec<QueryId>,
    marked_all_read_at: Option<Timestamp>,
}

impl SyncState {
    /// Create empty sync state for a user who has never synced.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            last_synced_at: Timestamp::zero(),
            active_channel_ids: Vec::new(),
            active_query_ids: Vec::new(),
            marked_all_read_at: None,
        }
    }

    /// The user this state belongs to.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The sync watermark: everything up to this server time has been
    /// applied locally.
    pub fn last_synced_at(&self) -> Timestamp {
        self.last_synced_at
    }

    /// Advance the watermark. Returns `false` (and leaves the watermark
    /// unchanged) if `at` is not strictly newer - moving the watermark
    /// backward is a no-op, not an error.
    pub fn mark_synced(&mut self, at: Timestamp) -> bool {
        if at > self.last_synced_at {
            self.last_synced_at = at;
            true
        } else {
            false
        }
    }

    /// When the user last marked everything read, if ever.
    pub fn marked_all_read_at(&self) -> Option<Timestamp> {
        self.marked_all_read_at
    }

    /// Record a mark-all-read. Monotonic like the watermark.
    pub fn mark_all_read(&mut self, at: Timestamp) -> bool {
        match self.marked_all_read_at {
            Some(existing) if at <= existing => false,
            _ => {
                self.marked_all_read_at = Some(at);
                true
            }
        }
    }

    /// The channels currently being watched.
    pub fn active_channel_ids(&self) -> &[Cid] {
        &self.active_channel_ids
    }

    /// Replace the watched channel set (e.g. when the connection drops
    /// and the current watch list is persisted for resume).
    pub fn set_active_channels(&mut self, cids: Vec<Cid>) {
        self.active_channel_ids = cids;
    }

    /// Record a newly watched channel. Idempotent.
    pub fn add_active_channel(&mut self, cid: Cid) {
        if !self.active_channel_ids.contains(&cid) {
            self.active_channel_ids.push(cid);
        }
    }

    /// The queries currently registered.
    pub fn active_query_ids(&self) -> &[QueryId] {
        &self.active_query_ids
    }

    /// Register a query. Idempotent.
    pub fn register_query(&mut self, id: QueryId) {
        if !self.active_query_ids.contains(&id) {
            self.active_query_ids.push(id);
        }
    }

    /// Unregister a query. Unknown ids are ignored.
    pub fn unregister_query(&mut self, id: QueryId) {
        self.active_query_ids.retain(|q| *q != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SyncState {
        SyncState::new(UserId::new("jo"))
    }

    #[test]
    fn starts_with_zero_watermark() {
        let s = state();
        assert_eq!(s.last_synced_at(), Timestamp::zero());
        assert!(s.active_channel_ids().is_empty());
        assert!(s.active_query_ids().is_empty());
        assert_eq!(s.marked_all_read_at(), None);
    }

    #[test]
    fn watermark_advances_monotonically() {
        let mut s = state();
        assert!(s.mark_synced(Timestamp::from_millis(5)));
        assert!(s.mark_synced(Timestamp::from_millis(8)));
        assert_eq!(s.last_synced_at(), Timestamp::from_millis(8));
    }

    #[test]
    fn watermark_rejects_backward_moves() {
        let mut s = state();
        assert!(s.mark_synced(Timestamp::from_millis(8)));
        assert!(!s.mark_synced(Timestamp::from_millis(5)));
        assert!(!s.mark_synced(Timestamp::from_millis(8)));
        assert_eq!(s.last_synced_at(), Timestamp::from_millis(8));
    }

    #[test]
    fn watermark_equals_max_of_all_marks() {
        let mut s = state();
        for millis in [3, 9, 1, 7, 9, 2] {
            s.mark_synced(Timestamp::from_millis(millis));
        }
        assert_eq!(s.last_synced_at(), Timestamp::from_millis(9));
    }

    #[test]
    fn mark_all_read_is_monotonic() {
        let mut s = state();
        assert!(s.mark_all_read(Timestamp::from_millis(10)));
        assert!(!s.mark_all_read(Timestamp::from_millis(4)));
        assert!(!s.mark_all_read(Timestamp::from_millis(10)));
        assert_eq!(s.marked_all_read_at(), Some(Timestamp::from_millis(10)));
    }

    #[test]
    fn active_channels_deduplicate() {
        let mut s = state();
        let cid = Cid::new("messaging", "a");
        s.add_active_channel(cid.clone());
        s.add_active_channel(cid.clone());
        assert_eq!(s.active_channel_ids(), &[cid]);
    }

    #[test]
    fn queries_register_and_unregister() {
        let mut s = state();
        let q = QueryId::random();
        s.register_query(q);
        s.register_query(q);
        assert_eq!(s.active_query_ids(), &[q]);

        s.unregister_query(q);
        assert!(s.active_query_ids().is_empty());
        // Unknown id is a no-op.
        s.unregister_query(QueryId::random());
    }
}
