//! Query-spec cache: which channels satisfy which channel-list query.
//!
//! A [`QueryChannelsSpec`] owns the ordered set of cids currently
//! satisfying one (filter, sort) query. It is mutated only by fresh
//! query results (`replace`/`extend`) and by the event handler's
//! decisions (`insert`/`remove`/`reposition`); the invariant is that a
//! cid is in the set iff the latest known channel state matches the
//! filter.

use std::cmp::Ordering;

use chat_types::{Channel, Cid, Filter, QueryId, QuerySpecSnapshot, SortSpec};

use crate::comparator::ChannelComparator;

/// A cached, filter+sort-identified view of matching channels.
///
/// Filter and sort are immutable once created; only the cid set changes.
#[derive(Debug, Clone)]
pub struct QueryChannelsSpec {
    id: QueryId,
    filter: Filter,
    sort: SortSpec,
    comparator: ChannelComparator,
    cids: Vec<Cid>,
}

impl QueryChannelsSpec {
    /// Create an empty spec for a (filter, sort) pair.
    pub fn new(filter: Filter, sort: SortSpec) -> Self {
        let comparator = ChannelComparator::new(&sort);
        Self {
            id: QueryId::random(),
            filter,
            sort,
            comparator,
            cids: Vec::new(),
        }
    }

    /// Rebuild a spec from its persisted form, keeping its identity.
    pub fn from_snapshot(snapshot: QuerySpecSnapshot) -> Self {
        let comparator = ChannelComparator::new(&snapshot.sort);
        Self {
            id: snapshot.id,
            filter: snapshot.filter,
            sort: snapshot.sort,
            comparator,
            cids: snapshot.cids,
        }
    }

    /// The persisted form of this spec.
    pub fn snapshot(&self) -> QuerySpecSnapshot {
        QuerySpecSnapshot {
            id: self.id,
            filter: self.filter.clone(),
            sort: self.sort.clone(),
            cids: self.cids.clone(),
        }
    }

    /// Stable identity of this query.
    pub fn id(&self) -> QueryId {
        self.id
    }

    /// The query's filter.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// The query's sort description.
    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    /// The matching cids, in sort order.
    pub fn cids(&self) -> &[Cid] {
        &self.cids
    }

    /// Whether a channel is currently in the result set.
    pub fn contains(&self, cid: &Cid) -> bool {
        self.cids.contains(cid)
    }

    /// Number of matching channels.
    pub fn len(&self) -> usize {
        self.cids.len()
    }

    /// Whether the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.cids.is_empty()
    }

    /// Replace the tracked set with a full first-page fetch result.
    /// Duplicate cids in the input keep their first occurrence.
    pub fn replace(&mut self, channels: &[Channel]) {
        let mut seen: Vec<&Cid> = Vec::with_capacity(channels.len());
        let mut unique: Vec<&Channel> = Vec::with_capacity(channels.len());
        for channel in channels {
            if !seen.contains(&&channel.cid) {
                seen.push(&channel.cid);
                unique.push(channel);
            }
        }
        unique.sort_by(|a, b| self.comparator.compare(a, b));
        self.cids = unique.into_iter().map(|c| c.cid.clone()).collect();
    }

    /// Fold a later page into the tracked set. Channels already present
    /// are ignored; new ones are inserted at their sort position.
    pub fn extend<F>(&mut self, channels: &[Channel], lookup: F)
    where
        F: Fn(&Cid) -> Option<Channel>,
    {
        for channel in channels {
            if !self.contains(&channel.cid) {
                self.insert(channel, &lookup);
            }
        }
    }

    /// Insert (or re-place) a channel at its sort-correct position.
    ///
    /// `lookup` resolves cached snapshots for the cids already tracked;
    /// once an unresolvable cid is reached the channel is placed before
    /// it, so unresolvable entries order after resolvable ones. Equal
    /// entries keep their existing relative order (the insert lands
    /// after them).
    pub fn insert<F>(&mut self, channel: &Channel, lookup: F)
    where
        F: Fn(&Cid) -> Option<Channel>,
    {
        self.remove(&channel.cid);

        let mut index = self.cids.len();
        for (i, cid) in self.cids.iter().enumerate() {
            match lookup(cid) {
                Some(existing) => {
                    if self.comparator.compare(channel, &existing) == Ordering::Less {
                        index = i;
                        break;
                    }
                }
                None => {
                    index = i;
                    break;
                }
            }
        }
        self.cids.insert(index, channel.cid.clone());
    }

    /// Re-place a tracked channel whose sort fields changed. A channel
    /// that is not tracked is left out (this never adds).
    pub fn reposition<F>(&mut self, channel: &Channel, lookup: F)
    where
        F: Fn(&Cid) -> Option<Channel>,
    {
        if self.contains(&channel.cid) {
            self.insert(channel, lookup);
        }
    }

    /// Remove a channel from the result set. Returns whether it was
    /// present.
    pub fn remove(&mut self, cid: &Cid) -> bool {
        let before = self.cids.len();
        self.cids.retain(|c| c != cid);
        self.cids.len() != before
    }
}

/// Cache of query specs, keyed by (filter, sort).
///
/// `get` is idempotent: the same pair always resolves to the same spec
/// (and therefore the same [`QueryId`]) for the cache's lifetime.
#[derive(Debug, Default)]
pub struct QuerySpecCache {
    specs: Vec<QueryChannelsSpec>,
}

impl QuerySpecCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the spec for a (filter, sort) pair, creating it on first use.
    pub fn get(&mut self, filter: &Filter, sort: &SortSpec) -> &mut QueryChannelsSpec {
        let index = match self
            .specs
            .iter()
            .position(|s| s.filter() == filter && s.sort() == sort)
        {
            Some(index) => index,
            None => {
                self.specs
                    .push(QueryChannelsSpec::new(filter.clone(), sort.clone()));
                self.specs.len() - 1
            }
        };
        &mut self.specs[index]
    }

    /// Restore a persisted spec. If its (filter, sort) pair is already
    /// cached the existing spec wins; otherwise the snapshot is adopted
    /// with its persisted identity. Returns the effective id.
    pub fn restore(&mut self, snapshot: QuerySpecSnapshot) -> QueryId {
        if let Some(existing) = self
            .specs
            .iter()
            .find(|s| s.filter() == &snapshot.filter && s.sort() == &snapshot.sort)
        {
            return existing.id();
        }
        let id = snapshot.id;
        self.specs.push(QueryChannelsSpec::from_snapshot(snapshot));
        id
    }

    /// Look up a spec by id.
    pub fn by_id(&self, id: QueryId) -> Option<&QueryChannelsSpec> {
        self.specs.iter().find(|s| s.id() == id)
    }

    /// Look up a spec by id, mutably.
    pub fn by_id_mut(&mut self, id: QueryId) -> Option<&mut QueryChannelsSpec> {
        self.specs.iter_mut().find(|s| s.id() == id)
    }

    /// Iterate over all cached specs.
    pub fn iter(&self) -> impl Iterator<Item = &QueryChannelsSpec> {
        self.specs.iter()
    }

    /// Iterate over all cached specs, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut QueryChannelsSpec> {
        self.specs.iter_mut()
    }

    /// Number of cached specs.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Drop every cached spec (logout).
    pub fn clear(&mut self) {
        self.specs.clear();
    }
}
