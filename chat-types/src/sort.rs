//! Channel-list sort descriptions.
//!
//! A [`SortSpec`] is data only: an ordered list of fields with
//! directions. The composite comparator that evaluates it lives in
//! backchat-core.

use serde::{Deserialize, Serialize};

/// Sort direction for a single field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// One field of a sort description.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortField {
    /// Field name; `"last_updated"` resolves to the synthetic
    /// most-recent-activity key, everything else via `Channel::field`.
    pub field: String,
    /// Direction for this field.
    pub direction: Direction,
}

impl SortField {
    /// Ascending sort on a field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    /// Descending sort on a field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// An ordered, multi-field sort description. Earlier fields take
/// priority; later fields break ties.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    fields: Vec<SortField>,
}

impl SortSpec {
    /// Create a sort description from its fields, highest priority first.
    pub fn new(fields: impl IntoIterator<Item = SortField>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    /// The fields, highest priority first.
    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    /// The default channel-list ordering: most recently updated first.
    pub fn last_updated() -> Self {
        Self::new([SortField::desc("last_updated")])
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::last_updated()
    }
}
