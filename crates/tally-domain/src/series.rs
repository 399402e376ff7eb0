//! Grouping of entries into recurring series.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{entry::Entry, EntryKind, Recurrence};

/// Strategy used to decide whether two entries belong to the same series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeriesIdentity {
    /// Group by the `series_id` stamped at series creation. Entries without one
    /// fall back to value matching.
    #[default]
    SeriesId,
    /// Group by `(category, kind, amount, recurrence)`. Unrelated series with
    /// identical values merge under this strategy.
    Values,
}

/// Grouping key for a recurring series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SeriesKey {
    Id(Uuid),
    Values {
        category: String,
        kind: EntryKind,
        amount: Decimal,
        recurrence: Recurrence,
    },
}

impl SeriesKey {
    /// Returns `None` for one-time entries, which never form a series.
    pub fn of(entry: &Entry, identity: SeriesIdentity) -> Option<SeriesKey> {
        if !entry.is_recurring() {
            return None;
        }
        match (identity, entry.series_id) {
            (SeriesIdentity::SeriesId, Some(id)) => Some(SeriesKey::Id(id)),
            _ => Some(SeriesKey::Values {
                category: entry.category.clone(),
                kind: entry.kind,
                amount: entry.amount.normalize(),
                recurrence: entry.recurrence,
            }),
        }
    }

    pub fn matches(&self, entry: &Entry, identity: SeriesIdentity) -> bool {
        SeriesKey::of(entry, identity).as_ref() == Some(self)
    }
}
