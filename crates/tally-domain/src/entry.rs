//! The ledger line item and its classification.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recurrence::Recurrence;

/// What an entry means for the balance. Amounts are always stored positive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Income,
    Expense,
    Investment,
    Savings,
}

impl EntryKind {
    pub const ALL: [EntryKind; 4] = [
        EntryKind::Income,
        EntryKind::Expense,
        EntryKind::Investment,
        EntryKind::Savings,
    ];
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryKind::Income => "Income",
            EntryKind::Expense => "Expense",
            EntryKind::Investment => "Investment",
            EntryKind::Savings => "Savings",
        };
        f.write_str(label)
    }
}

/// A single financial line item, either one-time or one occurrence of a series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub id: Uuid,
    pub amount: Decimal,
    pub category: String,
    pub kind: EntryKind,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub icon: String,
    /// Shared by every occurrence generated from the same recurring definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_id: Option<Uuid>,
    /// Exclusive cut-off left behind by a "this and future" cancellation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_before: Option<DateTime<Utc>>,
    /// Occurrence dates cancelled one at a time; never regenerated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_dates: Vec<DateTime<Utc>>,
}

impl Entry {
    pub fn new(
        amount: Decimal,
        category: impl Into<String>,
        kind: EntryKind,
        date: DateTime<Utc>,
        recurrence: Recurrence,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            category: category.into(),
            kind,
            date,
            recurrence,
            notes: None,
            icon: String::new(),
            series_id: None,
            ends_before: None,
            skipped_dates: Vec::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_series(mut self, series_id: Uuid) -> Self {
        self.series_id = Some(series_id);
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_recurring()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.date <= now
    }

    /// Whether the series this entry belongs to may still produce `date`.
    pub fn allows_occurrence_on(&self, date: DateTime<Utc>) -> bool {
        self.ends_before.map_or(true, |end| date < end) && !self.skipped_dates.contains(&date)
    }

    /// Records that the series stops before `cutoff`, keeping the earliest cut-off seen.
    pub fn end_series_before(&mut self, cutoff: DateTime<Utc>) {
        self.ends_before = Some(self.ends_before.map_or(cutoff, |end| end.min(cutoff)));
    }

    pub fn lift_cut_off(&mut self) {
        self.ends_before = None;
    }

    pub fn skip_date(&mut self, date: DateTime<Utc>) {
        if !self.skipped_dates.contains(&date) {
            self.skipped_dates.push(date);
            self.skipped_dates.sort();
        }
    }

    /// Carries cancellation bookkeeping over from `previous` when this entry has none.
    pub fn inherit_cancellations(&mut self, previous: &Entry) {
        if let Some(end) = previous.ends_before {
            self.end_series_before(end);
        }
        for date in &previous.skipped_dates {
            self.skip_date(*date);
        }
    }

    /// Copies the series-defining fields into a new occurrence on `date`.
    pub fn occurrence(&self, id: Uuid, date: DateTime<Utc>) -> Entry {
        Entry {
            id,
            date,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn occurrence_keeps_series_fields() {
        let date = Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap();
        let seed = Entry::new(
            Decimal::new(4250, 2),
            "Gym",
            EntryKind::Expense,
            date,
            Recurrence::Monthly,
        )
        .with_notes("membership")
        .with_icon("dumbbell")
        .with_series(Uuid::new_v4());

        let id = Uuid::new_v4();
        let next = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();
        let copy = seed.occurrence(id, next);

        assert_eq!(copy.id, id);
        assert_eq!(copy.date, next);
        assert_eq!(copy.amount, seed.amount);
        assert_eq!(copy.notes.as_deref(), Some("membership"));
        assert_eq!(copy.icon, "dumbbell");
        assert_eq!(copy.series_id, seed.series_id);
    }

    #[test]
    fn legacy_json_without_series_deserializes() {
        let json = r#"{
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "amount": "12.50",
            "category": "Coffee",
            "kind": "expense",
            "date": "2025-01-02T10:00:00Z"
        }"#;
        let entry: Entry = serde_json::from_str(json).expect("parse legacy entry");
        assert_eq!(entry.recurrence, Recurrence::OneTime);
        assert!(entry.series_id.is_none());
        assert!(entry.icon.is_empty());
        assert!(entry.ends_before.is_none());
        assert!(entry.skipped_dates.is_empty());
        assert_eq!(entry.amount, Decimal::new(1250, 2));
    }

    #[test]
    fn cancellations_restrict_future_dates() {
        let start = Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap();
        let mut seed = Entry::new(
            Decimal::from(30),
            "Cleaning",
            EntryKind::Expense,
            start,
            Recurrence::Weekly,
        );
        let week = chrono::Duration::weeks(1);

        seed.skip_date(start + week);
        seed.end_series_before(start + week * 4);
        seed.end_series_before(start + week * 6);

        assert!(!seed.allows_occurrence_on(start + week));
        assert!(seed.allows_occurrence_on(start + week * 2));
        assert!(!seed.allows_occurrence_on(start + week * 4));
        assert_eq!(seed.ends_before, Some(start + week * 4));

        let copy = seed.occurrence(Uuid::new_v4(), start + week * 3);
        assert_eq!(copy.skipped_dates, vec![start + week]);
        assert_eq!(copy.ends_before, seed.ends_before);
    }
}
