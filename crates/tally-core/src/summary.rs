//! Read-only aggregates over entry collections.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tally_domain::{Entry, EntryKind, Recurrence, SeriesKey};
use uuid::Uuid;

use crate::book::LedgerBook;

/// Point-in-time view of one recurring series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSnapshot {
    pub series_id: Option<Uuid>,
    pub category: String,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub recurrence: Recurrence,
    pub committed: usize,
    pub pending: usize,
    pub last_committed: Option<DateTime<Utc>>,
    pub next_due: Option<DateTime<Utc>>,
}

pub struct SummaryService;

impl SummaryService {
    /// Sums amounts per entry kind. Kinds without entries are reported as zero.
    pub fn totals_by_kind<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> BTreeMap<EntryKind, Decimal> {
        let mut totals: BTreeMap<EntryKind, Decimal> =
            EntryKind::ALL.iter().map(|kind| (*kind, Decimal::ZERO)).collect();
        for entry in entries {
            *totals.entry(entry.kind).or_default() += entry.amount;
        }
        totals
    }

    /// Sums amounts per category, optionally restricted to one kind.
    pub fn totals_by_category<'a>(
        entries: impl IntoIterator<Item = &'a Entry>,
        kind: Option<EntryKind>,
    ) -> BTreeMap<String, Decimal> {
        let mut totals = BTreeMap::new();
        for entry in entries {
            if kind.is_some_and(|wanted| wanted != entry.kind) {
                continue;
            }
            *totals.entry(entry.category.clone()).or_insert(Decimal::ZERO) += entry.amount;
        }
        totals
    }

    /// Income minus everything that leaves the spendable balance.
    pub fn net_balance<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Decimal {
        entries.into_iter().fold(Decimal::ZERO, |acc, entry| match entry.kind {
            EntryKind::Income => acc + entry.amount,
            EntryKind::Expense | EntryKind::Investment | EntryKind::Savings => acc - entry.amount,
        })
    }

    /// Lists every recurring series in the book, ordered by next due date.
    pub fn series_overview(book: &LedgerBook) -> Vec<SeriesSnapshot> {
        let identity = book.identity();
        let mut order: Vec<SeriesKey> = Vec::new();
        let mut snapshots: HashMap<SeriesKey, SeriesSnapshot> = HashMap::new();

        let tagged = book
            .committed()
            .iter()
            .map(|entry| (entry, true))
            .chain(book.pending().iter().map(|entry| (entry, false)));
        for (entry, is_committed) in tagged {
            let Some(key) = SeriesKey::of(entry, identity) else {
                continue;
            };
            let snapshot = snapshots.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                SeriesSnapshot {
                    series_id: entry.series_id,
                    category: entry.category.clone(),
                    kind: entry.kind,
                    amount: entry.amount,
                    recurrence: entry.recurrence,
                    committed: 0,
                    pending: 0,
                    last_committed: None,
                    next_due: None,
                }
            });
            if is_committed {
                snapshot.committed += 1;
                snapshot.last_committed = snapshot.last_committed.max(Some(entry.date));
            } else {
                snapshot.pending += 1;
                snapshot.next_due = match snapshot.next_due {
                    Some(current) => Some(current.min(entry.date)),
                    None => Some(entry.date),
                };
            }
        }

        let mut result: Vec<SeriesSnapshot> = order
            .into_iter()
            .filter_map(|key| snapshots.remove(&key))
            .collect();
        result.sort_by_key(|snapshot| (snapshot.next_due.is_none(), snapshot.next_due));
        result
    }
}
