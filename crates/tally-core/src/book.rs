//! The committed/pending ledger and the operations that move entries between them.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tally_domain::{Entry, SeriesIdentity, SeriesKey};
use uuid::Uuid;

use crate::generator::{Generated, OccurrenceGenerator};

/// How far a series cancellation reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteScope {
    ThisOnly,
    ThisAndFuture,
}

/// Outcome of a single regeneration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegenerateReport {
    pub changed: bool,
    pub expired: usize,
    pub series: usize,
    pub committed: usize,
    pub pending: usize,
}

/// Outcome of a reconciliation tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub promoted: usize,
    pub regenerated: RegenerateReport,
}

impl ReconcileReport {
    /// Whether the tick left either collection different from before.
    pub fn changed(&self) -> bool {
        self.promoted > 0 || self.regenerated.changed
    }
}

/// A pending occurrence whose pre-notification time falls inside a queried interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub entry_id: Uuid,
    pub notify_at: DateTime<Utc>,
    pub due: DateTime<Utc>,
}

/// Owns the committed and pending collections.
///
/// Committed keeps append order. Pending is kept ordered by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerBook {
    committed: Vec<Entry>,
    pending: Vec<Entry>,
    generator: OccurrenceGenerator,
}

impl LedgerBook {
    pub fn new(identity: SeriesIdentity) -> Self {
        Self {
            committed: Vec::new(),
            pending: Vec::new(),
            generator: OccurrenceGenerator::new(identity),
        }
    }

    /// Rebuilds a book from persisted collections, repairing identifier clashes.
    ///
    /// Returns the book together with a description of every repair made. An id
    /// present in both collections keeps its committed copy; repeated ids within
    /// one collection keep their first occurrence.
    pub fn from_parts(
        committed: Vec<Entry>,
        pending: Vec<Entry>,
        identity: SeriesIdentity,
    ) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        let mut keep = |entry: &Entry, collection: &str| {
            if seen.insert(entry.id) {
                true
            } else {
                warnings.push(format!(
                    "dropped duplicate entry {} from {} collection",
                    entry.id, collection
                ));
                false
            }
        };
        let committed: Vec<Entry> = committed
            .into_iter()
            .filter(|entry| keep(entry, "committed"))
            .collect();
        let mut pending: Vec<Entry> = pending
            .into_iter()
            .filter(|entry| keep(entry, "pending"))
            .collect();
        pending.sort_by_key(|entry| entry.date);

        let book = Self {
            committed,
            pending,
            generator: OccurrenceGenerator::new(identity),
        };
        (book, warnings)
    }

    pub fn identity(&self) -> SeriesIdentity {
        self.generator.identity()
    }

    pub fn committed(&self) -> &[Entry] {
        &self.committed
    }

    pub fn pending(&self) -> &[Entry] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.committed.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty() && self.pending.is_empty()
    }

    pub fn entry(&self, id: Uuid) -> Option<&Entry> {
        self.committed
            .iter()
            .chain(self.pending.iter())
            .find(|entry| entry.id == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entry(id).is_some()
    }

    /// Returns every member of the series `entry` belongs to, committed first.
    pub fn series_of(&self, entry: &Entry) -> Vec<&Entry> {
        let Some(key) = SeriesKey::of(entry, self.identity()) else {
            return Vec::new();
        };
        self.committed
            .iter()
            .chain(self.pending.iter())
            .filter(|candidate| key.matches(candidate, self.identity()))
            .collect()
    }

    /// Adds a user-created entry, expanding it into a series when it recurs.
    ///
    /// Returns the number of entries that did not exist before; regenerated
    /// occurrences that kept their id are not counted. Re-adding an id that is
    /// already present is a no-op.
    ///
    /// A recurring entry that matches a series with members dated up to `now` is
    /// not stored itself: the series resumes after its latest member, its cut-off is
    /// lifted and its skipped dates stay skipped.
    pub fn add(&mut self, mut entry: Entry, now: DateTime<Utc>) -> usize {
        if self.contains(entry.id) {
            tracing::debug!(id = %entry.id, "entry already present; add ignored");
            return 0;
        }
        if !entry.is_recurring() {
            self.place(entry, now);
            return 1;
        }
        if entry.series_id.is_none() {
            entry.series_id = Some(Uuid::new_v4());
        }
        if let Some(key) = SeriesKey::of(&entry, self.identity()) {
            let identity = self.identity();
            for member in self
                .committed
                .iter()
                .chain(self.pending.iter())
                .filter(|m| key.matches(m, identity))
            {
                entry.inherit_cancellations(member);
            }
            entry.lift_cut_off();
            self.mark_series(&key, Entry::lift_cut_off);
        }
        let generated = self
            .generator
            .generate(&entry, now, &self.committed, &mut self.pending);
        let inserted = generated.inserted();
        self.absorb(generated);
        tracing::debug!(id = %entry.id, inserted, "recurring entry added");
        inserted
    }

    /// Replaces the stored entry with the same id, wherever it lives.
    ///
    /// The entry stays in its current collection even when its new date crosses
    /// "now"; no regeneration happens. Cancellation bookkeeping of the stored
    /// copy is carried over. Returns `false` when the id is unknown.
    pub fn update(&mut self, mut entry: Entry) -> bool {
        if let Some(slot) = self.committed.iter_mut().find(|e| e.id == entry.id) {
            entry.inherit_cancellations(slot);
            *slot = entry;
            return true;
        }
        if let Some(slot) = self.pending.iter_mut().find(|e| e.id == entry.id) {
            entry.inherit_cancellations(slot);
            *slot = entry;
            self.pending.sort_by_key(|e| e.date);
            return true;
        }
        tracing::debug!(id = %entry.id, "update for unknown entry ignored");
        false
    }

    /// Removes a single entry by id.
    ///
    /// Removing one occurrence of a series records its date on the remaining
    /// members so later regeneration does not bring it back.
    pub fn delete(&mut self, id: Uuid) -> Option<Entry> {
        let removed = if let Some(pos) = self.committed.iter().position(|e| e.id == id) {
            self.committed.remove(pos)
        } else if let Some(pos) = self.pending.iter().position(|e| e.id == id) {
            self.pending.remove(pos)
        } else {
            tracing::debug!(%id, "delete for unknown entry ignored");
            return None;
        };
        if let Some(key) = SeriesKey::of(&removed, self.identity()) {
            let date = removed.date;
            self.mark_series(&key, |member| member.skip_date(date));
        }
        Some(removed)
    }

    /// Deletes `entry` alone, or `entry` together with every later member of its
    /// series from both collections. Returns the number of entries removed.
    pub fn delete_series_from(&mut self, entry: &Entry, scope: DeleteScope) -> usize {
        let key = match scope {
            DeleteScope::ThisOnly => None,
            DeleteScope::ThisAndFuture => SeriesKey::of(entry, self.identity()),
        };
        let Some(key) = key else {
            return usize::from(self.delete(entry.id).is_some());
        };
        let identity = self.identity();
        let cutoff = entry.date;
        let doomed = |candidate: &Entry| candidate.date >= cutoff && key.matches(candidate, identity);

        let before = self.len();
        self.committed.retain(|candidate| !doomed(candidate));
        self.pending.retain(|candidate| !doomed(candidate));
        let removed = before - self.len();
        self.mark_series(&key, |member| member.end_series_before(cutoff));
        tracing::debug!(id = %entry.id, removed, "series cancelled from date");
        removed
    }

    /// Moves every pending entry dated at or before `now` into the committed
    /// collection, preserving their relative order. Returns how many moved.
    pub fn promote_due(&mut self, now: DateTime<Utc>) -> usize {
        let (due, waiting): (Vec<Entry>, Vec<Entry>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|entry| entry.is_due(now));
        self.pending = waiting;
        let promoted = due.len();
        self.committed.extend(due);
        promoted
    }

    /// Drops stale pending entries, then refills every series seen in the
    /// committed collection up to its visibility horizon.
    pub fn regenerate_all(&mut self, now: DateTime<Utc>) -> RegenerateReport {
        let mut report = RegenerateReport::default();
        let previous = self.pending.clone();
        let before = self.pending.len();
        self.pending.retain(|entry| entry.date >= now);
        report.expired = before - self.pending.len();

        let seeds = self.latest_committed_per_series();
        report.series = seeds.len();
        for seed in seeds {
            let generated = self
                .generator
                .generate(&seed, now, &self.committed, &mut self.pending);
            report.committed += generated.committed.len();
            report.pending += generated.pending.len();
            self.committed.extend(generated.committed);
            self.pending.extend(generated.pending);
        }
        self.pending.sort_by_key(|entry| entry.date);
        report.changed = report.committed > 0 || self.pending != previous;
        report
    }

    /// One reconciliation tick: promotion first, so regeneration sees the
    /// occurrences that just became due.
    pub fn reconcile(&mut self, now: DateTime<Utc>) -> ReconcileReport {
        let promoted = self.promote_due(now);
        let regenerated = self.regenerate_all(now);
        ReconcileReport {
            promoted,
            regenerated,
        }
    }

    /// Pending entries whose reminder time falls in `(after, until]`.
    pub fn upcoming_reminders(&self, after: DateTime<Utc>, until: DateTime<Utc>) -> Vec<Reminder> {
        self.pending
            .iter()
            .filter_map(|entry| {
                let notify_at = entry.recurrence.policy().notify_at(entry.date);
                (notify_at > after && notify_at <= until).then(|| Reminder {
                    entry_id: entry.id,
                    notify_at,
                    due: entry.date,
                })
            })
            .collect()
    }

    fn place(&mut self, entry: Entry, now: DateTime<Utc>) {
        if entry.is_due(now) {
            self.committed.push(entry);
        } else {
            let pos = self.pending.partition_point(|e| e.date <= entry.date);
            self.pending.insert(pos, entry);
        }
    }

    fn mark_series(&mut self, key: &SeriesKey, mark: impl Fn(&mut Entry)) {
        let identity = self.identity();
        self.committed
            .iter_mut()
            .chain(self.pending.iter_mut())
            .filter(|member| key.matches(member, identity))
            .for_each(mark);
    }

    fn absorb(&mut self, generated: Generated) {
        self.committed.extend(generated.committed);
        self.pending.extend(generated.pending);
        self.pending.sort_by_key(|entry| entry.date);
    }

    fn latest_committed_per_series(&self) -> Vec<Entry> {
        let identity = self.identity();
        let mut order: Vec<SeriesKey> = Vec::new();
        let mut latest: HashMap<SeriesKey, &Entry> = HashMap::new();
        for entry in &self.committed {
            let Some(key) = SeriesKey::of(entry, identity) else {
                continue;
            };
            match latest.get(&key) {
                Some(current) if current.date > entry.date => {}
                Some(_) => {
                    latest.insert(key, entry);
                }
                None => {
                    order.push(key.clone());
                    latest.insert(key, entry);
                }
            }
        }
        order
            .into_iter()
            .filter_map(|key| latest.get(&key).map(|entry| (*entry).clone()))
            .collect()
    }
}
