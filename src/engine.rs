//! The public mutation surface over a [`LedgerBook`].
//!
//! Every operation runs as one critical section on the book. When an operation
//! changes state, a snapshot of both collections is queued for the background
//! writer before the lock is released, so the order of writes always matches
//! the order of mutations. The writer coalesces queued snapshots and keeps a
//! failed one around until a later write succeeds.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tally_core::{
    Clock, CoreError, DeleteScope, EntryDraft, EntryStore, LedgerBook, ReconcileReport,
    RegenerateReport, Reminder,
};
use tally_domain::{Entry, SeriesIdentity};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::TallyError;

#[derive(Debug)]
struct Snapshot {
    committed: Vec<Entry>,
    pending: Vec<Entry>,
}

enum FlushRequest {
    Write(Arc<Snapshot>),
    Barrier(oneshot::Sender<Result<(), String>>),
}

/// Thread-safe owner of the ledger and its persistence queue.
///
/// Must be opened inside a tokio runtime; the writer task lives as long as the
/// engine does.
pub struct LedgerEngine {
    book: Mutex<LedgerBook>,
    clock: Arc<dyn Clock>,
    writer: mpsc::UnboundedSender<FlushRequest>,
}

impl LedgerEngine {
    /// Loads both collections from `store`, repairs identifier clashes and runs
    /// one reconciliation tick to catch up on anything missed while stopped.
    pub async fn open(
        store: Arc<dyn EntryStore>,
        clock: Arc<dyn Clock>,
        identity: SeriesIdentity,
    ) -> Result<Self, TallyError> {
        let loader = Arc::clone(&store);
        let (committed, pending) = tokio::task::spawn_blocking(move || {
            Ok::<_, CoreError>((loader.load_committed()?, loader.load_pending()?))
        })
        .await
        .map_err(|err| TallyError::Runtime(format!("loader task failed: {err}")))??;

        let (book, repairs) = LedgerBook::from_parts(committed, pending, identity);
        for repair in &repairs {
            tracing::warn!(repair = %repair, "ledger data repaired on load");
        }
        tracing::info!(
            committed = book.committed().len(),
            pending = book.pending().len(),
            identity = ?identity,
            "ledger loaded"
        );

        let (writer, queue) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(store, queue));

        let engine = Self {
            book: Mutex::new(book),
            clock,
            writer,
        };
        let report = engine.reconcile();
        if !repairs.is_empty() && !report.changed() {
            engine.mutate(|_, _| ((), true));
        }
        Ok(engine)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn identity(&self) -> SeriesIdentity {
        self.lock().identity()
    }

    /// Adds an entry, expanding it when it recurs. Returns how many entries were inserted.
    pub fn add(&self, entry: Entry) -> usize {
        self.mutate(|book, now| {
            let inserted = book.add(entry, now);
            (inserted, inserted > 0)
        })
    }

    /// Validates a draft and adds the resulting entry.
    ///
    /// Returns the id of the stored entry, or `None` when the draft matched a
    /// series that already has a member on that date and nothing was stored.
    pub fn submit(&self, draft: EntryDraft) -> Result<Option<Uuid>, TallyError> {
        let entry = draft.build()?;
        let id = entry.id;
        let stored = self.mutate(|book, now| {
            let inserted = book.add(entry, now);
            (book.contains(id), inserted > 0)
        });
        if !stored {
            tracing::debug!(%id, "draft merged into an existing occurrence; nothing stored");
        }
        Ok(stored.then_some(id))
    }

    pub fn update(&self, entry: Entry) -> bool {
        self.mutate(|book, _| {
            let updated = book.update(entry);
            (updated, updated)
        })
    }

    pub fn delete(&self, id: Uuid) -> Option<Entry> {
        self.mutate(|book, _| {
            let removed = book.delete(id);
            let changed = removed.is_some();
            (removed, changed)
        })
    }

    pub fn delete_series_from(&self, entry: &Entry, scope: DeleteScope) -> usize {
        self.mutate(|book, _| {
            let removed = book.delete_series_from(entry, scope);
            (removed, removed > 0)
        })
    }

    pub fn promote_due(&self) -> usize {
        self.mutate(|book, now| {
            let promoted = book.promote_due(now);
            (promoted, promoted > 0)
        })
    }

    pub fn regenerate_all(&self) -> RegenerateReport {
        self.mutate(|book, now| {
            let report = book.regenerate_all(now);
            (report, report.changed)
        })
    }

    /// Promotion followed by regeneration, in a single critical section.
    pub fn reconcile(&self) -> ReconcileReport {
        let report = self.mutate(|book, now| {
            let report = book.reconcile(now);
            (report, report.changed())
        });
        if report.changed() {
            tracing::info!(
                promoted = report.promoted,
                expired = report.regenerated.expired,
                series = report.regenerated.series,
                committed = report.regenerated.committed,
                pending = report.regenerated.pending,
                "reconciliation tick"
            );
        } else {
            tracing::debug!("reconciliation tick; nothing to do");
        }
        report
    }

    pub fn committed(&self) -> Vec<Entry> {
        self.lock().committed().to_vec()
    }

    pub fn pending(&self) -> Vec<Entry> {
        self.lock().pending().to_vec()
    }

    pub fn entry(&self, id: Uuid) -> Option<Entry> {
        self.lock().entry(id).cloned()
    }

    pub fn upcoming_reminders(&self, after: DateTime<Utc>, until: DateTime<Utc>) -> Vec<Reminder> {
        self.lock().upcoming_reminders(after, until)
    }

    /// Runs a read-only query against the current book, e.g.
    /// `engine.view(SummaryService::series_overview)`.
    pub fn view<R>(&self, query: impl FnOnce(&LedgerBook) -> R) -> R {
        query(&self.lock())
    }

    /// Waits until everything queued before this call has been written.
    ///
    /// Reports the outcome of the latest write attempt. A failure leaves memory
    /// untouched; the unsaved snapshot is retried by the next flush or mutation.
    pub async fn flush(&self) -> Result<(), TallyError> {
        let (reply, outcome) = oneshot::channel();
        self.writer
            .send(FlushRequest::Barrier(reply))
            .map_err(|_| TallyError::Runtime("ledger writer is not running".into()))?;
        outcome
            .await
            .map_err(|_| TallyError::Runtime("ledger writer stopped before flushing".into()))?
            .map_err(|message| TallyError::Core(CoreError::Storage(message)))
    }

    fn mutate<R>(&self, op: impl FnOnce(&mut LedgerBook, DateTime<Utc>) -> (R, bool)) -> R {
        let now = self.clock.now();
        let mut book = self.lock();
        let (result, changed) = op(&mut book, now);
        if changed {
            let snapshot = Snapshot {
                committed: book.committed().to_vec(),
                pending: book.pending().to_vec(),
            };
            if self
                .writer
                .send(FlushRequest::Write(Arc::new(snapshot)))
                .is_err()
            {
                tracing::warn!("ledger writer is gone; change kept in memory only");
            }
        }
        result
    }

    fn lock(&self) -> MutexGuard<'_, LedgerBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_writer(store: Arc<dyn EntryStore>, mut queue: mpsc::UnboundedReceiver<FlushRequest>) {
    let mut unsaved: Option<Arc<Snapshot>> = None;
    while let Some(first) = queue.recv().await {
        let mut barriers = Vec::new();
        let mut next = Some(first);
        while let Some(request) = next.take().or_else(|| queue.try_recv().ok()) {
            match request {
                FlushRequest::Write(snapshot) => unsaved = Some(snapshot),
                FlushRequest::Barrier(reply) => barriers.push(reply),
            }
        }

        let outcome = match unsaved.take() {
            None => Ok(()),
            Some(snapshot) => {
                let result = write_snapshot(Arc::clone(&store), Arc::clone(&snapshot)).await;
                if result.is_err() {
                    unsaved = Some(snapshot);
                }
                result
            }
        };
        for reply in barriers {
            let _ = reply.send(outcome.clone());
        }
    }
    tracing::debug!("ledger writer stopped");
}

async fn write_snapshot(store: Arc<dyn EntryStore>, snapshot: Arc<Snapshot>) -> Result<(), String> {
    let task = tokio::task::spawn_blocking(move || {
        store.save_committed(&snapshot.committed)?;
        store.save_pending(&snapshot.pending)?;
        Ok::<_, CoreError>((snapshot.committed.len(), snapshot.pending.len()))
    });
    match task.await {
        Ok(Ok((committed, pending))) => {
            tracing::debug!(committed, pending, "ledger flushed");
            Ok(())
        }
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "ledger flush failed; memory remains authoritative");
            Err(err.to_string())
        }
        Err(err) => {
            tracing::warn!(error = %err, "ledger flush task aborted");
            Err(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use tally_core::{ManualClock, MemoryEntryStore};
    use tally_domain::{EntryKind, Recurrence};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
    }

    async fn engine_with(store: Arc<MemoryEntryStore>) -> LedgerEngine {
        let clock = Arc::new(ManualClock::new(start()));
        LedgerEngine::open(store, clock, SeriesIdentity::default())
            .await
            .expect("open engine")
    }

    #[tokio::test]
    async fn unchanged_operations_do_not_write() {
        let store = Arc::new(MemoryEntryStore::new());
        let engine = engine_with(Arc::clone(&store)).await;

        assert!(!engine.update(Entry::new(
            Decimal::ONE,
            "Ghost",
            EntryKind::Expense,
            start(),
            Recurrence::OneTime,
        )));
        assert!(engine.delete(Uuid::new_v4()).is_none());
        engine.reconcile();
        engine.flush().await.expect("flush");

        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn queued_snapshots_are_coalesced_to_latest_state() {
        let store = Arc::new(MemoryEntryStore::new());
        let engine = engine_with(Arc::clone(&store)).await;

        let mut last = None;
        for day in 0..20 {
            let entry = Entry::new(
                Decimal::from(day + 1),
                "Lunch",
                EntryKind::Expense,
                start() - Duration::days(day),
                Recurrence::OneTime,
            );
            last = Some(entry.id);
            engine.add(entry);
        }
        engine.flush().await.expect("flush");

        let stored = store.committed_snapshot();
        assert_eq!(stored.len(), 20);
        assert_eq!(stored.last().map(|e| e.id), last);
        assert!(store.save_count() <= 40);
    }
}
