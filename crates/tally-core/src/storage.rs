//! The persistence contract for committed and pending collections.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex, MutexGuard,
};

use tally_domain::Entry;

use crate::CoreError;

/// Abstraction over persistence backends holding the two entry collections.
///
/// Missing data loads as an empty collection. Implementations must round-trip
/// every entry field, identifiers included.
pub trait EntryStore: Send + Sync {
    fn load_committed(&self) -> Result<Vec<Entry>, CoreError>;
    fn save_committed(&self, entries: &[Entry]) -> Result<(), CoreError>;
    fn load_pending(&self) -> Result<Vec<Entry>, CoreError>;
    fn save_pending(&self, entries: &[Entry]) -> Result<(), CoreError>;
}

/// In-process store, mostly useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryEntryStore {
    committed: Mutex<Vec<Entry>>,
    pending: Mutex<Vec<Entry>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(committed: Vec<Entry>, pending: Vec<Entry>) -> Self {
        Self {
            committed: Mutex::new(committed),
            pending: Mutex::new(pending),
            ..Self::default()
        }
    }

    /// Makes every subsequent save fail until switched off again.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful collection writes so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn committed_snapshot(&self) -> Vec<Entry> {
        lock(&self.committed).clone()
    }

    pub fn pending_snapshot(&self) -> Vec<Entry> {
        lock(&self.pending).clone()
    }

    fn write(&self, slot: &Mutex<Vec<Entry>>, entries: &[Entry]) -> Result<(), CoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CoreError::Storage("memory store rejecting writes".into()));
        }
        *lock(slot) = entries.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl EntryStore for MemoryEntryStore {
    fn load_committed(&self) -> Result<Vec<Entry>, CoreError> {
        Ok(self.committed_snapshot())
    }

    fn save_committed(&self, entries: &[Entry]) -> Result<(), CoreError> {
        self.write(&self.committed, entries)
    }

    fn load_pending(&self) -> Result<Vec<Entry>, CoreError> {
        Ok(self.pending_snapshot())
    }

    fn save_pending(&self, entries: &[Entry]) -> Result<(), CoreError> {
        self.write(&self.pending, entries)
    }
}

fn lock(slot: &Mutex<Vec<Entry>>) -> MutexGuard<'_, Vec<Entry>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
