#![doc(test(attr(deny(warnings))))]

//! Tally keeps a ledger of committed and upcoming entries. Recurring entries are
//! expanded into dated occurrences and reconciled against the clock on a fixed
//! cadence, with both collections persisted after every change.

pub mod engine;
pub mod error;
pub mod scheduler;
pub mod utils;

pub use engine::LedgerEngine;
pub use error::TallyError;
pub use scheduler::ReconciliationScheduler;
pub use utils::build_info;

pub use tally_config::{Config, ConfigError, ConfigManager};
pub use tally_core::{
    Clock, CoreError, DeleteScope, EntryDraft, EntryStore, LedgerBook, ManualClock,
    MemoryEntryStore, ReceiptSuggestion, ReconcileReport, RegenerateReport, Reminder,
    SeriesSnapshot, SummaryService, SystemClock,
};
pub use tally_domain::{Entry, EntryKind, Recurrence, RecurrencePolicy, SeriesIdentity, SeriesKey};
pub use tally_storage_json::JsonEntryStore;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    init_with_filter(None);
}

/// Like [`init`], with extra filter directives layered over `RUST_LOG`.
pub fn init_with_filter(directives: Option<&str>) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(directives);
        let meta = build_info::current();
        tracing::info!(
            version = meta.version,
            git = meta.git_hash,
            profile = meta.profile,
            "Tally tracing initialized."
        );
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
        super::init_with_filter(Some("tally_core=debug"));
    }
}
