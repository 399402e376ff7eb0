//! tally-core
//!
//! Scheduling and reconciliation logic for the recurring ledger.
//! Depends on tally-domain. No terminal I/O, no threads, no direct file access:
//! persistence goes through the [`storage::EntryStore`] contract.

pub mod book;
pub mod draft;
pub mod error;
pub mod generator;
pub mod storage;
pub mod summary;
pub mod time;

pub use book::*;
pub use draft::*;
pub use error::CoreError;
pub use generator::*;
pub use storage::{EntryStore, MemoryEntryStore};
pub use summary::*;
pub use time::*;
