//! tally-domain
//!
//! Pure domain models for the recurring ledger: entries, recurrence cadences,
//! the recurrence policy table and series identity.
//! No I/O, no scheduling, no storage. Only data types and core enums.

pub mod entry;
pub mod recurrence;
pub mod series;

pub use entry::*;
pub use recurrence::*;
pub use series::*;
