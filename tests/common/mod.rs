#![allow(dead_code)]

use std::{path::PathBuf, sync::Mutex};

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use tally::{Entry, EntryKind, Recurrence};
use tempfile::TempDir;
use uuid::Uuid;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// A fresh directory that outlives the calling test.
pub fn temp_dir() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let path = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    path
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 15, 9, 0, 0).unwrap()
}

pub fn allowance(date: DateTime<Utc>) -> Entry {
    Entry::new(
        Decimal::from(20),
        "Allowance",
        EntryKind::Income,
        date,
        Recurrence::Weekly,
    )
    .with_series(Uuid::new_v4())
}

pub fn expense(amount: i64, category: &str, date: DateTime<Utc>) -> Entry {
    Entry::new(
        Decimal::from(amount),
        category,
        EntryKind::Expense,
        date,
        Recurrence::OneTime,
    )
}
