use std::fs;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use tally_core::{CoreError, EntryStore};
use tally_domain::{Entry, EntryKind, Recurrence};
use tally_storage_json::{Collection, JsonEntryStore, SCHEMA_VERSION};
use tempfile::tempdir;
use uuid::Uuid;

fn sample_entries() -> Vec<Entry> {
    let date = Utc.with_ymd_and_hms(2025, 2, 3, 7, 15, 0).unwrap();
    vec![
        Entry::new(
            Decimal::new(123456, 2),
            "Salary",
            EntryKind::Income,
            date,
            Recurrence::Monthly,
        )
        .with_notes("net of tax")
        .with_icon("briefcase")
        .with_series(Uuid::new_v4()),
        Entry::new(
            Decimal::new(450, 2),
            "Coffee",
            EntryKind::Expense,
            date,
            Recurrence::OneTime,
        ),
    ]
}

#[test]
fn missing_files_load_as_empty() {
    let dir = tempdir().expect("tempdir");
    let store = JsonEntryStore::new(dir.path().join("data")).expect("create store");

    assert!(store.load_committed().expect("load committed").is_empty());
    assert!(store.load_pending().expect("load pending").is_empty());
}

#[test]
fn collections_round_trip_every_field() {
    let dir = tempdir().expect("tempdir");
    let store = JsonEntryStore::new(dir.path().to_path_buf()).expect("create store");
    let committed = sample_entries();
    let pending = vec![committed[0].occurrence(Uuid::new_v4(), Utc::now())];

    store.save_committed(&committed).expect("save committed");
    store.save_pending(&pending).expect("save pending");

    assert_eq!(store.load_committed().expect("load committed"), committed);
    assert_eq!(store.load_pending().expect("load pending"), pending);
    assert!(store.collection_path(Collection::Committed).exists());
    assert!(!store
        .collection_path(Collection::Committed)
        .with_extension("json.tmp")
        .exists());
}

#[test]
fn overwrites_rotate_bounded_backups() {
    let dir = tempdir().expect("tempdir");
    let store = JsonEntryStore::with_retention(dir.path().to_path_buf(), 2).expect("create store");
    let entries = sample_entries();

    for _ in 0..6 {
        store.save_pending(&entries).expect("save pending");
    }

    let backups = store.list_backups(Collection::Pending).expect("list backups");
    assert!(!backups.is_empty());
    assert!(backups.len() <= 2);
    assert!(store
        .list_backups(Collection::Committed)
        .expect("list committed backups")
        .is_empty());
}

#[test]
fn legacy_array_layout_is_accepted() {
    let dir = tempdir().expect("tempdir");
    let store = JsonEntryStore::new(dir.path().to_path_buf()).expect("create store");
    let entries = sample_entries();
    fs::write(
        store.collection_path(Collection::Committed),
        serde_json::to_string(&entries).expect("serialize"),
    )
    .expect("write legacy file");

    assert_eq!(store.load_committed().expect("load legacy"), entries);
}

#[test]
fn newer_schema_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let store = JsonEntryStore::new(dir.path().to_path_buf()).expect("create store");
    let body = format!(
        r#"{{"schema_version": {}, "saved_at": "2025-01-01T00:00:00Z", "entries": []}}"#,
        SCHEMA_VERSION + 1
    );
    fs::write(store.collection_path(Collection::Pending), body).expect("write file");

    let err = store.load_pending().expect_err("future schema must fail");
    assert!(
        matches!(err, CoreError::UnsupportedSchema { found, .. } if found == SCHEMA_VERSION + 1),
        "unexpected error: {err:?}"
    );
}

#[test]
fn newer_schema_with_changed_entries_is_rejected_by_version() {
    let dir = tempdir().expect("tempdir");
    let store = JsonEntryStore::new(dir.path().to_path_buf()).expect("create store");
    let body = format!(
        r#"{{"schema_version": {}, "entries": [{{"amount_minor": 450, "labels": ["coffee"]}}]}}"#,
        SCHEMA_VERSION + 1
    );
    fs::write(store.collection_path(Collection::Committed), body).expect("write file");

    let err = store.load_committed().expect_err("future schema must fail");
    assert!(
        matches!(err, CoreError::UnsupportedSchema { found, .. } if found == SCHEMA_VERSION + 1),
        "unexpected error: {err:?}"
    );
}

#[test]
fn rapid_saves_keep_every_backup() {
    let dir = tempdir().expect("tempdir");
    let store = JsonEntryStore::with_retention(dir.path().to_path_buf(), 10).expect("create store");
    let entries = sample_entries();

    for _ in 0..4 {
        store.save_committed(&entries).expect("save committed");
    }

    let backups = store.list_backups(Collection::Committed).expect("list backups");
    assert_eq!(backups.len(), 3);
}

#[test]
fn corrupt_file_reports_serde_error() {
    let dir = tempdir().expect("tempdir");
    let store = JsonEntryStore::new(dir.path().to_path_buf()).expect("create store");
    fs::write(store.collection_path(Collection::Committed), "{ not json").expect("write file");

    assert!(matches!(store.load_committed(), Err(CoreError::Serde(_))));
}
