mod common;

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

use common::temp_dir;

fn tallyd() -> Command {
    Command::cargo_bin("tallyd").expect("tallyd binary")
}

#[test]
fn once_reports_empty_ledger() {
    let base = temp_dir();
    let data = base.join("data");

    tallyd()
        .args(["--once", "--config"])
        .arg(&base)
        .arg("--data-dir")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"committed\": 0"))
        .stdout(predicate::str::contains("\"pending\": 0"));

    assert!(data.join("backups").is_dir());
}

#[test]
fn once_catches_up_stored_series() {
    let base = temp_dir();
    let data = base.join("data");
    fs::create_dir_all(&data).expect("data dir");
    let seed = r#"[{
        "id": "6f2c1b9e-0c55-4c1e-9a43-3f9c2d1f7a10",
        "amount": "20",
        "category": "Allowance",
        "kind": "income",
        "date": "2020-01-06T09:00:00Z",
        "recurrence": "annual",
        "series_id": "a3d4c0b2-5e61-4f8e-8d1a-2b7c9e0f4d35"
    }]"#;
    fs::write(data.join("committed.json"), seed).expect("seed file");

    tallyd()
        .arg("--once")
        .arg("--config")
        .arg(&base)
        .arg("--data-dir")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"series\": 1"))
        .stdout(predicate::str::contains("\"committed\": 0").not());

    let rewritten = fs::read_to_string(data.join("committed.json")).expect("committed file");
    assert!(rewritten.contains("\"schema_version\": 1"));
}

#[test]
fn rejects_unknown_arguments() {
    tallyd()
        .arg("--bogus")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown argument"));
}

#[test]
fn rejects_zero_interval() {
    let base = temp_dir();
    tallyd()
        .args(["--once", "--interval", "0", "--config"])
        .arg(&base)
        .arg("--data-dir")
        .arg(base.join("data"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("reconcile_interval_secs"));
}

#[test]
fn version_prints_build_metadata() {
    tallyd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("tally "));
}
