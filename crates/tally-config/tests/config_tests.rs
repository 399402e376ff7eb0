use std::fs;

use tally_config::{Config, ConfigError, ConfigManager};
use tally_domain::SeriesIdentity;
use tempfile::tempdir;

#[test]
fn missing_file_yields_defaults() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");

    let config = manager.load().expect("load defaults");
    assert_eq!(config, Config::default());
    assert_eq!(config.reconcile_interval_secs, 3600);
    assert_eq!(config.series_identity, SeriesIdentity::SeriesId);
}

#[test]
fn save_and_reload_round_trip() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
    let config = Config {
        data_dir: Some(dir.path().join("ledger")),
        reconcile_interval_secs: 900,
        backup_retention: 2,
        series_identity: SeriesIdentity::Values,
        log_filter: Some("tally_core=debug".into()),
    };

    manager.save(&config).expect("save config");
    assert_eq!(manager.load().expect("reload"), config);
    assert_eq!(config.resolve_data_dir(), dir.path().join("ledger"));
}

#[test]
fn partial_file_fills_defaults() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
    fs::write(manager.config_path(), r#"{ "series_identity": "values" }"#).expect("write");

    let config = manager.load().expect("load partial");
    assert_eq!(config.series_identity, SeriesIdentity::Values);
    assert_eq!(config.backup_retention, 5);
}

#[test]
fn zero_interval_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
    let config = Config {
        reconcile_interval_secs: 0,
        ..Config::default()
    };

    assert!(matches!(manager.save(&config), Err(ConfigError::Invalid(_))));
    assert!(!manager.config_path().exists());
}
