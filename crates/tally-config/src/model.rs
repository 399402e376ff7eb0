use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use tally_domain::SeriesIdentity;

use crate::ConfigError;

/// Engine settings persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Directory holding the committed/pending files. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,

    #[serde(default = "Config::default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    #[serde(default = "Config::default_backup_retention")]
    pub backup_retention: usize,

    #[serde(default)]
    pub series_identity: SeriesIdentity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Extra `tracing` filter directives, e.g. `tally_core=debug`.
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            reconcile_interval_secs: Self::default_reconcile_interval_secs(),
            backup_retention: Self::default_backup_retention(),
            series_identity: SeriesIdentity::default(),
            log_filter: None,
        }
    }
}

impl Config {
    pub fn default_reconcile_interval_secs() -> u64 {
        60 * 60
    }

    pub fn default_backup_retention() -> usize {
        5
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(path) = &self.data_dir {
            return path.clone();
        }

        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        base.join("tally")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconcile_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "reconcile_interval_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
