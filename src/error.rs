use tally_config::ConfigError;
use tally_core::CoreError;
use thiserror::Error;

/// Errors surfaced by the engine, the scheduler and the daemon.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Runtime error: {0}")]
    Runtime(String),
}
