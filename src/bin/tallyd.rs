use std::{path::PathBuf, process, sync::Arc};

use rust_decimal::Decimal;
use serde::Serialize;
use tally::{
    build_info, init_with_filter, ConfigManager, JsonEntryStore, LedgerEngine,
    ReconciliationScheduler, SummaryService, SystemClock, TallyError,
};

const USAGE: &str = "\
Usage: tallyd [OPTIONS]

Options:
  --data-dir <PATH>   Directory holding committed.json and pending.json
  --config <DIR>      Base directory for config/config.json
  --interval <SECS>   Reconciliation cadence in seconds
  --once              Reconcile once, print a status report and exit
  --version           Print build information
  -h, --help          Print this help";

#[derive(Debug, Default)]
struct Args {
    data_dir: Option<PathBuf>,
    config_base: Option<PathBuf>,
    interval: Option<u64>,
    once: bool,
}

enum Command {
    Run(Args),
    Help,
    Version,
}

#[derive(Serialize)]
struct StatusReport {
    data_dir: PathBuf,
    committed: usize,
    pending: usize,
    series: usize,
    net_balance: Decimal,
}

#[tokio::main]
async fn main() {
    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("Error: {message}\n\n{USAGE}");
            process::exit(2);
        }
    };
    let args = match command {
        Command::Help => {
            println!("{USAGE}");
            return;
        }
        Command::Version => {
            println!("{}", build_info::current().summary());
            return;
        }
        Command::Run(args) => args,
    };

    if let Err(err) = run(args).await {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Command, String> {
    let mut args = Args::default();
    while let Some(flag) = raw.next() {
        match flag.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--version" => return Ok(Command::Version),
            "--once" => args.once = true,
            "--data-dir" => args.data_dir = Some(PathBuf::from(value_for(&flag, &mut raw)?)),
            "--config" => args.config_base = Some(PathBuf::from(value_for(&flag, &mut raw)?)),
            "--interval" => {
                let value = value_for(&flag, &mut raw)?;
                let secs = value
                    .parse::<u64>()
                    .map_err(|_| format!("--interval expects whole seconds, got `{value}`"))?;
                args.interval = Some(secs);
            }
            other => return Err(format!("unknown argument `{other}`")),
        }
    }
    Ok(Command::Run(args))
}

fn value_for(flag: &str, raw: &mut impl Iterator<Item = String>) -> Result<String, String> {
    raw.next()
        .filter(|value| !value.starts_with("--"))
        .ok_or_else(|| format!("{flag} requires a value"))
}

async fn run(args: Args) -> Result<(), TallyError> {
    let config_base = args.config_base.unwrap_or_else(default_config_base);
    let manager = ConfigManager::with_base_dir(config_base)?;
    let mut config = manager.load()?;
    if let Some(dir) = args.data_dir {
        config.data_dir = Some(dir);
    }
    if let Some(secs) = args.interval {
        config.reconcile_interval_secs = secs;
    }
    config.validate()?;

    init_with_filter(config.log_filter.as_deref());
    tracing::info!(config = %manager.config_path().display(), "configuration loaded");

    let data_dir = config.resolve_data_dir();
    let store = JsonEntryStore::with_retention(data_dir.clone(), config.backup_retention)?;
    let engine = Arc::new(
        LedgerEngine::open(Arc::new(store), Arc::new(SystemClock), config.series_identity).await?,
    );

    if args.once {
        engine.flush().await?;
        let report = engine.view(|book| StatusReport {
            data_dir: data_dir.clone(),
            committed: book.committed().len(),
            pending: book.pending().len(),
            series: SummaryService::series_overview(book).len(),
            net_balance: SummaryService::net_balance(book.committed()),
        });
        let json = serde_json::to_string_pretty(&report)
            .map_err(|err| TallyError::Runtime(err.to_string()))?;
        println!("{json}");
        return Ok(());
    }

    let scheduler = ReconciliationScheduler::start(Arc::clone(&engine), config.reconcile_interval());
    tokio::signal::ctrl_c()
        .await
        .map_err(|err| TallyError::Runtime(format!("failed to listen for shutdown: {err}")))?;
    tracing::info!("shutdown requested");

    let ticks = scheduler.stop().await?;
    engine.flush().await?;
    tracing::info!(ticks, "tallyd stopped");
    Ok(())
}

fn default_config_base() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tally")
}
