//! CLI definition and dispatch.

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::cached_broker::{BrokerFactory, CachedBroker};
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_ledger::CsvLedger;
use crate::adapters::csv_signal_store::CsvSignalStore;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_notifier::LogNotifier;
use crate::adapters::notify_worker::{NotifyConfig, NotifyWorker};
use crate::adapters::paper_broker::PaperBroker;
use crate::adapters::strategy_table::{load_strategy_table, new_rows, write_strategy_table};
#[cfg(feature = "telegram")]
use crate::adapters::telegram::{TelegramConfig, TelegramNotifier};
use crate::domain::config_validation::{validate_runtime_config, validate_strategies};
use crate::domain::error::SigtraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::message;
use crate::domain::pipeline::{Pipeline, RunReport};
use crate::domain::signal_history::{seed_previous, SignalHistory};
use crate::domain::sizing::{BetSizeTable, DEFAULT_QTY_PRECISION};
use crate::domain::strategy::StrategyInstance;
use crate::logging;
use crate::ports::broker_port::BrokerPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::notify_port::NotifyPort;
use crate::ports::signal_store_port::SignalStorePort;

pub const DEFAULT_STRATEGY_TABLE: &str = "strategy_table.csv";

#[derive(Parser, Debug)]
#[command(name = "sigtrader", about = "Signal-to-position reconciliation and execution")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate all strategies, trade the transitions and reconcile positions
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Evaluate all strategies and print their transitions without touching state
    Signals {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Reconcile live positions against the stored signals
    Reconcile {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate the runtime config and the strategy table
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Append new strategy rows and seed their previous signal as flat
    AddStrategies {
        #[arg(short, long)]
        config: PathBuf,
        /// CSV file with the rows to add
        #[arg(short, long)]
        from: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run { config } => run_pipeline(&config),
        Command::Signals { config } => run_signals(&config),
        Command::Reconcile { config } => run_reconcile(&config),
        Command::Validate { config } => run_validate(&config),
        Command::AddStrategies { config, from } => run_add_strategies(&config, &from),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = SigtraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(e: &SigtraderError) -> ExitCode {
    error!(error = %e, "aborted");
    eprintln!("error: {e}");
    e.into()
}

fn millis(config: &dyn ConfigPort, section: &str, key: &str, default: u64) -> Duration {
    let raw = config.get_int(section, key, default as i64);
    Duration::from_millis(u64::try_from(raw).unwrap_or(default))
}

pub fn build_data_dir(config: &dyn ConfigPort) -> Result<PathBuf, SigtraderError> {
    config
        .get_string("paths", "data_dir")
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| SigtraderError::ConfigMissing {
            section: "paths".into(),
            key: "data_dir".into(),
        })
}

/// `[paths] strategy_table`, defaulting to `strategy_table.csv` in the data dir.
pub fn build_strategy_table_path(config: &dyn ConfigPort) -> Result<PathBuf, SigtraderError> {
    match config
        .get_string("paths", "strategy_table")
        .filter(|s| !s.trim().is_empty())
    {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(build_data_dir(config)?.join(DEFAULT_STRATEGY_TABLE)),
    }
}

pub fn build_bet_sizes(config: &dyn ConfigPort) -> Result<BetSizeTable, SigtraderError> {
    let mut table = BetSizeTable::new();
    for key in config.keys("bet_size") {
        let raw = config.get_string("bet_size", &key).unwrap_or_default();
        let size = raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or_else(|| SigtraderError::ConfigInvalid {
                section: "bet_size".into(),
                key: key.clone(),
                reason: format!("'{raw}' is not a positive number"),
            })?;
        table.insert(&key, size);
    }
    Ok(table)
}

pub fn build_execution_config(config: &dyn ConfigPort) -> ExecutionConfig {
    let defaults = ExecutionConfig::default();
    let attempts = config.get_int(
        "execution",
        "fill_poll_attempts",
        i64::from(defaults.fill_poll_attempts),
    );
    let precision = config.get_int(
        "execution",
        "qty_precision",
        i64::from(DEFAULT_QTY_PRECISION),
    );
    ExecutionConfig {
        leverage: config.get_double("execution", "leverage", defaults.leverage),
        settle_delay: millis(config, "execution", "settle_delay_ms", defaults.settle_delay.as_millis() as u64),
        fill_poll_attempts: u32::try_from(attempts).unwrap_or(defaults.fill_poll_attempts).max(1),
        fill_poll_delay: millis(
            config,
            "execution",
            "fill_poll_delay_ms",
            defaults.fill_poll_delay.as_millis() as u64,
        ),
        qty_precision: u32::try_from(precision).unwrap_or(DEFAULT_QTY_PRECISION),
        post_trade_delay: millis(
            config,
            "execution",
            "post_trade_delay_ms",
            defaults.post_trade_delay.as_millis() as u64,
        ),
    }
}

pub fn build_notify_config(config: &dyn ConfigPort) -> NotifyConfig {
    let defaults = NotifyConfig::default();
    let attempts = config.get_int("notify", "max_attempts", i64::from(defaults.max_attempts));
    let wait = config.get_int("notify", "wait_timeout_secs", defaults.wait_timeout.as_secs() as i64);
    NotifyConfig {
        max_attempts: u32::try_from(attempts).unwrap_or(defaults.max_attempts).max(1),
        backoff: millis(config, "notify", "backoff_ms", defaults.backoff.as_millis() as u64),
        pace: millis(config, "notify", "pace_ms", defaults.pace.as_millis() as u64),
        wait_timeout: Duration::from_secs(u64::try_from(wait).unwrap_or(defaults.wait_timeout.as_secs())),
    }
}

/// `None` unless both a token and a chat id are configured.
#[cfg(feature = "telegram")]
pub fn build_telegram_config(config: &dyn ConfigPort) -> Option<TelegramConfig> {
    let token = config.get_string("telegram", "token").filter(|s| !s.trim().is_empty())?;
    let chat_id = config.get_string("telegram", "chat_id").filter(|s| !s.trim().is_empty())?;
    let mut telegram = TelegramConfig::new(token.trim(), chat_id.trim());
    let timeout = config.get_int("telegram", "timeout_secs", telegram.timeout.as_secs() as i64);
    telegram.timeout = Duration::from_secs(u64::try_from(timeout).unwrap_or(20));
    telegram.force_ipv4 = config.get_bool("telegram", "force_ipv4", false);
    Some(telegram)
}

pub fn build_paper_prices(config: &dyn ConfigPort) -> BTreeMap<String, f64> {
    config
        .keys("paper_prices")
        .into_iter()
        .filter_map(|key| {
            let price = config.get_string("paper_prices", &key)?.trim().parse::<f64>().ok()?;
            Some((key.to_uppercase(), price))
        })
        .collect()
}

/// The broker client is only built when first used, so commands that never
/// trade never connect.
pub fn build_broker(config: &dyn ConfigPort) -> CachedBroker {
    let prices = build_paper_prices(config);
    let state_file = config
        .get_string("broker", "state_file")
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);
    let factory: BrokerFactory = Box::new(move || {
        let mut broker = PaperBroker::new(prices.clone());
        if let Some(path) = &state_file {
            broker = broker.with_state_file(path.clone());
        }
        info!(symbols = prices.len(), "paper broker ready");
        Ok(Rc::new(broker) as Rc<dyn BrokerPort>)
    });
    CachedBroker::new(factory)
}

#[cfg(feature = "telegram")]
fn remote_sink(config: &dyn ConfigPort) -> Option<Box<dyn NotifyPort>> {
    let telegram = build_telegram_config(config)?;
    match TelegramNotifier::new(telegram) {
        Ok(notifier) => Some(Box::new(notifier)),
        Err(e) => {
            warn!(error = %e, "telegram unavailable, notifications go to the log");
            None
        }
    }
}

#[cfg(not(feature = "telegram"))]
fn remote_sink(_config: &dyn ConfigPort) -> Option<Box<dyn NotifyPort>> {
    warn!("built without telegram support, notifications go to the log");
    None
}

fn build_sink(config: &dyn ConfigPort) -> (Box<dyn NotifyPort>, bool) {
    if !config.get_bool("notify", "enabled", false) {
        return (Box::new(LogNotifier), false);
    }
    match remote_sink(config) {
        Some(sink) => (sink, true),
        None => (Box::new(LogNotifier), false),
    }
}

/// Starts the notification worker. The log-only sink is never paced.
pub fn build_notifier(config: &dyn ConfigPort) -> Result<NotifyWorker, SigtraderError> {
    let (sink, remote) = build_sink(config);
    let mut notify = build_notify_config(config);
    if !remote {
        notify = NotifyConfig {
            wait_timeout: notify.wait_timeout,
            ..NotifyConfig::immediate()
        };
    }
    Ok(NotifyWorker::spawn(sink, notify)?)
}

/// Everything a command needs once the configuration checked out.
#[derive(Debug)]
pub struct Context {
    pub config: FileConfigAdapter,
    pub data_dir: PathBuf,
    pub table_path: PathBuf,
    pub instances: Vec<StrategyInstance>,
    pub bet_sizes: BetSizeTable,
    _log_guard: Option<WorkerGuard>,
}

pub fn prepare(config_path: &Path) -> Result<Context, SigtraderError> {
    let config = FileConfigAdapter::from_file(config_path).map_err(|e| SigtraderError::ConfigParse {
        file: config_path.display().to_string(),
        reason: e.to_string(),
    })?;
    let log_dir = config.get_string("logging", "dir").map(PathBuf::from);
    let log_guard = logging::init(
        config.get_string("logging", "level").as_deref(),
        log_dir.as_deref(),
    );

    validate_runtime_config(&config)?;
    let data_dir = build_data_dir(&config)?;
    let table_path = build_strategy_table_path(&config)?;
    let bet_sizes = build_bet_sizes(&config)?;
    let instances = load_strategy_table(&table_path)?;
    validate_strategies(&instances, &bet_sizes)?;
    info!(
        strategies = instances.len(),
        table = %table_path.display(),
        "configuration loaded"
    );

    Ok(Context {
        config,
        data_dir,
        table_path,
        instances,
        bet_sizes,
        _log_guard: log_guard,
    })
}

fn print_report(report: &RunReport) {
    println!(
        "transitions: {}  orders: {}  corrections: {}  skipped: {}  failures: {}",
        report.transitions.len(),
        report.orders.len(),
        report.corrections.len(),
        report.skipped.len(),
        report.failures.len()
    );
    for outcome in report.orders.iter().chain(&report.corrections) {
        println!(
            "  {} {} {} (order {}, filled {})",
            outcome.order.symbol,
            outcome.order.side,
            outcome.order.notional,
            outcome.order_id,
            outcome.filled_amount()
        );
    }
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.key, skipped.reason);
    }
    for failure in &report.failures {
        println!("  failed {}: {}", failure.symbol, failure.reason);
    }
}

/// A report with per-symbol failures exits with the broker code.
fn report_exit(report: &RunReport) -> ExitCode {
    print_report(report);
    if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(4)
    }
}

fn run_pipeline(config_path: &Path) -> ExitCode {
    let ctx = match prepare(config_path) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let notifier = match build_notifier(&ctx.config) {
        Ok(n) => n,
        Err(e) => return fail(&e),
    };

    let series = CsvAdapter::new(ctx.data_dir.clone());
    let store = CsvSignalStore::new(ctx.data_dir.clone());
    let ledger = CsvLedger::new(ctx.data_dir.clone());
    let broker = build_broker(&ctx.config);

    let result = Pipeline {
        series: &series,
        store: &store,
        broker: &broker,
        ledger: &ledger,
        notifier: &notifier,
        bet_sizes: &ctx.bet_sizes,
        execution: build_execution_config(&ctx.config),
    }
    .run(&ctx.instances);

    notifier.wait_default();
    notifier.shutdown();

    match result {
        Ok(report) => report_exit(&report),
        Err(e) => fail(&e),
    }
}

fn run_signals(config_path: &Path) -> ExitCode {
    let ctx = match prepare(config_path) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let series = CsvAdapter::new(ctx.data_dir.clone());
    let store = CsvSignalStore::new(ctx.data_dir.clone());
    let ledger = CsvLedger::new(ctx.data_dir.clone());
    let broker = build_broker(&ctx.config);
    let pipeline = Pipeline {
        series: &series,
        store: &store,
        broker: &broker,
        ledger: &ledger,
        notifier: &LogNotifier,
        bet_sizes: &ctx.bet_sizes,
        execution: build_execution_config(&ctx.config),
    };

    let evaluation = pipeline.evaluate_instances(&ctx.instances, false);
    let history = SignalHistory::load(&store);
    let transitions = history.transitions(&evaluation.points, &evaluation.carried);
    println!("{}", message::transition_summary(&transitions));
    for skipped in &evaluation.skipped {
        println!("skipped {}: {}", skipped.key, skipped.reason);
    }
    ExitCode::SUCCESS
}

fn run_reconcile(config_path: &Path) -> ExitCode {
    let ctx = match prepare(config_path) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let notifier = match build_notifier(&ctx.config) {
        Ok(n) => n,
        Err(e) => return fail(&e),
    };
    let series = CsvAdapter::new(ctx.data_dir.clone());
    let store = CsvSignalStore::new(ctx.data_dir.clone());
    let ledger = CsvLedger::new(ctx.data_dir.clone());
    let broker = build_broker(&ctx.config);

    let report = Pipeline {
        series: &series,
        store: &store,
        broker: &broker,
        ledger: &ledger,
        notifier: &notifier,
        bet_sizes: &ctx.bet_sizes,
        execution: build_execution_config(&ctx.config),
    }
    .reconcile_only(&ctx.instances);

    notifier.wait_default();
    notifier.shutdown();
    report_exit(&report)
}

fn run_validate(config_path: &Path) -> ExitCode {
    match prepare(config_path) {
        Ok(ctx) => {
            let symbols: Vec<&str> = ctx.bet_sizes.symbols().collect();
            println!(
                "ok: {} strategies, symbols {}",
                ctx.instances.len(),
                symbols.join(",")
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

/// Merges `from` into the configured strategy table and seeds the previous
/// signal table for the added rows.
pub fn add_strategies(ctx: &Context, from: &Path) -> Result<Vec<StrategyInstance>, SigtraderError> {
    let incoming = load_strategy_table(from)?;
    let added = new_rows(&ctx.instances, &incoming);
    if added.is_empty() {
        info!(from = %from.display(), "no new strategies");
        return Ok(added);
    }

    let mut merged = ctx.instances.clone();
    merged.extend(added.iter().cloned());
    validate_strategies(&merged, &ctx.bet_sizes)?;

    let store = CsvSignalStore::new(ctx.data_dir.clone());
    let existing = store.load_previous()?;
    let seeded = seed_previous(existing, &added, Utc::now().naive_utc());

    write_strategy_table(&ctx.table_path, &merged)?;
    store.save_previous(&seeded)?;
    info!(added = added.len(), table = %ctx.table_path.display(), "strategies added");
    Ok(added)
}

fn run_add_strategies(config_path: &Path, from: &Path) -> ExitCode {
    let ctx = match prepare(config_path) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    match add_strategies(&ctx, from) {
        Ok(added) => {
            for inst in &added {
                println!("added {} ({})", inst.key(), inst.kind);
            }
            println!("{} strategies added", added.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}
