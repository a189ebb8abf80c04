//! CLI definition and dispatch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use chrono::DateTime;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::analyser::Analyser;
use crate::domain::candle::PriceTick;
use crate::domain::compiler::compile;
use crate::domain::error::EngineError;
use crate::domain::registry::Registry;
use crate::domain::rule_eval;
use crate::domain::settings::EngineSettings;
use crate::domain::strategy::{Alert, AlertCallback, Side, Strategy};
use crate::engine::broker::Broker;
use crate::ports::price_port::PriceHistoryPort;
use crate::ports::strategy_store::StrategyStore;

#[derive(Parser, Debug)]
#[command(name = "samalert", about = "Price alert engine for user trading strategies")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile an expression and print its rule tree
    Validate {
        #[arg(short, long)]
        expression: String,
    },
    /// Evaluate an expression over every candle of a CSV history file
    Scan {
        #[arg(long)]
        history: PathBuf,
        #[arg(short, long)]
        expression: String,
        #[arg(long, default_value = "buy")]
        side: Side,
    },
    /// Validate and persist a strategy
    Add {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        symbol: String,
        #[arg(short, long)]
        expression: String,
        #[arg(long, default_value = "buy")]
        side: Side,
        /// Alert once, then remove the strategy
        #[arg(long)]
        once: bool,
    },
    /// Remove a persisted strategy
    Remove {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "buy")]
        side: Side,
    },
    /// List persisted strategies
    List {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Watch live ticks from stdin and print alerts
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Load a CSV history file into the price table
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        file: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Validate { expression } => run_validate(&expression),
        Command::Scan {
            history,
            expression,
            side,
        } => run_scan(&history, &expression, side),
        Command::Add {
            config,
            user,
            symbol,
            expression,
            side,
            once,
        } => {
            let strategy = Strategy::new(user, symbol.to_uppercase(), expression, side, !once);
            run_add(&config, &strategy)
        }
        Command::Remove {
            config,
            user,
            symbol,
            side,
        } => run_remove(&config, &user, &symbol.to_uppercase(), side),
        Command::List { config, symbol } => {
            run_list(&config, symbol.map(|s| s.to_uppercase()).as_deref())
        }
        Command::Run { config } => run_live(&config),
        Command::Import {
            config,
            symbol,
            file,
        } => run_import(&config, &symbol.to_uppercase(), &file),
    }
}

fn fail(err: EngineError, expression: Option<&str>) -> ExitCode {
    match (&err, expression) {
        (EngineError::Compile(e), Some(input)) => {
            eprintln!("error: {}", e.display_with_context(input))
        }
        _ => eprintln!("error: {err}"),
    }
    (&err).into()
}

pub fn load_settings(path: &Path) -> Result<EngineSettings, EngineError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    EngineSettings::from_config(&adapter)
}

/// Strategy store plus the history sources configured for bootstrapping.
pub struct Stores {
    pub strategies: Arc<dyn StrategyStore>,
    pub history: Vec<Arc<dyn PriceHistoryPort + Send + Sync>>,
}

pub fn open_stores(settings: &EngineSettings) -> Result<Stores, EngineError> {
    let mut history: Vec<Arc<dyn PriceHistoryPort + Send + Sync>> = Vec::new();

    #[cfg(feature = "sqlite")]
    let strategies: Arc<dyn StrategyStore> = {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let db = Arc::new(SqliteAdapter::from_settings(settings)?);
        db.initialize_schema()?;
        history.push(db.clone());
        db
    };

    #[cfg(not(feature = "sqlite"))]
    let strategies: Arc<dyn StrategyStore> = {
        use crate::adapters::memory_store::MemoryStrategyStore;

        warn!("sqlite feature disabled, strategies are kept in memory only");
        Arc::new(MemoryStrategyStore::new())
    };

    if let Some(dir) = &settings.csv_dir {
        history.push(Arc::new(CsvAdapter::new(dir.clone())));
    }

    Ok(Stores {
        strategies,
        history,
    })
}

fn run_validate(expression: &str) -> ExitCode {
    match compile(expression, Registry::global()) {
        Ok(rule) => {
            println!("{rule}");
            eprintln!("Expression is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e.into(), Some(expression)),
    }
}

/// One candle where a scanned expression held.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanHit {
    pub index: usize,
    pub start: i64,
    pub close: Decimal,
}

/// Replay a CSV history file through an analyser and report every candle
/// at which `expression` holds.
pub fn scan_history(path: &Path, expression: &str) -> Result<Vec<ScanHit>, EngineError> {
    let rule = compile(expression, Registry::global())?;
    let symbol = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_uppercase())
        .unwrap_or_default();

    let mut analyser = Analyser::new(symbol.as_str(), chrono_tz::Tz::UTC);
    for tick in CsvAdapter::read_file(path, &symbol)? {
        analyser.append_past_price(&tick);
    }

    let series = analyser.series();
    Ok(series
        .iter()
        .enumerate()
        .filter(|(index, _)| rule_eval::evaluate(&rule, series, *index))
        .map(|(index, candle)| ScanHit {
            index,
            start: candle.start,
            close: candle.close,
        })
        .collect())
}

fn run_scan(history: &Path, expression: &str, side: Side) -> ExitCode {
    let hits = match scan_history(history, expression) {
        Ok(hits) => hits,
        Err(e) => return fail(e, Some(expression)),
    };

    for hit in &hits {
        let date = DateTime::from_timestamp(hit.start, 0)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| hit.start.to_string());
        println!("{},{},{},{}", hit.index, date, side, hit.close.normalize());
    }
    eprintln!("{} matching candles", hits.len());
    ExitCode::SUCCESS
}

fn run_add(config_path: &Path, strategy: &Strategy) -> ExitCode {
    let result = load_settings(config_path).and_then(|settings| {
        let stores = open_stores(&settings)?;
        let mut broker = Broker::new(settings, stores.strategies);
        broker.add_strategy(strategy, Arc::new(|_: &Alert| {}))
    });

    match result {
        Ok(_) => {
            eprintln!(
                "Added {} strategy for {} on {}",
                strategy.side, strategy.user_id, strategy.symbol
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e, Some(&strategy.expression)),
    }
}

fn run_remove(config_path: &Path, user_id: &str, symbol: &str, side: Side) -> ExitCode {
    let result = load_settings(config_path)
        .and_then(|settings| open_stores(&settings))
        .and_then(|stores| stores.strategies.delete(user_id, symbol, side));

    match result {
        Ok(true) => {
            eprintln!("Removed {side} strategy for {user_id} on {symbol}");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            eprintln!("No {side} strategy for {user_id} on {symbol}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e, None),
    }
}

fn run_list(config_path: &Path, symbol: Option<&str>) -> ExitCode {
    let result = load_settings(config_path)
        .and_then(|settings| open_stores(&settings))
        .and_then(|stores| match symbol {
            Some(s) => stores.strategies.select_by_symbol(s),
            None => stores.strategies.select_all(),
        });

    let strategies = match result {
        Ok(s) => s,
        Err(e) => return fail(e, None),
    };

    for s in &strategies {
        println!(
            "{},{},{},{},{}",
            s.user_id,
            s.symbol,
            s.side,
            if s.repeat { "repeat" } else { "once" },
            s.expression
        );
    }
    eprintln!("{} strategies", strategies.len());
    ExitCode::SUCCESS
}

fn run_import(config_path: &Path, symbol: &str, file: &Path) -> ExitCode {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let result = load_settings(config_path).and_then(|settings| {
            let db = SqliteAdapter::from_settings(&settings)?;
            db.initialize_schema()?;
            let ticks = CsvAdapter::read_file(file, symbol)?;
            db.insert_ticks(&ticks)?;
            Ok(ticks.len())
        });

        match result {
            Ok(count) => {
                eprintln!("Imported {count} candles for {symbol}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(e, None),
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config_path, symbol, file);
        eprintln!("error: sqlite feature is required for import");
        ExitCode::from(1)
    }
}

/// Parse a live tick line: `SYMBOL,timestamp,open,close,high,low,volume`.
pub fn parse_tick_line(line: &str) -> Result<PriceTick, EngineError> {
    let invalid = |reason: String| EngineError::InvalidData { reason };
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 7 {
        return Err(invalid(format!(
            "expected 7 fields in tick line, found {}",
            fields.len()
        )));
    }

    let decimal = |index: usize, name: &str| {
        Decimal::from_str(fields[index])
            .map_err(|e| invalid(format!("invalid {} value '{}': {}", name, fields[index], e)))
    };
    let timestamp = fields[1]
        .parse::<i64>()
        .map_err(|e| invalid(format!("invalid timestamp '{}': {}", fields[1], e)))?;

    if fields[0].is_empty() {
        return Err(invalid("empty symbol in tick line".into()));
    }

    Ok(PriceTick {
        symbol: fields[0].to_uppercase(),
        timestamp,
        open: decimal(2, "open")?,
        close: decimal(3, "close")?,
        high: decimal(4, "high")?,
        low: decimal(5, "low")?,
        volume: decimal(6, "volume")?,
    })
}

fn run_live(config_path: &Path) -> ExitCode {
    let result = load_settings(config_path).and_then(|settings| {
        let stores = open_stores(&settings)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(watch_stdin(settings, stores))
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e, None),
    }
}

async fn watch_stdin(settings: EngineSettings, stores: Stores) -> Result<(), EngineError> {
    // one-shot alerts come back here so deletion happens on the owner task
    let (expired_tx, mut expired_rx) = mpsc::unbounded_channel::<Alert>();
    let callback: AlertCallback = Arc::new(move |alert: &Alert| {
        println!("{alert}");
        if !alert.repeat {
            let _ = expired_tx.send(alert.clone());
        }
    });

    let mut broker = Broker::new(settings, Arc::clone(&stores.strategies));
    broker.restore(callback)?;

    let mut feeds = HashMap::new();
    for symbol in broker.symbols() {
        for source in &stores.history {
            broker.bootstrap_history(&symbol, source.as_ref())?;
        }
        if let Some(tx) = broker.subscribe(&symbol) {
            feeds.insert(symbol, tx);
        }
    }
    info!(symbols = feeds.len(), "watching stdin for ticks");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.eq_ignore_ascii_case("tick") {
            // let feeders drain what has been sent so far
            tokio::task::yield_now().await;
            let alerts = broker.tick();
            debug!(alerts = alerts.len(), "evaluated");

            while let Ok(alert) = expired_rx.try_recv() {
                broker.delete_strategy(&alert.user_id, &alert.symbol, alert.side)?;
                if !broker.contains(&alert.symbol) {
                    feeds.remove(&alert.symbol);
                }
            }
            continue;
        }

        let tick = match parse_tick_line(line) {
            Ok(tick) => tick,
            Err(e) => {
                warn!(error = %e, "skipping tick line");
                continue;
            }
        };
        let symbol = tick.symbol.clone();
        match feeds.get(&symbol) {
            Some(tx) => {
                if tx.send(tick).await.is_err() {
                    feeds.remove(&symbol);
                }
            }
            None => debug!(symbol = %symbol, "no strategies watch symbol"),
        }
    }

    broker.shutdown();
    Ok(())
}
