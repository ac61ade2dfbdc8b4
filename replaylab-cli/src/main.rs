//! ReplayLab CLI: run, fetch, and cache management commands.
//!
//! Commands:
//! - `run`: replay a TOML run config, with command-line overrides
//! - `fetch`: pull bars from Yahoo Finance into the local store
//! - `cache status`: list local store entries and their ranges

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use replaylab_core::data::{
    CircuitBreaker, DataSupplier, LocalStore, SourceMode, TimeRange, YahooSupplier,
};
use replaylab_core::domain::Interval;
use replaylab_runner::{
    load_bars, run_backtest, save_artifacts, BacktestResult, LoadOptions, RunConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "replaylab", about = "ReplayLab CLI: bar replay backtester")]
struct Cli {
    /// Log filter when RUST_LOG is unset (e.g. "debug", "replaylab_core=debug").
    #[arg(long, global = true, default_value = "replaylab=info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a TOML run config.
    Run {
        /// Path to the TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Override the data source: FETCH, CSV, or LOCAL.
        #[arg(long)]
        source: Option<SourceMode>,

        /// Override the base interval (e.g. 1MIN).
        #[arg(long)]
        interval: Option<String>,

        /// Replace the aggregation list. Repeatable.
        #[arg(long = "aggregate")]
        aggregations: Vec<String>,

        /// Replace the watch list. Repeatable.
        #[arg(long = "symbol")]
        symbols: Vec<String>,

        /// Override the data directory.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Replay seeded synthetic data instead of any supplier.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Never touch the network.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Write the result JSON to this file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Directory for the artifact set (result.json, fills.csv, equity.csv).
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Fetch bars from Yahoo Finance into the local store.
    Fetch {
        #[arg(required = true)]
        symbols: Vec<String>,

        #[arg(long, default_value = "1MIN")]
        interval: Interval,

        /// Derived intervals to store alongside. Repeatable.
        #[arg(long = "aggregate")]
        aggregations: Vec<Interval>,

        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// Local store management.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List stored series with bar counts and time ranges.
    Status {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Run {
            config,
            source,
            interval,
            aggregations,
            symbols,
            data_dir,
            synthetic,
            offline,
            output,
            output_dir,
        } => {
            let mut run_config = RunConfig::from_file(&config)?;
            let run = &mut run_config.run;
            if let Some(source) = source {
                run.source = source;
            }
            if let Some(interval) = interval {
                run.interval = interval;
            }
            if !aggregations.is_empty() {
                run.aggregations = aggregations;
            }
            if !symbols.is_empty() {
                run.symbols = symbols;
            }
            if let Some(dir) = data_dir {
                run.data_dir = dir;
            }
            if output.is_some() {
                run.output = output;
            }
            run.synthetic |= synthetic;
            run_config.validate()?;
            run_cmd(&run_config, offline, output_dir.as_deref())
        }
        Commands::Fetch {
            symbols,
            interval,
            aggregations,
            data_dir,
        } => fetch_cmd(symbols, interval, aggregations, data_dir),
        Commands::Cache { action } => match action {
            CacheAction::Status { data_dir } => cache_status(&data_dir),
        },
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn yahoo() -> Result<YahooSupplier> {
    let circuit_breaker = Arc::new(CircuitBreaker::default_supplier());
    YahooSupplier::new(circuit_breaker).context("failed to build Yahoo client")
}

fn run_cmd(config: &RunConfig, offline: bool, output_dir: Option<&Path>) -> Result<()> {
    let needs_fetch = !offline
        && !config.run.synthetic
        && (config.run.source == SourceMode::Fetch || config.run.fetch_fallback);
    if offline && config.run.source == SourceMode::Fetch && !config.run.synthetic {
        bail!("--offline conflicts with source = FETCH");
    }
    let supplier = if needs_fetch { Some(yahoo()?) } else { None };
    let fetch = supplier.as_ref().map(|s| s as &dyn DataSupplier);

    let result = run_backtest(config, fetch)?;
    print_summary(&result);

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&result, dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn fetch_cmd(
    symbols: Vec<String>,
    interval: Interval,
    aggregations: Vec<Interval>,
    data_dir: PathBuf,
) -> Result<()> {
    for target in &aggregations {
        target.factor_of(interval)?;
    }
    let supplier = yahoo()?;
    let opts = LoadOptions {
        mode: SourceMode::Fetch,
        data_dir,
        interval,
        aggregations,
        range: TimeRange::all(),
        fetch_fallback: false,
        synthetic: false,
        seed: 0,
        sessions: 1,
        persist: true,
    };
    let loaded = load_bars(&symbols, &opts, Some(&supplier))?;
    for (symbol, series) in &loaded.series {
        println!("{symbol:<10} {:>8} bars", series.len());
    }
    cache_status(&opts.data_dir)
}

fn cache_status(data_dir: &Path) -> Result<()> {
    let store = LocalStore::new(data_dir);
    let entries = store.status()?;
    if entries.is_empty() {
        println!("Local store is empty: {}", data_dir.display());
        return Ok(());
    }

    println!("Local store: {}", data_dir.display());
    println!();
    println!(
        "{:<10} {:<8} {:>8}  {:<25} {:<25}",
        "Symbol", "Interval", "Bars", "First", "Last"
    );
    println!("{}", "-".repeat(80));
    for e in &entries {
        let fmt = |t: Option<DateTime<Utc>>| t.map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
        println!(
            "{:<10} {:<8} {:>8}  {:<25} {:<25}",
            e.symbol,
            e.interval.to_string(),
            e.bars,
            fmt(e.first),
            fmt(e.last)
        );
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    let replay = &result.replay;
    println!();
    println!("=== Replay Result ===");
    println!("Run:            {}", result.run_id.short());
    println!("Algorithm:      {}", result.algorithm);
    println!(
        "Ticks:          {}{}",
        replay.ticks,
        if replay.stopped_early { " (stopped early)" } else { "" }
    );
    println!(
        "Orders:         {} ({} filled, {} cancelled)",
        m.order_count, m.fill_count, m.cancelled_count
    );
    println!();
    println!("--- Performance ---");
    println!("Initial Equity: {:.2}", m.initial_equity);
    println!("Final Equity:   {:.2}", m.final_equity);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Realized PnL:   {:.2}", m.realized_pnl);
    println!("Commission:     {:.2}", m.commission_paid);
    if !replay.positions.is_empty() {
        println!();
        println!("--- Positions ---");
        for p in &replay.positions {
            println!("{:<22} {:>10} @ {:.4}", p.symbol, p.quantity, p.avg_price);
        }
    }
    if result.synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}
