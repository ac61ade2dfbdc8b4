//! Backtest runner: wires together config, data loading, the replay engine, and metrics.
//!
//! Two entry points:
//! - `run_backtest()`: loads data per the config, then runs. Used by the CLI.
//! - `run_backtest_from_data()`: takes pre-loaded series. No I/O.

use chrono::Utc;
use replaylab_core::data::{DataSource, DataSupplier};
use replaylab_core::engine::{Ledger, PaperBroker, ReplayEngine, ReplayError};
use replaylab_core::store::Series;
use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

use crate::algos::build_algorithm;
use crate::config::{ConfigError, RunConfig};
use crate::data_loader::{load_bars, LoadError, LoadOptions};
use crate::metrics::PerformanceMetrics;
use crate::result::{ArtifactError, BacktestResult, SCHEMA_VERSION};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Load(#[from] LoadError),
    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

/// Load data as the config says, replay, and write `run.output` if set.
pub fn run_backtest(
    config: &RunConfig,
    fetch: Option<&dyn DataSupplier>,
) -> Result<BacktestResult, RunError> {
    let opts = LoadOptions::from_config(config)?;
    let loaded = load_bars(&config.run.symbols, &opts, fetch)?;
    let result = run_backtest_from_data(config, loaded.series, loaded.sources)?;
    if let Some(path) = &config.run.output {
        result.write_json(path)?;
        info!(path = %path.display(), "result written");
    }
    Ok(result)
}

/// Replay pre-loaded base series. `sources` records where each series came from.
pub fn run_backtest_from_data(
    config: &RunConfig,
    data: BTreeMap<String, Series>,
    sources: BTreeMap<String, DataSource>,
) -> Result<BacktestResult, RunError> {
    let started_at = Utc::now();
    let clock = Instant::now();

    let replay_config = config.replay_config()?;
    let mut algorithm = build_algorithm(&config.run.algorithm, &config.algorithm)?;
    let ledger = Ledger::with_positions(config.initial_account(), config.seed_positions());
    let broker = PaperBroker::with_ledger(ledger, config.commission);

    let engine = ReplayEngine::new(replay_config, data, broker)?;
    let replay = engine.run(&mut *algorithm)?;
    let metrics = PerformanceMetrics::compute(&replay);

    info!(
        run_id = %replay.run_id.short(),
        ticks = replay.ticks,
        fills = metrics.fill_count,
        total_return = metrics.total_return,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: replay.run_id.clone(),
        algorithm: config.run.algorithm.clone(),
        started_at,
        duration_secs: clock.elapsed().as_secs_f64(),
        synthetic: sources.values().any(|s| *s == DataSource::Synthetic),
        sources,
        metrics,
        replay,
        config: Some(config.clone()),
    })
}
