//! Bar loading and data resolution for the runner.
//!
//! Given a list of symbols, loads base-interval bars from the configured
//! source and returns them keyed by symbol. Fallback policy:
//! 1. Synthetic mode → seeded random walk for every symbol (tagged)
//! 2. Primary source (`FETCH`, `CSV`, or `LOCAL`) has bars → use them
//! 3. Primary misses, fetch fallback enabled, fetch supplier available → fetch
//! 4. Otherwise → `LoadError::DataGap`
//!
//! Non-synthetic loads are then written to the local store together with
//! their batch-aggregated derived series, one rayon task per symbol.

use rayon::prelude::*;
use replaylab_core::aggregate::aggregate_batch;
use replaylab_core::data::{
    validate_bars, CsvSupplier, DataError, DataSource, DataSupplier, LocalStore, SourceMode,
    SyntheticSupplier, TimeRange,
};
use replaylab_core::domain::Interval;
use replaylab_core::store::Series;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, RunConfig};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no {interval} data for '{symbol}' from {mode} and no fallback available")]
    DataGap {
        symbol: String,
        interval: Interval,
        mode: SourceMode,
    },

    #[error("loading '{symbol}': {source}")]
    Supplier {
        symbol: String,
        #[source]
        source: DataError,
    },
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub mode: SourceMode,
    pub data_dir: PathBuf,
    pub interval: Interval,
    /// Derived intervals persisted next to the base series.
    pub aggregations: Vec<Interval>,
    pub range: TimeRange,
    pub fetch_fallback: bool,
    pub synthetic: bool,
    pub seed: u64,
    pub sessions: usize,
    /// Write loaded data to the local store.
    pub persist: bool,
}

impl LoadOptions {
    pub fn from_config(config: &RunConfig) -> Result<Self, ConfigError> {
        let replay = config.replay_config()?;
        Ok(Self {
            mode: config.run.source,
            data_dir: config.run.data_dir.clone(),
            interval: replay.base_interval,
            aggregations: replay.aggregations,
            range: config.time_range()?,
            fetch_fallback: config.run.fetch_fallback,
            synthetic: config.run.synthetic,
            seed: config.run.seed,
            sessions: config.run.sessions,
            persist: true,
        })
    }
}

/// Loaded base series with provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub series: BTreeMap<String, Series>,
    pub sources: BTreeMap<String, DataSource>,
    /// Whether any symbol used synthetic data.
    pub has_synthetic: bool,
}

/// Load base bars for every symbol. `fetch` is the live supplier, if any.
pub fn load_bars(
    symbols: &[String],
    opts: &LoadOptions,
    fetch: Option<&dyn DataSupplier>,
) -> Result<LoadedData, LoadError> {
    let synthetic;
    let csv;
    let local;
    let primary: Option<&dyn DataSupplier> = if opts.synthetic {
        warn!("using synthetic data; results will be tagged as synthetic");
        synthetic = SyntheticSupplier::new(opts.seed).with_sessions(opts.sessions);
        Some(&synthetic)
    } else {
        match opts.mode {
            SourceMode::Fetch => fetch,
            SourceMode::Csv => {
                csv = CsvSupplier::new(&opts.data_dir);
                Some(&csv)
            }
            SourceMode::Local => {
                local = LocalStore::new(&opts.data_dir);
                Some(&local)
            }
        }
    };
    let fallback = fetch.filter(|_| {
        opts.fetch_fallback && !opts.synthetic && opts.mode != SourceMode::Fetch
    });

    let mut series = BTreeMap::new();
    let mut sources = BTreeMap::new();
    for symbol in symbols {
        let (bars, source) = load_symbol(symbol, opts, primary, fallback)?;
        sources.insert(symbol.clone(), source);
        series.insert(symbol.clone(), bars);
    }

    let loaded = LoadedData {
        has_synthetic: sources.values().any(|s| *s == DataSource::Synthetic),
        series,
        sources,
    };
    if opts.persist && !loaded.has_synthetic {
        persist(&loaded, opts);
    }
    Ok(loaded)
}

fn load_symbol(
    symbol: &str,
    opts: &LoadOptions,
    primary: Option<&dyn DataSupplier>,
    fallback: Option<&dyn DataSupplier>,
) -> Result<(Series, DataSource), LoadError> {
    let supplier_err = |source| LoadError::Supplier {
        symbol: symbol.to_string(),
        source,
    };

    if let Some(supplier) = primary.filter(|s| s.is_available()) {
        let bars = supplier
            .fetch_bars(symbol, opts.interval, opts.range)
            .map_err(supplier_err)?;
        if !bars.is_empty() {
            validate_bars(symbol, &bars).map_err(supplier_err)?;
            info!(symbol, supplier = supplier.name(), bars = bars.len(), "loaded");
            return Ok((bars, supplier.source()));
        }
        warn!(symbol, supplier = supplier.name(), interval = %opts.interval, "primary source has no data");
    }

    if let Some(supplier) = fallback.filter(|s| s.is_available()) {
        info!(symbol, supplier = supplier.name(), "falling back to fetch");
        let bars = supplier
            .fetch_bars(symbol, opts.interval, opts.range)
            .map_err(supplier_err)?;
        if !bars.is_empty() {
            validate_bars(symbol, &bars).map_err(supplier_err)?;
            return Ok((bars, supplier.source()));
        }
    }

    Err(LoadError::DataGap {
        symbol: symbol.to_string(),
        interval: opts.interval,
        mode: opts.mode,
    })
}

/// Write base and derived series to the local store, one task per symbol.
///
/// Cache failures are logged and do not fail the run.
fn persist(loaded: &LoadedData, opts: &LoadOptions) {
    let store = LocalStore::new(&opts.data_dir);
    let written: usize = loaded
        .series
        .par_iter()
        .map(|(symbol, base)| {
            let mut count = 0;
            let from_store = loaded.sources.get(symbol) == Some(&DataSource::LocalStore);
            if !from_store {
                count += write_entry(&store, symbol, opts.interval, base);
            }
            for &target in &opts.aggregations {
                let Ok(factor) = target.factor_of(opts.interval) else {
                    continue;
                };
                match aggregate_batch(base.bars(), factor) {
                    Ok((derived, _)) => count += write_entry(&store, symbol, target, &derived),
                    Err(e) => warn!(symbol = %symbol, %target, error = %e, "aggregation failed"),
                }
            }
            count
        })
        .sum();
    info!(entries = written, dir = %opts.data_dir.display(), "local store updated");
}

fn write_entry(store: &LocalStore, symbol: &str, interval: Interval, series: &Series) -> usize {
    match store.append_entry(symbol, interval, series) {
        Ok(_) => 1,
        Err(e) => {
            warn!(symbol, %interval, error = %e, "failed to write cache entry");
            0
        }
    }
}
