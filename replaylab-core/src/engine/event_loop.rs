//! Replay engine: the tick loop.
//!
//! Per base tick:
//! 1. Observation: the tick's base bar for every watched symbol
//! 2. Pending orders are evaluated against the observation
//! 3. The observation is appended to the store, derived intervals are updated
//!    incrementally, positions are marked to the closes
//! 4. The algorithm is invoked once
//!
//! Fills happen before the bar is visible to the algorithm, and an order can
//! only fill against a bar that arrives after it was submitted.

use super::algorithm::{Algorithm, AlgorithmError, SetupContext, TickContext};
use super::broker::{Broker, Observation, PaperBroker};
use super::context::RunContext;
use super::state::{ConfigError, EquityPoint, ReplayConfig, ReplayResult};
use crate::aggregate::Aggregator;
use crate::data::{align_series, check_interval, warn_intraday_gaps, DataError};
use crate::domain::{Interval, RunId};
use crate::fingerprint::{dataset_hash, run_id};
use crate::store::{BarStore, Series, StoreError};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("algorithm failed at tick {tick}: {source}")]
    Algorithm {
        tick: usize,
        #[source]
        source: AlgorithmError,
    },
}

pub struct ReplayEngine {
    config: ReplayConfig,
    store: BarStore,
    /// Aligned base series per symbol. The cursor indexes into these.
    data: BTreeMap<String, Series>,
    aggregators: BTreeMap<String, Vec<Aggregator>>,
    broker: PaperBroker,
    context: RunContext,
    cursor: usize,
    len: usize,
    warmup: usize,
    equity_curve: Vec<EquityPoint>,
    started: bool,
    stopped: bool,
}

impl ReplayEngine {
    /// Validate, align, and preload. Nothing is replayed yet.
    ///
    /// Symbols in `data` that are not on the watch list are ignored. A watched
    /// symbol without data is `DataError::Missing`.
    pub fn new(
        config: ReplayConfig,
        mut data: BTreeMap<String, Series>,
        mut broker: PaperBroker,
    ) -> Result<Self, ReplayError> {
        config.validate()?;
        let base = config.base_interval;

        let mut aggregators = BTreeMap::new();
        for symbol in &config.symbols {
            let per_symbol = config
                .aggregations
                .iter()
                .map(|&target| Aggregator::new(base, target))
                .collect::<Result<Vec<_>, _>>()
                .map_err(ConfigError::from)?;
            aggregators.insert(symbol.clone(), per_symbol);
        }

        let mut watched = BTreeMap::new();
        for symbol in &config.symbols {
            let series = data.remove(symbol).ok_or_else(|| DataError::Missing {
                symbol: symbol.clone(),
                interval: base,
            })?;
            check_interval(symbol, &series, base)?;
            watched.insert(symbol.clone(), series);
        }
        let data = align_series(watched)?;
        for (symbol, series) in &data {
            warn_intraday_gaps(symbol, series, base);
        }

        let hash = dataset_hash(&data);
        let id = run_id(&config, &hash);
        let context = RunContext::new(id, hash);

        let len = data.values().map(Series::len).min().unwrap_or(0);
        let warmup = config.warmup_bars.min(len);

        let mut store = BarStore::new();
        for symbol in &config.symbols {
            store.init(symbol, base);
            for &interval in &config.aggregations {
                store.init(symbol, interval);
            }
        }

        if warmup > 0 {
            for (symbol, series) in &data {
                let head = Series::from_bars(series.bars()[..warmup].to_vec())?;
                if let Some(per_symbol) = aggregators.get_mut(symbol) {
                    for aggregator in per_symbol.iter_mut() {
                        let derived = aggregator.warm_up(&head, config.daily_close)?;
                        store.load(symbol, aggregator.target(), derived);
                    }
                }
                store.load(symbol, base, head);
            }
            broker.mark_to_market(&observation_at(&data, warmup - 1));
        }

        broker.setup(&config.symbols);

        context.span().in_scope(|| {
            info!(
                symbols = config.symbols.len(),
                base = %base,
                aggregations = config.aggregations.len(),
                bars = len,
                warmup,
                "replay prepared"
            );
        });

        Ok(Self {
            config,
            store,
            data,
            aggregators,
            broker,
            context,
            cursor: warmup,
            len,
            warmup,
            equity_curve: Vec::with_capacity(len - warmup),
            started: false,
            stopped: false,
        })
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn run_id(&self) -> &RunId {
        self.context.run_id()
    }

    pub fn store(&self) -> &BarStore {
        &self.store
    }

    pub fn broker(&self) -> &PaperBroker {
        &self.broker
    }

    /// Index of the next base bar to replay.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Aligned base bars per symbol, warm-up included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_finished(&self) -> bool {
        self.stopped || self.cursor >= self.len
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    /// Replay one tick. Returns whether more ticks remain.
    ///
    /// The first call runs the algorithm's `setup`.
    pub fn step(&mut self, algorithm: &mut dyn Algorithm) -> Result<bool, ReplayError> {
        if self.is_finished() {
            return Ok(false);
        }
        let span = self.context.span().clone();
        let _guard = span.enter();

        let tick = self.cursor;
        if !self.started {
            let setup = SetupContext {
                symbols: self.config.symbols.clone(),
                base: self.config.base_interval,
                aggregations: self.config.aggregations.clone(),
            };
            algorithm
                .setup(&setup)
                .map_err(|source| ReplayError::Algorithm { tick, source })?;
            self.started = true;
            info!(algorithm = algorithm.name(), "replay started");
        }

        let base = self.config.base_interval;
        let daily_close = self.config.daily_close;

        // 1. observation
        let observation = observation_at(&self.data, tick);
        let Some(timestamp) = observation.values().next().map(|bar| bar.timestamp) else {
            self.cursor = self.len;
            return Ok(false);
        };

        // 2. fills against bars the algorithm has not seen yet
        let fills = self.broker.evaluate_pending(&observation);

        // 3. reveal the bar
        for (symbol, bar) in &observation {
            self.store.append(symbol, base, *bar, false)?;
            let Some(per_symbol) = self.aggregators.get_mut(symbol) else {
                continue;
            };
            let base_series = self.store.series(symbol, base)?;
            let updates: Vec<(Interval, _)> = per_symbol
                .iter_mut()
                .filter_map(|aggregator| {
                    aggregator
                        .update(base_series, timestamp, daily_close)
                        .map(|update| (aggregator.target(), update))
                })
                .collect();
            for (interval, update) in updates {
                self.store
                    .append(symbol, interval, update.bar, update.replace_last)?;
            }
        }
        self.broker.mark_to_market(&observation);
        let account = self.broker.fetch_account();
        self.equity_curve.push(EquityPoint {
            timestamp,
            equity: account.equity,
            cash: account.cash,
        });
        debug!(tick, %timestamp, fills = fills.len(), equity = account.equity, "tick");

        // 4. algorithm
        let mut ctx = TickContext::new(
            &self.store,
            &mut self.broker,
            timestamp,
            tick,
            base,
            daily_close,
        );
        algorithm
            .main(&mut ctx)
            .map_err(|source| ReplayError::Algorithm { tick, source })?;
        let stop = ctx.stop_requested();

        self.cursor += 1;
        if stop {
            self.stopped = true;
            info!(tick, "algorithm requested stop");
        }
        Ok(!self.is_finished())
    }

    /// Replay to the end (or until the algorithm stops) and report.
    pub fn run(mut self, algorithm: &mut dyn Algorithm) -> Result<ReplayResult, ReplayError> {
        while self.step(algorithm)? {}
        let result = self.result();
        self.context.span().in_scope(|| {
            info!(
                ticks = result.ticks,
                fills = result.fills.len(),
                equity = result.final_account.equity,
                stopped_early = result.stopped_early,
                "replay finished"
            );
        });
        Ok(result)
    }

    /// Snapshot of the run so far.
    pub fn result(&self) -> ReplayResult {
        let ledger = self.broker.ledger();
        ReplayResult {
            run_id: self.context.run_id().clone(),
            dataset_hash: self.context.dataset_hash().0.clone(),
            ticks: self.cursor - self.warmup,
            stopped_early: self.stopped && self.cursor < self.len,
            initial_equity: ledger.initial_equity(),
            final_account: self.broker.fetch_account(),
            positions: self.broker.fetch_positions(),
            orders: self.broker.orders(),
            fills: self.broker.fills().to_vec(),
            realized_pnl: ledger.realized_pnl(),
            commission_paid: ledger.commission_paid(),
            equity_curve: self.equity_curve.clone(),
        }
    }
}

fn observation_at(data: &BTreeMap<String, Series>, index: usize) -> Observation {
    data.iter()
        .filter_map(|(symbol, series)| series.get(index).map(|bar| (symbol.clone(), *bar)))
        .collect()
}
