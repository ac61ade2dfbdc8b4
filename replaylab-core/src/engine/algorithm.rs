//! Algorithm interface.
//!
//! An algorithm is called once before replay (`setup`) and once per base tick
//! (`main`). It reads bars through the [`TickContext`] and trades through the
//! broker handle it exposes. It never touches engine-owned state directly.

use super::broker::{Broker, BrokerError};
use crate::domain::{Account, Bar, Interval};
use crate::store::{BarStore, StoreError};
use chrono::{DateTime, NaiveTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlgorithmError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Other(String),
}

/// What an algorithm learns about the run before the first tick.
#[derive(Debug, Clone)]
pub struct SetupContext {
    pub symbols: Vec<String>,
    pub base: Interval,
    pub aggregations: Vec<Interval>,
}

/// Read access to the store plus a broker handle for one tick.
pub struct TickContext<'a> {
    store: &'a BarStore,
    broker: &'a mut dyn Broker,
    timestamp: DateTime<Utc>,
    tick: usize,
    base: Interval,
    daily_close: NaiveTime,
    stop: bool,
}

impl<'a> TickContext<'a> {
    pub fn new(
        store: &'a BarStore,
        broker: &'a mut dyn Broker,
        timestamp: DateTime<Utc>,
        tick: usize,
        base: Interval,
        daily_close: NaiveTime,
    ) -> Self {
        Self {
            store,
            broker,
            timestamp,
            tick,
            base,
            daily_close,
            stop: false,
        }
    }

    /// Timestamp of the current base bar.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Zero-based tick index, warm-up bars included.
    pub fn tick(&self) -> usize {
        self.tick
    }

    pub fn base_interval(&self) -> Interval {
        self.base
    }

    pub fn daily_close(&self) -> NaiveTime {
        self.daily_close
    }

    /// True when the current tick closes a bar of `interval`.
    pub fn is_closing(&self, interval: Interval) -> bool {
        interval.is_frequency(self.timestamp, self.daily_close)
    }

    pub fn store(&self) -> &'a BarStore {
        self.store
    }

    /// Last `n` bars for `(symbol, interval)`, oldest first.
    pub fn latest(&self, symbol: &str, interval: Interval, n: usize) -> Result<&'a [Bar], StoreError> {
        self.store.latest(symbol, interval, n)
    }

    pub fn last(&self, symbol: &str, interval: Interval) -> Result<Option<&'a Bar>, StoreError> {
        self.store.last(symbol, interval)
    }

    /// Close of the current base bar for `symbol`.
    pub fn close(&self, symbol: &str) -> Result<Option<f64>, StoreError> {
        Ok(self.store.last(symbol, self.base)?.map(|bar| bar.close))
    }

    pub fn broker(&mut self) -> &mut (dyn Broker + 'a) {
        &mut *self.broker
    }

    pub fn account(&self) -> Account {
        self.broker.fetch_account()
    }

    /// Ask the engine to end the run once this tick completes.
    pub fn stop(&mut self) {
        self.stop = true;
    }

    pub fn stop_requested(&self) -> bool {
        self.stop
    }
}

pub trait Algorithm {
    fn name(&self) -> &str;

    fn setup(&mut self, _ctx: &SetupContext) -> Result<(), AlgorithmError> {
        Ok(())
    }

    fn main(&mut self, ctx: &mut TickContext<'_>) -> Result<(), AlgorithmError>;
}

impl<A: Algorithm + ?Sized> Algorithm for Box<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn setup(&mut self, ctx: &SetupContext) -> Result<(), AlgorithmError> {
        (**self).setup(ctx)
    }

    fn main(&mut self, ctx: &mut TickContext<'_>) -> Result<(), AlgorithmError> {
        (**self).main(ctx)
    }
}
