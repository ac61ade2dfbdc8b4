//! Replay configuration and run result types.

use crate::domain::{
    default_daily_close, Account, Fill, Interval, IntervalError, Order, Position, RunId,
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Configuration errors. Always raised before any data is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error("watch list is empty")]
    NoSymbols,

    #[error("symbol names must be non-empty")]
    EmptySymbol,

    #[error("symbol {0} is listed more than once")]
    DuplicateSymbol(String),

    #[error("aggregation {0} is listed more than once")]
    DuplicateAggregation(Interval),
}

/// Configuration for a single replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub symbols: Vec<String>,
    pub base_interval: Interval,
    /// Derived intervals aggregated from the base.
    pub aggregations: Vec<Interval>,
    /// Time of day (UTC) that closes a `1DAY` bar.
    pub daily_close: NaiveTime,
    /// Base bars loaded before the cursor starts. No fills, no algorithm calls.
    pub warmup_bars: usize,
    /// Free-form label mixed into the run id (algorithm name and parameters).
    pub label: String,
}

impl ReplayConfig {
    pub fn new(symbols: Vec<String>, base_interval: Interval) -> Self {
        Self {
            symbols,
            base_interval,
            aggregations: Vec::new(),
            daily_close: default_daily_close(),
            warmup_bars: 0,
            label: String::new(),
        }
    }

    /// Build from interval strings as they appear in config files.
    pub fn parse(symbols: &[&str], base: &str, aggregations: &[&str]) -> Result<Self, ConfigError> {
        let base_interval: Interval = base.parse()?;
        let aggregations = aggregations
            .iter()
            .map(|s| s.parse::<Interval>())
            .collect::<Result<Vec<_>, _>>()?;
        let config = Self {
            aggregations,
            ..Self::new(symbols.iter().map(|s| s.to_string()).collect(), base_interval)
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_aggregations(mut self, aggregations: Vec<Interval>) -> Self {
        self.aggregations = aggregations;
        self
    }

    pub fn with_warmup(mut self, warmup_bars: usize) -> Self {
        self.warmup_bars = warmup_bars;
        self
    }

    pub fn with_daily_close(mut self, daily_close: NaiveTime) -> Self {
        self.daily_close = daily_close;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        let mut seen = BTreeSet::new();
        for symbol in &self.symbols {
            if symbol.trim().is_empty() {
                return Err(ConfigError::EmptySymbol);
            }
            if !seen.insert(symbol.as_str()) {
                return Err(ConfigError::DuplicateSymbol(symbol.clone()));
            }
        }
        let mut seen = BTreeSet::new();
        for interval in &self.aggregations {
            interval.factor_of(self.base_interval)?;
            if !seen.insert(*interval) {
                return Err(ConfigError::DuplicateAggregation(*interval));
            }
        }
        Ok(())
    }
}

/// Equity after one tick's fills and mark-to-market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub cash: f64,
}

/// Result of a completed replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    pub run_id: RunId,
    pub dataset_hash: String,
    /// Ticks replayed, warm-up excluded.
    pub ticks: usize,
    pub stopped_early: bool,
    pub initial_equity: f64,
    pub final_account: Account,
    pub positions: Vec<Position>,
    pub orders: Vec<Order>,
    pub fills: Vec<Fill>,
    pub realized_pnl: f64,
    pub commission_paid: f64,
    pub equity_curve: Vec<EquityPoint>,
}
