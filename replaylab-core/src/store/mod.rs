//! Bar Store: arena of series keyed by `(symbol, interval)`.
//!
//! The replay engine owns the store. Algorithms get a shared reference and
//! can only read; every mutation goes through `init`/`append`.

mod series;

pub use series::Series;

use crate::domain::{Bar, Interval};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no series for {0}")]
    NotFound(SeriesKey),

    #[error("timestamp {next} does not follow {previous}")]
    NonIncreasingTimestamp {
        previous: DateTime<Utc>,
        next: DateTime<Utc>,
    },
}

/// Key of one series in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub interval: Interval,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.interval)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BarStore {
    slots: Vec<Series>,
    index: HashMap<SeriesKey, usize>,
}

impl BarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty series for the key. An existing series is cleared.
    pub fn init(&mut self, symbol: &str, interval: Interval) {
        let key = SeriesKey::new(symbol, interval);
        match self.index.get(&key) {
            Some(&slot) => self.slots[slot].clear(),
            None => {
                self.index.insert(key, self.slots.len());
                self.slots.push(Series::new());
            }
        }
    }

    /// Append a bar, or overwrite the last one when `replace_last` is set.
    pub fn append(
        &mut self,
        symbol: &str,
        interval: Interval,
        bar: Bar,
        replace_last: bool,
    ) -> Result<(), StoreError> {
        let series = self.series_mut(symbol, interval)?;
        if replace_last {
            series.replace_last(bar)
        } else {
            series.push(bar)
        }
    }

    /// Replace a whole series at once. Used to load warm-up data.
    pub fn load(&mut self, symbol: &str, interval: Interval, series: Series) {
        let key = SeriesKey::new(symbol, interval);
        match self.index.get(&key) {
            Some(&slot) => self.slots[slot] = series,
            None => {
                self.index.insert(key, self.slots.len());
                self.slots.push(series);
            }
        }
    }

    /// Last `n` bars for the key, oldest first.
    pub fn latest(&self, symbol: &str, interval: Interval, n: usize) -> Result<&[Bar], StoreError> {
        Ok(self.series(symbol, interval)?.latest(n))
    }

    pub fn last(&self, symbol: &str, interval: Interval) -> Result<Option<&Bar>, StoreError> {
        Ok(self.series(symbol, interval)?.last())
    }

    pub fn len(&self, symbol: &str, interval: Interval) -> Result<usize, StoreError> {
        Ok(self.series(symbol, interval)?.len())
    }

    pub fn series(&self, symbol: &str, interval: Interval) -> Result<&Series, StoreError> {
        let slot = self.slot(symbol, interval)?;
        Ok(&self.slots[slot])
    }

    pub fn contains(&self, symbol: &str, interval: Interval) -> bool {
        self.index.contains_key(&SeriesKey::new(symbol, interval))
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<SeriesKey> = self.index.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn series_mut(&mut self, symbol: &str, interval: Interval) -> Result<&mut Series, StoreError> {
        let slot = self.slot(symbol, interval)?;
        Ok(&mut self.slots[slot])
    }

    fn slot(&self, symbol: &str, interval: Interval) -> Result<usize, StoreError> {
        let key = SeriesKey::new(symbol, interval);
        self.index
            .get(&key)
            .copied()
            .ok_or(StoreError::NotFound(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bar_at(minute: i64, close: f64) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap() + Duration::minutes(minute);
        Bar::new(ts, close, close + 1.0, close - 1.0, close, 10.0)
    }

    #[test]
    fn unknown_key_is_not_found() {
        let store = BarStore::new();
        let err = store.latest("SPY", Interval::Min1, 1).unwrap_err();
        assert_eq!(err, StoreError::NotFound(SeriesKey::new("SPY", Interval::Min1)));
        assert!(!store.contains("SPY", Interval::Min1));
    }

    #[test]
    fn append_and_replace() {
        let mut store = BarStore::new();
        store.init("SPY", Interval::Min5);
        store.append("SPY", Interval::Min5, bar_at(0, 1.0), false).unwrap();
        store.append("SPY", Interval::Min5, bar_at(1, 2.0), true).unwrap();
        store.append("SPY", Interval::Min5, bar_at(2, 3.0), false).unwrap();

        let bars = store.latest("SPY", Interval::Min5, 5).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 2.0);
        assert_eq!(bars[1].close, 3.0);
    }

    #[test]
    fn init_clears_existing_series() {
        let mut store = BarStore::new();
        store.init("SPY", Interval::Min1);
        store.append("SPY", Interval::Min1, bar_at(0, 1.0), false).unwrap();
        store.init("SPY", Interval::Min1);
        assert_eq!(store.len("SPY", Interval::Min1).unwrap(), 0);
        assert_eq!(store.keys().len(), 1);
    }

    #[test]
    fn keys_are_sorted() {
        let mut store = BarStore::new();
        store.init("QQQ", Interval::Min1);
        store.init("AAPL", Interval::Hr1);
        store.init("AAPL", Interval::Min1);
        let keys = store.keys();
        assert_eq!(keys[0], SeriesKey::new("AAPL", Interval::Min1));
        assert_eq!(keys[1], SeriesKey::new("AAPL", Interval::Hr1));
        assert_eq!(keys[2], SeriesKey::new("QQQ", Interval::Min1));
    }
}
