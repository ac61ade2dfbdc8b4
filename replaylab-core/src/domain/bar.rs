//! Bar: one OHLCV sample for a symbol at a given interval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar stamped in UTC.
///
/// The symbol and interval are not stored on the bar; they are the key of the
/// series the bar lives in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Basic OHLCV sanity check: finite prices, high/low enclose open/close, volume >= 0.
    pub fn is_sane(&self) -> bool {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return false;
        }
        self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && self.high >= self.low
            && self.volume >= 0.0
    }

    /// True when `price` lies within this bar's range.
    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}
