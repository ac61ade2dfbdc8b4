//! Data supplier trait and structured error types.
//!
//! A supplier returns the full series for one symbol at one interval in a
//! single call. Replay never touches a supplier; everything is preloaded.

use crate::domain::{Interval, Symbol};
use crate::store::{Series, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no data for {symbol} at {interval}")]
    Missing { symbol: Symbol, interval: Interval },

    #[error("data gap for {symbol} near {at}: {detail}")]
    Gap {
        symbol: Symbol,
        at: DateTime<Utc>,
        detail: String,
    },

    #[error("watched symbols share no overlapping time range")]
    NoOverlap,

    #[error("{symbol} is not sampled at {expected}: step of {step_secs}s at {at}")]
    IntervalMismatch {
        symbol: Symbol,
        expected: Interval,
        step_secs: i64,
        at: DateTime<Utc>,
    },

    #[error("{supplier} does not support interval {interval}")]
    UnsupportedInterval { supplier: String, interval: Interval },

    #[error("validation error for {symbol}: {reason}")]
    Validation { symbol: Symbol, reason: String },

    #[error("unordered bars for {symbol}: {source}")]
    Ordering {
        symbol: Symbol,
        #[source]
        source: StoreError,
    },

    #[error("parse error in {path} row {row}: {message}")]
    Parse {
        path: String,
        row: usize,
        message: String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited by supplier (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("hard stop: data supplier is blocked (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which supplier a run reads from first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceMode {
    Fetch,
    Csv,
    Local,
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceMode::Fetch => f.write_str("FETCH"),
            SourceMode::Csv => f.write_str("CSV"),
            SourceMode::Local => f.write_str("LOCAL"),
        }
    }
}

impl FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FETCH" => Ok(SourceMode::Fetch),
            "CSV" => Ok(SourceMode::Csv),
            "LOCAL" => Ok(SourceMode::Local),
            _ => Err(format!(
                "unknown source mode '{s}' (expected FETCH, CSV or LOCAL)"
            )),
        }
    }
}

/// Where a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Yahoo,
    Csv,
    LocalStore,
    Synthetic,
}

/// Inclusive time window for a fetch. Unbounded ends take everything available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }

    /// Restrict a series to this range.
    pub fn clip(&self, series: &Series) -> Series {
        match (self.start, self.end) {
            (None, None) => series.clone(),
            (start, end) => series.slice_range(
                start.unwrap_or(DateTime::<Utc>::MIN_UTC),
                end.unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
        }
    }
}

/// Capability set shared by data suppliers.
pub trait DataSupplier: Send + Sync {
    /// Human-readable name of this supplier.
    fn name(&self) -> &str;

    fn source(&self) -> DataSource;

    /// Full series for a symbol at an interval. An empty series means "no data".
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Series, DataError>;

    /// False while the supplier is rate-limited or blocked.
    fn is_available(&self) -> bool {
        true
    }
}

/// Reject bars that fail the OHLCV sanity check.
pub fn validate_bars(symbol: &str, series: &Series) -> Result<(), DataError> {
    if let Some(bad) = series.bars().iter().find(|b| !b.is_sane()) {
        return Err(DataError::Validation {
            symbol: symbol.to_string(),
            reason: format!("insane bar at {}", bad.timestamp),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::{Duration, TimeZone};

    #[test]
    fn source_mode_parsing() {
        assert_eq!("fetch".parse::<SourceMode>().unwrap(), SourceMode::Fetch);
        assert_eq!("CSV".parse::<SourceMode>().unwrap(), SourceMode::Csv);
        assert_eq!(" Local ".parse::<SourceMode>().unwrap(), SourceMode::Local);
        assert!("s3".parse::<SourceMode>().is_err());
        assert_eq!(SourceMode::Local.to_string(), "LOCAL");
    }

    #[test]
    fn range_clip() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        let bars = (0..10)
            .map(|i| Bar::new(t0 + Duration::minutes(i), 1.0, 1.0, 1.0, 1.0, 1.0))
            .collect();
        let series = Series::from_bars(bars).unwrap();

        assert_eq!(TimeRange::all().clip(&series).len(), 10);
        let from_five = TimeRange::new(Some(t0 + Duration::minutes(5)), None);
        assert_eq!(from_five.clip(&series).len(), 5);
        assert!(from_five.contains(t0 + Duration::minutes(9)));
        assert!(!from_five.contains(t0));
    }

    #[test]
    fn validate_flags_insane_bars() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        let series = Series::from_bars(vec![Bar::new(t0, 10.0, 9.0, 8.0, 9.5, 1.0)]).unwrap();
        assert!(matches!(
            validate_bars("X", &series),
            Err(DataError::Validation { .. })
        ));
    }
}
