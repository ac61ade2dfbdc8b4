//! Persisted local store: Parquet files per symbol and interval.
//!
//! Layout: `{dir}/{symbol}/{interval}.parquet`, columns `timestamp` (epoch
//! seconds, UTC), `open`, `high`, `low`, `close`, `volume`.
//!
//! - `get_entry` returns an empty series on a miss
//! - `append_entry` merges by timestamp (new bars win) and writes atomically
//! - corrupt files are quarantined (`.quarantined`) and treated as a miss

use super::provider::{DataError, DataSource, DataSupplier, TimeRange};
use crate::domain::{Bar, Interval};
use crate::store::Series;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// One cached `(symbol, interval)` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub symbol: String,
    pub interval: Interval,
    pub bars: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.dir.join(symbol).join(format!("{interval}.parquet"))
    }

    /// Cached series, or an empty one when nothing usable is stored.
    pub fn get_entry(&self, symbol: &str, interval: Interval) -> Result<Series, DataError> {
        let path = self.entry_path(symbol, interval);
        if !path.exists() {
            return Ok(Series::new());
        }
        match read_parquet(&path) {
            Ok(series) => Ok(series),
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                fs::rename(&path, &quarantine)?;
                Ok(Series::new())
            }
        }
    }

    /// Merge `series` into the stored entry. Returns the stored bar count.
    pub fn append_entry(
        &self,
        symbol: &str,
        interval: Interval,
        series: &Series,
    ) -> Result<usize, DataError> {
        let existing = self.get_entry(symbol, interval)?;
        let mut merged: BTreeMap<DateTime<Utc>, Bar> = existing
            .into_bars()
            .into_iter()
            .map(|b| (b.timestamp, b))
            .collect();
        for bar in series.bars() {
            merged.insert(bar.timestamp, *bar);
        }
        let bars: Vec<Bar> = merged.into_values().collect();
        if bars.is_empty() {
            return Ok(0);
        }

        let path = self.entry_path(symbol, interval);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("parquet.tmp");
        let mut df = bars_to_dataframe(&bars)?;
        write_parquet(&mut df, &tmp_path)?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        debug!(symbol, %interval, bars = bars.len(), "cache entry written");
        Ok(bars.len())
    }

    /// Every cached entry, sorted by symbol then interval.
    pub fn status(&self) -> Result<Vec<CacheEntry>, DataError> {
        let mut entries = Vec::new();
        if !self.dir.exists() {
            return Ok(entries);
        }
        for sym_dir in fs::read_dir(&self.dir)? {
            let sym_dir = sym_dir?.path();
            if !sym_dir.is_dir() {
                continue;
            }
            let Some(symbol) = sym_dir.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            for file in fs::read_dir(&sym_dir)? {
                let path = file?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                    continue;
                }
                let Some(interval) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.parse::<Interval>().ok())
                else {
                    continue;
                };
                let series = self.get_entry(symbol, interval)?;
                entries.push(CacheEntry {
                    symbol: symbol.to_string(),
                    interval,
                    bars: series.len(),
                    first: series.first().map(|b| b.timestamp),
                    last: series.last().map(|b| b.timestamp),
                });
            }
        }
        entries.sort_by(|a, b| (&a.symbol, a.interval).cmp(&(&b.symbol, b.interval)));
        Ok(entries)
    }
}

impl DataSupplier for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    fn source(&self) -> DataSource {
        DataSource::LocalStore
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Series, DataError> {
        let series = self.get_entry(symbol, interval)?;
        Ok(range.clip(&series))
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn parquet_err(context: &str) -> impl Fn(PolarsError) -> DataError + '_ {
    move |e| DataError::Parquet(format!("{context}: {e}"))
}

fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame, DataError> {
    let timestamps: Vec<i64> = bars.iter().map(|b| b.timestamp.timestamp()).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("timestamp".into(), timestamps),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(parquet_err("dataframe creation"))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file = fs::File::create(path)?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(parquet_err("write parquet"))?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<Series, DataError> {
    let file = fs::File::open(path)?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(parquet_err("read parquet"))?;

    for name in COLUMNS {
        if df.column(name).is_err() {
            return Err(DataError::Parquet(format!("missing column '{name}'")));
        }
    }

    let ts = df
        .column("timestamp")
        .and_then(|c| c.i64().cloned())
        .map_err(parquet_err("timestamp column"))?;
    let float_col = |name: &str| {
        df.column(name)
            .and_then(|c| c.f64().cloned())
            .map_err(|e| DataError::Parquet(format!("{name} column: {e}")))
    };
    let open = float_col("open")?;
    let high = float_col("high")?;
    let low = float_col("low")?;
    let close = float_col("close")?;
    let volume = float_col("volume")?;

    let mut bars = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let secs = ts
            .get(i)
            .ok_or_else(|| DataError::Parquet(format!("null timestamp at row {i}")))?;
        let timestamp = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| DataError::Parquet(format!("timestamp out of range at row {i}")))?;
        bars.push(Bar::new(
            timestamp,
            open.get(i).unwrap_or(f64::NAN),
            high.get(i).unwrap_or(f64::NAN),
            low.get(i).unwrap_or(f64::NAN),
            close.get(i).unwrap_or(f64::NAN),
            volume.get(i).unwrap_or(0.0),
        ));
    }

    let symbol = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    crate::store::Series::from_bars(bars).map_err(|source| DataError::Ordering { symbol, source })
}
