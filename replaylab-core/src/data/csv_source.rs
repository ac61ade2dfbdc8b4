//! CSV supplier: one file per symbol at `{dir}/{symbol}.csv`.
//!
//! Columns: `timestamp,open,high,low,close,volume`. The timestamp is either
//! epoch seconds or a formatted UTC string (`%Y-%m-%d %H:%M:%S` by default;
//! RFC 3339 and bare dates are also accepted). A missing file is a miss, not
//! an error.

use super::provider::{DataError, DataSource, DataSupplier, TimeRange};
use crate::domain::{Bar, Interval};
use crate::store::Series;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

#[derive(Debug, Clone)]
pub struct CsvSupplier {
    dir: PathBuf,
    timestamp_format: String,
}

impl CsvSupplier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }

    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    /// Read and validate one CSV file.
    pub fn read_file(&self, path: &Path) -> Result<Series, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut bars = Vec::new();
        for (row_idx, record) in reader.deserialize::<CsvRow>().enumerate() {
            let row = record?;
            let timestamp = parse_timestamp(&row.timestamp, &self.timestamp_format).ok_or_else(|| {
                DataError::Parse {
                    path: path.display().to_string(),
                    row: row_idx + 1,
                    message: format!("unrecognised timestamp '{}'", row.timestamp),
                }
            })?;
            bars.push(Bar::new(timestamp, row.open, row.high, row.low, row.close, row.volume));
        }

        let symbol = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        Series::from_bars(bars).map_err(|source| DataError::Ordering { symbol, source })
    }
}

/// Epoch seconds, the configured format, RFC 3339, or a bare date.
pub fn parse_timestamp(raw: &str, format: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
        return Some(naive.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl DataSupplier for CsvSupplier {
    fn name(&self) -> &str {
        "csv"
    }

    fn source(&self) -> DataSource {
        DataSource::Csv
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Series, DataError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            debug!(symbol, %interval, path = %path.display(), "no csv file");
            return Ok(Series::new());
        }
        let series = self.read_file(&path)?;
        Ok(range.clip(&series))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;

    #[test]
    fn parses_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        assert_eq!(parse_timestamp("1704205800", DEFAULT_TIMESTAMP_FORMAT), Some(expected));
        assert_eq!(
            parse_timestamp("2024-01-02 14:30:00", DEFAULT_TIMESTAMP_FORMAT),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp("2024-01-02T14:30:00Z", DEFAULT_TIMESTAMP_FORMAT),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp("2024-01-02", DEFAULT_TIMESTAMP_FORMAT),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday", DEFAULT_TIMESTAMP_FORMAT), None);
    }

    #[test]
    fn reads_csv_and_reports_miss() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("SPY.csv"),
            "timestamp,open,high,low,close,volume\n\
             2024-01-02 14:30:00,10,11,9,10.5,100\n\
             2024-01-02 14:31:00,10.5,12,10,11,50\n",
        )
        .unwrap();

        let supplier = CsvSupplier::new(dir.path());
        let series = supplier
            .fetch_bars("SPY", Interval::Min1, TimeRange::all())
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().close, 11.0);

        let miss = supplier
            .fetch_bars("QQQ", Interval::Min1, TimeRange::all())
            .unwrap();
        assert!(miss.is_empty());
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("SPY.csv"),
            "timestamp,open,high,low,close,volume\n\
             1704205800,10,11,9,10.5,100\n\
             1704205800,10,11,9,10.5,100\n",
        )
        .unwrap();
        let supplier = CsvSupplier::new(dir.path());
        assert!(matches!(
            supplier.fetch_bars("SPY", Interval::Min1, TimeRange::all()),
            Err(DataError::Ordering { .. })
        ));
    }

    #[test]
    fn bad_timestamp_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("SPY.csv"),
            "timestamp,open,high,low,close,volume\nnot-a-time,1,1,1,1,1\n",
        )
        .unwrap();
        let supplier = CsvSupplier::new(dir.path());
        assert!(matches!(
            supplier.fetch_bars("SPY", Interval::Min1, TimeRange::all()),
            Err(DataError::Parse { row: 1, .. })
        ));
    }
}
