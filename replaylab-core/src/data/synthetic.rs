//! Seeded random-walk supplier for development runs.
//!
//! Bars cover regular US sessions (13:30–20:00 UTC, weekdays). Daily bars are
//! stamped at 20:00 UTC. The walk for a symbol depends only on the master seed
//! and the symbol, so the same inputs always yield the same series.

use super::provider::{DataError, DataSource, DataSupplier, TimeRange};
use crate::domain::{Bar, Interval};
use crate::store::Series;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SESSION_OPEN: (u32, u32) = (13, 30);
const SESSION_SECS: i64 = 390 * 60;

#[derive(Debug, Clone)]
pub struct SyntheticSupplier {
    seed: u64,
    start: NaiveDate,
    sessions: usize,
}

impl SyntheticSupplier {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap_or_default(),
            sessions: 5,
        }
    }

    pub fn with_start(mut self, start: NaiveDate) -> Self {
        self.start = start;
        self
    }

    pub fn with_sessions(mut self, sessions: usize) -> Self {
        self.sessions = sessions.max(1);
        self
    }

    /// Per-symbol seed, independent of the order symbols are requested in.
    pub fn sub_seed(&self, symbol: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    fn session_days(&self, range: TimeRange) -> Vec<NaiveDate> {
        let mut day = range.start.map_or(self.start, |s| s.date_naive());
        let mut days = Vec::with_capacity(self.sessions);
        while days.len() < self.sessions {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                days.push(day);
            }
            day += Duration::days(1);
        }
        days
    }

    fn timestamps(&self, interval: Interval, range: TimeRange) -> Vec<DateTime<Utc>> {
        let open = NaiveTime::from_hms_opt(SESSION_OPEN.0, SESSION_OPEN.1, 0).unwrap_or(NaiveTime::MIN);
        let close = NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN);
        let mut out = Vec::new();
        for day in self.session_days(range) {
            if interval == Interval::Day1 {
                out.push(day.and_time(close).and_utc());
                continue;
            }
            let session_start = day.and_time(open).and_utc();
            let period = interval.period_secs();
            for k in 1..=(SESSION_SECS / period) {
                out.push(session_start + Duration::seconds(k * period));
            }
        }
        out
    }
}

impl DataSupplier for SyntheticSupplier {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn source(&self) -> DataSource {
        DataSource::Synthetic
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Series, DataError> {
        let mut rng = StdRng::seed_from_u64(self.sub_seed(symbol));
        let scale = 0.02 * (interval.period_secs() as f64 / 86_400.0).sqrt();
        let mut price = 100.0_f64;
        let mut series = Series::new();

        for timestamp in self.timestamps(interval, range) {
            let ret: f64 = rng.gen_range(-1.0..1.0) * scale;
            let open = price;
            let close = (price * (1.0 + ret)).max(0.01);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.5) * scale);
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.5) * scale);
            let volume = rng.gen_range(1_000.0..50_000.0_f64).round();
            series
                .push(Bar::new(timestamp, open, high, low, close, volume))
                .map_err(|source| DataError::Ordering {
                    symbol: symbol.to_string(),
                    source,
                })?;
            price = close;
        }
        Ok(range.clip(&series))
    }
}
