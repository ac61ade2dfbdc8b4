//! Yahoo Finance fetch supplier.
//!
//! Pulls intraday or daily OHLCV bars from Yahoo's v8 chart API, with retries,
//! exponential backoff, and the shared circuit breaker. Used directly in FETCH
//! mode and as the fallback when the CSV or local store misses a symbol.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataSource, DataSupplier, TimeRange};
use crate::domain::{Bar, Interval};
use crate::store::Series;
use chrono::DateTime;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

/// Yahoo's interval code, or `None` when the chart API has no such granularity.
pub fn yahoo_interval(interval: Interval) -> Option<&'static str> {
    match interval {
        Interval::Sec15 => None,
        Interval::Min1 => Some("1m"),
        Interval::Min5 => Some("5m"),
        Interval::Min15 => Some("15m"),
        Interval::Min30 => Some("30m"),
        Interval::Hr1 => Some("60m"),
        Interval::Day1 => Some("1d"),
    }
}

/// Longest lookback Yahoo serves for an interval when no range is given.
fn default_lookback(interval: Interval) -> &'static str {
    match interval {
        Interval::Sec15 | Interval::Min1 => "7d",
        Interval::Min5 | Interval::Min15 | Interval::Min30 => "60d",
        Interval::Hr1 => "730d",
        Interval::Day1 => "max",
    }
}

pub struct YahooSupplier {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooSupplier {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) replaylab")
            .build()
            .map_err(|e| DataError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    fn chart_url(symbol: &str, code: &str, interval: Interval, range: TimeRange) -> String {
        let base = format!("https://query2.finance.yahoo.com/v8/finance/chart/{symbol}?interval={code}");
        match (range.start, range.end) {
            (None, None) => format!("{base}&range={}", default_lookback(interval)),
            (start, end) => {
                let p1 = start.map_or(0, |s| s.timestamp());
                let p2 = end.map_or_else(|| chrono::Utc::now().timestamp(), |e| e.timestamp());
                format!("{base}&period1={p1}&period2={p2}")
            }
        }
    }

    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Series, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;
        let timestamps = data.timestamp.unwrap_or_default();
        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars: Vec<Bar> = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp = DateTime::from_timestamp(ts, 0).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;
            let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
            // Rows with any missing price are halts or padding.
            let (Some(open), Some(high), Some(low), Some(close)) = (
                field(&quote.open),
                field(&quote.high),
                field(&quote.low),
                field(&quote.close),
            ) else {
                continue;
            };
            let volume = field(&quote.volume).unwrap_or(0.0);
            let bar = Bar::new(timestamp, open, high, low, close, volume);

            // The live bar can repeat the last timestamp; keep the newer one.
            match bars.last_mut() {
                Some(last) if last.timestamp == timestamp => *last = bar,
                _ => bars.push(bar),
            }
        }

        debug!(symbol, bars = bars.len(), "parsed chart response");
        Series::from_bars(bars).map_err(|source| DataError::Ordering {
            symbol: symbol.to_string(),
            source,
        })
    }

    fn fetch_with_retry(&self, url: &str, symbol: &str) -> Result<Series, DataError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
            }
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::Network(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::Network(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after_secs = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!(symbol, retry_after_secs, "rate limited");
                last_error = Some(DataError::RateLimited { retry_after_secs });
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(Series::new());
            }
            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Network(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
            })?;
            let series = Self::parse_response(symbol, chart)?;
            self.circuit_breaker.record_success();
            return Ok(series);
        }

        Err(last_error.unwrap_or_else(|| DataError::Network("max retries exceeded".into())))
    }
}

impl DataSupplier for YahooSupplier {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn source(&self) -> DataSource {
        DataSource::Yahoo
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Series, DataError> {
        let code = yahoo_interval(interval).ok_or_else(|| DataError::UnsupportedInterval {
            supplier: self.name().to_string(),
            interval,
        })?;
        let url = Self::chart_url(symbol, code, interval, range);
        let series = self.fetch_with_retry(&url, symbol)?;
        Ok(range.clip(&series))
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
