//! TOML run configuration.
//!
//! ```toml
//! [run]
//! source = "CSV"
//! interval = "1MIN"
//! aggregations = ["5MIN", "1HR"]
//! symbols = ["SPY", "QQQ"]
//! data_dir = "data"
//! algorithm = "sma_cross"
//!
//! [account]
//! cash = 100000.0
//!
//! [commission]
//! buy = 1.0
//! sell = "0.1%"
//!
//! [algorithm]
//! fast = 5
//! slow = 20
//! ```
//!
//! Everything is validated before any data is loaded.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use replaylab_core::data::{SourceMode, TimeRange};
use replaylab_core::domain::{Account, AssetClass, Interval, Position};
use replaylab_core::engine::{self, CommissionSchedule, ReplayConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::algos;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Replay(#[from] engine::ConfigError),

    #[error("unknown algorithm '{name}' (expected one of: {known})")]
    UnknownAlgorithm { name: String, known: String },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub run: RunSection,
    #[serde(default)]
    pub account: AccountSection,
    #[serde(default)]
    pub commission: CommissionSchedule,
    /// Free-form numeric parameters for the algorithm.
    #[serde(default)]
    pub algorithm: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    #[serde(default = "default_source")]
    pub source: SourceMode,
    /// Base interval, e.g. `"1MIN"`.
    pub interval: String,
    #[serde(default)]
    pub aggregations: Vec<String>,
    pub symbols: Vec<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub algorithm: String,
    #[serde(default)]
    pub warmup_bars: usize,
    /// `HH:MM` or `HH:MM:SS`, UTC.
    #[serde(default = "default_daily_close")]
    pub daily_close: String,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    /// Fall back to the fetch supplier when the primary source misses a symbol.
    #[serde(default = "default_true")]
    pub fetch_fallback: bool,
    /// Replace every supplier with the seeded random walk.
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_sessions")]
    pub sessions: usize,
    /// Write the result JSON here when set.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountSection {
    #[serde(default = "default_cash")]
    pub cash: f64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub positions: Vec<SeedPosition>,
}

impl Default for AccountSection {
    fn default() -> Self {
        Self {
            cash: default_cash(),
            multiplier: default_multiplier(),
            positions: Vec::new(),
        }
    }
}

/// A position the broker starts with. Options cannot be seeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedPosition {
    pub symbol: String,
    pub quantity: f64,
    pub avg_price: f64,
    #[serde(default = "default_asset_class")]
    pub asset_class: AssetClass,
}

fn default_source() -> SourceMode {
    SourceMode::Local
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_daily_close() -> String {
    "20:00".to_string()
}

fn default_true() -> bool {
    true
}

fn default_sessions() -> usize {
    5
}

fn default_cash() -> f64 {
    100_000.0
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_asset_class() -> AssetClass {
    AssetClass::Stock
}

impl RunConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Full validation. Call again after applying overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.replay_config()?;
        let range = self.time_range()?;
        if let (Some(start), Some(end)) = (range.start, range.end) {
            if start > end {
                return Err(ConfigError::Invalid {
                    field: "run.start",
                    reason: format!("{start} is after end {end}"),
                });
            }
        }
        if !algos::is_known(&self.run.algorithm) {
            return Err(ConfigError::UnknownAlgorithm {
                name: self.run.algorithm.clone(),
                known: algos::ALGORITHMS.join(", "),
            });
        }
        if !(self.account.cash.is_finite() && self.account.cash >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "account.cash",
                reason: format!("must be a non-negative amount, got {}", self.account.cash),
            });
        }
        if !(self.account.multiplier.is_finite() && self.account.multiplier > 0.0) {
            return Err(ConfigError::Invalid {
                field: "account.multiplier",
                reason: format!("must be positive, got {}", self.account.multiplier),
            });
        }
        for seed in &self.account.positions {
            if seed.asset_class == AssetClass::Option {
                return Err(ConfigError::Invalid {
                    field: "account.positions",
                    reason: format!("option position {} cannot be seeded", seed.symbol),
                });
            }
            if !(seed.avg_price.is_finite() && seed.avg_price > 0.0) {
                return Err(ConfigError::Invalid {
                    field: "account.positions",
                    reason: format!("{} has invalid avg_price {}", seed.symbol, seed.avg_price),
                });
            }
        }
        if self.run.sessions == 0 {
            return Err(ConfigError::Invalid {
                field: "run.sessions",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn base_interval(&self) -> Result<Interval, ConfigError> {
        Ok(self.replay_config()?.base_interval)
    }

    /// Replay configuration, validated. The run label is the algorithm name and parameters.
    pub fn replay_config(&self) -> Result<ReplayConfig, ConfigError> {
        let symbols: Vec<&str> = self.run.symbols.iter().map(String::as_str).collect();
        let aggregations: Vec<&str> = self.run.aggregations.iter().map(String::as_str).collect();
        let label = std::iter::once(self.run.algorithm.clone())
            .chain(self.algorithm.iter().map(|(k, v)| format!("{k}={v}")))
            .collect::<Vec<_>>()
            .join(";");
        Ok(
            ReplayConfig::parse(&symbols, &self.run.interval, &aggregations)?
                .with_warmup(self.run.warmup_bars)
                .with_daily_close(self.daily_close()?)
                .with_label(label),
        )
    }

    pub fn daily_close(&self) -> Result<NaiveTime, ConfigError> {
        let raw = self.run.daily_close.trim();
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .map_err(|e| ConfigError::Invalid {
                field: "run.daily_close",
                reason: format!("'{raw}': {e}"),
            })
    }

    pub fn time_range(&self) -> Result<TimeRange, ConfigError> {
        let start = self
            .run
            .start
            .as_deref()
            .map(|s| parse_bound(s, "run.start", false))
            .transpose()?;
        let end = self
            .run
            .end
            .as_deref()
            .map(|s| parse_bound(s, "run.end", true))
            .transpose()?;
        Ok(TimeRange::new(start, end))
    }

    pub fn initial_account(&self) -> Account {
        Account::new(self.account.cash, self.account.multiplier)
    }

    pub fn seed_positions(&self) -> Vec<Position> {
        self.account
            .positions
            .iter()
            .map(|seed| Position {
                symbol: seed.symbol.clone(),
                underlying: seed.symbol.clone(),
                asset_class: seed.asset_class,
                quantity: seed.quantity,
                avg_price: seed.avg_price,
                option: None,
            })
            .collect()
    }
}

/// Dates cover the whole UTC day: a bare end date includes its last second.
fn parse_bound(raw: &str, field: &'static str, end_of_day: bool) -> Result<DateTime<Utc>, ConfigError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| ConfigError::Invalid {
        field,
        reason: format!("'{raw}': {e}"),
    })?;
    let (h, m, s) = if end_of_day { (23, 59, 59) } else { (0, 0, 0) };
    let time = NaiveTime::from_hms_opt(h, m, s).unwrap_or(NaiveTime::MIN);
    Ok(date.and_time(time).and_utc())
}
