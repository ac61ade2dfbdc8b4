//! Backtest result and artifact export.
//!
//! A run directory `{output}/{run_id short}/` holds:
//! - `result.json`: the full [`BacktestResult`]
//! - `fills.csv`: one row per fill
//! - `equity.csv`: one row per replayed tick
//!
//! Persisted JSON carries a `schema_version`; newer versions are rejected on load.

use chrono::{DateTime, Utc};
use replaylab_core::data::DataSource;
use replaylab_core::domain::{Fill, RunId};
use replaylab_core::engine::{EquityPoint, ReplayResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::RunConfig;
use crate::metrics::PerformanceMetrics;

pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("unsupported schema version {found} (max supported: {SCHEMA_VERSION})")]
    SchemaVersion { found: u32 },
}

/// Everything a completed run produced, plus the config that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub algorithm: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub sources: BTreeMap<String, DataSource>,
    /// True when any symbol replayed synthetic data.
    #[serde(default)]
    pub synthetic: bool,
    pub metrics: PerformanceMetrics,
    pub replay: ReplayResult,
    #[serde(default)]
    pub config: Option<RunConfig>,
}

impl BacktestResult {
    pub fn to_json(&self) -> Result<String, ArtifactError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let result: Self = serde_json::from_str(json)?;
        if result.schema_version > SCHEMA_VERSION {
            return Err(ArtifactError::SchemaVersion {
                found: result.schema_version,
            });
        }
        Ok(result)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), ArtifactError> {
        write_file(path, self.to_json()?)
    }
}

/// Fills as CSV.
pub fn fills_csv(fills: &[Fill]) -> Result<String, ArtifactError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "order_id",
        "timestamp",
        "symbol",
        "asset_class",
        "side",
        "quantity",
        "price",
        "commission",
    ])?;
    for fill in fills {
        wtr.write_record([
            fill.order_id.to_string(),
            fill.timestamp.to_rfc3339(),
            fill.symbol.clone(),
            fill.asset_class.to_string(),
            fill.side.to_string(),
            fill.quantity.to_string(),
            format!("{:.4}", fill.price),
            format!("{:.4}", fill.commission),
        ])?;
    }
    into_string(wtr)
}

/// Equity curve as CSV.
pub fn equity_csv(curve: &[EquityPoint]) -> Result<String, ArtifactError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity", "cash"])?;
    for point in curve {
        wtr.write_record([
            point.timestamp.to_rfc3339(),
            format!("{:.2}", point.equity),
            format!("{:.2}", point.cash),
        ])?;
    }
    into_string(wtr)
}

fn into_string(wtr: csv::Writer<Vec<u8>>) -> Result<String, ArtifactError> {
    let data = wtr
        .into_inner()
        .map_err(|e| ArtifactError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

fn write_file(path: &Path, contents: String) -> Result<(), ArtifactError> {
    fs::write(path, contents).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Save the artifact set for one run. Returns the run directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf, ArtifactError> {
    let run_dir = output_dir.join(result.run_id.short());
    fs::create_dir_all(&run_dir).map_err(|source| ArtifactError::Io {
        path: run_dir.clone(),
        source,
    })?;

    result.write_json(&run_dir.join("result.json"))?;
    write_file(&run_dir.join("fills.csv"), fills_csv(&result.replay.fills)?)?;
    write_file(
        &run_dir.join("equity.csv"),
        equity_csv(&result.replay.equity_curve)?,
    )?;
    Ok(run_dir)
}

/// Load a result from a run directory.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult, ArtifactError> {
    let path = dir.join("result.json");
    let json = fs::read_to_string(&path).map_err(|source| ArtifactError::Io { path, source })?;
    BacktestResult::from_json(&json)
}
