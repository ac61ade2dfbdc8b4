//! ReplayLab Runner: run orchestration on top of `replaylab-core`.
//!
//! This crate provides:
//! - TOML run configuration with validation
//! - Data loading with CSV/local/fetch sources, fetch fallback, and cache persistence
//! - Built-in sample algorithms selected by name
//! - Performance metrics and JSON/CSV result artifacts

pub mod algos;
pub mod config;
pub mod data_loader;
pub mod metrics;
pub mod result;
pub mod runner;

pub use algos::{build_algorithm, BuyAndHold, SmaCross, ALGORITHMS};
pub use config::{ConfigError, RunConfig};
pub use data_loader::{load_bars, LoadError, LoadOptions, LoadedData};
pub use metrics::PerformanceMetrics;
pub use result::{load_artifacts, save_artifacts, ArtifactError, BacktestResult, SCHEMA_VERSION};
pub use runner::{run_backtest, run_backtest_from_data, RunError};
