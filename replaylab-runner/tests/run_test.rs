//! End-to-end runs: TOML config in, result and cache files out.

use replaylab_core::data::{DataSource, LocalStore};
use replaylab_core::domain::Interval;
use replaylab_runner::{
    load_artifacts, run_backtest, save_artifacts, BacktestResult, LoadError, RunConfig, RunError,
};
use std::fmt::Write as _;
use std::path::Path;

/// Ten one-minute bars: open 100 + i, close open + 0.5.
fn write_csv(dir: &Path, symbol: &str) {
    let mut body = String::from("timestamp,open,high,low,close,volume\n");
    for i in 0..10 {
        let open = 100.0 + i as f64;
        writeln!(
            body,
            "2024-01-02 14:{:02}:00,{},{},{},{},1000",
            31 + i,
            open,
            open + 1.0,
            open - 1.0,
            open + 0.5
        )
        .unwrap();
    }
    std::fs::write(dir.join(format!("{symbol}.csv")), body).unwrap();
}

fn csv_config(dir: &Path, extra_run: &str) -> RunConfig {
    let toml = format!(
        r#"
[run]
source = "CSV"
interval = "1MIN"
aggregations = ["5MIN"]
symbols = ["SPY"]
data_dir = '{}'
algorithm = "buy_and_hold"
fetch_fallback = false
{extra_run}

[account]
cash = 10000.0

[commission]
buy = 1.0

[algorithm]
quantity = 10
"#,
        dir.display()
    );
    RunConfig::from_toml(&toml).unwrap()
}

#[test]
fn csv_run_fills_at_next_open() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "SPY");

    let result = run_backtest(&csv_config(dir.path(), ""), None).unwrap();
    let replay = &result.replay;

    assert_eq!(replay.ticks, 10);
    assert_eq!(replay.equity_curve.len(), 10);
    assert_eq!(replay.fills.len(), 1);
    assert_eq!(replay.fills[0].price, 101.0);
    assert_eq!(result.sources["SPY"], DataSource::Csv);
    assert!(!result.synthetic);

    let account = replay.final_account;
    assert!((account.cash - 8_989.0).abs() < 1e-9);
    assert!((account.equity - 10_084.0).abs() < 1e-9);
    assert!((result.metrics.total_return - 0.0084).abs() < 1e-12);
    assert_eq!(result.metrics.commission_paid, 1.0);
}

#[test]
fn csv_run_populates_local_store() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "SPY");
    let first = run_backtest(&csv_config(dir.path(), ""), None).unwrap();

    let store = LocalStore::new(dir.path());
    let status = store.status().unwrap();
    let counts: Vec<(Interval, usize)> = status.iter().map(|e| (e.interval, e.bars)).collect();
    assert!(counts.contains(&(Interval::Min1, 10)));
    assert!(counts.contains(&(Interval::Min5, 2)));

    // Replaying from the local store reproduces the run.
    std::fs::remove_file(dir.path().join("SPY.csv")).unwrap();
    let mut config = csv_config(dir.path(), "");
    config.run.source = "LOCAL".parse().unwrap();
    let second = run_backtest(&config, None).unwrap();
    assert_eq!(second.sources["SPY"], DataSource::LocalStore);
    assert_eq!(second.run_id, first.run_id);
    assert_eq!(second.replay.fills, first.replay.fills);
}

#[test]
fn missing_data_without_fallback_is_a_gap() {
    let dir = tempfile::tempdir().unwrap();
    let err = run_backtest(&csv_config(dir.path(), ""), None).unwrap_err();
    assert!(matches!(err, RunError::Load(LoadError::DataGap { .. })));
}

#[test]
fn output_path_receives_result_json() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "SPY");
    let out = dir.path().join("out.json");
    let extra = format!("output = '{}'", out.display());

    let result = run_backtest(&csv_config(dir.path(), &extra), None).unwrap();
    let json = std::fs::read_to_string(&out).unwrap();
    let loaded = BacktestResult::from_json(&json).unwrap();
    assert_eq!(loaded.run_id, result.run_id);
    assert_eq!(loaded.config, result.config);

    let run_dir = save_artifacts(&result, &dir.path().join("runs")).unwrap();
    let fills = std::fs::read_to_string(run_dir.join("fills.csv")).unwrap();
    assert_eq!(fills.lines().count(), 2);
    let equity = std::fs::read_to_string(run_dir.join("equity.csv")).unwrap();
    assert_eq!(equity.lines().count(), 11);
    assert_eq!(load_artifacts(&run_dir).unwrap().run_id, result.run_id);
}

#[test]
fn synthetic_sma_cross_run() {
    let dir = tempfile::tempdir().unwrap();
    let toml = format!(
        r#"
[run]
interval = "1MIN"
aggregations = ["5MIN", "1DAY"]
symbols = ["SPY", "QQQ"]
data_dir = '{}'
algorithm = "sma_cross"
synthetic = true
seed = 11
sessions = 2

[algorithm]
fast = 3
slow = 8
"#,
        dir.path().display()
    );
    let config = RunConfig::from_toml(&toml).unwrap();

    let a = run_backtest(&config, None).unwrap();
    let b = run_backtest(&config, None).unwrap();

    assert!(a.synthetic);
    assert_eq!(a.replay.ticks, 780);
    assert!(a.replay.fills.len() <= a.replay.orders.len());
    assert!(a.metrics.final_equity.is_finite());
    assert!(a.metrics.max_drawdown <= 0.0);
    assert_eq!(a.run_id, b.run_id);
    assert_eq!(a.replay.fills, b.replay.fills);
    // Synthetic data never reaches the local store.
    assert!(LocalStore::new(dir.path()).status().unwrap().is_empty());
}
