//! Criterion benchmarks for ReplayLab hot paths.
//!
//! Benchmarks:
//! 1. Full replay (store append, incremental aggregation, fills, algorithm call)
//! 2. Batch aggregation of a long base series
//! 3. Paper broker fill pass over a deep pending queue

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use replaylab_core::aggregate::aggregate_batch;
use replaylab_core::data::{DataSupplier, SyntheticSupplier, TimeRange};
use replaylab_core::domain::{Account, Bar, Interval, OrderSide};
use replaylab_core::engine::{
    Algorithm, AlgorithmError, Broker, CommissionSchedule, Observation, PaperBroker, ReplayConfig,
    ReplayEngine, TickContext,
};
use replaylab_core::store::Series;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_series(symbol: &str, sessions: usize) -> Series {
    SyntheticSupplier::new(7)
        .with_sessions(sessions)
        .fetch_bars(symbol, Interval::Min1, TimeRange::all())
        .unwrap()
}

/// Places a limit order at the last close every tick.
struct Churn;

impl Algorithm for Churn {
    fn name(&self) -> &str {
        "churn"
    }

    fn main(&mut self, ctx: &mut TickContext<'_>) -> Result<(), AlgorithmError> {
        let Some(close) = ctx.close("SPY")? else {
            return Ok(());
        };
        let side = if ctx.tick() % 2 == 0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        ctx.broker().order_limit(side, "SPY", 1.0, close)?;
        Ok(())
    }
}

// ── 1. Replay ────────────────────────────────────────────────────────

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");
    for sessions in [1usize, 5] {
        let mut data = BTreeMap::new();
        data.insert("SPY".to_string(), make_series("SPY", sessions));
        data.insert("QQQ".to_string(), make_series("QQQ", sessions));
        let config = ReplayConfig::new(vec!["SPY".into(), "QQQ".into()], Interval::Min1)
            .with_aggregations(vec![Interval::Min5, Interval::Min30, Interval::Day1]);

        group.bench_with_input(BenchmarkId::from_parameter(sessions), &data, |b, data| {
            b.iter(|| {
                let broker =
                    PaperBroker::new(Account::new(1_000_000.0, 2.0), CommissionSchedule::free());
                let engine = ReplayEngine::new(config.clone(), data.clone(), broker).unwrap();
                black_box(engine.run(&mut Churn).unwrap())
            })
        });
    }
    group.finish();
}

// ── 2. Batch aggregation ─────────────────────────────────────────────

fn bench_aggregate_batch(c: &mut Criterion) {
    let series = make_series("SPY", 20);
    c.bench_function("aggregate_batch_1min_to_30min", |b| {
        b.iter(|| black_box(aggregate_batch(series.bars(), 30).unwrap()))
    });
}

// ── 3. Fill pass ─────────────────────────────────────────────────────

fn bench_fill_pass(c: &mut Criterion) {
    let ts = Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap();
    let mut observation = Observation::new();
    observation.insert(
        "SPY".to_string(),
        Bar::new(ts + Duration::minutes(1), 100.0, 101.0, 99.0, 100.5, 1e6),
    );

    c.bench_function("evaluate_pending_1000", |b| {
        b.iter(|| {
            let mut broker =
                PaperBroker::new(Account::new(1e9, 1.0), CommissionSchedule::free());
            for i in 0..1000 {
                let limit = 95.0 + (i % 10) as f64;
                broker
                    .order_limit(OrderSide::Buy, "SPY", 1.0, limit)
                    .unwrap();
            }
            black_box(broker.evaluate_pending(&observation))
        })
    });
}

criterion_group!(benches, bench_replay, bench_aggregate_batch, bench_fill_pass);
criterion_main!(benches);
