//! Property tests for store, aggregation, and ledger invariants.
//!
//! Uses proptest to verify:
//! 1. Reduction rules: open first, high max, low min, close last, volume sum
//! 2. Incremental aggregation ends where batch aggregation does on aligned data
//! 3. Series ordering: out-of-order appends are rejected and leave the series intact
//! 4. Equity identity: equity = cash + Σ quantity × mark after any fill sequence

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use replaylab_core::aggregate::{aggregate_batch, reduce, Aggregator};
use replaylab_core::domain::{
    default_daily_close, Account, AssetClass, Bar, Fill, Interval, OrderId, OrderSide,
};
use replaylab_core::engine::Ledger;
use replaylab_core::store::Series;

// ── Strategies (proptest) ────────────────────────────────────────────

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 14, 31, 0).unwrap()
}

fn arb_bar_body() -> impl Strategy<Value = (f64, f64, f64, f64, f64)> {
    (10.0..500.0_f64, 0.0..5.0_f64, 0.0..5.0_f64, -5.0..5.0_f64, 0.0..10_000.0_f64).prop_map(
        |(open, up, down, drift, volume)| {
            let close = (open + drift).max(1.0);
            let high = open.max(close) + up;
            let low = (open.min(close) - down).max(0.5);
            (open, high, low, close, volume.round())
        },
    )
}

fn arb_minute_bars(max: usize) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(arb_bar_body(), 1..max).prop_map(|bodies| {
        bodies
            .into_iter()
            .enumerate()
            .map(|(i, (o, h, l, c, v))| Bar::new(start() + Duration::minutes(i as i64), o, h, l, c, v))
            .collect()
    })
}

fn arb_fill() -> impl Strategy<Value = (bool, f64, f64)> {
    (any::<bool>(), 1.0..50.0_f64, 10.0..200.0_f64)
        .prop_map(|(buy, q, p)| (buy, q.round(), (p * 100.0).round() / 100.0))
}

// ── 1. Reduction ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn reduce_follows_ohlcv_rules(bars in arb_minute_bars(40)) {
        let bar = reduce(&bars).unwrap();
        let first = bars.first().unwrap();
        let last = bars.last().unwrap();
        prop_assert_eq!(bar.open, first.open);
        prop_assert_eq!(bar.close, last.close);
        prop_assert_eq!(bar.timestamp, last.timestamp);
        prop_assert_eq!(bar.high, bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max));
        prop_assert_eq!(bar.low, bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min));
        let volume: f64 = bars.iter().map(|b| b.volume).sum();
        prop_assert!((bar.volume - volume).abs() < 1e-6);
        prop_assert!(bar.is_sane());
    }

    #[test]
    fn batch_keeps_partial_tail(bars in arb_minute_bars(60), factor in 1usize..10) {
        let (derived, complete) = aggregate_batch(&bars, factor).unwrap();
        prop_assert_eq!(derived.len(), bars.len().div_ceil(factor));
        prop_assert_eq!(complete, bars.len() % factor == 0);
        prop_assert_eq!(derived.last().unwrap().timestamp, bars.last().unwrap().timestamp);
    }
}

// ── 2. Incremental vs batch ──────────────────────────────────────────

proptest! {
    /// Windows starting at 14:31 line up with 5-minute boundaries, so after a
    /// whole number of windows both modes produce the same series.
    #[test]
    fn incremental_matches_batch_on_closed_windows(windows in 1usize..12, seed in arb_minute_bars(61)) {
        let n = (windows * 5).min(seed.len() / 5 * 5);
        prop_assume!(n > 0);
        let bars = &seed[..n];

        let mut aggregator = Aggregator::new(Interval::Min1, Interval::Min5).unwrap();
        let mut base = Series::new();
        let mut derived = Series::new();
        for bar in bars {
            base.push(*bar).unwrap();
            let update = aggregator.update(&base, bar.timestamp, default_daily_close()).unwrap();
            if update.replace_last {
                derived.replace_last(update.bar).unwrap();
            } else {
                derived.push(update.bar).unwrap();
            }
        }

        let (batch, complete) = aggregate_batch(bars, 5).unwrap();
        prop_assert!(complete);
        prop_assert!(aggregator.boundary_closed());
        prop_assert_eq!(derived, batch);
    }
}

// ── 3. Series ordering ───────────────────────────────────────────────

proptest! {
    #[test]
    fn out_of_order_push_is_rejected(bars in arb_minute_bars(30), back in 0i64..5) {
        let mut series = Series::from_bars(bars.clone()).unwrap();
        let last = *series.last().unwrap();
        let stale = Bar { timestamp: last.timestamp - Duration::minutes(back), ..last };
        prop_assert!(series.push(stale).is_err());
        prop_assert_eq!(series.len(), bars.len());
        prop_assert_eq!(series.last().copied(), Some(last));
    }
}

// ── 4. Equity identity ───────────────────────────────────────────────

proptest! {
    #[test]
    fn equity_identity_holds(fills in prop::collection::vec(arb_fill(), 1..30), mark in 10.0..200.0_f64) {
        let mut ledger = Ledger::new(Account::new(100_000.0, 2.0));
        let count = fills.len();
        for (i, (buy, quantity, price)) in fills.into_iter().enumerate() {
            let side = if buy { OrderSide::Buy } else { OrderSide::Sell };
            let fill = Fill {
                order_id: OrderId(i as u64 + 1),
                timestamp: start() + Duration::minutes(i as i64),
                symbol: "SPY".into(),
                asset_class: AssetClass::Stock,
                side,
                price,
                quantity,
                commission: 1.0,
            };
            let total = match side {
                OrderSide::Buy => fill.notional() + 1.0,
                OrderSide::Sell => fill.notional() - 1.0,
            };
            ledger.apply_fill(&fill, total, "SPY", None);
            ledger.mark_to_market([("SPY", mark)]);

            let account = *ledger.account();
            let held: f64 = ledger.positions().map(|p| p.quantity * mark).sum();
            prop_assert!((account.equity - (account.cash + held)).abs() < 1e-6);
            prop_assert!((account.buying_power - account.cash.max(0.0) * 2.0).abs() < 1e-6);
        }
        prop_assert!((ledger.commission_paid() - count as f64).abs() < 1e-9);
    }
}
