//! Performance metrics: pure functions over a replay result.
//!
//! Every metric is a pure function: equity curve and/or order list in, scalar out.

use replaylab_core::domain::{CancelReason, Order, OrderStatus};
use replaylab_core::engine::ReplayResult;
use serde::{Deserialize, Serialize};

/// Summary statistics for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    /// Mean per-tick return divided by its standard deviation. Not annualized.
    pub tick_sharpe: f64,
    pub order_count: usize,
    pub fill_count: usize,
    pub cancelled_count: usize,
    pub rejected_for_buying_power: usize,
    pub realized_pnl: f64,
    pub commission_paid: f64,
}

impl PerformanceMetrics {
    pub fn compute(result: &ReplayResult) -> Self {
        let equity: Vec<f64> = result.equity_curve.iter().map(|p| p.equity).collect();
        let final_equity = result.final_account.equity;
        Self {
            initial_equity: result.initial_equity,
            final_equity,
            total_return: total_return(result.initial_equity, final_equity),
            max_drawdown: max_drawdown(&equity),
            tick_sharpe: tick_sharpe(&equity),
            order_count: result.orders.len(),
            fill_count: result.fills.len(),
            cancelled_count: cancelled(&result.orders, None),
            rejected_for_buying_power: cancelled(
                &result.orders,
                Some(CancelReason::InsufficientBuyingPower),
            ),
            realized_pnl: result.realized_pnl,
            commission_paid: result.commission_paid,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(initial: f64, final_equity: f64) -> f64 {
    if initial <= 0.0 {
        return 0.0;
    }
    (final_equity - initial) / initial
}

/// Maximum peak-to-trough drawdown as a non-positive fraction.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Simple returns between consecutive equity points.
pub fn tick_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

pub fn tick_sharpe(equity_curve: &[f64]) -> f64 {
    let returns = tick_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    let sd = var.sqrt();
    if sd < 1e-15 {
        0.0
    } else {
        mean / sd
    }
}

/// Count cancelled orders, optionally restricted to one reason.
fn cancelled(orders: &[Order], reason: Option<CancelReason>) -> usize {
    orders
        .iter()
        .filter(|o| match o.status {
            OrderStatus::Cancelled { reason: r } => reason.map_or(true, |want| want == r),
            _ => false,
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_return_known() {
        assert!((total_return(100_000.0, 110_000.0) - 0.1).abs() < 1e-12);
        assert!((total_return(100_000.0, 90_000.0) + 0.1).abs() < 1e-12);
        assert_eq!(total_return(0.0, 10.0), 0.0);
    }

    #[test]
    fn max_drawdown_known() {
        let eq = vec![100_000.0, 110_000.0, 90_000.0, 95_000.0];
        let expected = (90_000.0 - 110_000.0) / 110_000.0;
        assert!((max_drawdown(&eq) - expected).abs() < 1e-10);
    }

    #[test]
    fn max_drawdown_monotonic_and_empty() {
        let eq: Vec<f64> = (0..100).map(|i| 100_000.0 + i as f64 * 100.0).collect();
        assert_eq!(max_drawdown(&eq), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn tick_returns_basic() {
        let r = tick_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.1).abs() < 1e-12);
        assert!((r[1] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn sharpe_of_constant_equity_is_zero() {
        assert_eq!(tick_sharpe(&[100.0; 50]), 0.0);
        assert_eq!(tick_sharpe(&[100.0]), 0.0);
    }

    proptest::proptest! {
        #[test]
        fn drawdown_is_bounded(curve in proptest::collection::vec(1.0..1e6_f64, 0..200)) {
            let dd = max_drawdown(&curve);
            proptest::prop_assert!((-1.0..=0.0).contains(&dd));
            proptest::prop_assert_eq!(tick_returns(&curve).len(), curve.len().saturating_sub(1));
        }
    }

    #[test]
    fn sharpe_sign_follows_drift() {
        let mut eq = vec![100.0];
        for i in 1..100 {
            let r = if i % 2 == 0 { 1.002 } else { 0.9995 };
            eq.push(eq[i - 1] * r);
        }
        assert!(tick_sharpe(&eq) > 0.0);
    }
}
