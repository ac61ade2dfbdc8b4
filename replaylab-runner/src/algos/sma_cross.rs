//! Moving-average cross on a derived interval.
//!
//! Evaluated only on ticks that close a bar of the signal interval. A fast
//! average crossing above the slow one enters long with a limit at the last
//! close; crossing below exits the whole position the same way. An unfilled
//! order from the previous signal is cancelled first.

use replaylab_core::domain::{Bar, Interval, OrderId, OrderSide};
use replaylab_core::engine::{Algorithm, AlgorithmError, SetupContext, TickContext};
use std::collections::BTreeMap;
use tracing::debug;

use super::{positive, window};
use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cross {
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct SmaCross {
    fast: usize,
    slow: usize,
    quantity: f64,
    /// Period in seconds of the signal interval, if pinned by parameter.
    interval_secs: Option<i64>,
    interval: Option<Interval>,
    symbols: Vec<String>,
    working: BTreeMap<String, OrderId>,
}

impl SmaCross {
    pub fn new(fast: usize, slow: usize, quantity: f64) -> Self {
        Self {
            fast,
            slow,
            quantity,
            interval_secs: None,
            interval: None,
            symbols: Vec::new(),
            working: BTreeMap::new(),
        }
    }

    /// Parameters: `fast` (5), `slow` (20), `quantity` (1), optional
    /// `interval_secs` selecting the signal interval by period.
    pub fn from_params(params: &BTreeMap<String, f64>) -> Result<Self, ConfigError> {
        let fast = window(params, "fast", 5)?;
        let slow = window(params, "slow", 20)?;
        if fast >= slow {
            return Err(ConfigError::Invalid {
                field: "fast",
                reason: format!("fast window {fast} must be shorter than slow window {slow}"),
            });
        }
        let mut algo = Self::new(fast, slow, positive(params, "quantity", 1.0)?);
        algo.interval_secs = params.get("interval_secs").map(|v| *v as i64);
        Ok(algo)
    }

    /// Signal interval chosen at setup.
    pub fn interval(&self) -> Option<Interval> {
        self.interval
    }

    fn cross(&self, bars: &[Bar]) -> Option<Cross> {
        if bars.len() < self.slow + 1 {
            return None;
        }
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let n = closes.len();
        let fast_now = mean(&closes[n - self.fast..]);
        let slow_now = mean(&closes[n - self.slow..]);
        let fast_prev = mean(&closes[n - 1 - self.fast..n - 1]);
        let slow_prev = mean(&closes[n - 1 - self.slow..n - 1]);
        if fast_prev <= slow_prev && fast_now > slow_now {
            Some(Cross::Up)
        } else if fast_prev >= slow_prev && fast_now < slow_now {
            Some(Cross::Down)
        } else {
            None
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

impl Algorithm for SmaCross {
    fn name(&self) -> &str {
        "sma_cross"
    }

    fn setup(&mut self, ctx: &SetupContext) -> Result<(), AlgorithmError> {
        let interval = match self.interval_secs {
            Some(secs) => std::iter::once(ctx.base)
                .chain(ctx.aggregations.iter().copied())
                .find(|i| i.period_secs() == secs)
                .ok_or_else(|| {
                    AlgorithmError::Other(format!("no configured interval with a {secs}s period"))
                })?,
            None => ctx.aggregations.first().copied().unwrap_or(ctx.base),
        };
        self.interval = Some(interval);
        self.symbols = ctx.symbols.clone();
        Ok(())
    }

    fn main(&mut self, ctx: &mut TickContext<'_>) -> Result<(), AlgorithmError> {
        let interval = self.interval.unwrap_or(ctx.base_interval());
        if interval != ctx.base_interval() && !ctx.is_closing(interval) {
            return Ok(());
        }

        for symbol in &self.symbols {
            let bars = ctx.latest(symbol, interval, self.slow + 1)?;
            let Some(cross) = self.cross(bars) else {
                continue;
            };
            let Some(close) = bars.last().map(|b| b.close) else {
                continue;
            };

            if let Some(id) = self.working.remove(symbol) {
                if ctx.broker().fetch_order_status(id)?.is_pending() {
                    ctx.broker().cancel_order(id)?;
                }
            }

            let held: f64 = ctx
                .broker()
                .fetch_positions()
                .iter()
                .filter(|p| &p.symbol == symbol)
                .map(|p| p.quantity)
                .sum();

            let order = match cross {
                Cross::Up if held <= 0.0 => {
                    ctx.broker()
                        .order_limit(OrderSide::Buy, symbol, self.quantity - held, close)?
                }
                Cross::Down if held > 0.0 => {
                    ctx.broker().order_limit(OrderSide::Sell, symbol, held, close)?
                }
                _ => continue,
            };
            debug!(symbol = %symbol, ?cross, order_id = %order.id, limit = close, "signal");
            self.working.insert(symbol.clone(), order.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(closes: &[f64]) -> Vec<Bar> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(t0 + Duration::minutes(i as i64 * 5), c, c + 0.5, c - 0.5, c, 100.0))
            .collect()
    }

    #[test]
    fn detects_crosses() {
        let algo = SmaCross::new(2, 3, 1.0);
        assert_eq!(algo.cross(&bars(&[10.0, 10.0, 10.0, 12.0])), Some(Cross::Up));
        assert_eq!(algo.cross(&bars(&[10.0, 10.0, 10.0, 8.0])), Some(Cross::Down));
        assert_eq!(algo.cross(&bars(&[10.0, 11.0, 12.0, 13.0])), None);
        assert_eq!(algo.cross(&bars(&[10.0, 12.0])), None);
    }

    #[test]
    fn params_are_validated() {
        let mut params = BTreeMap::new();
        params.insert("fast".to_string(), 20.0);
        params.insert("slow".to_string(), 10.0);
        assert!(SmaCross::from_params(&params).is_err());
    }

    #[test]
    fn signal_interval_defaults_to_first_aggregation() {
        let mut algo = SmaCross::new(2, 3, 1.0);
        let ctx = SetupContext {
            symbols: vec!["SPY".into()],
            base: Interval::Min1,
            aggregations: vec![Interval::Min5, Interval::Hr1],
        };
        algo.setup(&ctx).unwrap();
        assert_eq!(algo.interval(), Some(Interval::Min5));

        let mut params = BTreeMap::new();
        params.insert("interval_secs".to_string(), 3600.0);
        let mut pinned = SmaCross::from_params(&params).unwrap();
        pinned.setup(&ctx).unwrap();
        assert_eq!(pinned.interval(), Some(Interval::Hr1));
    }
}
