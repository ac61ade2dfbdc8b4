//! Execution rules: fill prices and commission.
//!
//! Stateless: [`ExecutionEngine`] carries only the commission schedule. The
//! broker owns the order queue and ledger and asks the engine whether each
//! pending order fills against the current observation.

pub mod cost_model;
pub mod fill_price;

pub use cost_model::{apply_commission, CommissionSchedule, Fee, FeeError};
pub use fill_price::{compute_fill, fill_price, ComputedFill};

use crate::domain::{Bar, Order};

#[derive(Debug, Clone, Default)]
pub struct ExecutionEngine {
    schedule: CommissionSchedule,
}

impl ExecutionEngine {
    pub fn new(schedule: CommissionSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &CommissionSchedule {
        &self.schedule
    }

    /// Evaluate one pending order against a bar. `None` when it does not fill.
    pub fn evaluate(&self, order: &Order, bar: &Bar) -> Option<ComputedFill> {
        let price = fill_price(&order.order_type, order.side, bar)?;
        Some(compute_fill(price, order.side, order.quantity, &self.schedule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderId, OrderRequest, OrderSide};
    use chrono::{TimeZone, Utc};

    #[test]
    fn evaluates_full_quantity() {
        let engine = ExecutionEngine::new(CommissionSchedule::new(Fee::ZERO, Fee::Percent(2.0)));
        let order = Order::from_request(
            OrderId(0),
            OrderRequest::limit(OrderSide::Sell, "A", 2.0, 25.0),
            None,
        );
        let bar = Bar::new(Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap(), 24.0, 26.0, 23.0, 25.0, 1.0);
        let fill = engine.evaluate(&order, &bar).unwrap();
        assert_eq!(fill.price, 25.0);
        assert_eq!(fill.quantity, 2.0);
        assert!((fill.commission - 1.0).abs() < 1e-12);
        assert!((fill.total - 49.0).abs() < 1e-12);
    }
}
