//! Fill price rules: whether an order fills against a bar and at what price.
//!
//! - Market: fills at the bar's open.
//! - Limit buy: fills iff `low <= limit`, at `min(limit, open)`.
//! - Limit sell: fills iff `high >= limit`, at `max(limit, open)`.
//!
//! All-or-nothing: there are no partial fills.

use crate::domain::{Bar, OrderSide, OrderType};

use super::cost_model::{apply_commission, CommissionSchedule};

/// Raw fill price for an order against the observed bar, if it fills.
pub fn fill_price(order_type: &OrderType, side: OrderSide, bar: &Bar) -> Option<f64> {
    match (order_type, side) {
        (OrderType::Market, _) => Some(bar.open),
        (OrderType::Limit { limit_price }, OrderSide::Buy) => {
            (bar.low <= *limit_price).then(|| limit_price.min(bar.open))
        }
        (OrderType::Limit { limit_price }, OrderSide::Sell) => {
            (bar.high >= *limit_price).then(|| limit_price.max(bar.open))
        }
    }
}

/// The fully computed fill with costs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedFill {
    pub price: f64,
    pub quantity: f64,
    /// Dollar amount of commission.
    pub commission: f64,
    /// Cash paid (buys) or received (sells), commission included.
    pub total: f64,
}

pub fn compute_fill(
    price: f64,
    side: OrderSide,
    quantity: f64,
    schedule: &CommissionSchedule,
) -> ComputedFill {
    let notional = price * quantity;
    ComputedFill {
        price,
        quantity,
        commission: schedule.commission(notional, side),
        total: apply_commission(notional, schedule, side),
    }
}
