//! Commission schedule: per-side flat fee or percentage of notional.
//!
//! Buyers pay `notional + fee`, sellers receive `notional - fee`.

use crate::domain::OrderSide;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeeError {
    #[error("invalid fee '{0}' (expected a flat amount like \"5.76\" or a percentage like \"2%\")")]
    Invalid(String),

    #[error("fee must be finite and non-negative, got {0}")]
    Negative(f64),
}

/// One side's commission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FeeRepr", into = "FeeRepr")]
pub enum Fee {
    /// Fixed dollar amount per fill.
    Flat(f64),
    /// Percentage of notional, e.g. `2.0` for 2%.
    Percent(f64),
}

impl Fee {
    pub const ZERO: Fee = Fee::Flat(0.0);

    /// Fee charged on a fill with the given notional.
    pub fn amount(&self, notional: f64) -> f64 {
        match self {
            Fee::Flat(amount) => *amount,
            Fee::Percent(pct) => notional.abs() * pct / 100.0,
        }
    }

    fn checked(self) -> Result<Self, FeeError> {
        let value = match self {
            Fee::Flat(v) | Fee::Percent(v) => v,
        };
        if !value.is_finite() || value < 0.0 {
            return Err(FeeError::Negative(value));
        }
        Ok(self)
    }
}

impl Default for Fee {
    fn default() -> Self {
        Fee::ZERO
    }
}

impl fmt::Display for Fee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fee::Flat(amount) => write!(f, "{amount}"),
            Fee::Percent(pct) => write!(f, "{pct}%"),
        }
    }
}

impl FromStr for Fee {
    type Err = FeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || FeeError::Invalid(s.to_string());
        let fee = if let Some(pct) = trimmed.strip_suffix('%') {
            Fee::Percent(pct.trim().parse::<f64>().map_err(|_| invalid())?)
        } else {
            let amount = trimmed.strip_prefix('$').unwrap_or(trimmed);
            Fee::Flat(amount.trim().parse::<f64>().map_err(|_| invalid())?)
        };
        fee.checked()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum FeeRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<FeeRepr> for Fee {
    type Error = FeeError;

    fn try_from(repr: FeeRepr) -> Result<Self, Self::Error> {
        match repr {
            FeeRepr::Number(amount) => Fee::Flat(amount).checked(),
            FeeRepr::Text(text) => text.parse(),
        }
    }
}

impl From<Fee> for FeeRepr {
    fn from(fee: Fee) -> Self {
        match fee {
            Fee::Flat(amount) => FeeRepr::Number(amount),
            Fee::Percent(_) => FeeRepr::Text(fee.to_string()),
        }
    }
}

/// Maps each order side to its fee.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionSchedule {
    pub buy: Fee,
    pub sell: Fee,
}

impl CommissionSchedule {
    pub fn new(buy: Fee, sell: Fee) -> Self {
        Self { buy, sell }
    }

    pub fn free() -> Self {
        Self::default()
    }

    pub fn fee_for(&self, side: OrderSide) -> Fee {
        match side {
            OrderSide::Buy => self.buy,
            OrderSide::Sell => self.sell,
        }
    }

    pub fn commission(&self, notional: f64, side: OrderSide) -> f64 {
        self.fee_for(side).amount(notional)
    }
}

/// Total cash effect magnitude of a fill: `cost + fee` for buys, `cost - fee` for sells.
pub fn apply_commission(cost: f64, schedule: &CommissionSchedule, side: OrderSide) -> f64 {
    let fee = schedule.commission(cost, side);
    match side {
        OrderSide::Buy => cost + fee,
        OrderSide::Sell => cost - fee,
    }
}
