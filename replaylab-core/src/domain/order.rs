//! Orders, order requests, and the order lifecycle states.

use super::ids::OrderId;
use super::instrument::{AssetClass, OptionContract};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("buy"),
            OrderSide::Sell => f.write_str("sell"),
        }
    }
}

/// What kind of order and its price parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OrderType {
    /// Fill at the open of the next observed bar.
    Market,
    /// Fill at the limit price or better, if the bar's range reaches it.
    Limit { limit_price: f64 },
}

impl OrderType {
    pub fn limit_price(&self) -> Option<f64> {
        match self {
            OrderType::Market => None,
            OrderType::Limit { limit_price } => Some(*limit_price),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    /// Good until filled or cancelled.
    #[default]
    Gtc,
    /// Cancelled once an observation falls on a later UTC date than submission.
    Day,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    User,
    Expired,
    InsufficientBuyingPower,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::User => f.write_str("user"),
            CancelReason::Expired => f.write_str("expired"),
            CancelReason::InsufficientBuyingPower => f.write_str("insufficient_buying_power"),
        }
    }
}

/// Order lifecycle states. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled { reason: CancelReason },
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// What the algorithm asks for. The broker validates it and turns it into an [`Order`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Tradable symbol; the underlying for option orders.
    pub symbol: String,
    pub asset_class: AssetClass,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub option: Option<OptionContract>,
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    pub fn market(side: OrderSide, symbol: impl Into<String>, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            asset_class: AssetClass::Stock,
            side,
            order_type: OrderType::Market,
            quantity,
            option: None,
            time_in_force: TimeInForce::Gtc,
        }
    }

    pub fn limit(
        side: OrderSide,
        symbol: impl Into<String>,
        quantity: f64,
        limit_price: f64,
    ) -> Self {
        Self {
            order_type: OrderType::Limit { limit_price },
            ..Self::market(side, symbol, quantity)
        }
    }

    pub fn asset_class(mut self, asset_class: AssetClass) -> Self {
        self.asset_class = asset_class;
        self
    }

    /// Attach an option contract; also switches the asset class to option.
    pub fn option(mut self, contract: OptionContract) -> Self {
        self.asset_class = AssetClass::Option;
        self.option = Some(contract);
        self
    }

    pub fn time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }
}

/// A single order held by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub asset_class: AssetClass,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub option: Option<OptionContract>,
    pub status: OrderStatus,
    pub filled_qty: f64,
    pub fill_price: Option<f64>,
    pub time_in_force: TimeInForce,
    /// Timestamp of the latest observation when the order was submitted, if any.
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn from_request(
        id: OrderId,
        request: OrderRequest,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            symbol: request.symbol,
            asset_class: request.asset_class,
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            option: request.option,
            status: OrderStatus::Pending,
            filled_qty: 0.0,
            fill_price: None,
            time_in_force: request.time_in_force,
            submitted_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// Key of the position this order trades: the OCC symbol for options,
    /// the plain symbol otherwise.
    pub fn position_key(&self) -> String {
        match &self.option {
            Some(contract) => contract.occ_symbol(&self.symbol),
            None => self.symbol.clone(),
        }
    }
}
