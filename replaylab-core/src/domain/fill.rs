use crate::domain::ids::OrderId;
use crate::domain::instrument::AssetClass;
use crate::domain::order::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fill record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub timestamp: DateTime<Utc>,
    /// Position key: OCC symbol for options, plain symbol otherwise.
    pub symbol: String,
    pub asset_class: AssetClass,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
    pub commission: f64,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}
