use super::instrument::{AssetClass, OptionContract};
use serde::{Deserialize, Serialize};

/// Open position. Quantity is signed: positive long, negative short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Position key: OCC symbol for options, plain symbol otherwise.
    pub symbol: String,
    /// Symbol whose bars price this position.
    pub underlying: String,
    pub asset_class: AssetClass,
    pub quantity: f64,
    pub avg_price: f64,
    pub option: Option<OptionContract>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }

    pub fn market_value(&self, mark: f64) -> f64 {
        self.quantity * mark
    }

    pub fn unrealized_pnl(&self, mark: f64) -> f64 {
        self.quantity * (mark - self.avg_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_valuation() {
        let mut pos = Position {
            symbol: "A".into(),
            underlying: "A".into(),
            asset_class: AssetClass::Stock,
            quantity: 10.0,
            avg_price: 20.0,
            option: None,
        };
        assert!(pos.is_long());
        assert_eq!(pos.market_value(25.0), 250.0);
        assert_eq!(pos.unrealized_pnl(25.0), 50.0);

        pos.quantity = -10.0;
        assert!(pos.is_short());
        assert_eq!(pos.unrealized_pnl(25.0), -50.0);
    }
}
