use serde::{Deserialize, Serialize};

/// Account snapshot owned by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub equity: f64,
    pub cash: f64,
    pub buying_power: f64,
    /// Margin multiplier applied to cash when computing buying power.
    pub multiplier: f64,
}

impl Account {
    pub fn new(cash: f64, multiplier: f64) -> Self {
        Self {
            equity: cash,
            cash,
            buying_power: cash.max(0.0) * multiplier,
            multiplier,
        }
    }

    /// Recompute equity and buying power from cash and the marked position value.
    pub fn recompute(&mut self, position_value: f64) {
        self.equity = self.cash + position_value;
        self.buying_power = self.cash.max(0.0) * self.multiplier;
    }
}
