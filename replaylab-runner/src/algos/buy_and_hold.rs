use replaylab_core::domain::OrderSide;
use replaylab_core::engine::{Algorithm, AlgorithmError, SetupContext, TickContext};
use std::collections::BTreeMap;
use tracing::info;

use super::positive;
use crate::config::ConfigError;

/// Market-buys `quantity` of every watched symbol on the first tick, then holds.
#[derive(Debug, Clone)]
pub struct BuyAndHold {
    quantity: f64,
    symbols: Vec<String>,
    entered: bool,
}

impl BuyAndHold {
    pub fn new(quantity: f64) -> Self {
        Self {
            quantity,
            symbols: Vec::new(),
            entered: false,
        }
    }

    pub fn from_params(params: &BTreeMap<String, f64>) -> Result<Self, ConfigError> {
        Ok(Self::new(positive(params, "quantity", 1.0)?))
    }
}

impl Algorithm for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn setup(&mut self, ctx: &SetupContext) -> Result<(), AlgorithmError> {
        self.symbols = ctx.symbols.clone();
        Ok(())
    }

    fn main(&mut self, ctx: &mut TickContext<'_>) -> Result<(), AlgorithmError> {
        if self.entered {
            return Ok(());
        }
        for symbol in &self.symbols {
            let order = ctx
                .broker()
                .order_market(OrderSide::Buy, symbol, self.quantity)?;
            info!(order_id = %order.id, symbol = %symbol, quantity = self.quantity, "entry submitted");
        }
        self.entered = true;
        Ok(())
    }
}
