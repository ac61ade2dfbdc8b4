//! Ledger: account and positions, mutated only by the broker.

use crate::domain::{Account, AssetClass, Fill, OptionContract, OrderSide, Position};
use std::collections::{BTreeMap, HashMap};

const QTY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct Ledger {
    account: Account,
    initial_equity: f64,
    /// Open positions keyed by position key (OCC symbol for options).
    positions: BTreeMap<String, Position>,
    /// Last close per underlying symbol.
    marks: HashMap<String, f64>,
    realized_pnl: f64,
    commission_paid: f64,
}

impl Ledger {
    pub fn new(account: Account) -> Self {
        Self::with_positions(account, Vec::new())
    }

    /// Start from an existing account and positions, marked at their average prices.
    pub fn with_positions(account: Account, positions: Vec<Position>) -> Self {
        let mut ledger = Self {
            account,
            initial_equity: account.cash,
            positions: BTreeMap::new(),
            marks: HashMap::new(),
            realized_pnl: 0.0,
            commission_paid: 0.0,
        };
        for pos in positions {
            if pos.quantity.abs() > QTY_EPSILON {
                ledger.positions.insert(pos.symbol.clone(), pos);
            }
        }
        ledger.recompute();
        ledger.initial_equity = ledger.account.equity;
        ledger
    }

    /// Apply a fill to cash and positions. Returns the P&L realized by it.
    ///
    /// `total` is the cash effect magnitude with commission already applied.
    pub fn apply_fill(
        &mut self,
        fill: &Fill,
        total: f64,
        underlying: &str,
        option: Option<OptionContract>,
    ) -> f64 {
        match fill.side {
            OrderSide::Buy => self.account.cash -= total,
            OrderSide::Sell => self.account.cash += total,
        }
        self.commission_paid += fill.commission;

        let delta = fill.side.sign() * fill.quantity;
        let realized = self.update_position(fill, delta, underlying, option);
        self.realized_pnl += realized;
        self.recompute();
        realized
    }

    fn update_position(
        &mut self,
        fill: &Fill,
        delta: f64,
        underlying: &str,
        option: Option<OptionContract>,
    ) -> f64 {
        let price = fill.price;
        let pos = self
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position {
                symbol: fill.symbol.clone(),
                underlying: underlying.to_string(),
                asset_class: fill.asset_class,
                quantity: 0.0,
                avg_price: price,
                option,
            });

        let old_qty = pos.quantity;
        let new_qty = old_qty + delta;
        let mut realized = 0.0;

        if old_qty.abs() <= QTY_EPSILON || old_qty.signum() == delta.signum() {
            // Opening or adding: weighted average entry.
            let total_qty = old_qty.abs() + delta.abs();
            pos.avg_price = (old_qty.abs() * pos.avg_price + delta.abs() * price) / total_qty;
        } else {
            let closed = old_qty.abs().min(delta.abs());
            realized = closed * (price - pos.avg_price) * old_qty.signum();
            if new_qty.abs() > QTY_EPSILON && new_qty.signum() != old_qty.signum() {
                // Crossed zero: the remainder opens at the fill price.
                pos.avg_price = price;
            }
        }
        pos.quantity = new_qty;

        if pos.quantity.abs() <= QTY_EPSILON {
            self.positions.remove(&fill.symbol);
        }
        realized
    }

    /// Record the latest close for each underlying and revalue the account.
    pub fn mark_to_market<'a>(&mut self, closes: impl IntoIterator<Item = (&'a str, f64)>) {
        for (symbol, close) in closes {
            self.marks.insert(symbol.to_string(), close);
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        let value = self.position_value();
        self.account.recompute(value);
    }

    /// Marked value of all positions. Unmarked positions use their average price.
    pub fn position_value(&self) -> f64 {
        self.positions
            .values()
            .map(|pos| pos.market_value(self.mark(pos)))
            .sum()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions
            .values()
            .map(|pos| pos.unrealized_pnl(self.mark(pos)))
            .sum()
    }

    fn mark(&self, pos: &Position) -> f64 {
        self.marks
            .get(&pos.underlying)
            .copied()
            .unwrap_or(pos.avg_price)
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn position(&self, key: &str) -> Option<&Position> {
        self.positions.get(key)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn positions_of(&self, asset_class: AssetClass) -> Vec<Position> {
        self.positions
            .values()
            .filter(|p| p.asset_class == asset_class)
            .cloned()
            .collect()
    }

    pub fn initial_equity(&self) -> f64 {
        self.initial_equity
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn commission_paid(&self) -> f64 {
        self.commission_paid
    }
}
