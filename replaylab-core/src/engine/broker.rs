//! Broker capability and the simulated paper broker.
//!
//! Algorithms see a `&mut dyn Broker`: they can submit, cancel, and query, but
//! only the replay engine drives fills (`evaluate_pending`) and marks
//! (`mark_to_market`) on the concrete [`PaperBroker`].

use super::accounting::Ledger;
use super::execution::{CommissionSchedule, ExecutionEngine};
use super::order_book::{OrderBook, OrderBookError};
use crate::domain::{
    is_crypto_symbol, Account, AssetClass, Bar, CancelReason, Fill, IdGen, OptionContract, Order,
    OrderId, OrderRequest, OrderSide, OrderStatus, Position, TimeInForce, UnknownAssetClass,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Current bar per watched symbol at the base interval.
pub type Observation = BTreeMap<String, Bar>;

/// Reasons an order request is rejected at submission. Rejected orders are never enqueued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderValidationError {
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(f64),

    #[error("limit price must be positive, got {0}")]
    InvalidLimitPrice(f64),

    #[error(transparent)]
    UnknownAssetClass(#[from] UnknownAssetClass),

    #[error("option order on {0} is missing its contract")]
    MissingOptionContract(String),

    #[error("{asset_class} order on {symbol} must not carry an option contract")]
    UnexpectedOptionContract {
        symbol: String,
        asset_class: AssetClass,
    },

    #[error("{asset_class} order does not match symbol {symbol}")]
    CryptoSymbolMismatch {
        symbol: String,
        asset_class: AssetClass,
    },

    #[error("symbol {0} is not on the watch list")]
    UnknownSymbol(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrokerError {
    #[error("order rejected: {0}")]
    Validation(#[from] OrderValidationError),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {id} cannot be cancelled (status: {status:?})")]
    NotCancellable { id: OrderId, status: OrderStatus },
}

impl From<OrderBookError> for BrokerError {
    fn from(err: OrderBookError) -> Self {
        match err {
            OrderBookError::OrderNotFound(id) => BrokerError::OrderNotFound(id),
            OrderBookError::NotPending(id, status) => BrokerError::NotCancellable { id, status },
        }
    }
}

/// Capability set shared by broker adapters.
pub trait Broker {
    fn name(&self) -> &str;

    /// Called once before replay with the watch list.
    fn setup(&mut self, symbols: &[String]);

    fn submit_order(&mut self, request: OrderRequest) -> Result<Order, BrokerError>;

    fn cancel_order(&mut self, id: OrderId) -> Result<Order, BrokerError>;

    fn fetch_order_status(&self, id: OrderId) -> Result<Order, BrokerError>;

    fn fetch_positions(&self) -> Vec<Position>;

    fn fetch_account(&self) -> Account;

    fn order_limit(
        &mut self,
        side: OrderSide,
        symbol: &str,
        quantity: f64,
        limit_price: f64,
    ) -> Result<Order, BrokerError> {
        self.submit_order(tag_crypto(OrderRequest::limit(side, symbol, quantity, limit_price)))
    }

    /// Limit order with the asset class given by name (`stock`, `option`, `crypto`).
    fn order_limit_as(
        &mut self,
        side: OrderSide,
        symbol: &str,
        quantity: f64,
        limit_price: f64,
        asset_class: &str,
        option: Option<OptionContract>,
    ) -> Result<Order, BrokerError> {
        let asset_class: AssetClass = asset_class
            .parse()
            .map_err(|e: UnknownAssetClass| BrokerError::Validation(e.into()))?;
        let mut request =
            OrderRequest::limit(side, symbol, quantity, limit_price).asset_class(asset_class);
        request.option = option;
        self.submit_order(request)
    }

    fn order_market(
        &mut self,
        side: OrderSide,
        symbol: &str,
        quantity: f64,
    ) -> Result<Order, BrokerError> {
        self.submit_order(tag_crypto(OrderRequest::market(side, symbol, quantity)))
    }

    fn order_option_limit(
        &mut self,
        side: OrderSide,
        underlying: &str,
        contract: OptionContract,
        quantity: f64,
        limit_price: f64,
    ) -> Result<Order, BrokerError> {
        self.submit_order(
            OrderRequest::limit(side, underlying, quantity, limit_price).option(contract),
        )
    }

    /// Market buy.
    fn buy(&mut self, symbol: &str, quantity: f64) -> Result<Order, BrokerError> {
        self.order_market(OrderSide::Buy, symbol, quantity)
    }

    /// Market sell.
    fn sell(&mut self, symbol: &str, quantity: f64) -> Result<Order, BrokerError> {
        self.order_market(OrderSide::Sell, symbol, quantity)
    }

    fn fetch_stock_order_status(&self, id: OrderId) -> Result<Order, BrokerError> {
        fetch_of_class(self, id, AssetClass::Stock)
    }

    fn fetch_option_order_status(&self, id: OrderId) -> Result<Order, BrokerError> {
        fetch_of_class(self, id, AssetClass::Option)
    }

    fn fetch_crypto_order_status(&self, id: OrderId) -> Result<Order, BrokerError> {
        fetch_of_class(self, id, AssetClass::Crypto)
    }

    fn fetch_stock_positions(&self) -> Vec<Position> {
        positions_of_class(self, AssetClass::Stock)
    }

    fn fetch_option_positions(&self) -> Vec<Position> {
        positions_of_class(self, AssetClass::Option)
    }

    fn fetch_crypto_positions(&self) -> Vec<Position> {
        positions_of_class(self, AssetClass::Crypto)
    }
}

/// `@`-prefixed symbols trade as crypto.
fn tag_crypto(request: OrderRequest) -> OrderRequest {
    if is_crypto_symbol(&request.symbol) {
        request.asset_class(AssetClass::Crypto)
    } else {
        request
    }
}

fn fetch_of_class<B: Broker + ?Sized>(
    broker: &B,
    id: OrderId,
    asset_class: AssetClass,
) -> Result<Order, BrokerError> {
    let order = broker.fetch_order_status(id)?;
    if order.asset_class != asset_class {
        return Err(BrokerError::OrderNotFound(id));
    }
    Ok(order)
}

fn positions_of_class<B: Broker + ?Sized>(broker: &B, asset_class: AssetClass) -> Vec<Position> {
    broker
        .fetch_positions()
        .into_iter()
        .filter(|p| p.asset_class == asset_class)
        .collect()
}

/// Check a request before it is enqueued.
pub fn validate_request(
    request: &OrderRequest,
    watch: &BTreeSet<String>,
) -> Result<(), OrderValidationError> {
    if !(request.quantity.is_finite() && request.quantity > 0.0) {
        return Err(OrderValidationError::NonPositiveQuantity(request.quantity));
    }
    if let Some(limit) = request.order_type.limit_price() {
        if !(limit.is_finite() && limit > 0.0) {
            return Err(OrderValidationError::InvalidLimitPrice(limit));
        }
    }
    match (request.asset_class, request.option.is_some()) {
        (AssetClass::Option, false) => {
            return Err(OrderValidationError::MissingOptionContract(
                request.symbol.clone(),
            ))
        }
        (AssetClass::Stock | AssetClass::Crypto, true) => {
            return Err(OrderValidationError::UnexpectedOptionContract {
                symbol: request.symbol.clone(),
                asset_class: request.asset_class,
            })
        }
        _ => {}
    }
    let crypto_symbol = is_crypto_symbol(&request.symbol);
    if crypto_symbol != (request.asset_class == AssetClass::Crypto) {
        return Err(OrderValidationError::CryptoSymbolMismatch {
            symbol: request.symbol.clone(),
            asset_class: request.asset_class,
        });
    }
    if !watch.is_empty() && !watch.contains(&request.symbol) {
        return Err(OrderValidationError::UnknownSymbol(request.symbol.clone()));
    }
    Ok(())
}

/// Simulated broker: order queue, execution rules, and the ledger.
#[derive(Debug, Clone)]
pub struct PaperBroker {
    execution: ExecutionEngine,
    book: OrderBook,
    ids: IdGen,
    ledger: Ledger,
    fills: Vec<Fill>,
    watch: BTreeSet<String>,
    /// Timestamp of the latest observation seen.
    clock: Option<DateTime<Utc>>,
}

impl PaperBroker {
    pub fn new(account: Account, schedule: CommissionSchedule) -> Self {
        Self::with_ledger(Ledger::new(account), schedule)
    }

    pub fn with_ledger(ledger: Ledger, schedule: CommissionSchedule) -> Self {
        Self {
            execution: ExecutionEngine::new(schedule),
            book: OrderBook::new(),
            ids: IdGen::new(),
            ledger,
            fills: Vec::new(),
            watch: BTreeSet::new(),
            clock: None,
        }
    }

    /// Evaluate every pending order, in ascending id, against the observation.
    ///
    /// Orders whose symbol is absent from the observation stay pending.
    /// Returns the fills produced on this pass.
    pub fn evaluate_pending(&mut self, observation: &Observation) -> Vec<Fill> {
        let mut produced = Vec::new();
        for id in self.book.pending_ids() {
            let Some(order) = self.book.get(id) else {
                continue;
            };
            let Some(bar) = observation.get(&order.symbol) else {
                debug!(order_id = %id, symbol = %order.symbol, "no bar for pending order");
                continue;
            };

            if is_expired(order, bar.timestamp) {
                info!(order_id = %id, symbol = %order.symbol, "order expired");
                self.cancel_internal(id, CancelReason::Expired);
                continue;
            }

            let Some(computed) = self.execution.evaluate(order, bar) else {
                continue;
            };

            if order.side == OrderSide::Buy && computed.total > self.ledger.account().buying_power {
                warn!(
                    order_id = %id,
                    symbol = %order.symbol,
                    cost = computed.total,
                    buying_power = self.ledger.account().buying_power,
                    "insufficient buying power, cancelling order"
                );
                self.cancel_internal(id, CancelReason::InsufficientBuyingPower);
                continue;
            }

            let fill = Fill {
                order_id: id,
                timestamp: bar.timestamp,
                symbol: order.position_key(),
                asset_class: order.asset_class,
                side: order.side,
                price: computed.price,
                quantity: computed.quantity,
                commission: computed.commission,
            };
            let underlying = order.symbol.clone();
            let option = order.option;

            if let Err(err) = self.book.record_fill(id, computed.price) {
                warn!(order_id = %id, error = %err, "fill on non-pending order skipped");
                continue;
            }
            let realized = self
                .ledger
                .apply_fill(&fill, computed.total, &underlying, option);
            debug!(
                order_id = %id,
                symbol = %fill.symbol,
                side = %fill.side,
                price = fill.price,
                quantity = fill.quantity,
                commission = fill.commission,
                realized,
                "order filled"
            );
            produced.push(fill);
        }

        if let Some(latest) = observation.values().map(|b| b.timestamp).max() {
            self.clock = Some(latest);
        }
        self.fills.extend(produced.iter().cloned());
        produced
    }

    /// Revalue positions at the observation's closes.
    pub fn mark_to_market(&mut self, observation: &Observation) {
        self.ledger
            .mark_to_market(observation.iter().map(|(s, b)| (s.as_str(), b.close)));
    }

    fn cancel_internal(&mut self, id: OrderId, reason: CancelReason) {
        if let Err(err) = self.book.cancel(id, reason) {
            warn!(order_id = %id, error = %err, "cancel failed");
        }
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn orders(&self) -> Vec<Order> {
        self.book.orders().cloned().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.book.pending_count()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn watch_list(&self) -> &BTreeSet<String> {
        &self.watch
    }
}

fn is_expired(order: &Order, at: DateTime<Utc>) -> bool {
    let today = at.date_naive();
    let day_expired = order.time_in_force == TimeInForce::Day
        && order
            .submitted_at
            .is_some_and(|submitted| submitted.date_naive() < today);
    let contract_expired = order
        .option
        .as_ref()
        .is_some_and(|contract| contract.is_expired(today));
    day_expired || contract_expired
}

impl Broker for PaperBroker {
    fn name(&self) -> &str {
        "paper"
    }

    fn setup(&mut self, symbols: &[String]) {
        self.watch = symbols.iter().cloned().collect();
    }

    fn submit_order(&mut self, request: OrderRequest) -> Result<Order, BrokerError> {
        validate_request(&request, &self.watch)?;
        let order = Order::from_request(self.ids.next_id(), request, self.clock);
        debug!(
            order_id = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            quantity = order.quantity,
            "order submitted"
        );
        self.book.submit(order.clone());
        Ok(order)
    }

    fn cancel_order(&mut self, id: OrderId) -> Result<Order, BrokerError> {
        let order = self.book.cancel(id, CancelReason::User)?;
        Ok(order.clone())
    }

    fn fetch_order_status(&self, id: OrderId) -> Result<Order, BrokerError> {
        self.book
            .get(id)
            .cloned()
            .ok_or(BrokerError::OrderNotFound(id))
    }

    fn fetch_positions(&self) -> Vec<Position> {
        self.ledger.positions().cloned().collect()
    }

    fn fetch_account(&self) -> Account {
        *self.ledger.account()
    }
}
