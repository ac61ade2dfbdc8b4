//! Order book: order storage and lifecycle.
//!
//! Orders transition Pending → Filled or Pending → Cancelled. Terminal orders
//! stay in the book so status queries keep working after the fact. The book
//! does not decide fills; the broker does.

use crate::domain::{CancelReason, Order, OrderId, OrderStatus};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderBookError {
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {0} is not pending (status: {1:?})")]
    NotPending(OrderId, OrderStatus),
}

#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    /// Every order ever submitted, keyed (and therefore ordered) by id.
    orders: BTreeMap<OrderId, Order>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Submit a new order. It must be pending.
    pub fn submit(&mut self, order: Order) {
        debug_assert!(order.is_pending(), "submitted order must be Pending");
        self.orders.insert(order.id, order);
    }

    /// Ids of pending orders in ascending id order.
    pub fn pending_ids(&self) -> Vec<OrderId> {
        self.orders
            .values()
            .filter(|o| o.is_pending())
            .map(|o| o.id)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.orders.values().filter(|o| o.is_pending()).count()
    }

    pub fn record_fill(&mut self, id: OrderId, price: f64) -> Result<&Order, OrderBookError> {
        let order = self.pending_mut(id)?;
        order.filled_qty = order.quantity;
        order.fill_price = Some(price);
        order.status = OrderStatus::Filled;
        Ok(order)
    }

    pub fn cancel(&mut self, id: OrderId, reason: CancelReason) -> Result<&Order, OrderBookError> {
        let order = self.pending_mut(id)?;
        order.status = OrderStatus::Cancelled { reason };
        Ok(order)
    }

    /// All orders in id order.
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn pending_mut(&mut self, id: OrderId) -> Result<&mut Order, OrderBookError> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or(OrderBookError::OrderNotFound(id))?;
        if !order.is_pending() {
            return Err(OrderBookError::NotPending(id, order.status));
        }
        Ok(order)
    }
}
