//! Paper broker integration tests through the public `Broker` surface.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use replaylab_core::domain::{
    Account, AssetClass, Bar, CancelReason, OptionContract, OptionRight, OrderId, OrderSide,
    OrderStatus,
};
use replaylab_core::engine::{
    apply_commission, Broker, BrokerError, CommissionSchedule, Fee, Observation,
    OrderValidationError, PaperBroker,
};

fn bar(minute: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap() + Duration::minutes(minute);
    Bar::new(ts, open, high, low, close, 1_000.0)
}

fn observe(symbol: &str, bar: Bar) -> Observation {
    let mut obs = Observation::new();
    obs.insert(symbol.to_string(), bar);
    obs
}

fn broker() -> PaperBroker {
    let mut broker = PaperBroker::new(Account::new(10_000.0, 1.0), CommissionSchedule::free());
    broker.setup(&["A".to_string(), "@BTC".to_string()]);
    broker
}

#[test]
fn limit_sell_waits_for_high_to_reach_limit() {
    let mut broker = broker();
    let order = broker.order_limit(OrderSide::Sell, "A", 2.0, 3.0).unwrap();

    let fills = broker.evaluate_pending(&observe("A", bar(0, 2.5, 2.9, 2.4, 2.8)));
    assert!(fills.is_empty());
    assert_eq!(
        broker.fetch_order_status(order.id).unwrap().status,
        OrderStatus::Pending
    );

    let fills = broker.evaluate_pending(&observe("A", bar(1, 2.8, 3.5, 2.7, 3.4)));
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].price, 3.0);

    let filled = broker.fetch_order_status(order.id).unwrap();
    assert_eq!(filled.status, OrderStatus::Filled);
    assert_eq!(filled.filled_qty, 2.0);
}

#[test]
fn limit_sell_gapping_up_fills_at_open() {
    let mut broker = broker();
    broker.order_limit(OrderSide::Sell, "A", 2.0, 3.0).unwrap();
    let fills = broker.evaluate_pending(&observe("A", bar(0, 3.2, 3.5, 3.1, 3.3)));
    assert_eq!(fills[0].price, 3.2);
}

#[test]
fn percent_sell_commission_reduces_proceeds() {
    let schedule: CommissionSchedule = serde_json::from_str(r#"{"sell": "2%"}"#).unwrap();
    assert_eq!(schedule.sell, Fee::Percent(2.0));
    assert_eq!(schedule.buy, Fee::ZERO);
    assert!((apply_commission(50.0, &schedule, OrderSide::Sell) - 49.0).abs() < 1e-12);
    assert_eq!(apply_commission(50.0, &schedule, OrderSide::Buy), 50.0);
}

#[test]
fn sell_fill_credits_net_proceeds() {
    let mut broker = PaperBroker::new(
        Account::new(10_000.0, 1.0),
        CommissionSchedule::new(Fee::ZERO, Fee::Percent(2.0)),
    );
    broker.order_market(OrderSide::Sell, "A", 2.0).unwrap();
    broker.evaluate_pending(&observe("A", bar(0, 25.0, 26.0, 24.0, 25.0)));
    assert!((broker.fetch_account().cash - 10_049.0).abs() < 1e-9);
    assert_eq!(broker.fetch_positions()[0].quantity, -2.0);
}

#[test]
fn unknown_order_is_not_found() {
    let broker = broker();
    assert_eq!(
        broker.fetch_order_status(OrderId(99)).unwrap_err(),
        BrokerError::OrderNotFound(OrderId(99))
    );
}

#[test]
fn cancelling_a_filled_order_fails() {
    let mut broker = broker();
    let order = broker.buy("A", 1.0).unwrap();
    broker.evaluate_pending(&observe("A", bar(0, 10.0, 11.0, 9.0, 10.0)));
    assert!(matches!(
        broker.cancel_order(order.id),
        Err(BrokerError::NotCancellable { .. })
    ));

    let pending = broker.buy("A", 1.0).unwrap();
    let cancelled = broker.cancel_order(pending.id).unwrap();
    assert_eq!(
        cancelled.status,
        OrderStatus::Cancelled {
            reason: CancelReason::User
        }
    );
}

#[test]
fn rejected_orders_are_never_enqueued() {
    let mut broker = broker();
    let err = broker.buy("A", 0.0).unwrap_err();
    assert_eq!(
        err,
        BrokerError::Validation(OrderValidationError::NonPositiveQuantity(0.0))
    );
    let err = broker
        .order_limit_as(OrderSide::Buy, "A", 1.0, 10.0, "futures", None)
        .unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Validation(OrderValidationError::UnknownAssetClass(_))
    ));
    assert!(broker.orders().is_empty());
}

#[test]
fn ids_are_monotonic() {
    let mut broker = broker();
    let a = broker.buy("A", 1.0).unwrap();
    let b = broker.sell("A", 1.0).unwrap();
    let c = broker.buy("@BTC", 0.5).unwrap();
    assert!(a.id < b.id && b.id < c.id);
    assert_eq!(c.asset_class, AssetClass::Crypto);
}

#[test]
fn crypto_limit_order_is_accepted_and_fills() {
    let mut broker = broker();
    let order = broker
        .order_limit(OrderSide::Buy, "@BTC", 0.5, 4_000.0)
        .unwrap();
    assert_eq!(order.asset_class, AssetClass::Crypto);

    let fills = broker.evaluate_pending(&observe("@BTC", bar(0, 4_100.0, 4_150.0, 3_950.0, 4_000.0)));
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].price, 4_000.0);
    assert_eq!(fills[0].asset_class, AssetClass::Crypto);

    let positions = broker.fetch_crypto_positions();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].quantity, 0.5);
    assert_eq!(
        broker.fetch_crypto_order_status(order.id).unwrap().status,
        OrderStatus::Filled
    );
}

#[test]
fn option_position_is_keyed_by_contract() {
    let mut broker = broker();
    let contract = OptionContract::new(
        10.0,
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        OptionRight::Put,
    );
    let order = broker
        .order_option_limit(OrderSide::Buy, "A", contract, 1.0, 2.0)
        .unwrap();
    broker.evaluate_pending(&observe("A", bar(0, 1.8, 2.2, 1.7, 2.0)));

    assert_eq!(
        broker.fetch_option_order_status(order.id).unwrap().status,
        OrderStatus::Filled
    );
    assert!(broker.fetch_stock_order_status(order.id).is_err());
    let positions = broker.fetch_option_positions();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].symbol, "A240315P00010000");
    assert!(broker.fetch_stock_positions().is_empty());
}
