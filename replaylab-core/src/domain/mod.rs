//! Domain types for replaylab

pub mod account;
pub mod bar;
pub mod fill;
pub mod ids;
pub mod instrument;
pub mod interval;
pub mod order;
pub mod position;

pub use account::Account;
pub use bar::Bar;
pub use fill::Fill;
pub use ids::{DatasetHash, IdGen, OrderId, RunId};
pub use instrument::{
    is_crypto_symbol, AssetClass, OptionContract, OptionRight, UnknownAssetClass, CRYPTO_PREFIX,
};
pub use interval::{default_daily_close, Interval, IntervalError, TimeUnit};
pub use order::{
    CancelReason, Order, OrderRequest, OrderSide, OrderStatus, OrderType, TimeInForce,
};
pub use position::Position;

/// Symbol type alias
pub type Symbol = String;
