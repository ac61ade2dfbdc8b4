//! Replay and execution engine.
//!
//! The replay loop owns the bar store and the paper broker and drives both
//! one base tick at a time:
//!
//! 1. Observation: the tick's base bar per symbol
//! 2. Fills: pending orders evaluated against the observation
//! 3. Reveal: bars appended, derived intervals updated, positions marked
//! 4. Algorithm: invoked once with a read-only store and a broker handle

pub mod accounting;
pub mod algorithm;
pub mod broker;
pub mod context;
pub mod event_loop;
pub mod execution;
pub mod order_book;
pub mod state;

pub use accounting::Ledger;
pub use algorithm::{Algorithm, AlgorithmError, SetupContext, TickContext};
pub use broker::{
    validate_request, Broker, BrokerError, Observation, OrderValidationError, PaperBroker,
};
pub use context::RunContext;
pub use event_loop::{ReplayEngine, ReplayError};
pub use execution::{apply_commission, CommissionSchedule, ExecutionEngine, Fee, FeeError};
pub use order_book::{OrderBook, OrderBookError};
pub use state::{ConfigError, EquityPoint, ReplayConfig, ReplayResult};
