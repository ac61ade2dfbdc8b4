//! ReplayLab Core: bar store, interval aggregation, replay loop, simulated execution.
//!
//! This crate contains the deterministic heart of a backtest:
//! - Domain types (intervals, bars, orders, fills, positions, account)
//! - Arena-style bar store keyed by `(symbol, interval)`
//! - Batch and incremental aggregation to coarser intervals
//! - Replay loop with fill-before-observe sequencing
//! - Paper broker with order book, fill rules, commission, and ledger
//! - Data suppliers (CSV, Parquet local store, Yahoo, synthetic)

pub mod aggregate;
pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod store;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: snapshot and engine types can cross threads.
    ///
    /// The runner replays independent runs on a rayon pool, so everything a
    /// run owns must be `Send`.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Order>();
        require_sync::<domain::Order>();
        require_send::<domain::Fill>();
        require_sync::<domain::Fill>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::Account>();
        require_sync::<domain::Account>();
        require_send::<domain::RunId>();
        require_sync::<domain::RunId>();

        require_send::<store::BarStore>();
        require_sync::<store::BarStore>();
        require_send::<aggregate::Aggregator>();
        require_send::<engine::PaperBroker>();
        require_sync::<engine::PaperBroker>();
        require_send::<engine::ReplayEngine>();
        require_send::<engine::ReplayResult>();
        require_sync::<engine::ReplayResult>();
        require_send::<data::LocalStore>();
        require_sync::<data::CircuitBreaker>();
    }

    /// Compile-time check: the tick context only hands out a shared store.
    #[allow(dead_code)]
    fn tick_context_store_is_read_only<'a>(ctx: &engine::TickContext<'a>) -> &'a store::BarStore {
        ctx.store()
    }
}
