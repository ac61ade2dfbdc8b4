//! Data suppliers, alignment, and the persisted local store.

pub mod align;
pub mod circuit_breaker;
pub mod csv_source;
pub mod local;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use align::{align_series, check_interval, warn_intraday_gaps};
pub use circuit_breaker::CircuitBreaker;
pub use csv_source::CsvSupplier;
pub use local::{CacheEntry, LocalStore};
pub use provider::{validate_bars, DataError, DataSource, DataSupplier, SourceMode, TimeRange};
pub use synthetic::SyntheticSupplier;
pub use yahoo::YahooSupplier;
