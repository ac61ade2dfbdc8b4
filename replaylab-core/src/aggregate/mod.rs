//! Aggregator: derives coarser bars from a finer base interval.
//!
//! Reduction over a window of base bars: first open, max high, min low,
//! last close, summed volume, stamped with the last base bar's timestamp.
//!
//! Batch mode chunks a whole base series from its first bar. Incremental mode
//! reduces the trailing `factor` base bars after every tick and either appends
//! or replaces the in-progress derived bar depending on whether the previous
//! tick closed a derived-interval boundary.

use crate::domain::{Bar, Interval, IntervalError};
use crate::store::{Series, StoreError};
use chrono::{DateTime, NaiveTime, Utc};

/// Reduce a window of base bars to one bar. `None` for an empty window.
pub fn reduce(window: &[Bar]) -> Option<Bar> {
    let first = window.first()?;
    let last = window.last()?;
    let mut high = f64::NEG_INFINITY;
    let mut low = f64::INFINITY;
    let mut volume = 0.0;
    for bar in window {
        high = high.max(bar.high);
        low = low.min(bar.low);
        volume += bar.volume;
    }
    Some(Bar {
        timestamp: last.timestamp,
        open: first.open,
        high,
        low,
        close: last.close,
        volume,
    })
}

/// Group `base` into consecutive windows of `factor` bars from the start.
///
/// A non-empty trailing partial window is kept as the in-progress bar. Returns
/// the derived series and whether its last window was complete.
pub fn aggregate_batch(base: &[Bar], factor: usize) -> Result<(Series, bool), StoreError> {
    let factor = factor.max(1);
    let mut derived = Series::with_capacity(base.len() / factor + 1);
    let mut last_complete = true;
    for chunk in base.chunks(factor) {
        if let Some(bar) = reduce(chunk) {
            derived.push(bar)?;
        }
        last_complete = chunk.len() == factor;
    }
    Ok((derived, last_complete))
}

/// Result of one incremental update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateUpdate {
    pub bar: Bar,
    /// Overwrite the in-progress derived bar instead of appending.
    pub replace_last: bool,
}

/// Incremental aggregation state for one derived interval of one symbol.
#[derive(Debug, Clone)]
pub struct Aggregator {
    base: Interval,
    target: Interval,
    factor: usize,
    boundary_closed: bool,
    started: bool,
}

impl Aggregator {
    /// Fails unless `target` is strictly coarser than and a multiple of `base`.
    pub fn new(base: Interval, target: Interval) -> Result<Self, IntervalError> {
        let factor = target.factor_of(base)?;
        Ok(Self {
            base,
            target,
            factor,
            boundary_closed: false,
            started: false,
        })
    }

    pub fn base(&self) -> Interval {
        self.base
    }

    pub fn target(&self) -> Interval {
        self.target
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Batch-aggregate warm-up data and prime the incremental state from it.
    ///
    /// The boundary flag follows the same clock rule as [`Aggregator::update`],
    /// so the first replayed tick only appends when the last warm-up bar
    /// closed a derived interval.
    pub fn warm_up(&mut self, base: &Series, daily_close: NaiveTime) -> Result<Series, StoreError> {
        let (derived, _) = aggregate_batch(base.bars(), self.factor)?;
        self.started = !derived.is_empty();
        self.boundary_closed = base
            .last()
            .is_some_and(|bar| self.target.is_frequency(bar.timestamp, daily_close));
        Ok(derived)
    }

    /// Recompute the in-progress derived bar after a base bar was appended.
    ///
    /// `base` must already contain the tick's bar. Returns `None` while the
    /// base series is empty.
    pub fn update(
        &mut self,
        base: &Series,
        timestamp: DateTime<Utc>,
        daily_close: NaiveTime,
    ) -> Option<AggregateUpdate> {
        let bar = reduce(base.latest(self.factor))?;
        let replace_last = self.started && !self.boundary_closed;
        self.started = true;
        self.boundary_closed = self.target.is_frequency(timestamp, daily_close);
        Some(AggregateUpdate { bar, replace_last })
    }

    pub fn boundary_closed(&self) -> bool {
        self.boundary_closed
    }
}
