//! Series: ordered bars for one `(symbol, interval)` pair.

use super::StoreError;
use crate::domain::Bar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bars with strictly increasing, unique timestamps.
///
/// The only mutations are [`Series::push`] and [`Series::replace_last`], and
/// both keep the ordering invariant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    bars: Vec<Bar>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bars: Vec::with_capacity(capacity),
        }
    }

    /// Build a series, rejecting any non-increasing timestamp.
    pub fn from_bars(bars: Vec<Bar>) -> Result<Self, StoreError> {
        if let Some(pair) = bars
            .windows(2)
            .find(|pair| pair[1].timestamp <= pair[0].timestamp)
        {
            return Err(StoreError::NonIncreasingTimestamp {
                previous: pair[0].timestamp,
                next: pair[1].timestamp,
            });
        }
        Ok(Self { bars })
    }

    pub fn push(&mut self, bar: Bar) -> Result<(), StoreError> {
        if let Some(last) = self.bars.last() {
            if bar.timestamp <= last.timestamp {
                return Err(StoreError::NonIncreasingTimestamp {
                    previous: last.timestamp,
                    next: bar.timestamp,
                });
            }
        }
        self.bars.push(bar);
        Ok(())
    }

    /// Overwrite the last bar. On an empty series this is a plain push.
    pub fn replace_last(&mut self, bar: Bar) -> Result<(), StoreError> {
        let len = self.bars.len();
        if len == 0 {
            self.bars.push(bar);
            return Ok(());
        }
        if len >= 2 {
            let previous = self.bars[len - 2].timestamp;
            if bar.timestamp <= previous {
                return Err(StoreError::NonIncreasingTimestamp {
                    previous,
                    next: bar.timestamp,
                });
            }
        }
        self.bars[len - 1] = bar;
        Ok(())
    }

    /// Last `n` bars (fewer if the series is shorter), oldest first.
    pub fn latest(&self, n: usize) -> &[Bar] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.bars.iter().map(|b| b.timestamp)
    }

    /// Bars with `start <= timestamp <= end`.
    pub fn slice_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Series {
        let lo = self.bars.partition_point(|b| b.timestamp < start);
        let hi = self.bars.partition_point(|b| b.timestamp <= end);
        Series {
            bars: self.bars[lo..hi.max(lo)].to_vec(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.bars.clear();
    }
}
