//! Multi-symbol time alignment.
//!
//! Replay needs every watched symbol on the same timeline: all series are
//! trimmed to the common overlapping range, then their timestamps must match
//! exactly. Nothing is forward-filled.

use super::provider::DataError;
use crate::domain::Interval;
use crate::store::Series;
use std::collections::BTreeMap;
use tracing::warn;

/// Trim every series to the common range and verify identical timestamps.
pub fn align_series(
    data: BTreeMap<String, Series>,
) -> Result<BTreeMap<String, Series>, DataError> {
    let start = data.values().filter_map(|s| s.first()).map(|b| b.timestamp).max();
    let end = data.values().filter_map(|s| s.last()).map(|b| b.timestamp).min();
    let (Some(start), Some(end)) = (start, end) else {
        return Err(DataError::NoOverlap);
    };
    if start > end || data.values().any(|s| s.is_empty()) {
        return Err(DataError::NoOverlap);
    }

    let trimmed: BTreeMap<String, Series> = data
        .into_iter()
        .map(|(symbol, series)| {
            let sliced = series.slice_range(start, end);
            (symbol, sliced)
        })
        .collect();

    let mut iter = trimmed.iter();
    if let Some((ref_symbol, reference)) = iter.next() {
        for (symbol, series) in iter {
            if let Some(at) = first_mismatch(reference, series) {
                return Err(DataError::Gap {
                    symbol: symbol.clone(),
                    at,
                    detail: format!(
                        "timestamps differ from {ref_symbol} ({} vs {} bars in common range)",
                        series.len(),
                        reference.len()
                    ),
                });
            }
        }
    }
    Ok(trimmed)
}

fn first_mismatch(a: &Series, b: &Series) -> Option<chrono::DateTime<chrono::Utc>> {
    let mut ta = a.timestamps();
    let mut tb = b.timestamps();
    loop {
        match (ta.next(), tb.next()) {
            (None, None) => return None,
            (Some(x), Some(y)) if x == y => continue,
            (Some(x), Some(y)) => return Some(x.min(y)),
            (Some(x), None) | (None, Some(x)) => return Some(x),
        }
    }
}

/// Every step between bars must be a whole number of periods.
pub fn check_interval(symbol: &str, series: &Series, interval: Interval) -> Result<(), DataError> {
    let period = interval.period_secs();
    for pair in series.bars().windows(2) {
        let step = (pair[1].timestamp - pair[0].timestamp).num_seconds();
        if step % period != 0 {
            return Err(DataError::IntervalMismatch {
                symbol: symbol.to_string(),
                expected: interval,
                step_secs: step,
                at: pair[1].timestamp,
            });
        }
    }
    Ok(())
}

/// Log jumps larger than one period that stay within the same UTC day.
///
/// Returns how many were found.
pub fn warn_intraday_gaps(symbol: &str, series: &Series, interval: Interval) -> usize {
    if interval == Interval::Day1 {
        return 0;
    }
    let period = interval.period_secs();
    let mut gaps = 0;
    for pair in series.bars().windows(2) {
        let (prev, next) = (pair[0].timestamp, pair[1].timestamp);
        let step = (next - prev).num_seconds();
        if step > period && prev.date_naive() == next.date_naive() {
            gaps += 1;
            warn!(
                symbol,
                %interval,
                from = %prev,
                to = %next,
                missing = step / period - 1,
                "intraday gap in base series"
            );
        }
    }
    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::{Duration, TimeZone, Utc};

    fn series(minutes: &[i64]) -> Series {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        Series::from_bars(
            minutes
                .iter()
                .map(|m| Bar::new(t0 + Duration::minutes(*m), 1.0, 1.0, 1.0, 1.0, 1.0))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn trims_to_common_range() {
        let mut data = BTreeMap::new();
        data.insert("A".to_string(), series(&[0, 1, 2, 3, 4, 5]));
        data.insert("B".to_string(), series(&[2, 3, 4, 5, 6, 7]));
        let aligned = align_series(data).unwrap();
        assert_eq!(aligned["A"].len(), 4);
        assert_eq!(aligned["B"].len(), 4);
        assert_eq!(aligned["A"].first(), aligned["B"].first());
    }

    #[test]
    fn mismatched_timestamps_are_a_gap() {
        let mut data = BTreeMap::new();
        data.insert("A".to_string(), series(&[0, 1, 2, 3]));
        data.insert("B".to_string(), series(&[0, 2, 3]));
        assert!(matches!(align_series(data), Err(DataError::Gap { .. })));
    }

    #[test]
    fn disjoint_ranges_have_no_overlap() {
        let mut data = BTreeMap::new();
        data.insert("A".to_string(), series(&[0, 1]));
        data.insert("B".to_string(), series(&[5, 6]));
        assert!(matches!(align_series(data), Err(DataError::NoOverlap)));
        assert!(matches!(align_series(BTreeMap::new()), Err(DataError::NoOverlap)));
    }

    #[test]
    fn interval_check_and_gap_warning() {
        let s = series(&[0, 5, 10, 20]);
        assert!(check_interval("A", &s, Interval::Min5).is_ok());
        assert!(check_interval("A", &s, Interval::Min15).is_err());
        assert_eq!(warn_intraday_gaps("A", &s, Interval::Min5), 1);
    }
}
