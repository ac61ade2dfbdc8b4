//! Sampling intervals and the boundary check that drives derived-bar cadence.

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing or relating intervals.
///
/// All of these are configuration errors: they surface before any data is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    #[error("unsupported interval '{0}' (expected one of 15SEC, 1MIN, 5MIN, 15MIN, 30MIN, 1HR, 1DAY)")]
    Unsupported(String),

    #[error("derived interval {derived} must be coarser than base interval {base}")]
    NotCoarser { base: Interval, derived: Interval },

    #[error("derived interval {derived} is not an integer multiple of base interval {base}")]
    NotMultiple { base: Interval, derived: Interval },
}

/// Unit part of an interval's `(unit, multiplier)` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Sec,
    Min,
    Hr,
    Day,
}

impl TimeUnit {
    fn seconds(self) -> i64 {
        match self {
            TimeUnit::Sec => 1,
            TimeUnit::Min => 60,
            TimeUnit::Hr => 3_600,
            TimeUnit::Day => 86_400,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Sec => "SEC",
            TimeUnit::Min => "MIN",
            TimeUnit::Hr => "HR",
            TimeUnit::Day => "DAY",
        }
    }
}

/// Supported sampling granularities, ordered finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    Sec15,
    Min1,
    Min5,
    Min15,
    Min30,
    Hr1,
    Day1,
}

impl Interval {
    pub const ALL: [Interval; 7] = [
        Interval::Sec15,
        Interval::Min1,
        Interval::Min5,
        Interval::Min15,
        Interval::Min30,
        Interval::Hr1,
        Interval::Day1,
    ];

    pub fn unit(self) -> TimeUnit {
        match self {
            Interval::Sec15 => TimeUnit::Sec,
            Interval::Min1 | Interval::Min5 | Interval::Min15 | Interval::Min30 => TimeUnit::Min,
            Interval::Hr1 => TimeUnit::Hr,
            Interval::Day1 => TimeUnit::Day,
        }
    }

    pub fn multiplier(self) -> u32 {
        match self {
            Interval::Sec15 => 15,
            Interval::Min1 => 1,
            Interval::Min5 => 5,
            Interval::Min15 => 15,
            Interval::Min30 => 30,
            Interval::Hr1 => 1,
            Interval::Day1 => 1,
        }
    }

    /// Length of one interval in seconds.
    pub fn period_secs(self) -> i64 {
        self.unit().seconds() * i64::from(self.multiplier())
    }

    pub fn duration(self) -> chrono::Duration {
        chrono::Duration::seconds(self.period_secs())
    }

    /// How many `base` bars make up one bar of `self`.
    ///
    /// Fails unless `self` is strictly coarser than `base` and an exact multiple of it.
    pub fn factor_of(self, base: Interval) -> Result<usize, IntervalError> {
        let (derived_secs, base_secs) = (self.period_secs(), base.period_secs());
        if derived_secs <= base_secs {
            return Err(IntervalError::NotCoarser {
                base,
                derived: self,
            });
        }
        if derived_secs % base_secs != 0 {
            return Err(IntervalError::NotMultiple {
                base,
                derived: self,
            });
        }
        Ok((derived_secs / base_secs) as usize)
    }

    /// True when `timestamp` closes a bar of this interval.
    ///
    /// `1DAY` closes at the configured `daily_close` time of day (UTC); every other
    /// interval closes when the timestamp sits on an exact multiple of its period.
    pub fn is_frequency(self, timestamp: DateTime<Utc>, daily_close: NaiveTime) -> bool {
        let second = timestamp.second();
        let minute = timestamp.minute();
        match self {
            Interval::Sec15 => second % 15 == 0,
            Interval::Min1 | Interval::Min5 | Interval::Min15 | Interval::Min30 => {
                second == 0 && minute % self.multiplier() == 0
            }
            Interval::Hr1 => second == 0 && minute == 0,
            Interval::Day1 => {
                timestamp.hour() == daily_close.hour()
                    && minute == daily_close.minute()
                    && second == daily_close.second()
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Sec15 => "15SEC",
            Interval::Min1 => "1MIN",
            Interval::Min5 => "5MIN",
            Interval::Min15 => "15MIN",
            Interval::Min30 => "30MIN",
            Interval::Hr1 => "1HR",
            Interval::Day1 => "1DAY",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.multiplier(), self.unit().suffix())
    }
}

impl FromStr for Interval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Interval::ALL
            .into_iter()
            .find(|interval| interval.as_str() == normalized)
            .ok_or_else(|| IntervalError::Unsupported(s.to_string()))
    }
}

impl TryFrom<String> for Interval {
    type Error = IntervalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(interval: Interval) -> Self {
        interval.as_str().to_string()
    }
}

/// Default daily close used by the `1DAY` boundary check (16:00 New York during daylight time).
pub fn default_daily_close() -> NaiveTime {
    NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, s).unwrap()
    }

    #[test]
    fn parses_every_supported_string() {
        for interval in Interval::ALL {
            assert_eq!(interval.as_str().parse::<Interval>().unwrap(), interval);
            assert_eq!(interval.to_string(), interval.as_str());
        }
        assert_eq!("5min".parse::<Interval>().unwrap(), Interval::Min5);
    }

    #[test]
    fn rejects_unknown_strings() {
        let err = "2HR".parse::<Interval>().unwrap_err();
        assert_eq!(err, IntervalError::Unsupported("2HR".into()));
        assert!("".parse::<Interval>().is_err());
    }

    #[test]
    fn factor_requires_coarser_multiple() {
        assert_eq!(Interval::Min15.factor_of(Interval::Min5), Ok(3));
        assert_eq!(Interval::Hr1.factor_of(Interval::Min1), Ok(60));
        assert_eq!(Interval::Day1.factor_of(Interval::Min30), Ok(48));
        assert_eq!(Interval::Min1.factor_of(Interval::Sec15), Ok(4));
        assert!(matches!(
            Interval::Min5.factor_of(Interval::Min5),
            Err(IntervalError::NotCoarser { .. })
        ));
        assert!(matches!(
            Interval::Min5.factor_of(Interval::Min15),
            Err(IntervalError::NotCoarser { .. })
        ));
    }

    #[test]
    fn frequency_on_minute_multiples() {
        let close = default_daily_close();
        assert!(Interval::Min30.is_frequency(at(14, 30, 0), close));
        assert!(Interval::Min30.is_frequency(at(14, 0, 0), close));
        assert!(!Interval::Min30.is_frequency(at(14, 15, 0), close));
        assert!(Interval::Min15.is_frequency(at(14, 45, 0), close));
        assert!(Interval::Min1.is_frequency(at(14, 46, 0), close));
        assert!(!Interval::Min1.is_frequency(at(14, 46, 30), close));
    }

    #[test]
    fn frequency_on_hour_and_day() {
        let close = default_daily_close();
        assert!(Interval::Hr1.is_frequency(at(15, 0, 0), close));
        assert!(!Interval::Hr1.is_frequency(at(15, 5, 0), close));
        assert!(Interval::Day1.is_frequency(at(20, 0, 0), close));
        assert!(!Interval::Day1.is_frequency(at(19, 0, 0), close));

        let custom = NaiveTime::from_hms_opt(19, 50, 0).unwrap();
        assert!(Interval::Day1.is_frequency(at(19, 50, 0), custom));
    }

    #[test]
    fn serde_uses_interval_strings() {
        let json = serde_json::to_string(&Interval::Hr1).unwrap();
        assert_eq!(json, "\"1HR\"");
        let parsed: Interval = serde_json::from_str("\"30MIN\"").unwrap();
        assert_eq!(parsed, Interval::Min30);
        assert!(serde_json::from_str::<Interval>("\"7MIN\"").is_err());
    }
}
