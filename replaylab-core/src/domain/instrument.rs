//! Asset classes, option contracts, and symbol conventions.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix that marks a crypto symbol (e.g. `@BTCUSD`).
pub const CRYPTO_PREFIX: char = '@';

/// What kind of instrument an order or position refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Stock,
    Option,
    Crypto,
}

impl AssetClass {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetClass::Stock => "stock",
            AssetClass::Option => "option",
            AssetClass::Crypto => "crypto",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an asset class string outside `stock | option | crypto`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown asset class '{0}'")]
pub struct UnknownAssetClass(pub String);

impl FromStr for AssetClass {
    type Err = UnknownAssetClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" | "equity" => Ok(AssetClass::Stock),
            "option" => Ok(AssetClass::Option),
            "crypto" => Ok(AssetClass::Crypto),
            _ => Err(UnknownAssetClass(s.to_string())),
        }
    }
}

/// True for symbols following the crypto naming convention.
pub fn is_crypto_symbol(symbol: &str) -> bool {
    symbol.starts_with(CRYPTO_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    fn code(self) -> char {
        match self {
            OptionRight::Call => 'C',
            OptionRight::Put => 'P',
        }
    }
}

/// Listed option contract on an underlying symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub strike: f64,
    pub expiration: NaiveDate,
    pub right: OptionRight,
}

impl OptionContract {
    pub fn new(strike: f64, expiration: NaiveDate, right: OptionRight) -> Self {
        Self {
            strike,
            expiration,
            right,
        }
    }

    /// OCC-style contract symbol: `SPY240315C00500000`.
    ///
    /// Strike is encoded in thousandths, zero-padded to eight digits.
    pub fn occ_symbol(&self, underlying: &str) -> String {
        let strike_milli = (self.strike * 1000.0).round() as u64;
        format!(
            "{}{:02}{:02}{:02}{}{:08}",
            underlying,
            self.expiration.year() % 100,
            self.expiration.month(),
            self.expiration.day(),
            self.right.code(),
            strike_milli
        )
    }

    pub fn is_expired(&self, on: NaiveDate) -> bool {
        self.expiration < on
    }
}
