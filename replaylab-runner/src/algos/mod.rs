//! Built-in sample algorithms, selected by name from the run config.

mod buy_and_hold;
mod sma_cross;

pub use buy_and_hold::BuyAndHold;
pub use sma_cross::SmaCross;

use replaylab_core::engine::Algorithm;
use std::collections::BTreeMap;

use crate::config::ConfigError;

pub const ALGORITHMS: &[&str] = &["buy_and_hold", "sma_cross"];

pub fn is_known(name: &str) -> bool {
    ALGORITHMS.contains(&name)
}

/// Build an algorithm from its name and numeric parameters.
pub fn build_algorithm(
    name: &str,
    params: &BTreeMap<String, f64>,
) -> Result<Box<dyn Algorithm + Send>, ConfigError> {
    match name {
        "buy_and_hold" => Ok(Box::new(BuyAndHold::from_params(params)?)),
        "sma_cross" => Ok(Box::new(SmaCross::from_params(params)?)),
        other => Err(ConfigError::UnknownAlgorithm {
            name: other.to_string(),
            known: ALGORITHMS.join(", "),
        }),
    }
}

/// Positive numeric parameter with a default.
fn positive(
    params: &BTreeMap<String, f64>,
    key: &'static str,
    default: f64,
) -> Result<f64, ConfigError> {
    let value = params.get(key).copied().unwrap_or(default);
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::Invalid {
            field: key,
            reason: format!("must be positive, got {value}"),
        });
    }
    Ok(value)
}

/// Positive whole-number parameter (window lengths).
fn window(
    params: &BTreeMap<String, f64>,
    key: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    let value = positive(params, key, default as f64)?;
    if value.fract() != 0.0 {
        return Err(ConfigError::Invalid {
            field: key,
            reason: format!("must be a whole number, got {value}"),
        });
    }
    Ok(value as usize)
}
