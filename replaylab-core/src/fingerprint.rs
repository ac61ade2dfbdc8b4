//! Run fingerprinting: deterministic identification of data and runs.
//!
//! - `dataset_hash`: BLAKE3 over every bar, in sorted symbol order.
//! - `run_id`: BLAKE3 over the replay configuration plus the dataset hash.
//!
//! Same configuration over the same bars gives the same run id on any machine.

use crate::domain::{DatasetHash, RunId};
use crate::engine::ReplayConfig;
use crate::store::Series;
use std::collections::BTreeMap;

/// Hash all bars. `BTreeMap` iteration fixes the symbol order.
pub fn dataset_hash(data: &BTreeMap<String, Series>) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for (symbol, series) in data {
        hasher.update(symbol.as_bytes());
        hasher.update(&(series.len() as u64).to_le_bytes());
        for bar in series.bars() {
            hasher.update(&bar.timestamp.timestamp().to_le_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}

pub fn run_id(config: &ReplayConfig, dataset: &DatasetHash) -> RunId {
    let mut hasher = blake3::Hasher::new();
    for symbol in &config.symbols {
        hasher.update(symbol.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(config.base_interval.as_str().as_bytes());
    for interval in &config.aggregations {
        hasher.update(b"+");
        hasher.update(interval.as_str().as_bytes());
    }
    hasher.update(config.daily_close.to_string().as_bytes());
    hasher.update(&(config.warmup_bars as u64).to_le_bytes());
    hasher.update(config.label.as_bytes());
    hasher.update(dataset.0.as_bytes());
    RunId(hasher.finalize().to_hex().to_string())
}
