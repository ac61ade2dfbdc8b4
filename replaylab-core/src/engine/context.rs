//! Per-run context: identity and the tracing span every log line of the run sits under.
//!
//! Created when a replay is constructed and dropped with it; nothing about a
//! run lives in process-wide state.

use crate::domain::{DatasetHash, RunId};
use tracing::{info_span, Span};

#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: RunId,
    dataset_hash: DatasetHash,
    span: Span,
}

impl RunContext {
    pub fn new(run_id: RunId, dataset_hash: DatasetHash) -> Self {
        let span = info_span!("replay", run_id = %run_id.short());
        Self {
            run_id,
            dataset_hash,
            span,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn dataset_hash(&self) -> &DatasetHash {
        &self.dataset_hash
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
