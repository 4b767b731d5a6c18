use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures that abort a pipeline run. A run that fails produces no output
/// rows; missing thresholds and unmatched join samples are handled inline and
/// never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("metric source query failed: {0}")]
    Source(anyhow::Error),

    #[error("metric source query timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("pipeline run cancelled before completion")]
    Cancelled,

    #[error("sample at {observed} precedes previously observed {previous}; input must be time-ordered")]
    OutOfOrder {
        previous: DateTime<Utc>,
        observed: DateTime<Utc>,
    },

    #[error("invalid state set: {0}")]
    InvalidStateSet(String),

    #[error("invalid time window: start {start} is not before stop {stop}")]
    InvalidWindow {
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    },
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Source(err)
    }
}
