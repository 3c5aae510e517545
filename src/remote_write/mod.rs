pub mod proto;
pub mod sink;

pub use sink::RemoteWriteSink;

use crate::sample::Sample;
use async_trait::async_trait;
use thiserror::Error;

/// Outcome class of a failed transmission.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Transient (rate limited, server error, network); the next flush may succeed
    #[error("Recoverable sink error: {0}")]
    Recoverable(String),

    /// Anything else; continuing would only repeat the failure
    #[error("Fatal sink error: {0}")]
    Fatal(String),
}

impl SinkError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SinkError::Recoverable(_))
    }
}

/// Destination for flushed batches.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn send(&self, batch: &[Sample]) -> Result<(), SinkError>;
}
