//! Sample Intake
//!
//! Many-producer, single-consumer queue carrying samples from every poller to
//! the aggregator. Pushing never blocks: the unbounded flavour always accepts,
//! the bounded flavour drops the newest sample when full.

use crate::sample::Sample;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    #[error("intake is full, sample dropped")]
    Full,
    #[error("intake is closed")]
    Closed,
}

#[derive(Debug, Clone)]
enum SenderKind {
    Unbounded(mpsc::UnboundedSender<Sample>),
    Bounded(mpsc::Sender<Sample>),
}

#[derive(Debug)]
enum ReceiverKind {
    Unbounded(mpsc::UnboundedReceiver<Sample>),
    Bounded(mpsc::Receiver<Sample>),
}

/// Producer half, cloned into every poller.
#[derive(Debug, Clone)]
pub struct IntakeSender {
    inner: SenderKind,
}

/// Consumer half, owned by the aggregator.
#[derive(Debug)]
pub struct IntakeReceiver {
    inner: ReceiverKind,
}

/// Create an intake. A `capacity` of 0 yields an unbounded queue.
pub fn channel(capacity: usize) -> (IntakeSender, IntakeReceiver) {
    if capacity == 0 {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            IntakeSender {
                inner: SenderKind::Unbounded(tx),
            },
            IntakeReceiver {
                inner: ReceiverKind::Unbounded(rx),
            },
        )
    } else {
        let (tx, rx) = mpsc::channel(capacity);
        (
            IntakeSender {
                inner: SenderKind::Bounded(tx),
            },
            IntakeReceiver {
                inner: ReceiverKind::Bounded(rx),
            },
        )
    }
}

impl IntakeSender {
    pub fn push(&self, sample: Sample) -> Result<(), PushError> {
        match &self.inner {
            SenderKind::Unbounded(tx) => tx.send(sample).map_err(|_| PushError::Closed),
            SenderKind::Bounded(tx) => tx.try_send(sample).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => PushError::Full,
                mpsc::error::TrySendError::Closed(_) => PushError::Closed,
            }),
        }
    }
}

impl IntakeReceiver {
    /// Wait for the next sample. Returns `None` once every sender is gone.
    ///
    /// Cancel safe, so it can sit in a `select!` next to the flush timer.
    pub async fn recv(&mut self) -> Option<Sample> {
        match &mut self.inner {
            ReceiverKind::Unbounded(rx) => rx.recv().await,
            ReceiverKind::Bounded(rx) => rx.recv().await,
        }
    }
}
