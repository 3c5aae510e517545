//! Batch Aggregator / Flusher
//!
//! Single consumer of the intake. Samples are appended to the current batch as they
//! arrive; on its own timer the aggregator transmits the whole batch through the
//! sink and starts a new one. Poll cadence and publish cadence are independent, so
//! the number of outbound writes does not grow with the number of devices.
//!
//! # Flush Outcomes
//!
//! | Sink result   | Batch                                              | Aggregator               |
//! |---------------|----------------------------------------------------|--------------------------|
//! | empty batch   | untouched, nothing sent                            | continues                |
//! | `Ok`          | cleared                                            | continues                |
//! | `Recoverable` | cleared (`drop`) or kept for next flush (`retain`) | continues                |
//! | `Fatal`       | cleared                                            | triggers shutdown, exits |
//!
//! With the default `drop` policy delivery is at-most-once: a batch rejected with a
//! recoverable error is logged and lost. `retain` keeps it at the head of the next
//! batch instead; a sample is still only ever transmitted successfully once.
//!
//! On shutdown the aggregator exits without a final flush. Samples accumulated
//! since the last flush are discarded.

use crate::config::{RecoverablePolicy, RemoteWriteConfig};
use crate::intake::IntakeReceiver;
use crate::metrics::{flush_outcome, MetricsCollector};
use crate::remote_write::{MetricsSink, SinkError};
use crate::sample::Sample;
use crate::shutdown::Shutdown;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Flush timer and error policy
#[derive(Debug, Clone, Copy)]
pub struct FlushSettings {
    pub interval: Duration,
    /// Delay added before the first tick, keeps the first flush off the poll ticks
    pub offset: Duration,
    pub on_recoverable_error: RecoverablePolicy,
}

impl From<&RemoteWriteConfig> for FlushSettings {
    fn from(config: &RemoteWriteConfig) -> Self {
        Self {
            interval: config.flush_interval(),
            offset: config.flush_offset(),
            on_recoverable_error: config.on_recoverable_error,
        }
    }
}

/// What a flush attempt did with the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing accumulated, nothing sent
    Empty,
    /// Batch of this many samples accepted by the sink
    Sent(usize),
    /// Recoverable failure, batch discarded
    Dropped(usize),
    /// Recoverable failure, batch kept for the next flush
    Retained(usize),
}

enum Event {
    Stop,
    Flush,
    Sample(Sample),
}

pub struct Aggregator {
    sink: Arc<dyn MetricsSink>,
    intake: IntakeReceiver,
    settings: FlushSettings,
    metrics: MetricsCollector,
    batch: Vec<Sample>,
}

impl Aggregator {
    pub fn new(
        sink: Arc<dyn MetricsSink>,
        intake: IntakeReceiver,
        settings: FlushSettings,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            sink,
            intake,
            settings,
            metrics,
            batch: Vec::new(),
        }
    }

    /// Samples accumulated since the last flush, in arrival order.
    pub fn pending(&self) -> &[Sample] {
        &self.batch
    }

    pub fn push(&mut self, sample: Sample) {
        self.batch.push(sample);
    }

    /// Drain the intake and flush on schedule until shutdown.
    ///
    /// A fatal sink error triggers shutdown for every other task and ends the loop.
    pub async fn run(mut self, shutdown: Shutdown) {
        info!("Starting aggregator");

        let period = self.settings.interval;
        let mut ticker = interval_at(Instant::now() + self.settings.offset + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Priority: shutdown, then flush tick, then queued samples.
            let event = tokio::select! {
                biased;
                _ = shutdown.stopped() => Event::Stop,
                _ = ticker.tick() => Event::Flush,
                Some(sample) = self.intake.recv() => Event::Sample(sample),
            };

            match event {
                Event::Stop => break,
                Event::Sample(sample) => {
                    debug!("Received sample from {}", sample.device.address);
                    self.push(sample);
                }
                Event::Flush => {
                    if let Err(e) = self.flush().await {
                        error!("Error pushing samples, shutting down: {}", e);
                        shutdown.fatal(e.to_string());
                        break;
                    }
                }
            }
        }

        if !self.batch.is_empty() {
            warn!(
                "Discarding {} samples accumulated since the last flush",
                self.batch.len()
            );
        }
        info!("Stopping aggregator");
    }

    /// Transmit the current batch.
    ///
    /// Returns `Err` only for a fatal sink error; the batch is cleared in that case too.
    pub async fn flush(&mut self) -> Result<FlushOutcome, SinkError> {
        if self.batch.is_empty() {
            debug!("Nothing to flush");
            return Ok(FlushOutcome::Empty);
        }

        let count = self.batch.len();
        self.metrics.batch_size.set(count as i64);
        debug!("Performing batched remote write for {} samples", count);

        match self.sink.send(&self.batch).await {
            Ok(()) => {
                info!("Pushed {} samples", count);
                self.batch.clear();
                self.metrics.record_flush(flush_outcome::SUCCESS);
                self.metrics.samples_sent_total.inc_by(count as u64);
                Ok(FlushOutcome::Sent(count))
            }
            Err(SinkError::Recoverable(reason)) => match self.settings.on_recoverable_error {
                RecoverablePolicy::Drop => {
                    warn!(
                        "Recoverable error pushing {} samples, batch dropped: {}",
                        count, reason
                    );
                    self.batch.clear();
                    self.metrics.record_flush(flush_outcome::DROPPED);
                    Ok(FlushOutcome::Dropped(count))
                }
                RecoverablePolicy::Retain => {
                    warn!(
                        "Recoverable error pushing {} samples, retrying with next flush: {}",
                        count, reason
                    );
                    self.metrics.record_flush(flush_outcome::RETAINED);
                    Ok(FlushOutcome::Retained(count))
                }
            },
            Err(fatal) => {
                self.batch.clear();
                self.metrics.record_flush(flush_outcome::FATAL);
                Err(fatal)
            }
        }
    }
}
