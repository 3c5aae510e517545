//! Device Poller
//!
//! One poller per configured device. On every tick it queries the device once and
//! pushes at most one `current_power` sample into the intake.
//!
//! # Error Handling
//!
//! Failures are soft: an unreachable device, a non-zero device error code or a
//! full intake is logged as a warning and the tick is skipped. The next attempt
//! is the next scheduled tick; there is no retry in between.
//!
//! # Ordering
//!
//! Each tick awaits its poll before the next tick is taken, so polls of one
//! device never overlap and its samples enter the intake in production order.
//! Shutdown is only observed between polls; an in-flight request is never
//! interrupted.

use crate::intake::{IntakeSender, PushError};
use crate::metrics::{poll_outcome, MetricsCollector};
use crate::sample::Sample;
use crate::shutdown::Shutdown;
use crate::tapo::PowerSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Result of a single poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// A sample was pushed into the intake
    Emitted,
    /// The device could not be read (already logged as warning)
    Failed,
    /// The device was read but the sample was not accepted by the intake
    Dropped,
}

pub struct Poller {
    source: Arc<dyn PowerSource>,
    interval: Duration,
    intake: IntakeSender,
    metrics: MetricsCollector,
}

impl Poller {
    pub fn new(
        source: Arc<dyn PowerSource>,
        interval: Duration,
        intake: IntakeSender,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            source,
            interval,
            intake,
            metrics,
        }
    }

    /// Poll on a fixed cadence until shutdown is observed.
    ///
    /// The first poll happens one full interval after start.
    pub async fn run(self, shutdown: Shutdown) {
        let address = self.source.device().address.clone();
        info!("Starting poller for {}", address);

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.stopped() => break,
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }

        info!("Stopping poller for {}", address);
    }

    /// Query the device once and publish the reading.
    pub async fn poll_once(&self) -> PollStatus {
        let device = self.source.device();

        let response = match self.source.fetch_power().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to poll device {}: {}", device.address, e);
                self.metrics.record_poll(&device.address, poll_outcome::ERROR);
                return PollStatus::Failed;
            }
        };

        let watts = match response.current_power() {
            Ok(watts) => watts,
            Err(e) => {
                warn!("Device {} reported a failure: {}", device.address, e);
                self.metrics
                    .record_poll(&device.address, poll_outcome::DEVICE_ERROR);
                return PollStatus::Failed;
            }
        };

        debug!("Device {} draws {} W", device.address, watts);

        match self.intake.push(Sample::current_power(device.clone(), watts)) {
            Ok(()) => {
                self.metrics.record_poll(&device.address, poll_outcome::SUCCESS);
                self.metrics
                    .last_power_watts
                    .with_label_values(&[device.address.as_str()])
                    .set(watts);
                PollStatus::Emitted
            }
            Err(PushError::Full) => {
                warn!(
                    "Intake full, dropping sample from device {}",
                    device.address
                );
                self.metrics.samples_dropped_total.inc();
                self.metrics.record_poll(&device.address, poll_outcome::DROPPED);
                PollStatus::Dropped
            }
            Err(PushError::Closed) => {
                debug!(
                    "Intake closed, discarding sample from device {}",
                    device.address
                );
                self.metrics.record_poll(&device.address, poll_outcome::DROPPED);
                PollStatus::Dropped
            }
        }
    }
}
