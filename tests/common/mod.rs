//! Test doubles shared by the pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tapmon::error::{Result, TapmonError};
use tapmon::metrics::MetricsCollector;
use tapmon::remote_write::{MetricsSink, SinkError};
use tapmon::sample::{DeviceId, Sample};
use tapmon::tapo::{EnergyUsageResponse, PowerSource};

/// Helper to create a test metrics instance
pub fn create_test_metrics() -> MetricsCollector {
    MetricsCollector::new().expect("Failed to create metrics")
}

/// Reports `start`, `start + 1`, `start + 2`, ... watts on successive polls.
pub struct CountingSource {
    device: DeviceId,
    start: f64,
    polls: AtomicU64,
}

impl CountingSource {
    pub fn new(address: &str, start: f64) -> Arc<Self> {
        Arc::new(Self {
            device: DeviceId::new(address),
            start,
            polls: AtomicU64::new(0),
        })
    }

    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PowerSource for CountingSource {
    fn device(&self) -> &DeviceId {
        &self.device
    }

    async fn fetch_power(&self) -> Result<EnergyUsageResponse> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(EnergyUsageResponse::ok(self.start + n as f64))
    }
}

/// Always reports the same draw.
pub struct FixedSource {
    device: DeviceId,
    watts: f64,
}

impl FixedSource {
    pub fn new(address: &str, watts: f64) -> Arc<Self> {
        Arc::new(Self {
            device: DeviceId::new(address),
            watts,
        })
    }
}

#[async_trait]
impl PowerSource for FixedSource {
    fn device(&self) -> &DeviceId {
        &self.device
    }

    async fn fetch_power(&self) -> Result<EnergyUsageResponse> {
        Ok(EnergyUsageResponse::ok(self.watts))
    }
}

/// Simulates an unreachable device.
pub struct UnreachableSource {
    device: DeviceId,
    polls: AtomicU64,
}

impl UnreachableSource {
    pub fn new(address: &str) -> Arc<Self> {
        Arc::new(Self {
            device: DeviceId::new(address),
            polls: AtomicU64::new(0),
        })
    }

    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PowerSource for UnreachableSource {
    fn device(&self) -> &DeviceId {
        &self.device
    }

    async fn fetch_power(&self) -> Result<EnergyUsageResponse> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Err(TapmonError::Device("connection refused".to_string()))
    }
}

/// Answers every poll with a non-zero device error code.
pub struct ErrorCodeSource {
    device: DeviceId,
    code: i64,
}

impl ErrorCodeSource {
    pub fn new(address: &str, code: i64) -> Arc<Self> {
        Arc::new(Self {
            device: DeviceId::new(address),
            code,
        })
    }
}

#[async_trait]
impl PowerSource for ErrorCodeSource {
    fn device(&self) -> &DeviceId {
        &self.device
    }

    async fn fetch_power(&self) -> Result<EnergyUsageResponse> {
        Ok(EnergyUsageResponse::failed(self.code))
    }
}

/// Takes `delay` (virtual time) to answer each poll.
pub struct SlowSource {
    device: DeviceId,
    delay: Duration,
    in_flight: AtomicU64,
    max_in_flight: AtomicU64,
}

impl SlowSource {
    pub fn new(address: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            device: DeviceId::new(address),
            delay,
            in_flight: AtomicU64::new(0),
            max_in_flight: AtomicU64::new(0),
        })
    }

    pub fn max_in_flight(&self) -> u64 {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PowerSource for SlowSource {
    fn device(&self) -> &DeviceId {
        &self.device
    }

    async fn fetch_power(&self) -> Result<EnergyUsageResponse> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(EnergyUsageResponse::ok(1.0))
    }
}

/// Records every batch it is asked to send and answers from a script.
///
/// Once the script is exhausted every send succeeds.
#[derive(Default)]
pub struct ScriptedSink {
    attempts: Mutex<Vec<Vec<Sample>>>,
    script: Mutex<VecDeque<std::result::Result<(), SinkError>>>,
}

impl ScriptedSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_script(script: Vec<std::result::Result<(), SinkError>>) -> Arc<Self> {
        Arc::new(Self {
            attempts: Mutex::new(Vec::new()),
            script: Mutex::new(script.into()),
        })
    }

    pub fn failing(error: SinkError) -> Arc<Self> {
        Self::with_script(vec![Err(error); 64])
    }

    /// Every batch passed to `send`, successful or not.
    pub fn attempts(&self) -> Vec<Vec<Sample>> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsSink for ScriptedSink {
    async fn send(&self, batch: &[Sample]) -> std::result::Result<(), SinkError> {
        self.attempts.lock().unwrap().push(batch.to_vec());
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

pub fn values_for(batch: &[Sample], address: &str) -> Vec<f64> {
    batch
        .iter()
        .filter(|s| s.device.address == address)
        .map(|s| s.value)
        .collect()
}

pub fn sample(address: &str, watts: f64) -> Sample {
    Sample::current_power(DeviceId::new(address), watts)
}
