//! Self-Observability Metrics
//!
//! Operational metrics about the collector itself, served by the optional status
//! server. These are independent of the power samples pushed via remote-write.
//!
//! # Metrics
//!
//! - `tapmon_polls_total{ip,outcome}` - Poll attempts (`success`, `error`, `device_error`, `dropped`)
//! - `tapmon_last_power_watts{ip}` - Most recent reading per device
//! - `tapmon_samples_dropped_total` - Samples rejected by a full intake
//! - `tapmon_flushes_total{outcome}` - Flush attempts (`success`, `dropped`, `retained`, `fatal`)
//! - `tapmon_samples_sent_total` - Samples accepted by the remote endpoint
//! - `tapmon_batch_size` - Size of the most recently attempted batch
//! - `tapmon_up` - 1 while the pipeline runs, 0 once stopping
//!
//! All metrics use the `tapmon_` namespace prefix.

use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Poll outcome label values
pub mod poll_outcome {
    pub const SUCCESS: &str = "success";
    pub const ERROR: &str = "error";
    pub const DEVICE_ERROR: &str = "device_error";
    pub const DROPPED: &str = "dropped";
}

/// Flush outcome label values
pub mod flush_outcome {
    pub const SUCCESS: &str = "success";
    pub const DROPPED: &str = "dropped";
    pub const RETAINED: &str = "retained";
    pub const FATAL: &str = "fatal";
}

/// Metrics collector for the pipeline
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,

    // Poller metrics
    pub polls_total: Arc<IntCounterVec>,
    pub last_power_watts: Arc<GaugeVec>,
    pub samples_dropped_total: Arc<IntCounter>,

    // Aggregator metrics
    pub flushes_total: Arc<IntCounterVec>,
    pub samples_sent_total: Arc<IntCounter>,
    pub batch_size: Arc<IntGauge>,

    pub up: Arc<Gauge>,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let polls_total = IntCounterVec::new(
            Opts::new("polls_total", "Device poll attempts by outcome").namespace("tapmon"),
            &["ip", "outcome"],
        )?;

        let last_power_watts = GaugeVec::new(
            Opts::new("last_power_watts", "Most recent power reading in watts")
                .namespace("tapmon"),
            &["ip"],
        )?;

        let samples_dropped_total = IntCounter::with_opts(
            Opts::new(
                "samples_dropped_total",
                "Samples dropped because the intake was full",
            )
            .namespace("tapmon"),
        )?;

        let flushes_total = IntCounterVec::new(
            Opts::new("flushes_total", "Remote-write flush attempts by outcome")
                .namespace("tapmon"),
            &["outcome"],
        )?;

        let samples_sent_total = IntCounter::with_opts(
            Opts::new(
                "samples_sent_total",
                "Samples accepted by the remote-write endpoint",
            )
            .namespace("tapmon"),
        )?;

        let batch_size = IntGauge::with_opts(
            Opts::new("batch_size", "Number of samples in the last attempted batch")
                .namespace("tapmon"),
        )?;

        let up = Gauge::with_opts(
            Opts::new("up", "Whether the collection pipeline is running (1=running, 0=stopping)")
                .namespace("tapmon"),
        )?;

        registry.register(Box::new(polls_total.clone()))?;
        registry.register(Box::new(last_power_watts.clone()))?;
        registry.register(Box::new(samples_dropped_total.clone()))?;
        registry.register(Box::new(flushes_total.clone()))?;
        registry.register(Box::new(samples_sent_total.clone()))?;
        registry.register(Box::new(batch_size.clone()))?;
        registry.register(Box::new(up.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            polls_total: Arc::new(polls_total),
            last_power_watts: Arc::new(last_power_watts),
            samples_dropped_total: Arc::new(samples_dropped_total),
            flushes_total: Arc::new(flushes_total),
            samples_sent_total: Arc::new(samples_sent_total),
            batch_size: Arc::new(batch_size),
            up: Arc::new(up),
        })
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn record_poll(&self, ip: &str, outcome: &str) {
        self.polls_total.with_label_values(&[ip, outcome]).inc();
    }

    pub fn record_flush(&self, outcome: &str) {
        self.flushes_total.with_label_values(&[outcome]).inc();
    }

    /// Current count for one poll outcome (0 if never recorded)
    pub fn poll_count(&self, ip: &str, outcome: &str) -> u64 {
        self.polls_total.with_label_values(&[ip, outcome]).get()
    }

    /// Current count for one flush outcome (0 if never recorded)
    pub fn flush_count(&self, outcome: &str) -> u64 {
        self.flushes_total.with_label_values(&[outcome]).get()
    }
}
