//! Samples flowing from the pollers to the aggregator.

use crate::config::DeviceConfig;
use chrono::{DateTime, Utc};

/// Metric name of the instantaneous power reading, in watts.
pub const CURRENT_POWER: &str = "current_power";

/// Identity of a polled device, carried on every sample it produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId {
    pub address: String,
    pub name: Option<String>,
}

impl DeviceId {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl From<&DeviceConfig> for DeviceId {
    fn from(device: &DeviceConfig) -> Self {
        Self {
            address: device.address.trim().to_string(),
            name: device.name.clone(),
        }
    }
}

/// One timestamped reading from one device.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub device: DeviceId,
    pub metric: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    /// A `current_power` reading taken now.
    pub fn current_power(device: DeviceId, watts: f64) -> Self {
        Self {
            device,
            metric: CURRENT_POWER.to_string(),
            value: watts,
            timestamp: Utc::now(),
        }
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}
