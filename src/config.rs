use crate::error::TapmonError;
use anyhow::{Context, Result};
use reqwest::Url;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    pub remote_write: RemoteWriteConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

/// A single smart plug, fixed for the lifetime of the process.
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    pub address: String,
    pub username: String,
    pub password: SecretString,
    /// Optional human readable name, exported as the `device` label
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteWriteConfig {
    pub endpoint: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default = "default_interval")]
    pub flush_interval_seconds: u64,
    #[serde(default = "default_flush_offset")]
    pub flush_offset_millis: u64,
    #[serde(default = "default_remote_write_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    #[serde(default)]
    pub on_recoverable_error: RecoverablePolicy,
    #[serde(default)]
    pub job: Option<String>,
}

/// What the aggregator does with a batch the sink rejected with a recoverable error.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecoverablePolicy {
    /// Discard the batch (at-most-once delivery, lossy on error)
    #[default]
    Drop,
    /// Keep the batch and prepend it to the next flush
    Retain,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IntakeConfig {
    /// 0 means unbounded
    #[serde(default)]
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_interval() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    10
}

fn default_flush_offset() -> u64 {
    1000
}

fn default_remote_write_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9101
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_addr(),
            port: default_port(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl RemoteWriteConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_seconds)
    }

    pub fn flush_offset(&self) -> Duration {
        Duration::from_millis(self.flush_offset_millis)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Parse the endpoint, accepting only absolute http(s) URLs.
    pub fn endpoint_url(&self) -> crate::error::Result<Url> {
        let url = Url::parse(self.endpoint.trim()).map_err(|e| {
            TapmonError::Config(format!(
                "cannot parse remote_write endpoint '{}': {}",
                self.endpoint, e
            ))
        })?;

        match url.scheme() {
            "http" | "https" if url.has_host() => Ok(url),
            _ => Err(TapmonError::Config(format!(
                "remote_write endpoint '{}' must be an http(s) URL",
                self.endpoint
            ))),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        // Load environment variables from .env if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("TAPMON")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Reject configurations the pipeline cannot run with.
    ///
    /// Called once before any task starts; a failure here aborts startup.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.devices.is_empty() {
            return Err(TapmonError::Config("no devices configured".to_string()));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            let address = device.address.trim();
            if address.is_empty() {
                return Err(TapmonError::Config(
                    "device address must not be empty".to_string(),
                ));
            }
            if !seen.insert(address) {
                return Err(TapmonError::Config(format!(
                    "device {} is configured more than once",
                    address
                )));
            }
        }

        if self.polling.interval_seconds == 0 {
            return Err(TapmonError::Config(
                "polling.interval_seconds must be greater than zero".to_string(),
            ));
        }

        if self.remote_write.flush_interval_seconds == 0 {
            return Err(TapmonError::Config(
                "remote_write.flush_interval_seconds must be greater than zero".to_string(),
            ));
        }

        self.remote_write.endpoint_url()?;

        Ok(())
    }
}
