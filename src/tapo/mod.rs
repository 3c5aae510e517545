pub mod client;
pub mod klap;
pub mod types;

pub use client::TapoClient;
pub use types::{EnergyUsage, EnergyUsageResponse};

use crate::error::Result;
use crate::sample::DeviceId;
use async_trait::async_trait;

/// Anything that can report the current power draw of one device.
///
/// Implemented by [`TapoClient`]; tests substitute in-memory sources.
#[async_trait]
pub trait PowerSource: Send + Sync {
    /// Identity used to label samples from this device
    fn device(&self) -> &DeviceId;

    /// Query the device once.
    ///
    /// `Err` means the exchange failed; an `Ok` response can still carry a
    /// non-zero device error code.
    async fn fetch_power(&self) -> Result<EnergyUsageResponse>;
}
