//! Tapo Device API Type Definitions
//!
//! Request and response bodies exchanged with a plug once the KLAP session is
//! established. Only the energy monitoring call is modelled.
//!
//! # Design Notes
//!
//! - **Error codes**: every response carries `error_code`; anything other than 0 is a
//!   device-side failure even when the HTTP exchange itself succeeded.
//! - **Optional fields**: firmware versions differ in what they report, so everything
//!   except `current_power` is optional.

use crate::error::{Result, TapmonError};
use serde::{Deserialize, Serialize};

/// Method call sent inside an encrypted request
#[derive(Debug, Serialize)]
pub struct TapoRequest {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(rename = "requestTimeMils")]
    pub request_time_mils: i64,
}

impl TapoRequest {
    pub fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            params: None,
            request_time_mils: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn get_energy_usage() -> Self {
        Self::new("get_energy_usage")
    }
}

/// Response to `get_energy_usage`
#[derive(Debug, Deserialize, Clone)]
pub struct EnergyUsageResponse {
    pub error_code: i64,
    #[serde(default)]
    pub result: Option<EnergyUsage>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnergyUsage {
    /// Instantaneous draw in watts
    pub current_power: f64,
    #[serde(default)]
    pub today_runtime: Option<u64>,
    #[serde(default)]
    pub month_runtime: Option<u64>,
    #[serde(default)]
    pub today_energy: Option<u64>,
    #[serde(default)]
    pub month_energy: Option<u64>,
    #[serde(default)]
    pub local_time: Option<String>,
}

impl EnergyUsageResponse {
    pub fn ok(current_power: f64) -> Self {
        Self {
            error_code: 0,
            result: Some(EnergyUsage {
                current_power,
                today_runtime: None,
                month_runtime: None,
                today_energy: None,
                month_energy: None,
                local_time: None,
            }),
        }
    }

    pub fn failed(error_code: i64) -> Self {
        Self {
            error_code,
            result: None,
        }
    }

    /// The reported draw, or why the device did not give one.
    pub fn current_power(&self) -> Result<f64> {
        if self.error_code != 0 {
            return Err(TapmonError::DeviceCode {
                code: self.error_code,
            });
        }

        self.result
            .as_ref()
            .map(|usage| usage.current_power)
            .ok_or_else(|| TapmonError::Device("response carried no result".to_string()))
    }
}
