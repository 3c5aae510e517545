//! Tapo Local API Client
//!
//! Talks to a single plug over its local HTTP API using the KLAP protocol.
//!
//! # Session Lifecycle
//!
//! - **Handshake**: `handshake1` / `handshake2` establish a session cookie and the
//!   seeds the request cipher is derived from (see [`super::klap`])
//! - **Reuse**: the session is cached and reused by every following request
//! - **Expiry**: the device announces a lifetime with the cookie (`TIMEOUT`, seconds).
//!   Once it has passed the next call handshakes before sending. Any failed request
//!   also drops the session. There is no retry within a call.
//!
//! # Example
//!
//! ```no_run
//! use tapmon::config::DeviceConfig;
//! use tapmon::tapo::{PowerSource, TapoClient};
//! use secrecy::SecretString;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let device = DeviceConfig {
//!     address: "192.168.1.20".to_string(),
//!     username: "me@example.com".to_string(),
//!     password: SecretString::from("secret"),
//!     name: None,
//! };
//!
//! let client = TapoClient::new(&device, Duration::from_secs(10))?;
//! client.connect().await?;
//! let usage = client.fetch_power().await?;
//! println!("{} W", usage.current_power()?);
//! # Ok(())
//! # }
//! ```

use super::klap::{self, KlapCipher, SEED_LEN};
use super::types::{EnergyUsageResponse, TapoRequest};
use super::PowerSource;
use crate::config::DeviceConfig;
use crate::error::{Result, TapmonError};
use crate::sample::DeviceId;
use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const SESSION_COOKIE: &str = "TP_SESSIONID";
const SESSION_TIMEOUT: &str = "TIMEOUT";

/// An authenticated KLAP session
struct Session {
    cipher: KlapCipher,
    cookie: String,
    /// None when the device did not announce a lifetime
    expires_at: Option<Instant>,
}

impl Session {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

/// Client for one Tapo plug
///
/// `Send` and `Sync`; requests are serialised through the session mutex, which
/// also keeps the KLAP sequence numbers in order.
pub struct TapoClient {
    device: DeviceId,
    username: String,
    password: SecretString,
    http: reqwest::Client,
    session: Mutex<Option<Session>>,
}

impl TapoClient {
    pub fn new(device: &DeviceConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            device: DeviceId::from(device),
            username: device.username.clone(),
            password: device.password.clone(),
            http,
            session: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}/app/{}", self.device.address, path)
    }

    /// Perform the handshake now, failing if the device is unreachable or
    /// rejects the credentials.
    pub async fn connect(&self) -> Result<()> {
        let mut guard = self.session.lock().await;
        *guard = Some(self.handshake().await?);
        Ok(())
    }

    async fn handshake(&self) -> Result<Session> {
        debug!("Starting KLAP handshake with {}", self.device.address);

        let auth = klap::auth_hash(&self.username, self.password.expose_secret());
        let local_seed: [u8; SEED_LEN] = rand::random();

        // handshake1: exchange seeds, verify the device knows our credentials
        let response = self
            .http
            .post(self.url("handshake1"))
            .body(local_seed.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TapmonError::Handshake(format!(
                "handshake1 returned HTTP {}",
                response.status()
            )));
        }

        let (cookie, lifetime) = session_cookie(response.headers()).ok_or_else(|| {
            TapmonError::Handshake("handshake1 response carried no session cookie".to_string())
        })?;
        let expires_at = lifetime.map(|lifetime| Instant::now() + lifetime);

        let body = response.bytes().await?;
        if body.len() < SEED_LEN + 32 {
            return Err(TapmonError::Handshake(format!(
                "handshake1 response too short ({} bytes)",
                body.len()
            )));
        }

        let remote_seed = &body[..SEED_LEN];
        let expected = klap::server_hash(&local_seed, remote_seed, &auth);
        if body[SEED_LEN..SEED_LEN + 32] != expected {
            return Err(TapmonError::Handshake(
                "device rejected the configured credentials".to_string(),
            ));
        }

        // handshake2: prove we derived the same seeds
        let response = self
            .http
            .post(self.url("handshake2"))
            .header(COOKIE, &cookie)
            .body(klap::client_hash(&local_seed, remote_seed, &auth).to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TapmonError::Handshake(format!(
                "handshake2 returned HTTP {}",
                response.status()
            )));
        }

        info!("Established session with device {}", self.device.address);

        Ok(Session {
            cipher: KlapCipher::new(&local_seed, remote_seed, &auth),
            cookie,
            expires_at,
        })
    }

    /// Send one encrypted request on the cached session.
    ///
    /// The session is taken out of the mutex for the duration of the call and
    /// only put back when the exchange succeeded.
    pub async fn request<T>(&self, request: &TapoRequest) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut guard = self.session.lock().await;

        let mut session = match guard.take() {
            Some(session) if !session.is_expired() => session,
            Some(_) => {
                debug!("Session with {} expired", self.device.address);
                self.handshake().await?
            }
            None => self.handshake().await?,
        };

        let body = serde_json::to_vec(request)?;
        let (payload, seq) = session.cipher.encrypt(&body);
        debug!("Sending {} to {} (seq {})", request.method, self.device.address, seq);

        let response = self
            .http
            .post(self.url("request"))
            .query(&[("seq", seq)])
            .header(COOKIE, &session.cookie)
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(
                "Device {} returned HTTP {}, session will be renegotiated",
                self.device.address,
                response.status()
            );
            return Err(TapmonError::Device(format!(
                "request returned HTTP {}",
                response.status()
            )));
        }

        let encrypted = response.bytes().await?;
        let plaintext = session.cipher.decrypt(seq, &encrypted)?;
        let parsed = serde_json::from_slice(&plaintext)?;

        *guard = Some(session);
        Ok(parsed)
    }
}

#[async_trait]
impl PowerSource for TapoClient {
    fn device(&self) -> &DeviceId {
        &self.device
    }

    async fn fetch_power(&self) -> Result<EnergyUsageResponse> {
        self.request(&TapoRequest::get_energy_usage()).await
    }
}

/// Extract `TP_SESSIONID=...` and the session lifetime from the `Set-Cookie` headers.
fn session_cookie(headers: &reqwest::header::HeaderMap) -> Option<(String, Option<Duration>)> {
    let attributes: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .collect();

    let cookie = attributes
        .iter()
        .find(|part| part.starts_with(SESSION_COOKIE))?
        .to_string();
    let lifetime = attributes
        .iter()
        .filter_map(|part| part.split_once('='))
        .find(|(key, _)| key.eq_ignore_ascii_case(SESSION_TIMEOUT))
        .and_then(|(_, seconds)| seconds.trim().parse::<u64>().ok())
        .map(Duration::from_secs);

    Some((cookie, lifetime))
}
