//! Prometheus Remote-Write Sink
//!
//! Serialises a batch as a snappy-compressed `WriteRequest` and POSTs it to the
//! configured endpoint.
//!
//! # Error Classification
//!
//! | Condition                         | Class         |
//! |-----------------------------------|---------------|
//! | 2xx                               | success       |
//! | 429 Too Many Requests             | `Recoverable` |
//! | 5xx                               | `Recoverable` |
//! | connect / timeout / transport     | `Recoverable` |
//! | any other status                  | `Fatal`       |
//! | compression failure               | `Fatal`       |

use super::proto::WriteRequest;
use super::{MetricsSink, SinkError};
use crate::config::RemoteWriteConfig;
use crate::error::Result;
use crate::sample::Sample;
use async_trait::async_trait;
use prost::Message;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, USER_AGENT};
use reqwest::{StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

const REMOTE_WRITE_VERSION: &str = "0.1.0";
const MAX_ERROR_BODY: usize = 256;

pub struct RemoteWriteSink {
    client: reqwest::Client,
    endpoint: Url,
    username: Option<String>,
    password: Option<SecretString>,
    job: Option<String>,
}

impl RemoteWriteSink {
    /// Build the sink; fails on a malformed endpoint.
    pub fn new(config: &RemoteWriteConfig) -> Result<Self> {
        let endpoint = config.endpoint_url()?;

        let mut builder = reqwest::Client::builder().timeout(config.timeout());
        if !config.verify_ssl {
            // Self-signed receivers on the local network
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
            job: config.job.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Protobuf-encode and snappy-compress a batch.
    pub fn encode(&self, batch: &[Sample]) -> std::result::Result<Vec<u8>, SinkError> {
        let request = WriteRequest::from_batch(batch, self.job.as_deref());
        snap::raw::Encoder::new()
            .compress_vec(&request.encode_to_vec())
            .map_err(|e| SinkError::Fatal(format!("unable to compress write request: {}", e)))
    }
}

#[async_trait]
impl MetricsSink for RemoteWriteSink {
    async fn send(&self, batch: &[Sample]) -> std::result::Result<(), SinkError> {
        let body = self.encode(batch)?;
        debug!("Sending {} bytes to {}", body.len(), self.endpoint);

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_ENCODING, "snappy")
            .header(CONTENT_TYPE, "application/x-protobuf")
            .header("X-Prometheus-Remote-Write-Version", REMOTE_WRITE_VERSION)
            .header(USER_AGENT, concat!("tapmon/", env!("CARGO_PKG_VERSION")))
            .body(body);

        if let Some(username) = &self.username {
            request = request.basic_auth(
                username,
                self.password.as_ref().map(|p| p.expose_secret().to_string()),
            );
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Recoverable(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }
}

/// Map a non-success HTTP status to its error class.
pub fn classify_status(status: StatusCode, body: &str) -> SinkError {
    let detail: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
    let message = if detail.is_empty() {
        format!("server returned HTTP status {}", status)
    } else {
        format!("server returned HTTP status {}: {}", status, detail)
    };

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SinkError::Recoverable(message)
    } else {
        SinkError::Fatal(message)
    }
}
