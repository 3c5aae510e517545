use thiserror::Error;

#[derive(Debug, Error)]
pub enum TapmonError {
    #[error("Device error: {0}")]
    Device(String),

    #[error("Device reported non-zero error code {code}")]
    DeviceCode { code: i64 },

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, TapmonError>;
