//! Tapo Power Collector
//!
//! A long-running daemon that polls Tapo smart plugs for their instantaneous power
//! draw and pushes the readings, in batches, to a Prometheus remote-write endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌────────┐  KLAP/HTTP  ┌──────────┐
//! │ Plug A │ ◄─────────► │ Poller A │──┐
//! └────────┘             └──────────┘  │   intake    ┌────────────┐  remote-write  ┌────────────┐
//!                                      ├───────────► │ Aggregator │ ─────────────► │ Prometheus │
//! ┌────────┐  KLAP/HTTP  ┌──────────┐  │   (mpsc)    └────────────┘  snappy+proto  └────────────┘
//! │ Plug B │ ◄─────────► │ Poller B │──┘
//! └────────┘             └──────────┘
//!
//!              Shutdown: broadcast signal + join barrier over every task
//! ```
//!
//! # Modules
//!
//! - [`poller`] - Per-device polling task
//! - [`intake`] - Many-producer, single-consumer sample queue
//! - [`aggregator`] - Batching and timed flushing
//! - [`shutdown`] - Stop signal and task barrier
//! - [`daemon`] - Startup checks and task wiring
//! - [`tapo`] - Device client (KLAP protocol)
//! - [`remote_write`] - Prometheus remote-write sink
//! - [`server`] / [`metrics`] - Optional self-observability endpoint
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use tapmon::{config::Config, daemon};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/Default.toml")?;
//!     daemon::run(config).await?;
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod config;
pub mod daemon;
pub mod error;
pub mod intake;
pub mod metrics;
pub mod poller;
pub mod remote_write;
pub mod sample;
pub mod server;
pub mod shutdown;
pub mod tapo;
