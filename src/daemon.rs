//! Daemon Wiring
//!
//! Startup checks, task spawning and the final wait on the shutdown barrier.
//!
//! # Startup
//!
//! 1. Validate the configuration
//! 2. Build the remote-write sink (rejects a malformed endpoint)
//! 3. Handshake with every device, concurrently; any failure aborts startup
//! 4. Bind the status server, if enabled
//!
//! Nothing is spawned until all of the above succeeded, so a startup failure never
//! leaves a partially running pipeline behind.
//!
//! # Running
//!
//! One [`Poller`] task per device and a single [`Aggregator`] task, connected by the
//! intake. All of them, plus the signal listener and status server, are registered
//! with the [`Shutdown`] barrier; [`run`] returns once every one of them has exited.

use crate::aggregator::{Aggregator, FlushSettings};
use crate::config::Config;
use crate::intake;
use crate::metrics::MetricsCollector;
use crate::poller::Poller;
use crate::remote_write::{MetricsSink, RemoteWriteSink};
use crate::server;
use crate::shutdown::{install_signal_handler, Shutdown, StopCause};
use crate::tapo::{PowerSource, TapoClient};
use anyhow::Context;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Timing and queueing parameters of the pipeline
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub poll_interval: Duration,
    pub flush: FlushSettings,
    /// 0 means unbounded
    pub intake_capacity: usize,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.polling.interval(),
            flush: FlushSettings::from(&config.remote_write),
            intake_capacity: config.intake.capacity,
        }
    }
}

/// Spawn one poller per source plus the aggregator, all registered with `shutdown`.
pub fn spawn_pipeline(
    sources: Vec<Arc<dyn PowerSource>>,
    sink: Arc<dyn MetricsSink>,
    settings: PipelineSettings,
    metrics: MetricsCollector,
    shutdown: &Shutdown,
) {
    let (tx, rx) = intake::channel(settings.intake_capacity);

    for source in sources {
        let name = format!("poller {}", source.device().address);
        let poller = Poller::new(source, settings.poll_interval, tx.clone(), metrics.clone());
        shutdown.spawn(&name, poller.run(shutdown.clone()));
    }

    let aggregator = Aggregator::new(sink, rx, settings.flush, metrics.clone());
    shutdown.spawn("aggregator", aggregator.run(shutdown.clone()));

    metrics.up.set(1.0);
    let watcher = shutdown.clone();
    shutdown.spawn("up gauge", async move {
        watcher.stopped().await;
        metrics.up.set(0.0);
    });
}

/// Handshake with every configured device, failing on the first unreachable one.
pub async fn connect_devices(config: &Config) -> anyhow::Result<Vec<Arc<dyn PowerSource>>> {
    let timeout = config.polling.request_timeout();

    let attempts = config.devices.iter().map(|device| async move {
        let client = TapoClient::new(device, timeout)?;
        client.connect().await?;
        info!("Connected to device {}", device.address);
        Ok::<_, crate::error::TapmonError>(Arc::new(client) as Arc<dyn PowerSource>)
    });

    join_all(attempts)
        .await
        .into_iter()
        .zip(&config.devices)
        .map(|(result, device)| {
            result.with_context(|| {
                format!("could not connect to device with ip {}", device.address)
            })
        })
        .collect()
}

/// Run the daemon until shutdown.
///
/// Returns `Ok` after a requested shutdown and `Err` after a startup failure or a
/// fatal runtime error.
pub async fn run(config: Config) -> anyhow::Result<()> {
    config.validate().context("Invalid configuration")?;

    let sink = RemoteWriteSink::new(&config.remote_write)
        .context("Invalid remote_write configuration")?;
    info!("Remote-write endpoint: {}", sink.endpoint());

    let sources = connect_devices(&config).await?;

    let metrics = MetricsCollector::new()?;
    let listener = if config.server.enabled {
        Some(server::bind(&config.server).await?)
    } else {
        None
    };

    let shutdown = Shutdown::new();
    install_signal_handler(&shutdown);

    info!(
        "Polling {} devices every {:?}, flushing every {:?}",
        sources.len(),
        config.polling.interval(),
        config.remote_write.flush_interval()
    );
    spawn_pipeline(
        sources,
        Arc::new(sink),
        PipelineSettings::from(&config),
        metrics.clone(),
        &shutdown,
    );

    if let Some(listener) = listener {
        let server_shutdown = shutdown.clone();
        shutdown.spawn("status server", async move {
            if let Err(e) = server::serve(listener, metrics, server_shutdown).await {
                error!("Status server error: {}", e);
            }
        });
    }

    shutdown.wait().await;

    match shutdown.cause() {
        Some(StopCause::Fatal(reason)) => anyhow::bail!("Stopped after fatal error: {}", reason),
        _ => {
            info!("Shutdown complete");
            Ok(())
        }
    }
}
