//! Shutdown Coordinator
//!
//! A one-shot broadcast stop signal plus a join barrier over every pipeline task.
//!
//! - The signal is a [`CancellationToken`]: it transitions once, never resets, and an
//!   observer that subscribes after the transition sees it immediately.
//! - The barrier is a [`TaskTracker`]: tasks are registered when spawned (before they
//!   first run) and deregistered when their future completes, on every exit path.
//! - The first trigger records its [`StopCause`], so the process can tell a fatal
//!   shutdown from a requested one when choosing its exit code.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::{task_tracker::TaskTrackerToken, TaskTracker};
use tracing::{debug, info, warn};

/// Why the pipeline is stopping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCause {
    /// External termination (signal or caller request)
    Requested(String),
    /// A task hit a condition that makes continued operation impossible
    Fatal(String),
}

#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    tracker: TaskTracker,
    cause: Arc<OnceLock<StopCause>>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broadcast the stop transition. Only the first cause is kept.
    pub fn trigger(&self, cause: StopCause) {
        if self.cause.set(cause.clone()).is_err() {
            debug!("Shutdown already in progress, ignoring {:?}", cause);
        }
        self.token.cancel();
    }

    pub fn request(&self, reason: impl Into<String>) {
        self.trigger(StopCause::Requested(reason.into()));
    }

    pub fn fatal(&self, reason: impl Into<String>) {
        self.trigger(StopCause::Fatal(reason.into()));
    }

    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been triggered, immediately if it already was.
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }

    pub fn cause(&self) -> Option<StopCause> {
        self.cause.get().cloned()
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.cause.get(), Some(StopCause::Fatal(_)))
    }

    /// Spawn a task registered with the barrier.
    pub fn spawn<F>(&self, name: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!("Spawning {}", name);
        self.tracker.spawn(task);
    }

    /// Manually register with the barrier; dropping the token deregisters.
    pub fn register(&self) -> TaskTrackerToken {
        self.tracker.token()
    }

    /// Number of tasks still registered.
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Block until every registered task has finished.
    ///
    /// Closes the barrier first; tasks spawned afterwards are still tracked.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        info!("All tasks stopped");
    }
}

/// Request shutdown on SIGINT or SIGTERM.
///
/// The listener is itself a registered task and exits when shutdown begins for
/// any other reason.
pub fn install_signal_handler(shutdown: &Shutdown) {
    let listener = shutdown.clone();
    shutdown.spawn("signal listener", async move {
        tokio::select! {
            _ = listener.stopped() => {}
            signal = termination_signal() => {
                match signal {
                    Ok(name) => {
                        info!("Received {}, shutting down", name);
                        listener.request(name);
                    }
                    Err(e) => {
                        warn!("Unable to listen for termination signals: {}", e);
                        listener.stopped().await;
                    }
                }
            }
        }
    });
}

#[cfg(unix)]
async fn termination_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn termination_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "Ctrl-C")
}
