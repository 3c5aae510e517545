//! Poller tests
//!
//! Single polls against in-memory sources.

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use tapmon::intake;
use tapmon::metrics::poll_outcome;
use tapmon::poller::{PollStatus, Poller};
use tapmon::sample::CURRENT_POWER;
use tapmon::tapo::PowerSource;

#[tokio::test]
async fn test_successful_poll_emits_one_labeled_sample() {
    // Given: a device drawing 42.5W
    let (tx, mut rx) = intake::channel(0);
    let metrics = create_test_metrics();
    let source: Arc<dyn PowerSource> = FixedSource::new("192.168.1.20", 42.5);
    let poller = Poller::new(source, Duration::from_secs(300), tx, metrics.clone());

    // When: polling once
    let status = poller.poll_once().await;

    // Then: exactly one sample arrives, labeled with the device address
    assert_eq!(status, PollStatus::Emitted);
    let sample = rx.recv().await.expect("sample expected");
    assert_eq!(sample.device.address, "192.168.1.20");
    assert_eq!(sample.metric, CURRENT_POWER);
    assert_eq!(sample.value, 42.5);

    drop(poller);
    assert!(rx.recv().await.is_none(), "only one sample per poll");
    assert_eq!(metrics.poll_count("192.168.1.20", poll_outcome::SUCCESS), 1);
}

#[tokio::test]
async fn test_failed_poll_emits_nothing() {
    // Given: an unreachable device
    let (tx, mut rx) = intake::channel(0);
    let source: Arc<dyn PowerSource> = UnreachableSource::new("192.168.1.21");
    let poller = Poller::new(source, Duration::from_secs(300), tx, create_test_metrics());

    // When: polling once
    let status = poller.poll_once().await;

    // Then: the tick is skipped
    assert_eq!(status, PollStatus::Failed);
    drop(poller);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_non_zero_error_code_is_soft_failure() {
    // Given: a device answering with error code -1
    let (tx, mut rx) = intake::channel(0);
    let metrics = create_test_metrics();
    let source: Arc<dyn PowerSource> = ErrorCodeSource::new("192.168.1.22", -1);
    let poller = Poller::new(source, Duration::from_secs(300), tx, metrics.clone());

    // When: polling once
    let status = poller.poll_once().await;

    // Then: no sample, failure counted as a device error
    assert_eq!(status, PollStatus::Failed);
    drop(poller);
    assert!(rx.recv().await.is_none());
    assert_eq!(
        metrics.poll_count("192.168.1.22", poll_outcome::DEVICE_ERROR),
        1
    );
}

#[tokio::test]
async fn test_full_bounded_intake_drops_newest_sample() {
    // Given: a bounded intake of one slot that nobody drains
    let (tx, mut rx) = intake::channel(1);
    let metrics = create_test_metrics();
    let source: Arc<dyn PowerSource> = CountingSource::new("192.168.1.23", 1.0);
    let poller = Poller::new(source, Duration::from_secs(300), tx, metrics.clone());

    // When: polling twice
    let first = poller.poll_once().await;
    let second = poller.poll_once().await;

    // Then: the second sample is dropped without blocking, the first survives
    assert_eq!(first, PollStatus::Emitted);
    assert_eq!(second, PollStatus::Dropped);
    assert_eq!(metrics.samples_dropped_total.get(), 1);
    assert_eq!(rx.recv().await.map(|s| s.value), Some(1.0));
}

#[tokio::test]
async fn test_closed_intake_does_not_panic() {
    // Given: an intake whose consumer is gone
    let (tx, rx) = intake::channel(0);
    drop(rx);
    let source: Arc<dyn PowerSource> = FixedSource::new("192.168.1.24", 3.0);
    let poller = Poller::new(source, Duration::from_secs(300), tx, create_test_metrics());

    // When: polling
    let status = poller.poll_once().await;

    // Then: the sample is discarded
    assert_eq!(status, PollStatus::Dropped);
}
