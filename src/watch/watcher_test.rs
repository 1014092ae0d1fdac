use std::sync::Arc;
use std::time::Duration;

use futures::stream;
use futures::StreamExt;
use prost::Name;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::proto::EventReport;
use crate::test_utils::connected_channel;
use crate::test_utils::enable_logger;
use crate::Channel;
use crate::HandlerRegistry;
use crate::WatchConfig;
use crate::WatchError;

fn event(
    name: &str,
    resource_version: &str,
) -> ClusterEvent {
    ClusterEvent {
        name: Some(name.into()),
        namespace: Some("default".into()),
        reason: Some("Scheduled".into()),
        resource_version: Some(resource_version.into()),
        ..Default::default()
    }
}

fn source_with<F>(
    snapshot: &'static str,
    watch: F,
) -> Arc<dyn EventSource>
where
    F: FnMut(String, Duration) -> crate::Result<EventStream> + Send + 'static,
{
    let mut source = MockEventSource::new();
    source.expect_snapshot().returning(move || Ok(snapshot.to_string()));
    source.expect_watch().returning(watch);
    Arc::new(source)
}

fn assert_elapsed(
    start: Instant,
    expected: Duration,
) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "elapsed {elapsed:?}, expected {expected:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_baseline_then_event_advances_cursor() {
    enable_logger();
    let (channel, mut core, _read_loop) = connected_channel(Arc::new(HandlerRegistry::new())).await;
    let source = source_with("rv-100", |resource_version, timeout| {
        assert_eq!(resource_version, "rv-100");
        assert_eq!(timeout, Duration::from_secs(60));
        Ok(stream::iter(vec![Ok(event("pod-a.1", "rv-101"))]).boxed())
    });
    let mut watcher = EventWatcher::new(source, channel, WatchConfig::default());
    assert_eq!(watcher.state(), WatchState::NoCursor);
    assert!(watcher.cursor().is_none());

    assert_eq!(watcher.step().await, WatchState::Watching);
    assert_eq!(watcher.cursor().resource_version.as_deref(), Some("rv-100"));

    assert_eq!(watcher.step().await, WatchState::Cooldown);
    assert_eq!(watcher.cursor().resource_version.as_deref(), Some("rv-101"));

    let sent = core.next_envelope().await.expect("event report");
    assert!(sent.correlation_id.is_none());
    assert_eq!(sent.type_url(), EventReport::type_url());
    let report = sent.decode::<EventReport>().unwrap();
    assert_eq!(report.event.unwrap().name, "pod-a.1");
    assert!(core.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_events_are_sent_in_subscription_order() {
    let (channel, mut core, _read_loop) = connected_channel(Arc::new(HandlerRegistry::new())).await;
    let source = source_with("rv-1", |_, _| {
        Ok(stream::iter(vec![
            Ok(event("e2", "rv-2")),
            Ok(event("e3", "rv-3")),
            Ok(event("e4", "rv-4")),
        ])
        .boxed())
    });
    let mut watcher = EventWatcher::new(source, channel, WatchConfig::default());
    watcher.step().await;
    watcher.step().await;
    assert_eq!(watcher.cursor().resource_version.as_deref(), Some("rv-4"));

    for expected in ["e2", "e3", "e4"] {
        let report = core.next_envelope().await.unwrap().decode::<EventReport>().unwrap();
        assert_eq!(report.event.unwrap().name, expected);
    }
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_keeps_cursor_for_redelivery() {
    let source = source_with("rv-100", |_, _| {
        Ok(stream::iter(vec![Ok(event("pod-a.1", "rv-101"))]).boxed())
    });
    // never connected: every send fails
    let mut watcher = EventWatcher::new(source, Channel::new("secret", 1), WatchConfig::default());
    watcher.step().await;

    let start = Instant::now();
    assert_eq!(watcher.step().await, WatchState::Watching);
    assert_eq!(watcher.cursor().resource_version.as_deref(), Some("rv-100"));
    assert_elapsed(start, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_gone_on_open_clears_cursor() {
    let source = source_with("rv-100", |resource_version, _| {
        Err(WatchError::Gone(Some(resource_version)).into())
    });
    let mut watcher = EventWatcher::new(source, Channel::new("secret", 1), WatchConfig::default());
    watcher.step().await;

    assert_eq!(watcher.step().await, WatchState::NoCursor);
    assert!(watcher.cursor().is_none());

    // resync from a fresh snapshot
    assert_eq!(watcher.step().await, WatchState::Watching);
    assert_eq!(watcher.cursor().resource_version.as_deref(), Some("rv-100"));
}

#[tokio::test(start_paused = true)]
async fn test_gone_mid_stream_clears_cursor() {
    let (channel, mut core, _read_loop) = connected_channel(Arc::new(HandlerRegistry::new())).await;
    let source = source_with("rv-100", |_, _| {
        Ok(stream::iter(vec![
            Ok(event("pod-a.1", "rv-101")),
            Err(WatchError::Gone(Some("rv-101".into())).into()),
        ])
        .boxed())
    });
    let mut watcher = EventWatcher::new(source, channel, WatchConfig::default());
    watcher.step().await;

    assert_eq!(watcher.step().await, WatchState::NoCursor);
    assert!(watcher.cursor().is_none());
    assert!(core.next_envelope().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_other_error_keeps_cursor_and_waits() {
    let source = source_with("rv-100", |_, _| Err(WatchError::Api("connection reset".into()).into()));
    let mut watcher = EventWatcher::new(source, Channel::new("secret", 1), WatchConfig::default());
    watcher.step().await;

    let start = Instant::now();
    assert_eq!(watcher.step().await, WatchState::Watching);
    assert_eq!(watcher.cursor().resource_version.as_deref(), Some("rv-100"));
    assert_elapsed(start, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_failure_retries_without_cursor() {
    let mut source = MockEventSource::new();
    let mut calls = 0;
    source.expect_snapshot().times(2).returning(move || {
        calls += 1;
        if calls == 1 {
            Err(WatchError::Api("apiserver unavailable".into()).into())
        } else {
            Ok("rv-7".to_string())
        }
    });
    let mut watcher = EventWatcher::new(Arc::new(source), Channel::new("secret", 1), WatchConfig::default());

    let start = Instant::now();
    assert_eq!(watcher.step().await, WatchState::NoCursor);
    assert!(watcher.cursor().is_none());
    assert_elapsed(start, Duration::from_secs(1));

    assert_eq!(watcher.step().await, WatchState::Watching);
    assert_eq!(watcher.cursor().resource_version.as_deref(), Some("rv-7"));
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_doubles_up_to_cap() {
    let source = source_with("rv-100", |_, _| Ok(stream::empty().boxed()));
    let mut watcher = EventWatcher::new(source, Channel::new("secret", 1), WatchConfig::default());
    watcher.step().await;

    for secs in [1, 2, 4, 8, 16, 30, 30] {
        assert_eq!(watcher.step().await, WatchState::Cooldown);
        let start = Instant::now();
        assert_eq!(watcher.step().await, WatchState::Watching);
        assert_elapsed(start, Duration::from_secs(secs));
        assert_eq!(watcher.cursor().resource_version.as_deref(), Some("rv-100"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_error_resets_cooldown() {
    let mut calls = 0;
    let source = source_with("rv-100", move |_, _| {
        calls += 1;
        if calls == 3 {
            Err(WatchError::Api("boom".into()).into())
        } else {
            Ok(stream::empty().boxed())
        }
    });
    let mut watcher = EventWatcher::new(source, Channel::new("secret", 1), WatchConfig::default());
    watcher.step().await;

    watcher.step().await; // watch #1
    watcher.step().await; // cooldown 1s
    watcher.step().await; // watch #2
    watcher.step().await; // cooldown 2s
    assert_eq!(watcher.next_cooldown(), Duration::from_secs(4));

    assert_eq!(watcher.step().await, WatchState::Watching); // watch #3 fails
    assert_eq!(watcher.next_cooldown(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_stuck_subscription_ends_after_timeout() {
    let source = source_with("rv-100", |_, _| Ok(stream::pending().boxed()));
    let config = WatchConfig {
        timeout_in_secs: 10,
        ..Default::default()
    };
    let mut watcher = EventWatcher::new(source, Channel::new("secret", 1), config);
    watcher.step().await;

    let start = Instant::now();
    assert_eq!(watcher.step().await, WatchState::Cooldown);
    assert_elapsed(start, Duration::from_secs(10) + SUBSCRIPTION_GRACE);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_when_cancelled() {
    let source = source_with("rv-100", |_, _| Ok(stream::pending().boxed()));
    let watcher = EventWatcher::new(source, Channel::new("secret", 1), WatchConfig::default());
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(watcher.run(cancel.clone()));
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!handle.is_finished());

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_huge_timeout_does_not_overflow_deadline() {
    let source = source_with("rv-100", |_, timeout| {
        assert_eq!(timeout, Duration::from_secs(u64::MAX));
        Ok(stream::iter(vec![Ok(event("pod-a.1", "rv-101"))]).boxed())
    });
    let config = WatchConfig {
        timeout_in_secs: u64::MAX,
        ..Default::default()
    };
    let mut watcher = EventWatcher::new(source, Channel::new("secret", 1), config);
    watcher.step().await;

    // send fails on the unconnected channel, the loop keeps going
    assert_eq!(watcher.step().await, WatchState::Watching);
    assert_eq!(watcher.cursor().resource_version.as_deref(), Some("rv-100"));
}

#[tokio::test(start_paused = true)]
async fn test_huge_timeout_subscription_ends_normally() {
    let source = source_with("rv-100", |_, _| Ok(stream::empty().boxed()));
    let config = WatchConfig {
        timeout_in_secs: u64::MAX,
        ..Default::default()
    };
    let mut watcher = EventWatcher::new(source, Channel::new("secret", 1), config);
    watcher.step().await;

    assert_eq!(watcher.step().await, WatchState::Cooldown);
}
