//! Integration tests for reconnection strategies and the retry loop

mod common;

use common::{closed_port_url, HangingOpener, RecordingHandler, ScriptedOpener};
use std::sync::Arc;
use std::time::Duration;
use wampsockets::{
    ConnectionState, ExponentialBackoff, ReconnectingTransport, ReconnectionStrategy,
    TransportConfig, WsOpener,
};

#[test]
fn test_exponential_backoff_full_sequence() {
    verbose_println!("Testing exponential backoff full sequence...");

    let mut strategy =
        ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(300), None);

    let expected_secs = [1, 2, 4, 8, 16, 32, 64, 128, 256, 300, 300, 300];

    for (attempt, &expected) in expected_secs.iter().enumerate() {
        let delay = strategy.next_delay().unwrap();
        verbose_println!("  Attempt {}: {:?}", attempt, delay);
        assert_eq!(
            delay,
            Duration::from_secs(expected),
            "Unexpected delay at attempt {}",
            attempt
        );
    }
    assert_eq!(strategy.attempts(), expected_secs.len() as u32);
}

#[test]
fn test_exponential_backoff_max_retries() {
    verbose_println!("Testing exponential backoff max retries...");

    let mut strategy =
        ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(10), Some(3));

    assert_eq!(strategy.next_delay(), Some(Duration::from_millis(100)));
    assert_eq!(strategy.next_delay(), Some(Duration::from_millis(200)));
    assert_eq!(strategy.next_delay(), Some(Duration::from_millis(400)));
    assert!(
        strategy.next_delay().is_none(),
        "Should return None after max retries"
    );

    strategy.reset();
    assert_eq!(strategy.next_delay(), Some(Duration::from_millis(100)));
}

#[test]
fn test_zero_max_retries_never_retries() {
    let mut strategy =
        ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(10), Some(0));
    assert!(strategy.next_delay().is_none());
    assert_eq!(strategy.attempts(), 0);
}

#[test]
fn test_jitter_stays_within_bounds() {
    verbose_println!("Testing jitter bounds...");

    let jitter = 0.25;
    let mut strategy =
        ExponentialBackoff::new(Duration::from_secs(4), Duration::from_secs(100), None)
            .with_factor(1.0)
            .with_jitter(jitter);

    for _ in 0..200 {
        let delay = strategy.next_delay().unwrap().as_secs_f64();
        assert!(delay >= 4.0 * (1.0 - jitter) - 1e-9, "delay {} below bound", delay);
        assert!(delay <= 4.0 * (1.0 + jitter) + 1e-9, "delay {} above bound", delay);
    }
}

#[test]
fn test_jitter_never_exceeds_max_delay() {
    let mut strategy =
        ExponentialBackoff::new(Duration::from_secs(10), Duration::from_secs(10), None)
            .with_jitter(0.5);

    for _ in 0..100 {
        assert!(strategy.next_delay().unwrap() <= Duration::from_secs(10));
    }
}

#[test]
fn test_exponential_backoff_overflow_safety() {
    verbose_println!("Testing exponential backoff overflow safety...");

    let mut strategy = ExponentialBackoff::default();

    for _ in 0..10_000 {
        let delay = strategy.next_delay().unwrap();
        assert!(delay <= ExponentialBackoff::DEFAULT_MAX_DELAY);
    }

    verbose_println!("  Overflow safety verified");
}

#[tokio::test(start_paused = true)]
async fn test_transport_retries_until_connected() {
    verbose_println!("Testing retries until a connection succeeds...");

    let (opener, mut remotes) = ScriptedOpener::new(&[false, false, true]);
    let opener = Arc::new(opener);
    let handler = Arc::new(RecordingHandler::default());

    let transport = ReconnectingTransport::spawn(
        TransportConfig::new(
            "ws://broker.test",
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), None),
        ),
        opener.clone(),
        handler.clone(),
    );
    let handle = transport.handle();

    let _remote = remotes.recv().await.unwrap();
    assert_eq!(opener.attempts(), 3);
    // Two failures scheduled two retries: 1s then 2s
    assert_eq!(handle.attempts(), 2);

    let metrics = handle.metrics();
    assert_eq!(metrics.connection_attempts, 3);
    assert_eq!(metrics.reconnect_count, 2);

    transport.stop_trying();
}

#[tokio::test(start_paused = true)]
async fn test_reset_delay_after_successful_connection() {
    let (opener, mut remotes) = ScriptedOpener::new(&[false, false, true]);
    let handler = Arc::new(RecordingHandler::resetting());

    let transport = ReconnectingTransport::spawn(
        TransportConfig::new(
            "ws://broker.test",
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), None),
        ),
        Arc::new(opener),
        handler.clone(),
    );
    let handle = transport.handle();

    let remote = remotes.recv().await.unwrap();
    tokio::task::yield_now().await;
    assert_eq!(handler.sessions(), 1);
    assert_eq!(handle.attempts(), 0);

    // Losing the connection schedules a retry at the initial delay again
    drop(remote);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.attempts(), 1);

    transport.stop_trying();
    transport.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_strategy_exhaustion_stops_transport() {
    let (opener, _remotes) = ScriptedOpener::new(&[]);
    let opener = Arc::new(opener);

    let transport = ReconnectingTransport::spawn(
        TransportConfig::new(
            "ws://broker.test",
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), Some(2)),
        ),
        opener.clone(),
        Arc::new(RecordingHandler::default()),
    );
    let handle = transport.handle();

    transport.join().await;

    // Initial attempt plus exactly two retries
    assert_eq!(opener.attempts(), 3);
    assert_eq!(handle.connection_state(), ConnectionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_retry() {
    verbose_println!("Testing stop during a long retry delay...");

    let (opener, _remotes) = ScriptedOpener::new(&[]);
    let opener = Arc::new(opener);

    let transport = ReconnectingTransport::spawn(
        TransportConfig::new(
            "ws://broker.test",
            ExponentialBackoff::new(Duration::from_secs(3600), Duration::from_secs(3600), None),
        ),
        opener.clone(),
        Arc::new(RecordingHandler::default()),
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(opener.attempts(), 1);

    let handle = transport.handle();
    transport.stop_trying();
    transport.join().await;

    assert!(!handle.is_trying());
    assert_eq!(opener.attempts(), 1);
    assert_eq!(handle.connection_state(), ConnectionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_connection_attempt() {
    let transport = ReconnectingTransport::spawn(
        TransportConfig::new("ws://broker.test", ExponentialBackoff::default()),
        Arc::new(HangingOpener),
        Arc::new(RecordingHandler::default()),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        transport.handle().connection_state(),
        ConnectionState::Connecting
    );

    transport.stop_trying();
    transport.join().await;
}

#[tokio::test]
async fn test_transport_retries_unreachable_server() {
    verbose_println!("Testing retries against a closed port...");

    let url = closed_port_url().await;
    let transport = ReconnectingTransport::spawn(
        TransportConfig::new(
            url,
            ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(20), None),
        ),
        Arc::new(WsOpener::new()),
        Arc::new(RecordingHandler::default()),
    );
    let handle = transport.handle();

    tokio::time::timeout(Duration::from_secs(5), async {
        while handle.metrics().connection_attempts < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("transport should keep retrying");

    assert_eq!(handle.metrics().connections, 0);

    transport.stop_trying();
    transport.join().await;
}
