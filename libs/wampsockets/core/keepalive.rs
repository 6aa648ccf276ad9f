//! Ping/pong keepalive for WebSocket connections
//!
//! # Architecture
//!
//! The keepalive is polled from the connection's I/O loop alongside reads
//! and writes; it never owns the socket:
//!
//! ```text
//! ┌──────────────────────────┐
//! │  Connection I/O loop     │
//! │                          │
//! │  select! {               │
//! │    socket read   ──────┐ │   Pong ──> pong_received()
//! │    outbound queue      │ │
//! │    keepalive event ────┼─┼─> Ping      => send ping, ping_sent()
//! │  }                     │ │   TimedOut  => close connection
//! └────────────────────────┴─┘
//! ```
//!
//! Missed ticks are skipped rather than bursting pings after a stall.

use crate::config::KeepaliveConfig;
use std::time::Duration;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};

/// What the I/O loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveEvent {
    /// Time to send a ping
    Ping,
    /// A ping went unanswered for longer than the timeout
    TimedOut,
}

/// Keepalive timer state for one connection
pub struct Keepalive {
    ticker: Interval,
    timeout: Duration,
    pong_deadline: Option<Instant>,
}

impl Keepalive {
    pub fn new(config: KeepaliveConfig) -> Self {
        let period = config.interval.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            ticker,
            timeout: config.timeout,
            pong_deadline: None,
        }
    }

    /// Wait for the next keepalive event
    pub async fn next_event(&mut self) -> KeepaliveEvent {
        match self.pong_deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = sleep_until(deadline) => KeepaliveEvent::TimedOut,
                    _ = self.ticker.tick() => KeepaliveEvent::Ping,
                }
            }
            None => {
                self.ticker.tick().await;
                KeepaliveEvent::Ping
            }
        }
    }

    /// Record that a ping was written; starts the pong deadline
    pub fn ping_sent(&mut self) {
        if self.pong_deadline.is_none() {
            self.pong_deadline = Some(Instant::now() + self.timeout);
        }
    }

    /// Record that a pong arrived
    pub fn pong_received(&mut self) {
        self.pong_deadline = None;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check whether a pong is outstanding
    pub fn awaiting_pong(&self) -> bool {
        self.pong_deadline.is_some()
    }
}

/// Poll an optional keepalive; never resolves when keepalive is disabled
pub(crate) async fn next_keepalive_event(keepalive: &mut Option<Keepalive>) -> KeepaliveEvent {
    match keepalive {
        Some(keepalive) => keepalive.next_event().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(interval_ms: u64, timeout_ms: u64) -> KeepaliveConfig {
        KeepaliveConfig::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_ping_waits_one_interval() {
        let mut keepalive = Keepalive::new(config(1000, 500));
        let started = Instant::now();

        assert_eq!(keepalive.next_event().await, KeepaliveEvent::Ping);
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_ping_times_out() {
        let mut keepalive = Keepalive::new(config(1000, 300));

        assert_eq!(keepalive.next_event().await, KeepaliveEvent::Ping);
        keepalive.ping_sent();
        assert!(keepalive.awaiting_pong());

        assert_eq!(keepalive.next_event().await, KeepaliveEvent::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_clears_deadline() {
        let mut keepalive = Keepalive::new(config(1000, 300));

        assert_eq!(keepalive.next_event().await, KeepaliveEvent::Ping);
        keepalive.ping_sent();
        keepalive.pong_received();
        assert!(!keepalive.awaiting_pong());

        assert_eq!(keepalive.next_event().await, KeepaliveEvent::Ping);
    }
}
