use crate::traits::*;
use std::time::Duration;

/// Configuration for a [`ReconnectingTransport`](crate::ReconnectingTransport)
///
/// The socket-level details (subprotocols, keepalive) belong to the opener;
/// this struct only carries what the retry loop needs.
pub struct TransportConfig {
    /// WebSocket URL (wss:// or ws://)
    pub(crate) url: String,

    /// Reconnection strategy, owned by the transport task
    pub(crate) reconnect_strategy: Box<dyn ReconnectionStrategy>,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>, strategy: impl ReconnectionStrategy + 'static) -> Self {
        Self {
            url: url.into(),
            reconnect_strategy: Box::new(strategy),
        }
    }

    /// Get a reference to the URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Ping/pong supervision of an established WebSocket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Send a ping after this much time
    pub interval: Duration,
    /// Close the connection if the pong takes longer than this
    pub timeout: Duration,
}

impl KeepaliveConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}
