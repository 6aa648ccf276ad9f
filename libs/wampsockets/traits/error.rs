use std::time::Duration;
use thiserror::Error;

/// Main error type for wampsockets
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Connection attempt refused, unreachable or timed out
    #[error("Connection failed: {0}")]
    Connect(String),

    /// WebSocket protocol or I/O error on an established connection
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed, by the peer or locally
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// No pong arrived within the keepalive timeout
    #[error("Keepalive timeout: no pong within {0:?}")]
    KeepaliveTimeout(Duration),

    /// Message could not be queued because the connection is gone
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Invalid transport configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error raised by the protocol running over the connection
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type for wampsockets operations
pub type Result<T> = std::result::Result<T, TransportError>;
