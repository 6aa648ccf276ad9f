//! # WampSockets
//!
//! A reconnecting WebSocket transport for long-lived broker sessions.
//!
//! ## Features
//!
//! - **Pluggable openers**: the [`TransportOpener`] trait performs one
//!   connection attempt; [`WsOpener`] is the tungstenite implementation
//! - **Reconnection as a decorator**: [`ReconnectingTransport`] owns the
//!   backoff state and retry timer and delegates every attempt to an opener
//! - **Protocol agnostic**: each established [`Connection`] is handed to a
//!   [`ConnectionHandler`], which runs whatever protocol sits on top
//! - **Keepalive**: optional ping/pong supervision of idle sockets

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use self::core::{
    client, config, connection_state, keepalive, websocket,
    client::{Metrics, ReconnectingTransport, TransportHandle},
    config::{KeepaliveConfig, TransportConfig},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    websocket::WsOpener,
};

/// Type alias for Result with TransportError
pub type Result<T> = std::result::Result<T, traits::TransportError>;
