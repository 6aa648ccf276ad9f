//! # WampSockets core
//!
//! The reconnecting transport and its tungstenite opener.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wampsockets::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let opener = WsOpener::new()
//!         .with_subprotocol("wamp.2.json")
//!         .with_keepalive(KeepaliveConfig::new(Duration::from_secs(10), Duration::from_secs(5)));
//!
//!     let transport = ReconnectingTransport::spawn(
//!         TransportConfig::new("ws://127.0.0.1:8888", ExponentialBackoff::default()),
//!         Arc::new(opener),
//!         Arc::new(MyProtocol),
//!     );
//!
//!     // Later: stop retrying; the current connection is left to its handler
//!     transport.stop_trying();
//!     transport.join().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection_state;
pub mod keepalive;
pub mod websocket;

// Re-export main types
pub use client::{Metrics, ReconnectingTransport, TransportHandle};
pub use config::{KeepaliveConfig, TransportConfig};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use keepalive::Keepalive;
pub use websocket::WsOpener;
