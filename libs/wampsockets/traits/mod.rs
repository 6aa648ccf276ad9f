//! # WampSockets Traits
//!
//! Core traits and types of the transport layer:
//!
//! - **TransportOpener**: Perform a single connection attempt
//! - **ConnectionHandler**: Drive the protocol over an established connection
//! - **ReconnectionStrategy**: Control the delay between attempts
//!
//! ## Example
//!
//! ```rust,ignore
//! use wampsockets::*;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl ConnectionHandler for Echo {
//!     async fn on_connection(
//!         &self,
//!         mut connection: Connection,
//!         _transport: TransportHandle,
//!     ) -> Result<()> {
//!         while let Some(message) = connection.recv().await {
//!             connection.send(message)?;
//!         }
//!         Err(connection.close_reason())
//!     }
//! }
//! ```

pub mod error;
pub mod handler;
pub mod opener;
pub mod reconnect;

// Re-export commonly used types
pub use error::{Result, TransportError};
pub use handler::ConnectionHandler;
pub use opener::{Connection, ConnectionSender, TransportOpener, WsMessage};
pub use reconnect::{ExponentialBackoff, ReconnectionStrategy};
