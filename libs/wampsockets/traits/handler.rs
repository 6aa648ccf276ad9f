use crate::core::client::TransportHandle;
use crate::error::Result;
use crate::opener::Connection;
use async_trait::async_trait;

/// Trait for running a protocol over an established connection
///
/// The reconnecting transport calls this once per successful connection
/// attempt and waits for it to return before applying its retry policy.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// Drive the connection until it ends
    ///
    /// # Arguments
    /// * `connection` - The freshly opened connection, owned by the handler
    /// * `transport` - Handle to the transport, e.g. to reset its backoff
    ///   once the protocol considers the connection healthy
    ///
    /// # Returns
    /// * `Ok(())` - The connection ended in an orderly way
    /// * `Err(TransportError)` - The connection was lost or the protocol failed
    async fn on_connection(&self, connection: Connection, transport: TransportHandle) -> Result<()>;
}
