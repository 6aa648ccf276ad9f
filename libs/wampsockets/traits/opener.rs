use crate::error::{Result, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Application-level WebSocket message
/// Can be Text or Binary data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }

    /// Get the message as binary, if it is binary
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            WsMessage::Text(_) => None,
            WsMessage::Binary(b) => Some(b),
        }
    }

    /// Check if message is text
    pub fn is_text(&self) -> bool {
        matches!(self, WsMessage::Text(_))
    }
}

/// Close state shared by both ends of one connection.
///
/// Whoever closes first records the reason; the other end observes the
/// close on its next `recv`.
#[derive(Default)]
pub(crate) struct CloseSignal {
    closed: AtomicBool,
    notify: Notify,
    reason: Mutex<Option<TransportError>>,
}

impl CloseSignal {
    pub(crate) fn close(&self, reason: Option<TransportError>) {
        if let Some(reason) = reason {
            let mut slot = self.reason.lock();
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) async fn closed(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }

    fn reason(&self) -> Option<TransportError> {
        self.reason.lock().clone()
    }
}

/// Cloneable sending half of a [`Connection`]
#[derive(Clone)]
pub struct ConnectionSender {
    tx: mpsc::UnboundedSender<WsMessage>,
    signal: Arc<CloseSignal>,
}

impl ConnectionSender {
    /// Queue a message for the peer
    pub fn send(&self, message: WsMessage) -> Result<()> {
        if self.signal.is_closed() {
            return Err(TransportError::ChannelSend("connection closed".into()));
        }
        self.tx
            .send(message)
            .map_err(|e| TransportError::ChannelSend(e.to_string()))
    }

    /// Check whether the underlying connection is closed
    pub fn is_closed(&self) -> bool {
        self.signal.is_closed() || self.tx.is_closed()
    }
}

/// One established, message-oriented duplex connection.
///
/// Dropping the connection closes it.
pub struct Connection {
    sender: ConnectionSender,
    inbound: mpsc::UnboundedReceiver<WsMessage>,
    signal: Arc<CloseSignal>,
    peer: String,
}

impl Connection {
    pub(crate) fn from_parts(
        outbound: mpsc::UnboundedSender<WsMessage>,
        inbound: mpsc::UnboundedReceiver<WsMessage>,
        signal: Arc<CloseSignal>,
        peer: impl Into<String>,
    ) -> Self {
        Self {
            sender: ConnectionSender {
                tx: outbound,
                signal: Arc::clone(&signal),
            },
            inbound,
            signal,
            peer: peer.into(),
        }
    }

    /// Create two in-process connections wired to each other
    ///
    /// Useful for openers that do not touch the network, and for driving a
    /// protocol from tests.
    pub fn memory_pair(peer: impl Into<String>) -> (Connection, Connection) {
        let peer = peer.into();
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let signal = Arc::new(CloseSignal::default());

        let local = Connection::from_parts(a_tx, b_rx, Arc::clone(&signal), peer.clone());
        let remote = Connection::from_parts(b_tx, a_rx, signal, peer);
        (local, remote)
    }

    /// Queue a message for the peer
    pub fn send(&self, message: WsMessage) -> Result<()> {
        self.sender.send(message)
    }

    /// Get a cloneable sender for this connection
    pub fn sender(&self) -> ConnectionSender {
        self.sender.clone()
    }

    /// Receive the next message
    ///
    /// Returns `None` once the connection is closed. Messages that arrived
    /// before the close are still delivered.
    pub async fn recv(&mut self) -> Option<WsMessage> {
        tokio::select! {
            biased;
            message = self.inbound.recv() => message,
            _ = self.signal.closed() => self.inbound.try_recv().ok(),
        }
    }

    /// Check whether the connection is closed
    pub fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }

    /// Why the connection closed
    pub fn close_reason(&self) -> TransportError {
        self.signal
            .reason()
            .unwrap_or_else(|| TransportError::ConnectionClosed("closed by peer".into()))
    }

    /// Close the connection with an explicit reason
    pub fn close(self, reason: TransportError) {
        self.signal.close(Some(reason));
    }

    /// Remote address or label of the connection
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.signal.close(None);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Trait for performing a single connection attempt
///
/// Implement this trait to plug a different socket layer under the
/// reconnecting transport. Retry policy is not the opener's concern.
#[async_trait]
pub trait TransportOpener: Send + Sync {
    /// Open one connection to `url`
    ///
    /// # Returns
    /// * `Ok(connection)` - The socket is established
    /// * `Err(TransportError)` - Refused, unreachable, timed out or rejected
    async fn open(&self, url: &str) -> Result<Connection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pair_delivers_both_ways() {
        let (mut local, mut remote) = Connection::memory_pair("memory");

        local.send(WsMessage::Text("hello".into())).unwrap();
        remote.send(WsMessage::Binary(vec![1, 2, 3])).unwrap();

        assert_eq!(remote.recv().await, Some(WsMessage::Text("hello".into())));
        assert_eq!(local.recv().await, Some(WsMessage::Binary(vec![1, 2, 3])));
    }

    #[tokio::test]
    async fn test_drop_closes_peer_after_pending_messages() {
        let (local, mut remote) = Connection::memory_pair("memory");
        let sender = local.sender();

        sender.send(WsMessage::Text("last words".into())).unwrap();
        drop(local);

        assert_eq!(remote.recv().await, Some(WsMessage::Text("last words".into())));
        assert_eq!(remote.recv().await, None);
        assert!(sender.send(WsMessage::Text("too late".into())).is_err());
        assert!(sender.is_closed());
    }

    #[tokio::test]
    async fn test_close_reason_is_recorded() {
        let (local, remote) = Connection::memory_pair("memory");

        local.close(TransportError::ConnectionClosed("going away".into()));

        assert!(remote.is_closed());
        assert_eq!(
            remote.close_reason(),
            TransportError::ConnectionClosed("going away".into())
        );
    }
}
