use crate::config::KeepaliveConfig;
use crate::keepalive::{next_keepalive_event, Keepalive, KeepaliveEvent};
use crate::opener::CloseSignal;
use crate::traits::*;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{http, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`TransportOpener`] backed by tokio-tungstenite
///
/// Each successful `open` spawns an I/O task that owns the socket and
/// bridges it to the returned [`Connection`]. Protocol-level pings are
/// answered by tungstenite; outgoing pings are sent when a keepalive is
/// configured.
#[derive(Debug, Clone, Default)]
pub struct WsOpener {
    subprotocols: Vec<String>,
    keepalive: Option<KeepaliveConfig>,
}

impl WsOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a WebSocket subprotocol during the handshake
    pub fn with_subprotocol(mut self, protocol: impl Into<String>) -> Self {
        self.subprotocols.push(protocol.into());
        self
    }

    /// Enable ping/pong supervision
    pub fn with_keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.keepalive = Some(keepalive);
        self
    }

    pub fn keepalive(&self) -> Option<KeepaliveConfig> {
        self.keepalive
    }
}

#[async_trait]
impl TransportOpener for WsOpener {
    async fn open(&self, url: &str) -> Result<Connection> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::Configuration(format!("Invalid URL '{}': {}", url, e)))?;

        if !self.subprotocols.is_empty() {
            let offered = self.subprotocols.join(", ");
            match offered.parse::<http::header::HeaderValue>() {
                Ok(value) => {
                    request
                        .headers_mut()
                        .insert(http::header::SEC_WEBSOCKET_PROTOCOL, value);
                }
                Err(_) => {
                    warn!("Invalid subprotocol header value: {}", offered);
                }
            }
        }

        let (ws_stream, _response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!("WebSocket handshake completed with {}", url);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let signal = Arc::new(CloseSignal::default());

        let keepalive = self.keepalive.map(Keepalive::new);
        let pump_signal = Arc::clone(&signal);
        tokio::spawn(async move {
            let result = pump(ws_stream, outbound_rx, inbound_tx, &pump_signal, keepalive).await;
            match result {
                Ok(()) => pump_signal.close(None),
                Err(e) => {
                    debug!("WebSocket I/O task ended: {}", e);
                    pump_signal.close(Some(e));
                }
            }
        });

        Ok(Connection::from_parts(outbound_tx, inbound_rx, signal, url))
    }
}

/// Socket I/O loop bridging tungstenite to the connection channels
async fn pump(
    ws_stream: WsStream,
    mut outbound_rx: mpsc::UnboundedReceiver<WsMessage>,
    inbound_tx: mpsc::UnboundedSender<WsMessage>,
    signal: &CloseSignal,
    mut keepalive: Option<Keepalive>,
) -> Result<()> {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            // Handle incoming frames
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        if let Some(ref mut keepalive) = keepalive {
                            keepalive.pong_received();
                        }
                    }
                    Some(Ok(msg)) => {
                        if let Some(ws_msg) = tungstenite_to_ws_message(msg) {
                            if inbound_tx.send(ws_msg).is_err() {
                                // Local side dropped the connection
                                let _ = write.close().await;
                                return Ok(());
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Err(TransportError::WebSocket(e.to_string()));
                    }
                    None => {
                        return Err(TransportError::ConnectionClosed("Stream ended".into()));
                    }
                }
            }

            // Forward queued messages to the socket
            out = outbound_rx.recv() => {
                match out {
                    Some(msg) => {
                        write.send(ws_message_to_tungstenite(msg)).await.map_err(|e| {
                            TransportError::WebSocket(e.to_string())
                        })?;
                    }
                    None => {
                        let _ = write.close().await;
                        return Ok(());
                    }
                }
            }

            // Local close
            _ = signal.closed() => {
                debug!("Connection closed locally, closing socket");
                let _ = write.close().await;
                return Ok(());
            }

            event = next_keepalive_event(&mut keepalive) => {
                match event {
                    KeepaliveEvent::Ping => {
                        write.send(Message::Ping(Vec::new())).await.map_err(|e| {
                            TransportError::WebSocket(format!("Failed to send ping: {}", e))
                        })?;
                        if let Some(ref mut keepalive) = keepalive {
                            keepalive.ping_sent();
                        }
                    }
                    KeepaliveEvent::TimedOut => {
                        let timeout = keepalive
                            .as_ref()
                            .map(Keepalive::timeout)
                            .unwrap_or_default();
                        warn!("No pong within {:?}, dropping connection", timeout);
                        let _ = write.close().await;
                        return Err(TransportError::KeepaliveTimeout(timeout));
                    }
                }
            }
        }
    }
}

/// Convert WsMessage to tungstenite Message
fn ws_message_to_tungstenite(msg: WsMessage) -> Message {
    match msg {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
    }
}

/// Convert tungstenite Message to WsMessage
fn tungstenite_to_ws_message(msg: Message) -> Option<WsMessage> {
    match msg {
        Message::Text(text) => Some(WsMessage::Text(text)),
        Message::Binary(data) => Some(WsMessage::Binary(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_options() {
        let keepalive = KeepaliveConfig::new(
            std::time::Duration::from_secs(10),
            std::time::Duration::from_secs(5),
        );
        let opener = WsOpener::new()
            .with_subprotocol("wamp.2.json")
            .with_keepalive(keepalive);

        assert_eq!(opener.subprotocols, vec!["wamp.2.json".to_string()]);
        assert_eq!(opener.keepalive(), Some(keepalive));
    }

    #[tokio::test]
    async fn test_open_rejects_non_websocket_url() {
        let result = WsOpener::new().open("http://127.0.0.1:1").await;
        assert!(result.is_err());
    }
}
