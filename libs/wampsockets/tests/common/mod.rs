//! Common test utilities for WampSockets integration tests
//!
//! A local echo server, a scripted opener and a recording handler.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};
use wampsockets::{
    Connection, ConnectionHandler, TransportError, TransportHandle, TransportOpener, WsMessage,
};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// A simple mock WebSocket server that echoes text and binary frames
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    connections: Arc<AtomicUsize>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        Self::start_with(false).await
    }

    /// Start a server that completes the handshake, then never reads
    ///
    /// Pings are left unanswered since tungstenite only replies while the
    /// stream is polled.
    pub async fn start_silent() -> Self {
        Self::start_with(true).await
    }

    async fn start_with(silent: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();
        let connections = Arc::new(AtomicUsize::new(0));
        let connections_clone = connections.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                let connections = connections_clone.clone();
                                tokio::spawn(async move {
                                    if silent {
                                        Self::hold_connection(stream, shutdown, connections).await;
                                    } else {
                                        connections.fetch_add(1, Ordering::SeqCst);
                                        Self::handle_connection(stream, shutdown).await;
                                    }
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown,
            connections,
        }
    }

    async fn hold_connection(
        stream: tokio::net::TcpStream,
        shutdown: Arc<Notify>,
        connections: Arc<AtomicUsize>,
    ) {
        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };
        connections.fetch_add(1, Ordering::SeqCst);

        shutdown.notified().await;
        drop(ws_stream);
    }

    async fn handle_connection(stream: tokio::net::TcpStream, shutdown: Arc<Notify>) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            if msg.is_text() || msg.is_binary() {
                                if write.send(msg).await.is_err() {
                                    break;
                                }
                            } else if msg.is_close() {
                                break;
                            }
                        }
                        Some(Err(_)) | None => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Connections that completed the WebSocket handshake
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Reserve a local port with nothing listening on it
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}", addr)
}

/// Opener that replays a script of outcomes, one per attempt
///
/// `Ok` entries hand out the local end of an in-memory connection and pass
/// the remote end to the test. Once the script is exhausted every attempt
/// fails.
pub struct ScriptedOpener {
    script: Mutex<VecDeque<bool>>,
    attempts: AtomicUsize,
    remotes: mpsc::UnboundedSender<Connection>,
}

impl ScriptedOpener {
    pub fn new(script: &[bool]) -> (Self, mpsc::UnboundedReceiver<Connection>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                script: Mutex::new(script.iter().copied().collect()),
                attempts: AtomicUsize::new(0),
                remotes: tx,
            },
            rx,
        )
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportOpener for ScriptedOpener {
    async fn open(&self, url: &str) -> wampsockets::Result<Connection> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let succeed = self.script.lock().pop_front().unwrap_or(false);
        if !succeed {
            return Err(TransportError::Connect(format!("refused: {}", url)));
        }
        let (local, remote) = Connection::memory_pair(url);
        let _ = self.remotes.send(remote);
        Ok(local)
    }
}

/// Opener whose attempts never complete
pub struct HangingOpener;

#[async_trait]
impl TransportOpener for HangingOpener {
    async fn open(&self, _url: &str) -> wampsockets::Result<Connection> {
        std::future::pending().await
    }
}

/// Handler that records every message and resets the backoff on connect
#[derive(Default)]
pub struct RecordingHandler {
    pub received: Mutex<Vec<WsMessage>>,
    /// Why each connection ended
    pub closed: Mutex<Vec<TransportError>>,
    pub sessions: AtomicUsize,
    pub reset_on_connect: bool,
}

impl RecordingHandler {
    pub fn resetting() -> Self {
        Self {
            reset_on_connect: true,
            ..Self::default()
        }
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionHandler for RecordingHandler {
    async fn on_connection(
        &self,
        mut connection: Connection,
        transport: TransportHandle,
    ) -> wampsockets::Result<()> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        if self.reset_on_connect {
            transport.reset_delay();
        }
        while let Some(message) = connection.recv().await {
            self.received.lock().push(message);
        }
        let reason = connection.close_reason();
        self.closed.lock().push(reason.clone());
        Err(reason)
    }
}
