//! Common test utilities for plc-wamp integration tests
//!
//! An in-memory opener hands the broker end of every connection to the test,
//! which then plays the broker with [`FakeBroker`].

#![allow(dead_code)]

use async_trait::async_trait;
use plc_wamp::protocol::{code, Dict, Payload, WampMessage};
use plc_wamp::{
    CapabilityRegistry, Catalog, ClientFactoryOptions, Jitter, Registry, WampConfig,
    WampController, PLC_PROCEDURES,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use wampsockets::{Connection, TransportError, TransportOpener, WsMessage};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Opener producing in-memory connections
///
/// The first `refuse` attempts fail as if the broker were down.
pub struct MemoryOpener {
    brokers: mpsc::UnboundedSender<Connection>,
    refuse: AtomicUsize,
    attempts: AtomicUsize,
}

impl MemoryOpener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Connection>) {
        Self::refusing(0)
    }

    pub fn refusing(refuse: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<Connection>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                brokers: tx,
                refuse: AtomicUsize::new(refuse),
                attempts: AtomicUsize::new(0),
            }),
            rx,
        )
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportOpener for MemoryOpener {
    async fn open(&self, url: &str) -> wampsockets::Result<Connection> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect(format!("connection refused: {}", url)));
        }

        let (client, broker) = Connection::memory_pair(url);
        self.brokers
            .send(broker)
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(client)
    }
}

/// Broker side of one in-memory connection
pub struct FakeBroker {
    connection: Connection,
    next_id: u64,
}

impl FakeBroker {
    /// Wait for the client's next connection
    pub async fn accept(brokers: &mut mpsc::UnboundedReceiver<Connection>) -> Self {
        let connection = tokio::time::timeout(TIMEOUT, brokers.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("opener dropped");
        Self {
            connection,
            next_id: 1000,
        }
    }

    /// Next message from the client; panics on close or timeout
    pub async fn recv(&mut self) -> WampMessage {
        self.try_recv().await.expect("connection closed by client")
    }

    /// Next message from the client, `None` once it closed the connection
    pub async fn try_recv(&mut self) -> Option<WampMessage> {
        let message = tokio::time::timeout(TIMEOUT, self.connection.recv())
            .await
            .expect("timed out waiting for a client message")?;
        let text = message.as_text().expect("client sent a binary frame");
        Some(WampMessage::decode(text).expect("client sent an undecodable message"))
    }

    pub fn send(&self, message: WampMessage) {
        self.connection
            .send(WsMessage::Text(message.encode()))
            .expect("client connection closed");
    }

    /// Expect HELLO and return its realm and details
    pub async fn expect_hello(&mut self) -> (String, Dict) {
        match self.recv().await {
            WampMessage::Hello { realm, details } => (realm, details),
            other => panic!("expected HELLO, got {:?}", other),
        }
    }

    pub fn welcome(&self, session: u64) {
        self.send(WampMessage::Welcome {
            session,
            details: Dict::new(),
        });
    }

    /// Complete an anonymous join
    pub async fn join(&mut self, session: u64) {
        let (_realm, details) = self.expect_hello().await;
        assert!(!details.contains_key("authmethods"));
        self.welcome(session);
    }

    /// Acknowledge `count` REGISTER messages; returns (procedure, registration)
    pub async fn ack_registrations(&mut self, count: usize) -> Vec<(String, u64)> {
        let mut registered = Vec::with_capacity(count);
        for _ in 0..count {
            match self.recv().await {
                WampMessage::Register {
                    request, procedure, ..
                } => {
                    let registration = self.next_id();
                    self.send(WampMessage::Registered {
                        request,
                        registration,
                    });
                    registered.push((procedure, registration));
                }
                other => panic!("expected REGISTER, got {:?}", other),
            }
        }
        registered
    }

    pub fn invoke(&self, request: u64, registration: u64, args: Vec<Value>) {
        self.send(WampMessage::Invocation {
            request,
            registration,
            details: Dict::new(),
            payload: Payload::new(args, Dict::new()),
        });
    }

    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }
}

/// Active configuration with fast, deterministic backoff
pub fn test_config() -> WampConfig {
    WampConfig {
        id: Some("wamptest".to_string()),
        active: Some(true),
        realm: Some("Automation".to_string()),
        url: Some("ws://127.0.0.1:8888".to_string()),
        client_factory_options: Some(ClientFactoryOptions {
            initial_delay: Some(0.01),
            max_delay: Some(0.05),
            factor: Some(2.0),
            jitter: Some(Jitter::Enabled(false)),
            ..ClientFactoryOptions::default()
        }),
        protocol_options: None,
        secret: None,
    }
}

/// Every PLC procedure answers with its own name
pub fn plc_capabilities() -> CapabilityRegistry {
    let mut capabilities = CapabilityRegistry::new();
    for name in PLC_PROCEDURES {
        capabilities.register_fn(name, move |_payload| async move {
            Ok(Payload::from(json!(name)))
        });
    }
    capabilities
}

pub fn controller_with(
    catalog: Catalog,
    capabilities: CapabilityRegistry,
) -> (WampController, Arc<MemoryOpener>, mpsc::UnboundedReceiver<Connection>) {
    let (opener, brokers) = MemoryOpener::new();
    let controller =
        WampController::new(Registry::new(catalog, capabilities)).with_opener(opener.clone());
    (controller, opener, brokers)
}

/// Poll `condition` until it holds or the timeout expires
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub fn is_error_for(message: &WampMessage, request_type: u64, uri: &str) -> bool {
    matches!(
        message,
        WampMessage::Error { request_type: t, error, .. } if *t == request_type && error == uri
    )
}

pub const INVOCATION: u64 = code::INVOCATION;
