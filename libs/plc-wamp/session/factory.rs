//! Session lifecycle over one established connection
//!
//! ```text
//! Idle ──HELLO──> Connecting ──WELCOME──────────────> Joined ──> Left
//!                     │                                 ▲
//!                     └─CHALLENGE─> Challenging ─WELCOME┘
//!                                        │
//!                                        └─ no secret / ABORT ──> Left
//! ```

use super::handle::{RegisteredProcedure, SessionCommand, SessionHandle, SubscribedTopic};
use super::state::SessionState;
use crate::auth;
use crate::config::ValidatedConfig;
use crate::error::{AuthenticationError, ProtocolError, RegistrationError, WampError};
use crate::protocol::{code, uri, Dict, Payload, WampMessage};
use crate::registry::{ProcedureBinding, Registry, TopicBinding};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use wampsockets::{Connection, ConnectionHandler, TransportError, TransportHandle, WsMessage};

/// Controller-owned reference to the live session
pub type SessionSlot = Arc<RwLock<Option<SessionHandle>>>;

/// How long a leave waits for the broker's GOODBYE
pub const LEAVE_GRACE: Duration = Duration::from_secs(2);

/// Creates one session per established connection
pub struct SessionFactory {
    config: Arc<ValidatedConfig>,
    registry: Registry,
    slot: SessionSlot,
}

impl SessionFactory {
    pub fn new(config: Arc<ValidatedConfig>, registry: Registry, slot: SessionSlot) -> Self {
        Self {
            config,
            registry,
            slot,
        }
    }
}

#[async_trait]
impl ConnectionHandler for SessionFactory {
    async fn on_connection(
        &self,
        connection: Connection,
        transport: TransportHandle,
    ) -> wampsockets::Result<()> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let handle = SessionHandle::new(
            self.config.id.clone(),
            self.config.realm.clone(),
            connection.sender(),
            commands_tx,
        );
        {
            // Checked under the slot lock so a concurrent stop either sees
            // this session or prevents it
            let mut slot = self.slot.write();
            if !transport.is_trying() {
                debug!("Transport stopping, not joining");
                return Ok(());
            }
            *slot = Some(handle.clone());
        }

        let mut session = Session {
            handle: handle.clone(),
            connection,
            commands: commands_rx,
            config: &self.config,
            registry: &self.registry,
            transport,
            pending_registrations: HashMap::new(),
            pending_subscriptions: HashMap::new(),
            leave_deadline: None,
        };
        let result = session.run().await;

        let previous = handle.mark_left();
        {
            let mut slot = self.slot.write();
            if slot.as_ref().is_some_and(|current| current.ptr_eq(&handle)) {
                *slot = None;
            }
        }
        if previous == SessionState::Joined {
            info!("WAMP session left");
        }

        result.map_err(|e| match e {
            WampError::Transport(e) => e,
            WampError::Authentication(e) => {
                warn!("WAMP authentication failed: {}", e);
                TransportError::Protocol(e.to_string())
            }
            other => TransportError::Protocol(other.to_string()),
        })
    }
}

/// State of one session task
struct Session<'a> {
    handle: SessionHandle,
    connection: Connection,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    config: &'a ValidatedConfig,
    registry: &'a Registry,
    transport: TransportHandle,
    /// REGISTER request id -> binding awaiting REGISTERED
    pending_registrations: HashMap<u64, ProcedureBinding>,
    /// SUBSCRIBE request id -> binding awaiting SUBSCRIBED
    pending_subscriptions: HashMap<u64, TopicBinding>,
    /// Set once GOODBYE was sent
    leave_deadline: Option<Instant>,
}

/// What the main loop does after handling an input
enum Flow {
    Continue,
    Done,
}

impl Session<'_> {
    async fn run(&mut self) -> Result<(), WampError> {
        self.handle.set_state(SessionState::Connecting);
        self.send(&self.hello())?;

        let session_id = match self.handshake().await? {
            Some(session_id) => session_id,
            // Left or disconnected before the join completed
            None => return Ok(()),
        };
        self.on_join(session_id);

        loop {
            let flow = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command)?,
                    None => Flow::Continue,
                },
                message = self.connection.recv() => match message {
                    Some(message) => self.on_message(message)?,
                    None if self.leave_deadline.is_some() => Flow::Done,
                    None => return Err(self.connection.close_reason().into()),
                },
                _ = leave_timer(self.leave_deadline) => {
                    debug!("No GOODBYE from broker within {:?}, closing", LEAVE_GRACE);
                    Flow::Done
                }
            };

            if let Flow::Done = flow {
                return Ok(());
            }
        }
    }

    fn hello(&self) -> WampMessage {
        let mut details = Dict::new();
        details.insert(
            "roles".into(),
            json!({
                "caller": {},
                "callee": {},
                "publisher": {},
                "subscriber": {}
            }),
        );
        if self.config.secret.is_some() {
            details.insert("authmethods".into(), json!([auth::WAMPCRA]));
            details.insert("authid".into(), json!(self.config.id));
        }

        WampMessage::Hello {
            realm: self.config.realm.clone(),
            details,
        }
    }

    /// Wait for WELCOME, answering a CHALLENGE on the way
    ///
    /// Returns `None` when a leave or disconnect was requested first.
    async fn handshake(&mut self) -> Result<Option<u64>, WampError> {
        loop {
            let message = tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(SessionCommand::Leave) => {
                            self.send_abort(uri::SYSTEM_SHUTDOWN, "leaving before join")?;
                            return Ok(None);
                        }
                        Some(SessionCommand::Disconnect) => {
                            return Err(TransportError::ConnectionClosed(
                                "disconnect requested".into(),
                            )
                            .into());
                        }
                        None => continue,
                    }
                }
                message = self.connection.recv() => message,
            };

            let Some(message) = message else {
                return Err(self.connection.close_reason().into());
            };
            let Some(message) = decode(message) else {
                continue;
            };

            match message {
                WampMessage::Welcome { session, .. } => return Ok(Some(session)),
                WampMessage::Challenge { method, extra } => {
                    self.handle.set_state(SessionState::Challenging);
                    self.answer_challenge(&method, &extra)?;
                }
                WampMessage::Abort { reason, details } => {
                    let message = details
                        .get("message")
                        .and_then(Value::as_str)
                        .map(|message| format!("{} ({})", reason, message))
                        .unwrap_or(reason);
                    return Err(if self.handle.state() == SessionState::Challenging {
                        AuthenticationError::Rejected(message).into()
                    } else {
                        ProtocolError::Aborted(message).into()
                    });
                }
                other => return Err(ProtocolError::Unexpected(other.name()).into()),
            }
        }
    }

    fn answer_challenge(&self, method: &str, extra: &Dict) -> Result<(), WampError> {
        let secret = self.config.secret.as_deref();
        match auth::respond(method, extra, secret) {
            Ok(signature) => {
                debug!("Answering {} challenge", method);
                self.send(&WampMessage::Authenticate {
                    signature,
                    extra: Dict::new(),
                })?;
                Ok(())
            }
            Err(e) => {
                let _ = self.send_abort(uri::CANNOT_AUTHENTICATE, &e.to_string());
                Err(e.into())
            }
        }
    }

    fn send_abort(&self, reason: &str, message: &str) -> Result<(), WampError> {
        let mut details = Dict::new();
        details.insert("message".into(), json!(message));
        self.send(&WampMessage::Abort {
            details,
            reason: reason.to_string(),
        })
    }

    /// Joined: reset the backoff, issue registrations, run hooks
    fn on_join(&mut self, session_id: u64) {
        self.handle.mark_joined(session_id);
        self.transport.reset_delay();

        let plan = self.registry.bind(&self.config.id);

        for binding in plan.procedures {
            let request = self.handle.next_request_id();
            let message = WampMessage::Register {
                request,
                options: binding.options.to_details(),
                procedure: binding.procedure.clone(),
            };
            match self.send(&message) {
                Ok(()) => {
                    self.pending_registrations.insert(request, binding);
                }
                Err(e) => warn!(
                    "{}",
                    RegistrationError::SendFailed {
                        name: binding.procedure,
                        reason: e.to_string(),
                    }
                ),
            }
        }

        for binding in plan.topics {
            let request = self.handle.next_request_id();
            let message = WampMessage::Subscribe {
                request,
                options: Dict::new(),
                topic: binding.topic.clone(),
            };
            match self.send(&message) {
                Ok(()) => {
                    self.pending_subscriptions.insert(request, binding);
                }
                Err(e) => warn!(
                    "{}",
                    RegistrationError::SendFailed {
                        name: binding.topic,
                        reason: e.to_string(),
                    }
                ),
            }
        }

        for (index, hook) in self.registry.catalog().on_join_hooks().iter().enumerate() {
            if let Err(e) = hook(&self.handle) {
                warn!("On-join hook #{} failed: {:#}", index, e);
            }
        }

        info!(
            "WAMP session joined ({}) by: {}",
            chrono::Local::now().format("%a %b %e %H:%M:%S %Y"),
            self.config.id
        );
    }

    fn on_command(&mut self, command: SessionCommand) -> Result<Flow, WampError> {
        match command {
            SessionCommand::Leave => {
                if self.leave_deadline.is_none() {
                    debug!("Leaving realm {}", self.config.realm);
                    self.send(&WampMessage::Goodbye {
                        details: Dict::new(),
                        reason: uri::CLOSE_REALM.to_string(),
                    })?;
                    self.leave_deadline = Some(Instant::now() + LEAVE_GRACE);
                }
                Ok(Flow::Continue)
            }
            SessionCommand::Disconnect => {
                info!("Dropping WAMP connection on request");
                Err(TransportError::ConnectionClosed("disconnect requested".into()).into())
            }
        }
    }

    fn on_message(&mut self, message: WsMessage) -> Result<Flow, WampError> {
        let Some(message) = decode(message) else {
            return Ok(Flow::Continue);
        };

        match message {
            WampMessage::Registered {
                request,
                registration,
            } => match self.pending_registrations.remove(&request) {
                Some(binding) => {
                    debug!("Registered {} as {}", binding.procedure, registration);
                    self.handle.add_registration(
                        registration,
                        RegisteredProcedure {
                            procedure: binding.procedure,
                            target: binding.target,
                        },
                    );
                }
                None => debug!("REGISTERED for unknown request {}", request),
            },

            WampMessage::Subscribed {
                request,
                subscription,
            } => match self.pending_subscriptions.remove(&request) {
                Some(binding) => {
                    debug!("Subscribed to {} as {}", binding.topic, subscription);
                    self.handle.add_subscription(
                        subscription,
                        SubscribedTopic {
                            topic: binding.topic,
                            target: binding.target,
                        },
                    );
                }
                None => debug!("SUBSCRIBED for unknown request {}", request),
            },

            WampMessage::Error {
                request_type,
                request,
                error,
                ..
            } => self.on_error(request_type, request, error),

            WampMessage::Invocation {
                request,
                registration,
                payload,
                ..
            } => self.dispatch_invocation(request, registration, payload),

            WampMessage::Event {
                subscription,
                payload,
                ..
            } => match self.handle.publishable(subscription) {
                Some(target) => {
                    tokio::spawn(async move {
                        target.notify(payload).await;
                    });
                }
                None => debug!("EVENT for unknown subscription {}", subscription),
            },

            WampMessage::Published { .. } => {}

            WampMessage::Goodbye { reason, .. } => {
                if self.leave_deadline.is_none() {
                    info!("Broker closed the WAMP session: {}", reason);
                    self.send(&WampMessage::Goodbye {
                        details: Dict::new(),
                        reason: uri::GOODBYE_AND_OUT.to_string(),
                    })?;
                }
                return Ok(Flow::Done);
            }

            WampMessage::Abort { reason, .. } => {
                return Err(ProtocolError::Aborted(reason).into());
            }

            other => warn!("Ignoring unexpected {} message", other.name()),
        }

        Ok(Flow::Continue)
    }

    fn on_error(&mut self, request_type: u64, request: u64, error: String) {
        match request_type {
            code::REGISTER => {
                if let Some(binding) = self.pending_registrations.remove(&request) {
                    warn!(
                        "{}",
                        RegistrationError::Rejected {
                            name: binding.procedure,
                            error,
                        }
                    );
                }
            }
            code::SUBSCRIBE => {
                if let Some(binding) = self.pending_subscriptions.remove(&request) {
                    warn!(
                        "{}",
                        RegistrationError::Rejected {
                            name: binding.topic,
                            error,
                        }
                    );
                }
            }
            _ => warn!("Broker error for request {}: {}", request, error),
        }
    }

    /// Run the target in its own task and answer with YIELD or ERROR
    fn dispatch_invocation(&self, request: u64, registration: u64, payload: Payload) {
        let Some(target) = self.handle.callable(registration) else {
            warn!("INVOCATION for unknown registration {}", registration);
            let _ = self.send(&invocation_error(
                request,
                uri::NO_SUCH_REGISTRATION,
                format!("no registration {}", registration),
            ));
            return;
        };

        let sender = self.handle.sender();
        tokio::spawn(async move {
            let reply = match target.invoke(payload).await {
                Ok(result) => WampMessage::Yield {
                    request,
                    options: Dict::new(),
                    payload: result,
                },
                Err(e) => {
                    debug!("Invocation {} failed: {}", request, e);
                    invocation_error(request, &e.uri, e.message)
                }
            };
            if let Err(e) = sender.send(WsMessage::Text(reply.encode())) {
                debug!("Could not answer invocation {}: {}", request, e);
            }
        });
    }

    fn send(&self, message: &WampMessage) -> Result<(), WampError> {
        self.handle.send(message)?;
        Ok(())
    }
}

fn invocation_error(request: u64, error: &str, message: String) -> WampMessage {
    WampMessage::Error {
        request_type: code::INVOCATION,
        request,
        details: Dict::new(),
        error: error.to_string(),
        payload: Payload::from(Value::String(message)),
    }
}

fn decode(message: WsMessage) -> Option<WampMessage> {
    match message {
        WsMessage::Text(text) => match WampMessage::decode(&text) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Dropping undecodable message: {}", e);
                None
            }
        },
        WsMessage::Binary(_) => {
            warn!("Dropping binary frame on a JSON session");
            None
        }
    }
}

async fn leave_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
