use super::state::{AtomicSessionState, SessionState};
use crate::error::{ProtocolError, WampError};
use crate::protocol::{Dict, Payload, WampMessage};
use crate::registry::{Callable, Publishable};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use wampsockets::{ConnectionSender, WsMessage};

/// Requests from handles to the session task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionCommand {
    /// Send GOODBYE and end the session
    Leave,
    /// Drop the connection without GOODBYE
    Disconnect,
}

pub(crate) struct RegisteredProcedure {
    pub procedure: String,
    pub target: Arc<dyn Callable>,
}

pub(crate) struct SubscribedTopic {
    pub topic: String,
    pub target: Arc<dyn Publishable>,
}

struct SessionInner {
    id: String,
    realm: String,
    state: AtomicSessionState,
    session_id: AtomicU64,
    joined_at: Mutex<Option<DateTime<Utc>>>,
    sender: ConnectionSender,
    next_request: AtomicU64,
    registrations: RwLock<HashMap<u64, RegisteredProcedure>>,
    subscriptions: RwLock<HashMap<u64, SubscribedTopic>>,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

/// Cloneable handle to the live broker session
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

impl SessionHandle {
    pub(crate) fn new(
        id: impl Into<String>,
        realm: impl Into<String>,
        sender: ConnectionSender,
        commands: mpsc::UnboundedSender<SessionCommand>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: id.into(),
                realm: realm.into(),
                state: AtomicSessionState::new(SessionState::Idle),
                session_id: AtomicU64::new(0),
                joined_at: Mutex::new(None),
                sender,
                next_request: AtomicU64::new(1),
                registrations: RwLock::new(HashMap::new()),
                subscriptions: RwLock::new(HashMap::new()),
                commands,
            }),
        }
    }

    /// Client identity (`ID` of the configuration)
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn realm(&self) -> &str {
        &self.inner.realm
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.inner.state.get()
    }

    /// Check whether the session is joined
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.inner.state.is_joined()
    }

    /// Broker-assigned session id, once joined
    pub fn session_id(&self) -> Option<u64> {
        match self.inner.session_id.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    pub fn joined_at(&self) -> Option<DateTime<Utc>> {
        *self.inner.joined_at.lock()
    }

    /// Publish `value` to `topic` verbatim
    pub fn publish(&self, topic: &str, value: impl Into<Payload>) -> Result<(), WampError> {
        if !self.is_attached() {
            return Err(ProtocolError::NotJoined.into());
        }
        let request = self.next_request_id();
        self.send(&WampMessage::Publish {
            request,
            options: Dict::new(),
            topic: topic.to_string(),
            payload: value.into(),
        })?;
        Ok(())
    }

    /// Publish to `"{ID}.{event}"`
    pub fn publish_with_own_id(
        &self,
        event: &str,
        value: impl Into<Payload>,
    ) -> Result<(), WampError> {
        self.publish(&format!("{}.{}", self.inner.id, event), value)
    }

    /// Ask the broker to end the session (GOODBYE)
    ///
    /// Returns immediately; the session task completes the leave.
    pub fn leave(&self) {
        let _ = self.inner.commands.send(SessionCommand::Leave);
    }

    /// Drop the connection without leaving; the transport reconnects
    pub fn disconnect(&self) {
        let _ = self.inner.commands.send(SessionCommand::Disconnect);
    }

    /// Qualified URIs of the procedures acknowledged by the broker
    pub fn registered_procedures(&self) -> Vec<String> {
        let mut procedures: Vec<_> = self
            .inner
            .registrations
            .read()
            .values()
            .map(|registered| registered.procedure.clone())
            .collect();
        procedures.sort();
        procedures
    }

    /// Topics acknowledged by the broker
    pub fn subscribed_topics(&self) -> Vec<String> {
        let mut topics: Vec<_> = self
            .inner
            .subscriptions
            .read()
            .values()
            .map(|subscribed| subscribed.topic.clone())
            .collect();
        topics.sort();
        topics
    }

    /// Check whether two handles refer to the same session
    pub fn ptr_eq(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.inner.state.set(state);
    }

    pub(crate) fn mark_joined(&self, session_id: u64) {
        self.inner.session_id.store(session_id, Ordering::Release);
        *self.inner.joined_at.lock() = Some(Utc::now());
        self.inner.state.set(SessionState::Joined);
    }

    /// Enter `Left`, revoking every registration and subscription
    ///
    /// Returns the state the session was in.
    pub(crate) fn mark_left(&self) -> SessionState {
        let previous = self.inner.state.swap(SessionState::Left);
        self.inner.registrations.write().clear();
        self.inner.subscriptions.write().clear();
        previous
    }

    pub(crate) fn next_request_id(&self) -> u64 {
        self.inner.next_request.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn send(&self, message: &WampMessage) -> wampsockets::Result<()> {
        self.inner.sender.send(WsMessage::Text(message.encode()))
    }

    pub(crate) fn sender(&self) -> ConnectionSender {
        self.inner.sender.clone()
    }

    pub(crate) fn add_registration(&self, registration: u64, registered: RegisteredProcedure) {
        self.inner.registrations.write().insert(registration, registered);
    }

    pub(crate) fn add_subscription(&self, subscription: u64, subscribed: SubscribedTopic) {
        self.inner.subscriptions.write().insert(subscription, subscribed);
    }

    pub(crate) fn callable(&self, registration: u64) -> Option<Arc<dyn Callable>> {
        self.inner
            .registrations
            .read()
            .get(&registration)
            .map(|registered| Arc::clone(&registered.target))
    }

    pub(crate) fn publishable(&self, subscription: u64) -> Option<Arc<dyn Publishable>> {
        self.inner
            .subscriptions
            .read()
            .get(&subscription)
            .map(|subscribed| Arc::clone(&subscribed.target))
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.inner.id)
            .field("realm", &self.inner.realm)
            .field("state", &self.state())
            .field("session_id", &self.session_id())
            .finish()
    }
}
