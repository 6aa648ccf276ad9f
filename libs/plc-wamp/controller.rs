//! The control surface exposed to the surrounding runtime
//!
//! At most one transport and one session are live at a time. Both are held
//! in slots owned by the controller; status is derived from the slots on
//! every call, never stored. A stopped transport is kept aside until its
//! task exits, and no new one starts before that.

use crate::config::WampConfig;
use crate::error::{Result, WampError};
use crate::protocol::{Payload, SUBPROTOCOL};
use crate::registry::Registry;
use crate::session::{SessionFactory, SessionHandle, SessionSlot};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use wampsockets::{
    ReconnectingTransport, TransportConfig, TransportHandle, TransportOpener, WsOpener,
};

/// Coarse client status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WampStatus {
    /// No transport
    Disconnected,
    /// Transport running, no session yet
    Connecting,
    /// Session exists but has not joined
    Established,
    /// Session joined
    Attached,
}

impl WampStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WampStatus::Disconnected => "Disconnected",
            WampStatus::Connecting => "Connecting",
            WampStatus::Established => "Established",
            WampStatus::Attached => "Attached",
        }
    }
}

impl std::fmt::Display for WampStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Starts, stops and observes the WAMP client
///
/// All methods take `&self`; share the controller behind an `Arc`.
/// [`start`](Self::start) and [`restart`](Self::restart) spawn tasks and must
/// be called from within a tokio runtime.
pub struct WampController {
    registry: Registry,
    /// Replaces the WebSocket opener (in-process brokers, tests)
    opener: Option<Arc<dyn TransportOpener>>,
    last_config: RwLock<Option<WampConfig>>,
    transport: Mutex<Option<ReconnectingTransport>>,
    /// Stopped transport whose session may still be leaving
    retiring: Mutex<Option<ReconnectingTransport>>,
    session: SessionSlot,
}

impl WampController {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            opener: None,
            last_config: RwLock::new(None),
            transport: Mutex::new(None),
            retiring: Mutex::new(None),
            session: Arc::new(RwLock::new(None)),
        }
    }

    /// Use `opener` for every connection attempt instead of WebSockets
    pub fn with_opener(mut self, opener: Arc<dyn TransportOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Validate `config` and start connecting
    ///
    /// Returns `Ok(false)` without connecting when the configuration is not
    /// active or its options cannot be applied. A configuration error aborts
    /// before any network I/O.
    ///
    /// Fails with [`WampError::StillStopping`] while a transport stopped by
    /// [`stop`](Self::stop) has not exited yet; await
    /// [`shutdown`](Self::shutdown) to wait for it.
    pub fn start(&self, config: WampConfig) -> Result<bool> {
        let mut transport = self.transport.lock();
        if transport.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(WampError::AlreadyStarted);
        }
        {
            let mut retiring = self.retiring.lock();
            if retiring.as_ref().is_some_and(|t| !t.is_finished()) {
                return Err(WampError::StillStopping);
            }
            *retiring = None;
        }

        let validated = config.validate()?;
        *self.last_config.write() = Some(config);

        if !validated.active {
            info!("WAMP deactivated in configuration");
            *transport = None;
            return Ok(false);
        }

        let backoff = match validated.client_factory_options.to_backoff() {
            Ok(backoff) => backoff,
            Err(e) => {
                error!("Custom client factory options failed: {}", e);
                warn!("WAMP client can not connect to : {}", validated.url);
                *transport = None;
                return Ok(false);
            }
        };
        let keepalive = match validated.protocol_options.to_keepalive() {
            Ok(keepalive) => keepalive,
            Err(e) => {
                error!("Custom protocol options failed: {}", e);
                warn!("WAMP client can not connect to : {}", validated.url);
                *transport = None;
                return Ok(false);
            }
        };

        if validated.secret.is_none() {
            info!("WAMP authentication has no secret configured");
        }

        let opener = match &self.opener {
            Some(opener) => Arc::clone(opener),
            None => {
                let mut opener = WsOpener::new().with_subprotocol(SUBPROTOCOL);
                if let Some(keepalive) = keepalive {
                    opener = opener.with_keepalive(keepalive);
                }
                Arc::new(opener) as Arc<dyn TransportOpener>
            }
        };

        let url = validated.url.clone();
        let factory = SessionFactory::new(
            Arc::new(validated),
            self.registry.clone(),
            Arc::clone(&self.session),
        );
        *transport = Some(ReconnectingTransport::spawn(
            TransportConfig::new(url.clone(), backoff),
            opener,
            Arc::new(factory),
        ));

        info!("WAMP client connecting to : {}", url);
        Ok(true)
    }

    /// Stop reconnecting and leave the current session
    ///
    /// Idempotent. Returns immediately; the leave completes in the
    /// background. The session is detached at once, so status and publish
    /// no longer see it.
    pub fn stop(&self) {
        let Some(transport) = self.transport.lock().take() else {
            return;
        };
        transport.stop_trying();
        if let Some(session) = self.session.write().take() {
            session.leave();
        }
        *self.retiring.lock() = Some(transport);
    }

    /// [`stop`](Self::stop), then wait for the transport task to exit
    pub async fn shutdown(&self) {
        self.stop();
        let retiring = self.retiring.lock().take();
        if let Some(transport) = retiring {
            transport.join().await;
            debug!("WAMP transport stopped");
        }
    }

    /// Reconnect
    ///
    /// With a live session, resets the backoff and drops the connection so
    /// the transport reconnects on its own. Otherwise shuts down what is
    /// left and starts again from the last known configuration.
    pub async fn restart(&self) -> Result<bool> {
        let live = {
            let transport = self.transport.lock();
            transport
                .as_ref()
                .filter(|t| !t.is_finished())
                .map(ReconnectingTransport::handle)
        };
        let session = self.session.read().clone();

        if let (Some(transport), Some(session)) = (live, session) {
            transport.reset_delay();
            session.disconnect();
            return Ok(true);
        }

        let config = self
            .last_config
            .read()
            .clone()
            .ok_or(WampError::NotConfigured)?;
        self.shutdown().await;
        self.start(config)
    }

    /// Apply a new configuration
    ///
    /// An invalid configuration is rejected before the running client is
    /// touched. The old session has left, or its grace period expired,
    /// before the new one connects.
    pub async fn reconfigure(&self, config: WampConfig) -> Result<bool> {
        config.validate()?;
        self.shutdown().await;
        self.start(config)
    }

    pub fn status(&self) -> WampStatus {
        let transport_alive = self
            .transport
            .lock()
            .as_ref()
            .is_some_and(|t| !t.is_finished());
        if !transport_alive {
            return WampStatus::Disconnected;
        }

        match self.session.read().as_ref() {
            None => WampStatus::Connecting,
            Some(session) if session.is_attached() => WampStatus::Attached,
            Some(_) => WampStatus::Established,
        }
    }

    /// Publish to `topic`; does nothing unless attached
    ///
    /// Returns whether the event was sent.
    pub fn publish(&self, topic: &str, value: impl Into<Payload>) -> bool {
        self.publish_with(|session, payload| session.publish(topic, payload), value)
    }

    /// Publish to `"{ID}.{event}"`; does nothing unless attached
    pub fn publish_with_own_id(&self, event: &str, value: impl Into<Payload>) -> bool {
        self.publish_with(
            |session, payload| session.publish_with_own_id(event, payload),
            value,
        )
    }

    fn publish_with<F>(&self, publish: F, value: impl Into<Payload>) -> bool
    where
        F: FnOnce(&SessionHandle, Payload) -> Result<()>,
    {
        if self.status() != WampStatus::Attached {
            return false;
        }
        let Some(session) = self.session() else {
            return false;
        };
        match publish(&session, value.into()) {
            Ok(()) => true,
            Err(e) => {
                debug!("Publish failed: {}", e);
                false
            }
        }
    }

    /// The live session, if any
    pub fn session(&self) -> Option<SessionHandle> {
        self.session.read().clone()
    }

    /// Configuration given to the last `start`/`reconfigure`
    pub fn last_known_config(&self) -> Option<WampConfig> {
        self.last_config.read().clone()
    }

    /// Handle of the running transport, if any
    pub fn transport(&self) -> Option<TransportHandle> {
        self.transport
            .lock()
            .as_ref()
            .map(ReconnectingTransport::handle)
    }
}

impl std::fmt::Debug for WampController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WampController")
            .field("status", &self.status())
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CapabilityRegistry, Catalog};

    fn controller() -> WampController {
        WampController::new(Registry::new(Catalog::plc_runtime(), CapabilityRegistry::new()))
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(WampStatus::Attached.to_string(), "Attached");
        assert_eq!(WampStatus::Disconnected.as_str(), "Disconnected");
    }

    #[tokio::test]
    async fn test_inactive_config_creates_no_transport() {
        let controller = controller();

        assert!(!controller.start(WampConfig::deactivated()).unwrap());
        assert_eq!(controller.status(), WampStatus::Disconnected);
        assert!(controller.transport().is_none());
        assert_eq!(
            controller.last_known_config(),
            Some(WampConfig::deactivated())
        );
    }

    #[tokio::test]
    async fn test_restart_without_config() {
        let controller = controller();
        assert!(matches!(
            controller.restart().await,
            Err(WampError::NotConfigured)
        ));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let controller = controller();
        controller.stop();
        controller.stop();
        assert_eq!(controller.status(), WampStatus::Disconnected);
    }

    #[test]
    fn test_publish_is_noop_when_disconnected() {
        let controller = controller();
        assert!(!controller.publish("Updated", serde_json::json!(1)));
        assert!(!controller.publish_with_own_id("Updated", serde_json::json!(1)));
    }
}
