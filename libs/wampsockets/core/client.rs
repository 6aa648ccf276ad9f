use crate::config::TransportConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::traits::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Transport metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    pub connection_attempts: u64,
    pub connections: u64,
    pub reconnect_count: u64,
    pub connection_state: ConnectionState,
}

/// State shared between the transport task and every handle
struct TransportShared {
    url: String,
    /// When false, no further connection attempt is made
    continue_trying: AtomicBool,
    state: AtomicConnectionState,
    metrics: AtomicMetrics,
    strategy: Mutex<Box<dyn ReconnectionStrategy>>,
    /// Wakes the task out of a pending retry timer or connection attempt
    stop: Notify,
}

/// Cloneable control handle for a [`ReconnectingTransport`]
#[derive(Clone)]
pub struct TransportHandle {
    shared: Arc<TransportShared>,
}

impl TransportHandle {
    /// Get the URL the transport connects to
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Get current connection state
    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Check whether further attempts are still allowed
    #[inline]
    pub fn is_trying(&self) -> bool {
        self.shared.continue_trying.load(Ordering::Acquire)
    }

    /// Reset the backoff to its initial delay and attempt count
    ///
    /// Called by the protocol once a connection proved usable.
    pub fn reset_delay(&self) {
        self.shared.strategy.lock().reset();
        debug!("Reconnection backoff reset");
    }

    /// Retries scheduled since the last reset
    pub fn attempts(&self) -> u32 {
        self.shared.strategy.lock().attempts()
    }

    /// Stop reconnecting
    ///
    /// Cancels a pending retry timer or an in-flight connection attempt.
    /// An established connection is left to its handler; once it ends the
    /// transport task exits instead of scheduling another attempt.
    pub fn stop_trying(&self) {
        if self.shared.continue_trying.swap(false, Ordering::AcqRel) {
            info!("Stopping reconnection to {}", self.shared.url);
        }
        self.shared.stop.notify_one();
    }

    /// Get current metrics
    pub fn metrics(&self) -> Metrics {
        Metrics {
            connection_attempts: self.shared.metrics.attempts(),
            connections: self.shared.metrics.connections(),
            reconnect_count: self.shared.metrics.reconnect_count(),
            connection_state: self.shared.state.get(),
        }
    }
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("url", &self.shared.url)
            .field("state", &self.shared.state.get())
            .field("trying", &self.is_trying())
            .finish()
    }
}

/// WebSocket transport that keeps reconnecting with a backoff strategy
///
/// Composition rather than inheritance: every attempt is delegated to a
/// [`TransportOpener`], every established connection to a
/// [`ConnectionHandler`]. The transport only owns the retry loop, the
/// backoff state and the retry timer.
///
/// Both failure classes (an attempt that fails, and an established
/// connection that is lost) schedule the next attempt the same way.
pub struct ReconnectingTransport {
    handle: TransportHandle,
    task: Option<JoinHandle<()>>,
}

impl ReconnectingTransport {
    /// Spawn the transport task; the first attempt starts immediately
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        config: TransportConfig,
        opener: Arc<dyn TransportOpener>,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Self {
        let shared = Arc::new(TransportShared {
            url: config.url,
            continue_trying: AtomicBool::new(true),
            state: AtomicConnectionState::new(ConnectionState::Disconnected),
            metrics: AtomicMetrics::new(),
            strategy: Mutex::new(config.reconnect_strategy),
            stop: Notify::new(),
        });
        let handle = TransportHandle { shared };

        let task = {
            let handle = handle.clone();
            tokio::spawn(async move {
                run_transport(handle, opener, handler).await;
            })
        };

        Self {
            handle,
            task: Some(task),
        }
    }

    /// Get a cloneable handle to this transport
    pub fn handle(&self) -> TransportHandle {
        self.handle.clone()
    }

    /// Stop reconnecting (see [`TransportHandle::stop_trying`])
    pub fn stop_trying(&self) {
        self.handle.stop_trying();
    }

    /// Check whether the transport task has exited
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the transport task to exit
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Main transport task loop
async fn run_transport(
    handle: TransportHandle,
    opener: Arc<dyn TransportOpener>,
    handler: Arc<dyn ConnectionHandler>,
) {
    let shared = Arc::clone(&handle.shared);
    let mut first_attempt = true;

    loop {
        if !handle.is_trying() {
            debug!("Reconnection disabled, exiting transport loop");
            break;
        }

        shared.state.set(if first_attempt {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        });
        first_attempt = false;
        shared.metrics.increment_attempts();

        let attempt = tokio::select! {
            result = opener.open(&shared.url) => Some(result),
            _ = shared.stop.notified() => None,
        };
        let Some(attempt) = attempt else {
            debug!("Stop requested during connection attempt");
            break;
        };

        match attempt {
            Ok(connection) => {
                info!("Connected to {}", shared.url);
                shared.state.set(ConnectionState::Connected);
                shared.metrics.increment_connections();

                match handler.on_connection(connection, handle.clone()).await {
                    Ok(()) => info!("Connection to {} closed", shared.url),
                    Err(e) => warn!("Connection lost ({}) .. retrying ..", e),
                }
            }
            Err(e) => {
                warn!("Connection failed ({}) .. retrying ..", e);
            }
        }

        shared.state.set(ConnectionState::Disconnected);

        if !handle.is_trying() {
            debug!("Stop requested during connection, not reconnecting");
            break;
        }

        let delay = shared.strategy.lock().next_delay();
        let Some(delay) = delay else {
            warn!("Reconnection strategy exhausted for {}, giving up", shared.url);
            break;
        };

        info!(
            "Reconnecting in {:?} (attempt {})",
            delay,
            handle.attempts()
        );
        shared.metrics.increment_reconnects();

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shared.stop.notified() => {
                debug!("Stop requested during reconnection delay");
                break;
            }
        }
    }

    shared.state.set(ConnectionState::Stopped);
    info!("Transport task exiting");
}
