//! Lock-free connection state and counters shared between the transport
//! task and its handles.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Socket-level state of a reconnecting transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// No socket, waiting for the next attempt
    Disconnected = 0,
    /// First connection attempt in progress
    Connecting = 1,
    /// Socket established, handler running
    Connected = 2,
    /// Retry attempt in progress
    Reconnecting = 3,
    /// Transport task has exited and will not reconnect
    Stopped = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            4 => ConnectionState::Stopped,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Atomic wrapper around [`ConnectionState`]
#[derive(Debug)]
pub struct AtomicConnectionState(AtomicU8);

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Atomically move from `current` to `new`
    ///
    /// Returns the previous state on failure.
    pub fn compare_exchange(
        &self,
        current: ConnectionState,
        new: ConnectionState,
    ) -> Result<ConnectionState, ConnectionState> {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(ConnectionState::from_u8)
            .map_err(ConnectionState::from_u8)
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    /// True for both the first attempt and retries
    #[inline]
    pub fn is_connecting(&self) -> bool {
        matches!(
            self.get(),
            ConnectionState::Connecting | ConnectionState::Reconnecting
        )
    }

    #[inline]
    pub fn is_disconnected(&self) -> bool {
        self.get() == ConnectionState::Disconnected
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.get() == ConnectionState::Stopped
    }
}

/// Transport counters
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    attempts: AtomicU64,
    connections: AtomicU64,
    reconnects: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_attempts(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_connections(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Connection attempts made, successful or not
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Attempts that produced an established connection
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Retries scheduled by the reconnection strategy
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }
}
