use std::sync::atomic::{AtomicU8, Ordering};

/// Join state of one broker session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Created, HELLO not sent yet
    Idle = 0,
    /// HELLO sent, waiting for WELCOME or CHALLENGE
    Connecting = 1,
    /// Broker asked for challenge-response authentication
    Challenging = 2,
    /// WELCOME received; registrations issued
    Joined = 3,
    /// Session over; registrations implicitly revoked
    Left = 4,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Connecting,
            2 => SessionState::Challenging,
            3 => SessionState::Joined,
            4 => SessionState::Left,
            _ => SessionState::Idle,
        }
    }
}

#[derive(Debug)]
pub struct AtomicSessionState(AtomicU8);

impl AtomicSessionState {
    pub fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move to `state`, returning the previous one
    #[inline]
    pub fn swap(&self, state: SessionState) -> SessionState {
        SessionState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
    }

    #[inline]
    pub fn is_joined(&self) -> bool {
        self.get() == SessionState::Joined
    }
}
