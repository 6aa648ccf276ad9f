//! One logical broker session per established connection
//!
//! The [`SessionFactory`] is the transport's [`ConnectionHandler`]: every
//! socket the transport establishes becomes a fresh session that joins the
//! realm, binds the catalog and serves invocations until it leaves or the
//! socket drops.
//!
//! [`ConnectionHandler`]: wampsockets::ConnectionHandler

pub mod factory;
pub mod handle;
pub mod state;

pub use factory::{SessionFactory, SessionSlot, LEAVE_GRACE};
pub use handle::SessionHandle;
pub use state::{AtomicSessionState, SessionState};
