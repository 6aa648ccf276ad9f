//! PLC WAMP client
//!
//! Remote-control client of the PLC runtime: joins a WAMP realm over a
//! reconnecting WebSocket, exposes the runtime's procedures and publishes
//! runtime events.
//!
//! ## Layers
//!
//! - **auth**: wampcra challenge-response signatures
//! - **registry**: catalog of exposed procedures and topics, bound at join
//!   time to capabilities supplied by the runtime
//! - **session**: join handshake, registrations, invocation dispatch
//! - **controller**: start/stop/restart and status, the only entry point
//!   the runtime needs
//!
//! The transport underneath is [`wampsockets`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use plc_wamp::*;
//!
//! let mut capabilities = CapabilityRegistry::new();
//! capabilities.register_fn("StartPLC", |_payload| async { Ok(Payload::empty()) });
//!
//! let controller = WampController::new(Registry::new(Catalog::plc_runtime(), capabilities));
//! controller.start(WampConfig::load("wampconf.json")?)?;
//! controller.publish_with_own_id("Updated", serde_json::json!("Started"));
//! ```

pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod session;

// Re-export commonly used items
pub use config::{
    is_correct_uri, load_secret, ClientFactoryOptions, Jitter, ProtocolOptions, ValidatedConfig,
    WampConfig,
};
pub use controller::{WampController, WampStatus};
pub use error::{
    AuthenticationError, CallError, ConfigError, ProtocolError, RegistrationError, Result,
    WampError,
};
pub use protocol::{Dict, Payload, WampMessage};
pub use registry::{
    Callable, CapabilityRegistry, Catalog, ExposedCall, Publishable, RegisterOptions, Registry,
    PLC_PROCEDURES,
};
pub use session::{SessionHandle, SessionState};
