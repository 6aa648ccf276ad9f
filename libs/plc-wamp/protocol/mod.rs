//! WAMP v2 wire protocol (JSON serialization)

pub mod message;

pub use message::{code, Dict, Payload, WampMessage};

/// WebSocket subprotocol offered during the handshake
pub const SUBPROTOCOL: &str = "wamp.2.json";

/// Close reasons and error URIs
pub mod uri {
    pub const CLOSE_REALM: &str = "wamp.close.close_realm";
    pub const GOODBYE_AND_OUT: &str = "wamp.close.goodbye_and_out";
    pub const SYSTEM_SHUTDOWN: &str = "wamp.close.system_shutdown";
    pub const CANNOT_AUTHENTICATE: &str = "wamp.error.cannot_authenticate";
    pub const NO_SUCH_REGISTRATION: &str = "wamp.error.no_such_registration";
    pub const RUNTIME_ERROR: &str = "wamp.error.runtime_error";
}
