//! PLC WAMP runtime - Main Library
//!
//! Wires the WAMP remote-control client into a runnable binary.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, logging, runners)
//! - **plc_wamp**: WAMP client core (re-exported from workspace)
//! - **wampsockets**: Reconnecting WebSocket transport (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use plc_wamp_runtime::bin_common::{load_wamp_config, ConfigType};
//! use plc_wamp_runtime::plc_wamp::WampController;
//! ```

// Re-export workspace libraries for convenience
pub use plc_wamp;
pub use wampsockets;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;
    pub mod runner;

    pub use cli::{load_config_from_env, load_wamp_config, parse_args, ConfigType};
    pub use logging::{init_tracing, init_tracing_with_level};
    pub use runner::{BinaryRunner, RunConfig, ShutdownManager};
}
