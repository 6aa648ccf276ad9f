use thiserror::Error;
use wampsockets::TransportError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("WAMP configuration error: missing '{0}' parameter")]
    MissingField(&'static str),

    #[error("WAMP configuration error: '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },

    #[error("Failed to load config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("WAMP secret empty")]
    EmptySecret,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    #[error("no secret given for authentication")]
    NoSecret,

    #[error("don't know how to handle authmethod {0}")]
    UnsupportedMethod(String),

    #[error("challenge is missing the 'challenge' string")]
    MissingChallenge,

    #[error("HMAC error: {0}")]
    Signature(String),

    #[error("broker rejected authentication: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("no callable registered under '{name}'")]
    Unresolved { name: String },

    #[error("broker refused '{name}': {error}")]
    Rejected { name: String, error: String },

    #[error("failed to send request for '{name}': {reason}")]
    SendFailed { name: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("unknown message code {0}")]
    UnknownCode(u64),

    #[error("unexpected {0} message")]
    Unexpected(&'static str),

    #[error("session aborted by broker: {0}")]
    Aborted(String),

    #[error("session is not joined")]
    NotJoined,
}

/// Failure reported by a [`Callable`](crate::Callable)
///
/// The URI is sent to the caller in the ERROR message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{uri}: {message}")]
pub struct CallError {
    pub uri: String,
    pub message: String,
}

impl CallError {
    pub const RUNTIME_ERROR: &'static str = crate::protocol::uri::RUNTIME_ERROR;

    pub fn new(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Generic failure of the callee
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(Self::RUNTIME_ERROR, message)
    }
}

impl From<anyhow::Error> for CallError {
    fn from(err: anyhow::Error) -> Self {
        Self::runtime(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum WampError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("a WAMP client is already running, stop it first")]
    AlreadyStarted,

    #[error("the previous WAMP client is still leaving, await shutdown first")]
    StillStopping,

    #[error("no configuration known yet")]
    NotConfigured,
}

pub type Result<T> = std::result::Result<T, WampError>;
