//! WAMP client configuration
//!
//! File keys keep the names used by existing `wampconf.json` files. Every
//! key is optional while parsing so that a missing mandatory key surfaces as
//! [`ConfigError::MissingField`] from [`WampConfig::validate`] rather than as
//! a parse error.

use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{info, warn};
use wampsockets::{ExponentialBackoff, KeepaliveConfig};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Keys that must be present (and non-null) before activation
pub const MANDATORY_ITEMS: [&str; 4] = ["ID", "active", "realm", "url"];

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^wss?://[^\s?:#-]+(:[0-9]+)?(/[^\s]*)?$").expect("URL pattern is valid")
});

/// Check a broker URL: `ws://` or `wss://`, host, optional port and path
pub fn is_correct_uri(uri: &str) -> bool {
    URL_PATTERN.is_match(uri)
}

/// Configuration record as found in the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WampConfig {
    /// Client identity, prefix of every exposed procedure
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Whether to connect at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,

    /// Broker URL (ws:// or wss://)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(
        rename = "clientFactoryOptions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_factory_options: Option<ClientFactoryOptions>,

    #[serde(
        rename = "protocolOptions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub protocol_options: Option<ProtocolOptions>,

    /// Shared secret, loaded from a separate file (not in the config file)
    #[serde(skip)]
    pub secret: Option<Vec<u8>>,
}

impl WampConfig {
    /// The de-activated configuration used when no file exists
    pub fn deactivated() -> Self {
        Self {
            id: Some("wamptest".to_string()),
            active: Some(false),
            realm: Some("Automation".to_string()),
            url: Some("ws://127.0.0.1:8888".to_string()),
            client_factory_options: Some(ClientFactoryOptions {
                max_delay: Some(300.0),
                ..ClientFactoryOptions::default()
            }),
            protocol_options: Some(ProtocolOptions {
                auto_ping_interval: Some(10.0),
                auto_ping_timeout: Some(5.0),
                ..ProtocolOptions::default()
            }),
            secret: None,
        }
    }

    /// Fill every absent top-level key from [`WampConfig::deactivated`]
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::deactivated();
        self.id = self.id.or(defaults.id);
        self.active = self.active.or(defaults.active);
        self.realm = self.realm.or(defaults.realm);
        self.url = self.url.or(defaults.url);
        self.client_factory_options = self
            .client_factory_options
            .or(defaults.client_factory_options);
        self.protocol_options = self.protocol_options.or(defaults.protocol_options);
        self
    }

    /// Attach the shared secret
    pub fn with_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Load configuration from a JSON or YAML file, defaults merged in
    ///
    /// `.yaml`/`.yml` files are parsed as YAML, anything else as JSON.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let path = config_path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config: WampConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };

        Ok(config.with_defaults())
    }

    /// Load configuration, falling back to the de-activated one when the
    /// file does not exist
    pub fn load_or_default(config_path: impl AsRef<Path>) -> Result<Self> {
        let path = config_path.as_ref();
        if !path.exists() {
            info!("No WAMP configuration at {}, using defaults", path.display());
            return Ok(Self::deactivated());
        }
        Self::load(path)
    }

    /// Check mandatory keys and the URL
    ///
    /// Runs before any network I/O; a failure aborts activation.
    pub fn validate(&self) -> Result<ValidatedConfig> {
        let id = self.id.clone().ok_or(ConfigError::MissingField("ID"))?;
        let active = self.active.ok_or(ConfigError::MissingField("active"))?;
        let realm = self.realm.clone().ok_or(ConfigError::MissingField("realm"))?;
        let url = self.url.clone().ok_or(ConfigError::MissingField("url"))?;

        if id.is_empty() {
            return Err(ConfigError::EmptyField("ID"));
        }
        if realm.is_empty() {
            return Err(ConfigError::EmptyField("realm"));
        }
        if !is_correct_uri(&url) {
            return Err(ConfigError::InvalidUrl(url));
        }

        Ok(ValidatedConfig {
            id,
            active,
            realm,
            url,
            client_factory_options: self.client_factory_options.clone().unwrap_or_default(),
            protocol_options: self.protocol_options.clone().unwrap_or_default(),
            secret: self.secret.clone(),
        })
    }
}

/// Configuration that passed [`WampConfig::validate`]
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub id: String,
    pub active: bool,
    pub realm: String,
    pub url: String,
    pub client_factory_options: ClientFactoryOptions,
    pub protocol_options: ProtocolOptions,
    pub secret: Option<Vec<u8>>,
}

impl ValidatedConfig {
    /// Prefix a name with this client's ID: `"{ID}.{name}"`
    pub fn qualified(&self, name: &str) -> String {
        format!("{}.{}", self.id, name)
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("WAMP configuration:");
        info!("  ID: {}", self.id);
        info!("  Active: {}", self.active);
        info!("  Realm: {}", self.realm);
        info!("  URL: {}", self.url);
        info!(
            "  Secret: {}",
            if self.secret.is_some() { "configured" } else { "none" }
        );
    }
}

/// `jitter` is either a switch or a fraction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Jitter {
    Enabled(bool),
    Fraction(f64),
}

/// Reconnection backoff options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFactoryOptions {
    /// Cap on the retry delay, seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay: Option<f64>,

    /// First retry delay, seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay: Option<f64>,

    /// Bound on retries, unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<Jitter>,

    /// Keys this client does not know; reported and ignored
    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

impl ClientFactoryOptions {
    /// Build the backoff strategy, defaults applied per key
    pub fn to_backoff(&self) -> Result<ExponentialBackoff> {
        warn_unknown("clientFactoryOptions", &self.unknown);

        let initial_delay = seconds(
            "initialDelay",
            self.initial_delay,
            ExponentialBackoff::DEFAULT_INITIAL_DELAY,
        )?;
        let max_delay = seconds("maxDelay", self.max_delay, ExponentialBackoff::DEFAULT_MAX_DELAY)?;

        let max_retries = match self.max_retries {
            None => None,
            Some(retries) => Some(u32::try_from(retries).map_err(|_| ConfigError::InvalidOption {
                option: "maxRetries".to_string(),
                reason: format!("expected a non-negative count, got {}", retries),
            })?),
        };

        let factor = self.factor.unwrap_or(ExponentialBackoff::DEFAULT_FACTOR);
        if !factor.is_finite() || factor < 1.0 {
            return Err(ConfigError::InvalidOption {
                option: "factor".to_string(),
                reason: format!("expected a number >= 1, got {}", factor),
            });
        }

        let jitter = match self.jitter {
            None | Some(Jitter::Enabled(true)) => ExponentialBackoff::DEFAULT_JITTER,
            Some(Jitter::Enabled(false)) => 0.0,
            Some(Jitter::Fraction(fraction)) if (0.0..=1.0).contains(&fraction) => fraction,
            Some(Jitter::Fraction(fraction)) => {
                return Err(ConfigError::InvalidOption {
                    option: "jitter".to_string(),
                    reason: format!("expected a fraction between 0 and 1, got {}", fraction),
                })
            }
        };

        Ok(ExponentialBackoff::new(initial_delay, max_delay, max_retries)
            .with_factor(factor)
            .with_jitter(jitter))
    }
}

/// WebSocket protocol options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolOptions {
    /// Seconds between pings, 0 or absent disables pinging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_ping_interval: Option<f64>,

    /// Seconds to wait for the pong
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_ping_timeout: Option<f64>,

    /// Keys this client does not know; reported and ignored
    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

impl ProtocolOptions {
    pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(2);

    /// Build the keepalive settings, `None` when pinging is disabled
    pub fn to_keepalive(&self) -> Result<Option<KeepaliveConfig>> {
        warn_unknown("protocolOptions", &self.unknown);

        let interval = seconds("autoPingInterval", self.auto_ping_interval, Duration::ZERO)?;
        if interval.is_zero() {
            return Ok(None);
        }
        let timeout = seconds(
            "autoPingTimeout",
            self.auto_ping_timeout,
            Self::DEFAULT_PING_TIMEOUT,
        )?;

        Ok(Some(KeepaliveConfig::new(interval, timeout)))
    }
}

fn seconds(option: &str, value: Option<f64>, default: Duration) -> Result<Duration> {
    match value {
        None => Ok(default),
        Some(secs) => Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidOption {
            option: option.to_string(),
            reason: format!("expected a non-negative number of seconds, got {}", secs),
        }),
    }
}

fn warn_unknown(section: &str, unknown: &BTreeMap<String, Value>) {
    for key in unknown.keys() {
        warn!("Ignoring unknown {} key '{}'", section, key);
    }
}

/// Read the shared secret; an empty file is an error
pub fn load_secret(secret_path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let secret = std::fs::read(secret_path)?;
    if secret.is_empty() {
        return Err(ConfigError::EmptySecret);
    }
    Ok(secret)
}
