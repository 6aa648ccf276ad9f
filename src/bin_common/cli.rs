//! CLI utilities for binaries
//!
//! Handles configuration paths and environment variables
//! for all binary executables.

use anyhow::{Context, Result};
use plc_wamp::{load_secret, WampConfig};
use std::path::PathBuf;
use tracing::info;

/// Type of configuration file to locate
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// WAMP client configuration (wampconf.json)
    WampConfig,
    /// Shared secret for wampcra (wamp.secret)
    WampSecret,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::WampConfig => "wampconf.json",
            ConfigType::WampSecret => "wamp.secret",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable overriding this config type's path
    ///
    /// Custom paths are used as given.
    pub fn env_var_name(&self) -> Option<&str> {
        match self {
            ConfigType::WampConfig => Some("WAMP_CONFIG_PATH"),
            ConfigType::WampSecret => Some("WAMP_SECRET_PATH"),
            ConfigType::Custom(_) => None,
        }
    }
}

/// Load configuration path from environment or use default
///
/// # Examples
/// ```
/// use plc_wamp_runtime::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::WampConfig);
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    config_type
        .env_var_name()
        .and_then(|name| std::env::var(name).ok())
        .unwrap_or_else(|| config_type.default_path().to_string())
        .into()
}

/// Load the WAMP configuration and, when its file exists, the secret
///
/// A missing configuration file yields the de-activated defaults. An
/// existing but empty secret file is an error.
pub fn load_wamp_config(config: ConfigType, secret: ConfigType) -> Result<WampConfig> {
    let config_path = load_config_from_env(config);
    let secret_path = load_config_from_env(secret);

    let mut wamp_config = WampConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if secret_path.exists() {
        let secret = load_secret(&secret_path)
            .with_context(|| format!("loading {}", secret_path.display()))?;
        wamp_config = wamp_config.with_secret(secret);
        info!("WAMP secret loaded from {}", secret_path.display());
    }

    Ok(wamp_config)
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
