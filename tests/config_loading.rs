//! Integration test: Configuration utilities
//!
//! Tests the bin_common configuration loading functionality.

use plc_wamp_runtime::bin_common::{load_config_from_env, load_wamp_config, ConfigType};
use std::path::Path;

fn custom(path: &Path) -> ConfigType {
    ConfigType::Custom(path.to_string_lossy().into_owned())
}

#[test]
fn test_custom_config_ignores_environment() {
    let custom = ConfigType::Custom("custom/wampconf.json".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/wampconf.json");
}

#[test]
fn test_config_type_default_paths() {
    assert_eq!(ConfigType::WampConfig.default_path(), "wampconf.json");
    assert_eq!(ConfigType::WampSecret.default_path(), "wamp.secret");
}

#[test]
fn test_config_and_secret_loaded_together() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("wampconf.json");
    let secret_path = dir.path().join("wamp.secret");
    std::fs::write(
        &config_path,
        r#"{"ID": "plc3", "active": true, "url": "ws://broker:8888"}"#,
    )
    .unwrap();
    std::fs::write(&secret_path, "secret123").unwrap();

    let config = load_wamp_config(custom(&config_path), custom(&secret_path)).unwrap();

    let validated = config.validate().unwrap();
    assert_eq!(validated.id, "plc3");
    assert_eq!(validated.realm, "Automation");
    assert_eq!(validated.secret.as_deref(), Some(b"secret123".as_slice()));
}

#[test]
fn test_empty_secret_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let secret_path = dir.path().join("wamp.secret");
    std::fs::write(&secret_path, "").unwrap();

    let result = load_wamp_config(custom(&dir.path().join("missing.json")), custom(&secret_path));
    assert!(result.is_err());
}

#[test]
fn test_missing_files_give_deactivated_config() {
    let dir = tempfile::tempdir().unwrap();

    let config = load_wamp_config(
        custom(&dir.path().join("wampconf.json")),
        custom(&dir.path().join("wamp.secret")),
    )
    .unwrap();
    assert_eq!(config.active, Some(false));
    assert!(config.secret.is_none());
}
