use std::env;
use std::time::Duration;

use serial_test::serial;

use keygen::config::KeygenConfig;
use keygen::derivation::DEFAULT_SALT;

const VARS: &[&str] = &[
    "KEYGEN_SALT",
    "KEYGEN_STORAGE_BACKEND",
    "KEYGEN_STORAGE_DIR",
    "KEYGEN_COPY_RESET_MS",
    "KEYGEN_LOGGING_ENABLED",
    "KEYGEN_LOG_LEVEL",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn defaults_load_without_file_or_env() {
    clear_env();

    let config = KeygenConfig::load().expect("config should load");
    assert_eq!(config.license.salt, DEFAULT_SALT);
    assert_eq!(config.storage.backend, "file");
    assert_eq!(config.clipboard.reset_delay(), Duration::from_millis(2000));
    assert!(!config.logging.enabled);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn env_overrides_defaults() {
    clear_env();
    env::set_var("KEYGEN_SALT", "custom-salt");
    env::set_var("KEYGEN_STORAGE_BACKEND", "memory");
    env::set_var("KEYGEN_COPY_RESET_MS", "500");
    env::set_var("KEYGEN_LOGGING_ENABLED", "true");
    env::set_var("KEYGEN_LOG_LEVEL", "debug");

    let config = KeygenConfig::load().expect("config should load");
    clear_env();

    assert_eq!(config.license.salt, "custom-salt");
    assert_eq!(config.storage.backend, "memory");
    assert_eq!(config.clipboard.reset_ms, 500);
    assert!(config.logging.enabled);
    assert_eq!(config.logging.level, "debug");
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn invalid_backend_fails_validation() {
    clear_env();
    env::set_var("KEYGEN_STORAGE_BACKEND", "cloud");

    let config = KeygenConfig::load().expect("config should load");
    clear_env();

    assert!(config.validate().is_err());
}
