//! Configuration system for keygen.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `keygen.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `KEYGEN_SALT` - HMAC salt used for key derivation
//! - `KEYGEN_STORAGE_BACKEND` - History backend: file, keyring or memory
//! - `KEYGEN_STORAGE_DIR` - Directory for the file backend
//! - `KEYGEN_COPY_RESET_MS` - Delay before the "copied" flag resets
//! - `KEYGEN_LOGGING_ENABLED` - Enable log output
//! - `KEYGEN_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::Config;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use crate::derivation::DEFAULT_SALT;
use crate::errors::{LicenseError, LicenseResult};

/// Global configuration singleton.
static CONFIG: OnceLock<KeygenConfig> = OnceLock::new();

/// Default delay before the copied indicator resets.
pub const DEFAULT_COPY_RESET_MS: u64 = 2000;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeygenConfig {
    /// Key derivation configuration
    pub license: LicenseConfig,
    /// History storage configuration
    pub storage: StorageConfig,
    /// Clipboard feedback configuration
    pub clipboard: ClipboardConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Key derivation configuration.
///
/// The salt ships with every build and is not a secret.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    pub salt: String,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            salt: DEFAULT_SALT.to_string(),
        }
    }
}

/// History storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend: "file", "keyring" or "memory"
    pub backend: String,
    /// Directory for the file backend. Empty means the platform data dir.
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            dir: String::new(),
        }
    }
}

impl StorageConfig {
    /// Resolve the directory used by the file backend.
    ///
    /// - Windows: `%APPDATA%\keygen\`
    /// - macOS: `~/Library/Application Support/keygen/`
    /// - Linux: `~/.local/share/keygen/`
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        if self.dir.is_empty() {
            dirs::data_dir().map(|p| p.join("keygen"))
        } else {
            Some(PathBuf::from(&self.dir))
        }
    }
}

/// Clipboard feedback configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    /// Milliseconds before the copied flag goes back to false
    pub reset_ms: u64,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            reset_ms: DEFAULT_COPY_RESET_MS,
        }
    }
}

impl ClipboardConfig {
    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
        }
    }
}

fn config_err(e: config::ConfigError) -> LicenseError {
    LicenseError::ConfigError(e.to_string())
}

impl KeygenConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `keygen.toml` file (optional)
    /// 3. Environment variables
    pub fn load() -> LicenseResult<Self> {
        let builder = Config::builder()
            .set_default("license.salt", DEFAULT_SALT)
            .map_err(config_err)?
            .set_default("storage.backend", "file")
            .map_err(config_err)?
            .set_default("storage.dir", "")
            .map_err(config_err)?
            .set_default("clipboard.reset_ms", DEFAULT_COPY_RESET_MS)
            .map_err(config_err)?
            .set_default("logging.enabled", false)
            .map_err(config_err)?
            .set_default("logging.level", "info")
            .map_err(config_err)?
            .add_source(config::File::with_name("keygen").required(false))
            .set_override_option("license.salt", env::var("KEYGEN_SALT").ok())
            .map_err(config_err)?
            .set_override_option("storage.backend", env::var("KEYGEN_STORAGE_BACKEND").ok())
            .map_err(config_err)?
            .set_override_option("storage.dir", env::var("KEYGEN_STORAGE_DIR").ok())
            .map_err(config_err)?
            .set_override_option(
                "clipboard.reset_ms",
                env::var("KEYGEN_COPY_RESET_MS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(config_err)?
            .set_override_option(
                "logging.enabled",
                env::var("KEYGEN_LOGGING_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(config_err)?
            .set_override_option("logging.level", env::var("KEYGEN_LOG_LEVEL").ok())
            .map_err(config_err)?;

        let settings = builder
            .build()
            .map_err(|e| LicenseError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| LicenseError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.license.salt.is_empty() {
            return Err(LicenseError::ConfigError(
                "license.salt cannot be empty".to_string(),
            ));
        }

        match self.storage.backend.as_str() {
            "file" | "keyring" | "memory" => {}
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "storage.backend must be 'file', 'keyring' or 'memory', got '{other}'"
                )));
            }
        }

        if self.clipboard.reset_ms == 0 {
            return Err(LicenseError::ConfigError(
                "clipboard.reset_ms must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
/// Returns an error if configuration loading or validation fails.
pub fn get_config() -> LicenseResult<&'static KeygenConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = KeygenConfig::load()?;
    config.validate()?;

    // Another thread may have won the race; either value is equivalent.
    let _ = CONFIG.set(config);

    CONFIG
        .get()
        .ok_or_else(|| LicenseError::ConfigError("configuration not initialised".to_string()))
}

/// Initialize configuration explicitly.
///
/// Call this early in your application to catch configuration errors.
pub fn init_config() -> LicenseResult<&'static KeygenConfig> {
    get_config()
}
