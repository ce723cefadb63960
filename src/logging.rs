//! Log output setup and structured generation events.
//!
//! # Usage
//!
//! ```rust,ignore
//! use keygen::logging::{init_logging, log_generation_event, GenerationEvent};
//!
//! init_logging(&config.logging)?;
//! log_generation_event(GenerationEvent::Derived, "F742FA06-...", Some("5BDC-C146-BF60"));
//! ```

use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing::{info, info_span, warn, Level};

use crate::config::LoggingConfig;
use crate::errors::{LicenseError, LicenseResult};

/// Key generation event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationEvent {
    /// A key was derived and became the current key
    Derived,
    /// The derived key was added to history
    Recorded,
    /// Input was empty, current key cleared
    Cleared,
    /// A completed derivation was older than the latest request
    Superseded,
    /// The HMAC primitive failed
    DerivationFailed,
    /// A key was copied to the clipboard
    Copied,
    /// History was cleared
    HistoryCleared,
}

impl std::fmt::Display for GenerationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GenerationEvent::Derived => "derived",
            GenerationEvent::Recorded => "recorded",
            GenerationEvent::Cleared => "cleared",
            GenerationEvent::Superseded => "superseded",
            GenerationEvent::DerivationFailed => "derivation_failed",
            GenerationEvent::Copied => "copied",
            GenerationEvent::HistoryCleared => "history_cleared",
        };
        write!(f, "{}", s)
    }
}

/// Log a generation event with the machine id it concerns.
pub fn log_generation_event(event: GenerationEvent, machine_id: &str, details: Option<&str>) {
    let span = info_span!(
        "generation_event",
        event = %event,
        machine_id = %machine_id,
    );
    let _enter = span.enter();

    match event {
        GenerationEvent::DerivationFailed => {
            if let Some(d) = details {
                warn!(reason = %d, "Generation event occurred");
            } else {
                warn!("Generation event occurred");
            }
        }
        _ => {
            if let Some(d) = details {
                info!(details = %d, "Generation event occurred");
            } else {
                info!("Generation event occurred");
            }
        }
    }
}

/// Map the configured level and enabled flag to a filter.
pub fn level_filter(config: &LoggingConfig) -> LicenseResult<LevelFilter> {
    if !config.enabled {
        return Ok(LevelFilter::OFF);
    }

    Level::from_str(&config.level)
        .map(LevelFilter::from_level)
        .map_err(|_| LicenseError::ConfigError(format!("invalid log level '{}'", config.level)))
}

/// Install the global fmt subscriber, writing to stderr.
///
/// Calling this more than once is harmless; later calls keep the first
/// subscriber.
pub fn init_logging(config: &LoggingConfig) -> LicenseResult<()> {
    let filter = level_filter(config)?;

    let _ = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    Ok(())
}
