//! Error types shared by every keygen module.

use thiserror::Error;

/// Everything that can go wrong while deriving keys or keeping history.
///
/// Empty input is deliberately absent: it is a normal "no key" outcome,
/// not an error.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The HMAC primitive could not produce a digest.
    #[error("key derivation unavailable: {0}")]
    DerivationUnavailable(String),

    /// File backed storage failed.
    #[error("storage error: {0}")]
    StorageError(#[from] std::io::Error),

    /// OS keyring backed storage failed.
    #[error("keyring error: {0}")]
    KeyringError(String),

    /// History snapshot could not be encoded or decoded.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Writing to the clipboard failed.
    #[error("clipboard error: {0}")]
    ClipboardError(String),

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Reading user input (stdin) failed.
    #[error("failed to read input: {0}")]
    InputError(std::io::Error),

    /// A history entry was requested that does not exist.
    #[error("no history entry at index {0}")]
    HistoryIndexOutOfRange(usize),
}

impl LicenseError {
    /// Returns true if the failure came from the persistence layer.
    ///
    /// Callers use this to tell "key derived but not saved" apart from
    /// "no key at all".
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            LicenseError::StorageError(_)
                | LicenseError::KeyringError(_)
                | LicenseError::SerializationError(_)
        )
    }
}

pub type LicenseResult<T> = Result<T, LicenseError>;
