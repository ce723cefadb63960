//! Machine-bound license key derivation.
//!
//! A license key is derived from a machine identifier with HMAC-SHA-256,
//! keyed by a fixed salt, and rendered as `XXXX-XXXX-XXXX` (uppercase hex).
//!
//! # Algorithm
//!
//! 1. Trim the machine identifier; an empty result yields no key.
//! 2. `HMAC-SHA-256(key = salt, message = trimmed id)`.
//! 3. Uppercase hex of the digest, first 12 characters (6 bytes).
//! 4. Split into three groups of four, joined by `-`.
//!
//! The mapping is a pure function of `(salt, trimmed id)`.
//!
//! # Example
//!
//! ```rust,ignore
//! use keygen::derivation::{derive_license_key, validate_license_key_format, DEFAULT_SALT};
//!
//! let key = derive_license_key(DEFAULT_SALT, "F742FA06-DF86-A54A-A541-7B2FA297AD93")?
//!     .expect("non-empty input");
//! assert!(validate_license_key_format(&key));
//! ```

use ring::hmac;
use regex::Regex;
use std::sync::OnceLock;

use crate::errors::LicenseResult;

/// Salt shipped with the generator. Treat it as configuration, not a secret.
pub const DEFAULT_SALT: &str = "fg_2026_modern_secure_99";

/// Size of an HMAC-SHA-256 digest in bytes.
pub const DIGEST_SIZE: usize = 32;

/// Number of hex characters kept from the digest.
pub const KEY_HEX_LENGTH: usize = 12;

/// Characters per hyphen-separated group.
pub const GROUP_LENGTH: usize = 4;

const KEY_PATTERN: &str = r"^[0-9A-F]{4}-[0-9A-F]{4}-[0-9A-F]{4}$";

/// Source of HMAC-SHA-256 digests.
///
/// The generator only ever talks to this trait, so a platform without a
/// working primitive (or a test) can plug in its own implementation.
pub trait HmacProvider: Send + Sync {
    /// Compute `HMAC-SHA-256(key, message)`.
    fn hmac_sha256(&self, key: &[u8], message: &[u8]) -> LicenseResult<[u8; DIGEST_SIZE]>;
}

/// HMAC-SHA-256 backed by `ring`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RingHmac;

impl HmacProvider for RingHmac {
    fn hmac_sha256(&self, key: &[u8], message: &[u8]) -> LicenseResult<[u8; DIGEST_SIZE]> {
        let key = hmac::Key::new(hmac::HMAC_SHA256, key);
        let tag = hmac::sign(&key, message);

        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(tag.as_ref());
        Ok(digest)
    }
}

/// Apply the trim rule to a raw machine identifier.
///
/// Returns `None` when nothing but whitespace was supplied.
pub fn normalize_machine_id(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Render a digest in canonical key form: `XXXX-XXXX-XXXX`.
///
/// Digests shorter than six bytes are rendered with whatever is available.
pub fn format_digest(digest: &[u8]) -> String {
    let hex = hex::encode_upper(digest);
    let raw = &hex[..hex.len().min(KEY_HEX_LENGTH)];

    raw.as_bytes()
        .chunks(GROUP_LENGTH)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}

/// Derive a license key with an explicit HMAC provider.
///
/// Returns `Ok(None)` for empty or whitespace-only input.
///
/// # Errors
///
/// Returns `LicenseError::DerivationUnavailable` if the provider fails.
pub fn derive_with(
    provider: &dyn HmacProvider,
    salt: &str,
    machine_id: &str,
) -> LicenseResult<Option<String>> {
    let Some(machine_id) = normalize_machine_id(machine_id) else {
        return Ok(None);
    };

    let digest = provider.hmac_sha256(salt.as_bytes(), machine_id.as_bytes())?;
    Ok(Some(format_digest(&digest)))
}

/// Derive a license key using the built-in `ring` provider.
pub fn derive_license_key(salt: &str, machine_id: &str) -> LicenseResult<Option<String>> {
    derive_with(&RingHmac, salt, machine_id)
}

fn key_regex() -> &'static Regex {
    static KEY_REGEX: OnceLock<Regex> = OnceLock::new();
    KEY_REGEX.get_or_init(|| Regex::new(KEY_PATTERN).expect("key pattern is a valid regex"))
}

/// Validate that a string has the exact shape of a derived key.
///
/// ```rust,ignore
/// use keygen::derivation::validate_license_key_format;
///
/// assert!(validate_license_key_format("5BDC-C146-BF60"));
/// assert!(!validate_license_key_format("5bdc-c146-bf60"));
/// ```
pub fn validate_license_key_format(key: &str) -> bool {
    key_regex().is_match(key)
}

/// Split a well-formed key into its three groups.
pub fn parse_license_key(key: &str) -> Option<[String; 3]> {
    if !validate_license_key_format(key) {
        return None;
    }

    let mut parts = key.split('-').map(str::to_string);
    Some([parts.next()?, parts.next()?, parts.next()?])
}
