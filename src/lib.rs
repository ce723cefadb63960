//! Keygen - machine-bound license keys with a local history
//!
//! A license key is `HMAC-SHA-256(salt, machine id)`, cut to six bytes and
//! written as `XXXX-XXXX-XXXX`. The last ten distinct derivations are kept in
//! local storage.
//!
//! # Features
//!
//! - `clipboard` - System clipboard support via arboard. Enabled by default.
//! - `keyring-store` - OS keyring as a history backend. Enabled by default.
//!
//! # Example
//!
//! ```rust,ignore
//! use keygen::clipboard::MemoryClipboard;
//! use keygen::config::get_config;
//! use keygen::generator::LicenseGenerator;
//!
//! let generator = LicenseGenerator::from_config(get_config()?, Box::new(MemoryClipboard::new()))?;
//! let outcome = generator.generate("F742FA06-DF86-A54A-A541-7B2FA297AD93").await?;
//! ```

pub mod clipboard;
pub mod config;
pub mod derivation;
pub mod errors;
pub mod generator;
pub mod history;
pub mod history_store;
pub mod logging;
pub mod storage;

pub use derivation::derive_license_key;
pub use errors::{LicenseError, LicenseResult};
pub use generator::{GenerateOutcome, LicenseGenerator};
pub use history::{Generation, History};
