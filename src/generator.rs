//! Key generation session.
//!
//! [`LicenseGenerator`] is what a front end talks to: it turns raw input into
//! the current key, records new keys in history and drives the copy flag.
//!
//! Derivations run on tokio's blocking pool and may overlap. Every request
//! gets a sequence number; a completion is applied only if no newer request
//! has been issued since, so a slow result can never overwrite a newer one.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::clipboard::{ClipboardWriter, CopyFeedback};
use crate::config::KeygenConfig;
use crate::derivation::{derive_with, normalize_machine_id, HmacProvider, RingHmac};
use crate::errors::{LicenseError, LicenseResult};
use crate::history::{Generation, History};
use crate::history_store::HistoryStore;
use crate::logging::{log_generation_event, GenerationEvent};
use crate::storage::{open_store, KeyValueStore};

/// Result of a [`LicenseGenerator::generate`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// Input was blank; the current key was cleared.
    Cleared,
    /// A key was derived and is now current.
    Derived {
        key: String,
        /// Whether a new history entry was added
        recorded: bool,
    },
    /// A newer request was issued before this one completed.
    Superseded,
}

#[derive(Debug, Default)]
struct SessionState {
    latest_request: u64,
    current_key: Option<String>,
}

pub struct LicenseGenerator {
    salt: Arc<str>,
    provider: Arc<dyn HmacProvider>,
    state: Mutex<SessionState>,
    history: Mutex<HistoryStore>,
    feedback: CopyFeedback,
}

impl LicenseGenerator {
    pub fn new(salt: impl Into<Arc<str>>, history: HistoryStore, feedback: CopyFeedback) -> Self {
        Self {
            salt: salt.into(),
            provider: Arc::new(RingHmac),
            state: Mutex::new(SessionState::default()),
            history: Mutex::new(history),
            feedback,
        }
    }

    /// Build a generator from explicit parts.
    pub fn with_parts(
        salt: impl Into<Arc<str>>,
        store: Box<dyn KeyValueStore>,
        clipboard: Box<dyn ClipboardWriter>,
        reset_delay: Duration,
    ) -> Self {
        Self::new(
            salt,
            HistoryStore::open(store),
            CopyFeedback::with_reset_delay(clipboard, reset_delay),
        )
    }

    /// Build a generator from configuration, opening the configured store.
    pub fn from_config(
        config: &KeygenConfig,
        clipboard: Box<dyn ClipboardWriter>,
    ) -> LicenseResult<Self> {
        let store = open_store(&config.storage)?;
        Ok(Self::with_parts(
            config.license.salt.as_str(),
            store,
            clipboard,
            config.clipboard.reset_delay(),
        ))
    }

    /// Replace the HMAC provider.
    pub fn with_provider(mut self, provider: Arc<dyn HmacProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Derive the key for `input` and record it.
    ///
    /// # Errors
    ///
    /// - `DerivationUnavailable` if the HMAC primitive failed. The current
    ///   key is left as it was.
    /// - A storage error if the key was derived but history could not be
    ///   written. The key is current and the entry is kept in memory.
    pub async fn generate(&self, input: &str) -> LicenseResult<GenerateOutcome> {
        let request = {
            let mut state = self.state.lock();
            state.latest_request += 1;
            state.latest_request
        };

        let Some(machine_id) = normalize_machine_id(input).map(str::to_string) else {
            let mut state = self.state.lock();
            if state.latest_request != request {
                return Ok(GenerateOutcome::Superseded);
            }
            state.current_key = None;
            drop(state);
            log_generation_event(GenerationEvent::Cleared, "", None);
            return Ok(GenerateOutcome::Cleared);
        };

        let provider = Arc::clone(&self.provider);
        let salt = Arc::clone(&self.salt);
        let id = machine_id.clone();
        let result =
            match tokio::task::spawn_blocking(move || derive_with(provider.as_ref(), &salt, &id))
                .await
            {
                Ok(result) => result,
                Err(e) => Err(LicenseError::DerivationUnavailable(format!(
                    "derivation task failed: {e}"
                ))),
            };

        // Lock order is state, then history, so the applied key and the
        // history head always come from the same request.
        let mut state = self.state.lock();
        if state.latest_request != request {
            debug!(request, latest = state.latest_request, "Discarding stale derivation");
            log_generation_event(GenerationEvent::Superseded, &machine_id, None);
            return Ok(GenerateOutcome::Superseded);
        }

        let key = match result {
            Ok(Some(key)) => key,
            Ok(None) => {
                state.current_key = None;
                return Ok(GenerateOutcome::Cleared);
            }
            Err(e) => {
                error!(error = %e, "Error generating key");
                log_generation_event(
                    GenerationEvent::DerivationFailed,
                    &machine_id,
                    Some(&e.to_string()),
                );
                return Err(e);
            }
        };

        state.current_key = Some(key.clone());
        self.feedback.reset();
        log_generation_event(GenerationEvent::Derived, &machine_id, Some(&key));

        let recorded = self
            .history
            .lock()
            .record(Generation::new(machine_id.as_str(), key.as_str()));
        drop(state);

        let recorded = recorded?;
        if recorded {
            log_generation_event(GenerationEvent::Recorded, &machine_id, Some(&key));
        }

        Ok(GenerateOutcome::Derived { key, recorded })
    }

    /// The key shown to the user, if any.
    pub fn current_key(&self) -> Option<String> {
        self.state.lock().current_key.clone()
    }

    /// Snapshot of the history, newest first.
    pub fn history(&self) -> History {
        self.history.lock().history().clone()
    }

    pub fn clear_history(&self) -> LicenseResult<()> {
        self.history.lock().clear()?;
        log_generation_event(GenerationEvent::HistoryCleared, "", None);
        Ok(())
    }

    /// Copy the current key. Returns the copied key.
    pub fn copy_current(&self) -> LicenseResult<Option<String>> {
        let Some(key) = self.current_key() else {
            return Ok(None);
        };
        self.feedback.copy(&key)?;
        log_generation_event(GenerationEvent::Copied, "", Some(&key));
        Ok(Some(key))
    }

    /// Copy the key of history entry `index` (0 = newest).
    pub fn copy_history_entry(&self, index: usize) -> LicenseResult<Generation> {
        let generation = self
            .history
            .lock()
            .history()
            .get(index)
            .cloned()
            .ok_or(LicenseError::HistoryIndexOutOfRange(index))?;

        self.feedback.copy(&generation.key)?;
        log_generation_event(
            GenerationEvent::Copied,
            &generation.machine_id,
            Some(&generation.key),
        );
        Ok(generation)
    }

    pub fn is_copied(&self) -> bool {
        self.feedback.is_copied()
    }
}

impl std::fmt::Debug for LicenseGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseGenerator")
            .field("state", &*self.state.lock())
            .field("feedback", &self.feedback)
            .finish_non_exhaustive()
    }
}
