//! Load-once, write-through persistence for [`History`].
//!
//! The full snapshot lives under a single storage key, [`HISTORY_KEY`], as a
//! JSON array of generations (newest first). It is read once when the store
//! is opened and rewritten after every change. A missing or unreadable
//! snapshot is treated as an empty history.

use tracing::{debug, warn};

use crate::errors::LicenseResult;
use crate::history::{Generation, History};
use crate::storage::KeyValueStore;

/// Logical storage key of the history snapshot.
pub const HISTORY_KEY: &str = "license_history";

pub struct HistoryStore {
    store: Box<dyn KeyValueStore>,
    history: History,
}

impl HistoryStore {
    /// Rehydrate history from `store`.
    ///
    /// Never fails: read and parse errors are logged and yield an empty
    /// history.
    pub fn open(store: Box<dyn KeyValueStore>) -> Self {
        let history = match store.get(HISTORY_KEY) {
            Ok(Some(raw)) => History::from_json(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to load history, starting empty");
                History::new()
            }),
            Ok(None) => History::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read history, starting empty");
                History::new()
            }
        };

        debug!(entries = history.len(), "History loaded");
        Self { store, history }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Record `generation` if its machine id differs from the newest entry.
    ///
    /// Returns whether the history changed. A changed history is written
    /// through immediately; if that write fails the in-memory change stays
    /// and the error is returned.
    pub fn record(&mut self, generation: Generation) -> LicenseResult<bool> {
        if !self.history.record_if_new(generation) {
            return Ok(false);
        }

        self.save()?;
        Ok(true)
    }

    /// Write the current snapshot to storage.
    pub fn save(&self) -> LicenseResult<()> {
        let json = self.history.to_json()?;
        self.store.set(HISTORY_KEY, &json)
    }

    /// Empty the history and remove the persisted snapshot.
    pub fn clear(&mut self) -> LicenseResult<()> {
        self.history.clear();
        self.store.remove(HISTORY_KEY)
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}
