//! Bounded, most-recent-first log of past key derivations.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::LicenseResult;

/// Maximum number of generations kept in history.
pub const HISTORY_LIMIT: usize = 10;

/// One completed key derivation.
///
/// Serialized as `{"machineId": ..., "key": ..., "timestamp": <unix millis>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    /// Trimmed, non-empty machine identifier that produced the key
    pub machine_id: String,
    /// Derived key in canonical `XXXX-XXXX-XXXX` form
    pub key: String,
    /// Creation instant, Unix epoch milliseconds
    pub timestamp: i64,
}

impl Generation {
    /// Create a generation stamped with the current time.
    pub fn new(machine_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self::with_timestamp(machine_id, key, Utc::now().timestamp_millis())
    }

    pub fn with_timestamp(
        machine_id: impl Into<String>,
        key: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            machine_id: machine_id.into(),
            key: key.into(),
            timestamp,
        }
    }
}

/// Ordered generations, newest first, never more than [`HISTORY_LIMIT`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<Generation>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `generation` unless the head already has the same machine id.
    ///
    /// Returns `true` if the history changed. The tail is truncated to
    /// [`HISTORY_LIMIT`] entries.
    pub fn record_if_new(&mut self, generation: Generation) -> bool {
        if self
            .head()
            .is_some_and(|head| head.machine_id == generation.machine_id)
        {
            return false;
        }

        self.entries.insert(0, generation);
        self.entries.truncate(HISTORY_LIMIT);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Most recent generation, if any.
    pub fn head(&self) -> Option<&Generation> {
        self.entries.first()
    }

    pub fn get(&self, index: usize) -> Option<&Generation> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[Generation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a persisted snapshot.
    ///
    /// Snapshots longer than the limit are cut down to the newest entries.
    pub fn from_json(raw: &str) -> LicenseResult<Self> {
        let mut history: History = serde_json::from_str(raw)?;
        history.entries.truncate(HISTORY_LIMIT);
        Ok(history)
    }

    pub fn to_json(&self) -> LicenseResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generation(id: &str, ts: i64) -> Generation {
        Generation::with_timestamp(id, format!("KEY-{id}"), ts)
    }

    #[test]
    fn keeps_ten_most_recent_distinct_ids() {
        let mut history = History::new();
        for i in 0..15 {
            assert!(history.record_if_new(generation(&format!("machine-{i}"), i)));
        }

        assert_eq!(history.len(), HISTORY_LIMIT);
        let ids: Vec<_> = history
            .entries()
            .iter()
            .map(|g| g.machine_id.clone())
            .collect();
        let expected: Vec<_> = (5..15).rev().map(|i| format!("machine-{i}")).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn repeated_id_at_head_is_not_duplicated() {
        let mut history = History::new();
        assert!(history.record_if_new(generation("a", 1)));
        assert!(!history.record_if_new(generation("a", 2)));
        assert_eq!(history.len(), 1);
        assert_eq!(history.head().unwrap().timestamp, 1);
    }

    #[test]
    fn same_id_after_another_is_recorded_again() {
        let mut history = History::new();
        history.record_if_new(generation("a", 1));
        history.record_if_new(generation("b", 2));
        history.record_if_new(generation("a", 3));

        let ids: Vec<_> = history.entries().iter().map(|g| g.machine_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "a"]);
    }

    #[test]
    fn clear_empties_any_history() {
        let mut empty = History::new();
        empty.clear();
        assert!(empty.is_empty());

        let mut populated = History::new();
        populated.record_if_new(generation("a", 1));
        populated.clear();
        assert!(populated.is_empty());
    }

    #[test]
    fn json_uses_camel_case_fields() {
        let mut history = History::new();
        history.record_if_new(Generation::with_timestamp("id-1", "ABCD-EF01-2345", 1_700_000_000_000));

        let json = history.to_json().unwrap();
        assert_eq!(
            json,
            r#"[{"machineId":"id-1","key":"ABCD-EF01-2345","timestamp":1700000000000}]"#
        );
        assert_eq!(History::from_json(&json).unwrap(), history);
    }

    #[test]
    fn oversized_snapshot_is_truncated_on_load() {
        let entries: Vec<_> = (0..12).map(|i| generation(&format!("m{i}"), i)).collect();
        let json = serde_json::to_string(&entries).unwrap();

        let history = History::from_json(&json).unwrap();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.head().unwrap().machine_id, "m0");
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        assert!(History::from_json("{not json").is_err());
        assert!(History::from_json(r#"{"machineId":"x"}"#).is_err());
    }
}
