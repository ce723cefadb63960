use std::time::Duration;

use keygen::clipboard::MemoryClipboard;
use keygen::generator::{GenerateOutcome, LicenseGenerator};
use keygen::history::{Generation, HISTORY_LIMIT};
use keygen::history_store::{HistoryStore, HISTORY_KEY};
use keygen::storage::{FileStore, KeyValueStore};

fn file_generator(store: &FileStore) -> LicenseGenerator {
    LicenseGenerator::with_parts(
        "test-salt",
        Box::new(store.clone()),
        Box::new(MemoryClipboard::new()),
        Duration::from_millis(50),
    )
}

#[tokio::test]
async fn fifteen_distinct_ids_keep_latest_ten() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let generator = file_generator(&store);

    for i in 0..15 {
        let outcome = generator.generate(&format!("machine-{i}")).await.unwrap();
        assert!(matches!(outcome, GenerateOutcome::Derived { recorded: true, .. }));
    }

    let history = generator.history();
    assert_eq!(history.len(), HISTORY_LIMIT);
    let ids: Vec<_> = history.entries().iter().map(|g| g.machine_id.clone()).collect();
    let expected: Vec<_> = (5..15).rev().map(|i| format!("machine-{i}")).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn dedup_only_applies_to_the_head() {
    let dir = tempfile::tempdir().unwrap();
    let generator = file_generator(&FileStore::new(dir.path()));

    generator.generate("A").await.unwrap();
    generator.generate("A").await.unwrap();
    assert_eq!(generator.history().len(), 1);

    generator.generate("B").await.unwrap();
    generator.generate("A").await.unwrap();
    let ids: Vec<_> = generator
        .history()
        .entries()
        .iter()
        .map(|g| g.machine_id.clone())
        .collect();
    assert_eq!(ids, ["A", "B", "A"]);
}

#[tokio::test]
async fn history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());

    let before = {
        let generator = file_generator(&store);
        for id in ["first", "second", "third"] {
            generator.generate(id).await.unwrap();
        }
        generator.history()
    };

    let reopened = file_generator(&store);
    assert_eq!(reopened.history(), before);

    let raw = store.get(HISTORY_KEY).unwrap().unwrap();
    assert!(raw.contains(r#""machineId":"third""#));
}

#[tokio::test]
async fn blank_input_does_not_touch_storage() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let generator = file_generator(&store);

    assert_eq!(generator.generate("   ").await.unwrap(), GenerateOutcome::Cleared);
    assert!(generator.history().is_empty());
    assert_eq!(store.get(HISTORY_KEY).unwrap(), None);
}

#[test]
fn clear_is_idempotent_and_removes_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());

    let mut empty = HistoryStore::open(Box::new(store.clone()));
    empty.clear().unwrap();
    assert!(empty.history().is_empty());
    assert_eq!(store.get(HISTORY_KEY).unwrap(), None);

    let mut populated = HistoryStore::open(Box::new(store.clone()));
    populated
        .record(Generation::with_timestamp("m", "AAAA-BBBB-CCCC", 42))
        .unwrap();
    assert!(dir.path().join("license_history.json").exists());

    populated.clear().unwrap();
    assert!(populated.history().is_empty());
    assert_eq!(store.get(HISTORY_KEY).unwrap(), None);
    assert!(!dir.path().join("license_history.json").exists());
}

#[test]
fn corrupt_file_starts_empty_and_is_replaced_on_next_write() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    store.set(HISTORY_KEY, "[{\"machineId\": 3").unwrap();

    let mut history = HistoryStore::open(Box::new(store.clone()));
    assert!(history.history().is_empty());

    history
        .record(Generation::with_timestamp("m", "AAAA-BBBB-CCCC", 42))
        .unwrap();
    let reopened = HistoryStore::open(Box::new(store));
    assert_eq!(reopened.history().len(), 1);
    assert_eq!(reopened.history().head().unwrap().timestamp, 42);
}
