//! Record store behavior through the public API: copy isolation, seeding,
//! atomic writes and snapshot compatibility.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};

use vitalstore::{
    AlertKind, Document, DocumentId, InMemoryBackend, KeyValueBackend, RecordStore, SeedOutcome,
    Severity, StorageError, StoreConfig, VitalsError, VitalsSample,
};

fn shared_store() -> (Arc<InMemoryBackend>, RecordStore) {
    let backend = Arc::new(InMemoryBackend::new());
    let store = RecordStore::open(Arc::clone(&backend), StoreConfig::default()).unwrap();
    (backend, store)
}

fn herd() -> Vec<Document> {
    vec![
        Document::new("C-01", "cow"),
        Document::new("G-01", "goat"),
        Document::new("S-01", "sheep"),
    ]
}

#[test]
fn test_list_returns_copies() {
    let store = RecordStore::in_memory();
    store.seed_if_empty(herd()).unwrap();

    let mut listed = store.list().unwrap();
    listed[0].tag = "tampered".to_string();
    listed[0].alerts.clear();
    listed.pop();

    let again = store.list().unwrap();
    assert_eq!(again.len(), 3);
    assert!(again.iter().all(|d| d.tag != "tampered"));
}

#[test]
fn test_seed_assigns_positional_ids_once() {
    let store = RecordStore::in_memory();

    let first = store.seed_if_empty(herd()).unwrap();
    assert_eq!(
        first,
        SeedOutcome::Seeded {
            ids: vec!["animal_1".into(), "animal_2".into(), "animal_3".into()],
        }
    );

    let second = store.seed_if_empty(herd()).unwrap();
    assert_eq!(second, SeedOutcome::Skipped { existing: 3 });
    assert_eq!(store.len().unwrap(), 3);
    assert_eq!(store.get(&"animal_2".into()).unwrap().species, "goat");
}

#[test]
fn test_seed_keeps_explicit_ids() {
    let store = RecordStore::in_memory();
    let docs = vec![
        Document::new("C-01", "cow").with_id("barn_7"),
        Document::new("C-02", "cow"),
    ];
    store.seed_if_empty(docs).unwrap();

    assert!(store.contains(&"barn_7".into()).unwrap());
    assert!(store.contains(&"animal_2".into()).unwrap());
}

#[test]
fn test_generated_ids_use_prefix() {
    let config = StoreConfig {
        id_prefix: "herd".to_string(),
        ..StoreConfig::default()
    };
    let store = RecordStore::open(InMemoryBackend::new(), config).unwrap();
    let id = store.put(Document::new("C-01", "cow")).unwrap();
    assert!(id.as_str().starts_with("herd_"));
}

#[test]
fn test_failed_bulk_insert_changes_nothing() {
    let (backend, store) = shared_store();
    store.seed_if_empty(herd()).unwrap();
    let before = store.list().unwrap();

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    store.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    backend.set_unavailable(true);
    let err = store
        .bulk_insert(vec![
            Document::new("C-09", "cow"),
            Document::new("C-01", "cow").with_id("animal_1"),
        ])
        .unwrap_err();
    assert!(matches!(err, StorageError::PersistenceUnavailable(_)));

    assert_eq!(store.list().unwrap(), before);
    assert_eq!(notified.load(Ordering::SeqCst), 0);

    backend.set_unavailable(false);
    store.put(Document::new("C-10", "cow")).unwrap();
    assert_eq!(notified.load(Ordering::SeqCst), 1);
}

#[test]
fn test_state_survives_reopen_on_same_backend() {
    let (backend, store) = shared_store();
    let id = store
        .put(
            Document::new("C-01", "cow").with_vitals(vec![VitalsSample::at(Utc::now())
                .temperature(38.7)
                .weight(410.0)]),
        )
        .unwrap();
    let written = store.get(&id).unwrap();
    drop(store);

    let reopened = RecordStore::open(backend, StoreConfig::default()).unwrap();
    let read = reopened.get(&id).unwrap();
    assert_eq!(read.tag, written.tag);
    assert_eq!(read.vitals_history.len(), 1);
    assert_eq!(read.vitals_history[0].temperature, Some(38.7));
}

#[test]
fn test_reads_legacy_snapshot() {
    let legacy = r#"{
        "animal_1": {
            "_id": "animal_1",
            "tag": "C-01",
            "species": "cow",
            "gender": "female",
            "pen": "north",
            "vitals_history": [
                {"ts": 1700000000000, "temp": 40.2, "hr": 95, "weight": 300, "feed_intake": 4.5}
            ],
            "alerts": [
                {"type": "fever", "severity": "critical", "message": "High temperature: 40.2 °C"}
            ],
            "synced": false
        }
    }"#;
    let backend = Arc::new(InMemoryBackend::with_value("livestock_db_docs_v1", legacy));
    let store = RecordStore::open(Arc::clone(&backend), StoreConfig::default()).unwrap();

    let doc = store.get(&"animal_1".into()).unwrap();
    let sample = &doc.vitals_history[0];
    assert_eq!(sample.timestamp, Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
    assert_eq!(sample.temperature, Some(40.2));
    assert_eq!(sample.heart_rate, Some(95));
    assert_eq!(sample.weight, Some(300.0));
    assert_eq!(doc.alerts[0].kind, AlertKind::Fever);
    assert_eq!(doc.alerts[0].severity, Severity::Critical);
    assert_eq!(doc.extra["pen"], "north");

    // Unknown fields survive a rewrite.
    store.acknowledge_sync(&"animal_1".into()).unwrap();
    let raw = backend.load("livestock_db_docs_v1").unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["animal_1"]["pen"], "north");
    assert_eq!(json["animal_1"]["synced"], true);
}

#[test]
fn test_corrupt_snapshot_policy() {
    let corrupt = || InMemoryBackend::with_value("livestock_db_docs_v1", "{\"animal_1\": [");

    let err = RecordStore::open(corrupt(), StoreConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        VitalsError::Storage(StorageError::CorruptSnapshot { .. })
    ));

    let lenient = StoreConfig {
        recover_corrupt_snapshot: true,
        ..StoreConfig::default()
    };
    let store = RecordStore::open(corrupt(), lenient).unwrap();
    assert!(store.is_empty().unwrap());
}

#[test]
fn test_invalid_config_rejected_at_open() {
    let config = StoreConfig {
        storage_key: "../etc/passwd".to_string(),
        ..StoreConfig::default()
    };
    let err = RecordStore::open(InMemoryBackend::new(), config).unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_summary_and_tag_order() {
    let store = RecordStore::in_memory();
    store
        .seed_if_empty(vec![
            Document::new("Z-9", "cow"),
            Document::new("A-1", "goat"),
            Document::new("M-5", "sheep"),
        ])
        .unwrap();

    let tags: Vec<String> = store.list_by_tag().unwrap().into_iter().map(|d| d.tag).collect();
    assert_eq!(tags, ["A-1", "M-5", "Z-9"]);

    let summary = store.summary().unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.healthy, 3);
    assert_eq!(summary.with_alerts, 0);
    assert_eq!(summary.unsynced, 3);

    let id: DocumentId = "animal_1".into();
    store.acknowledge_sync(&id).unwrap();
    assert_eq!(store.summary().unwrap().unsynced, 2);
}
