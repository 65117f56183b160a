//! Durability tests for the file backend.
//!
//! These tests verify that the storage layer correctly handles:
//! - Reopening a data directory after the process lets go of it
//! - CRC corruption and truncation detection
//! - Exclusive ownership of a data directory

#![cfg(feature = "persistent")]

use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use vitalstore::storage::persistent::{open_store, PersistentConfig, MAGIC};
use vitalstore::{
    Document, DocumentId, RecordStore, SimulationDriver, StorageError, StoreConfig, VitalsError,
};

fn snapshot_file(dir: &std::path::Path) -> std::path::PathBuf {
    dir.join("livestock_db_docs_v1.snap")
}

#[test]
fn test_reopen_restores_documents() {
    let dir = tempdir().unwrap();
    let id: DocumentId = "animal_1".into();

    let simulated = {
        let store = Arc::new(open_store(dir.path(), StoreConfig::default(), None).unwrap());
        store
            .seed_if_empty(vec![Document::new("C-01", "cow"), Document::new("G-01", "goat")])
            .unwrap();
        let driver = SimulationDriver::new(Arc::clone(&store));
        driver.simulate(&id).unwrap()
    };

    let store = open_store(dir.path(), StoreConfig::default(), None).unwrap();
    assert_eq!(store.len().unwrap(), 2);
    let restored = store.get(&id).unwrap();
    assert_eq!(restored.vitals_history.len(), 1);
    assert_eq!(restored.alerts, simulated.alerts);
    assert_eq!(restored.synced, simulated.synced);
    let (before, after) = (
        simulated.vitals_history[0].temperature.unwrap(),
        restored.vitals_history[0].temperature.unwrap(),
    );
    assert!((before - after).abs() < 1e-9);

    let bytes = fs::read(snapshot_file(dir.path())).unwrap();
    assert_eq!(&bytes[..4], &MAGIC);
}

#[test]
fn test_second_open_is_refused() {
    let dir = tempdir().unwrap();
    let _owner = open_store(dir.path(), StoreConfig::default(), None).unwrap();

    let err = open_store(dir.path(), StoreConfig::default(), None).unwrap_err();
    assert!(err.is_retryable());
}

#[test]
fn test_flipped_byte_is_detected() {
    let dir = tempdir().unwrap();
    {
        let store = open_store(dir.path(), StoreConfig::default(), None).unwrap();
        store.put(Document::new("C-01", "cow")).unwrap();
    }

    let path = snapshot_file(dir.path());
    let mut bytes = fs::read(&path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x20;
    fs::write(&path, bytes).unwrap();

    let err = open_store(dir.path(), StoreConfig::default(), None).unwrap_err();
    assert!(matches!(
        err,
        VitalsError::Storage(StorageError::CorruptSnapshot { ref reason, .. })
            if reason.contains("CRC")
    ));
}

#[test]
fn test_truncated_snapshot_can_be_discarded() {
    let dir = tempdir().unwrap();
    {
        let store = open_store(dir.path(), StoreConfig::default(), None).unwrap();
        store.put(Document::new("C-01", "cow")).unwrap();
    }

    let path = snapshot_file(dir.path());
    let size = fs::metadata(&path).unwrap().len();
    fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(size * 4 / 5)
        .unwrap();

    assert!(open_store(dir.path(), StoreConfig::default(), None).is_err());

    let lenient = StoreConfig {
        recover_corrupt_snapshot: true,
        ..StoreConfig::default()
    };
    let store = open_store(dir.path(), lenient, None).unwrap();
    assert!(store.is_empty().unwrap());

    // The next write replaces the damaged file.
    store.put(Document::new("C-02", "cow")).unwrap();
    drop(store);
    let store = open_store(dir.path(), StoreConfig::default(), None).unwrap();
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn test_keys_are_independent() {
    let dir = tempdir().unwrap();
    let herd_a = StoreConfig {
        storage_key: "herd_a".to_string(),
        ..StoreConfig::default()
    };
    let herd_b = StoreConfig {
        storage_key: "herd_b".to_string(),
        ..StoreConfig::default()
    };

    {
        let store = open_store(dir.path(), herd_a.clone(), None).unwrap();
        store.put(Document::new("A-1", "cow")).unwrap();
    }
    {
        let store = open_store(dir.path(), herd_b.clone(), None).unwrap();
        assert!(store.is_empty().unwrap());
        store.put(Document::new("B-1", "goat")).unwrap();
        store.put(Document::new("B-2", "goat")).unwrap();
    }

    assert_eq!(open_store(dir.path(), herd_a, None).unwrap().len().unwrap(), 1);
    assert_eq!(open_store(dir.path(), herd_b, None).unwrap().len().unwrap(), 2);
}

#[test]
fn test_unsynced_writes_still_visible_after_reopen() {
    let dir = tempdir().unwrap();
    let config = PersistentConfig {
        sync_on_write: false,
        ..PersistentConfig::default()
    };

    let id = {
        let store: RecordStore =
            open_store(dir.path(), StoreConfig::default(), Some(config.clone())).unwrap();
        let id = store.put(Document::new("C-01", "cow")).unwrap();
        store.acknowledge_sync(&id).unwrap();
        id
    };

    let store = open_store(dir.path(), StoreConfig::default(), Some(config)).unwrap();
    assert!(store.get(&id).unwrap().synced);
}
