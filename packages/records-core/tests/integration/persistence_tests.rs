//! Snapshot persistence tests.

use std::fs;

use tempfile::tempdir;

use records_core::config::StoreConfig;
use records_core::persistence::SNAPSHOT_FILE;
use records_core::{Database, DbError, NewPlaybook, NewRecord, RecordChanges, RecordType};

fn config_for(dir: &std::path::Path) -> StoreConfig {
    StoreConfig {
        data_dir: Some(dir.to_path_buf()),
        persistence_retry_delay_ms: 0,
        ..Default::default()
    }
}

#[test]
fn test_open_without_snapshot_is_empty() {
    let temp_dir = tempdir().unwrap();
    let db = Database::open(&config_for(temp_dir.path())).unwrap();
    assert_eq!(db.record_count().unwrap(), 0);
    assert_eq!(db.playbook_count().unwrap(), 0);
    assert!(!temp_dir.path().join(SNAPSHOT_FILE).exists());
}

#[test]
fn test_reopen_sees_committed_rows() {
    let temp_dir = tempdir().unwrap();
    let config = config_for(temp_dir.path());

    let (kept, deleted) = {
        let db = Database::open(&config).unwrap();
        let playbook = db.create_playbook(NewPlaybook::new("site.yml")).unwrap();
        let kept = db
            .insert_record(NewRecord::new(playbook.id, "kept").with_type(RecordType::Url))
            .unwrap();
        let deleted = db.insert_record(NewRecord::new(playbook.id, "gone")).unwrap();
        db.update_record(
            kept.id,
            RecordChanges {
                value: Some("https://example.com".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        db.delete_record(deleted.id).unwrap();
        (kept, deleted)
    };
    assert!(temp_dir.path().join(SNAPSHOT_FILE).exists());

    let db = Database::open(&config).unwrap();
    assert_eq!(db.record_count().unwrap(), 1);
    let record = db.get_record(kept.id).unwrap();
    assert_eq!(record.key, "kept");
    assert_eq!(record.value, "https://example.com");
    assert_eq!(record.record_type, RecordType::Url);

    // The id counter survives the restart
    let playbook = db.get_playbook(record.playbook).unwrap();
    let next = db.insert_record(NewRecord::new(playbook.id, "next")).unwrap();
    assert!(next.id > deleted.id);
}

#[test]
fn test_tampered_snapshot_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let config = config_for(temp_dir.path());
    {
        let db = Database::open(&config).unwrap();
        let playbook = db.create_playbook(NewPlaybook::new("site.yml")).unwrap();
        db.insert_record(NewRecord::new(playbook.id, "original"))
            .unwrap();
    }

    let path = temp_dir.path().join(SNAPSHOT_FILE);
    let mut snapshot: serde_json::Value =
        serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    snapshot["tables"]["records"]["1"]["key"] = serde_json::json!("tampered");
    fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

    match Database::open(&config) {
        Err(DbError::DataCorruption(msg)) => assert!(msg.contains("checksum")),
        other => panic!("expected DataCorruption, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_unsupported_version_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let config = config_for(temp_dir.path());
    {
        let db = Database::open(&config).unwrap();
        db.create_playbook(NewPlaybook::new("site.yml")).unwrap();
    }

    let path = temp_dir.path().join(SNAPSHOT_FILE);
    let mut snapshot: serde_json::Value =
        serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    snapshot["version"] = serde_json::json!(99);
    fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

    assert!(matches!(
        Database::open(&config),
        Err(DbError::DataCorruption(_))
    ));
}

#[test]
fn test_garbage_snapshot_is_rejected() {
    let temp_dir = tempdir().unwrap();
    fs::write(temp_dir.path().join(SNAPSHOT_FILE), b"not json").unwrap();
    assert!(matches!(
        Database::open(&config_for(temp_dir.path())),
        Err(DbError::DataCorruption(_))
    ));
}

#[test]
fn test_failed_snapshot_write_leaves_store_untouched() {
    let temp_dir = tempdir().unwrap();
    let data_dir = temp_dir.path().join("data");
    let db = Database::open(&config_for(&data_dir)).unwrap();

    let playbook = db.create_playbook(NewPlaybook::new("site.yml")).unwrap();
    let record = db.insert_record(NewRecord::new(playbook.id, "kept")).unwrap();

    // A regular file now occupies the data directory path
    fs::remove_dir_all(&data_dir).unwrap();
    fs::write(&data_dir, b"not a directory").unwrap();

    match db.insert_record(NewRecord::new(playbook.id, "lost")) {
        Err(DbError::IoError(msg)) => assert!(msg.contains("not a directory"), "{}", msg),
        other => panic!("expected IoError, got {:?}", other),
    }
    assert!(db
        .update_record(
            record.id,
            RecordChanges {
                key: Some("renamed".to_string()),
                ..Default::default()
            },
        )
        .is_err());
    assert!(db.delete_record(record.id).is_err());
    assert!(db.create_playbook(NewPlaybook::new("other.yml")).is_err());

    assert_eq!(db.record_count().unwrap(), 1);
    assert_eq!(db.playbook_count().unwrap(), 1);
    assert_eq!(db.get_record(record.id).unwrap(), record);

    // Once the directory is usable again the next write gets the next id
    fs::remove_file(&data_dir).unwrap();
    let next = db.insert_record(NewRecord::new(playbook.id, "next")).unwrap();
    assert_eq!(next.id, record.id + 1);
    assert_eq!(db.record_count().unwrap(), 2);
}
