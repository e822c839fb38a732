//! Store and serializer behavior through the public API.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use serde_json::json;

use records_core::query::{RecordOrder, RecordQuery};
use records_core::serializer::{self, RecordFields};
use records_core::{
    Database, DbError, NewPlaybook, NewRecord, Playbook, Record, RecordChanges, RecordType,
};

fn make_playbook(db: &Database) -> Playbook {
    db.create_playbook(NewPlaybook::new("/tmp/playbook.yml"))
        .unwrap()
}

/// Stores a record with the usual fixture values, adjusted by `overrides`.
fn make_record(
    db: &Database,
    playbook: &Playbook,
    overrides: impl FnOnce(NewRecord) -> NewRecord,
) -> Record {
    let new_record = NewRecord::new(playbook.id, "record-key").with_value("record-value");
    db.insert_record(overrides(new_record)).unwrap()
}

fn payload(value: serde_json::Value) -> RecordFields {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_record_constructor() {
    let db = Database::new();
    let playbook = make_playbook(&db);
    let record = make_record(&db, &playbook, |r| r.with_key("test"));
    assert_eq!(record.key, "test");
    assert_eq!(record.playbook, playbook.id);
}

#[test]
fn test_serializer_create_and_reload() {
    let db = Database::new();
    let playbook = make_playbook(&db);

    let record = serializer::create(
        &db,
        payload(json!({"key": "test", "value": "value", "type": "text", "playbook": playbook.id})),
    )
    .unwrap();

    let reloaded = db.get_record(record.id).unwrap();
    assert_eq!(reloaded.key, "test");
    assert_eq!(reloaded.value, "value");
    assert_eq!(reloaded.record_type, RecordType::Text);
}

#[test]
fn test_create_increments_count_by_one() {
    let db = Database::new();
    let playbook = make_playbook(&db);
    assert_eq!(db.record_count().unwrap(), 0);

    serializer::create(
        &db,
        payload(json!({"key": "test", "value": "value", "type": "text", "playbook": playbook.id})),
    )
    .unwrap();
    assert_eq!(db.record_count().unwrap(), 1);
}

#[test]
fn test_invalid_payload_has_no_side_effect() {
    let db = Database::new();
    make_playbook(&db);

    let err = serializer::create(&db, payload(json!({"value": "value"}))).unwrap_err();
    match err {
        DbError::Validation(errors) => {
            assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["key", "playbook"]);
        }
        other => panic!("expected Validation, got {:?}", other),
    }
    assert_eq!(db.record_count().unwrap(), 0);
}

#[test]
fn test_dangling_playbook_is_a_constraint_error() {
    let db = Database::new();

    let err = db.insert_record(NewRecord::new(42, "orphan")).unwrap_err();
    match err {
        DbError::Constraint(errors) => assert!(errors.get("playbook").is_some()),
        other => panic!("expected Constraint, got {:?}", other),
    }
    assert_eq!(db.record_count().unwrap(), 0);
}

#[test]
fn test_partial_update_changes_only_supplied_fields() {
    let db = Database::new();
    let playbook = make_playbook(&db);
    let record = make_record(&db, &playbook, |r| r.with_type(RecordType::Url));
    assert_ne!(record.key, "update");

    let updated = serializer::update(
        &db,
        record.id,
        payload(json!({"key": "update"})),
    )
    .unwrap();

    assert_eq!(updated.key, "update");
    let stored = db.get_record(record.id).unwrap();
    assert_eq!(stored.key, "update");
    assert_eq!(stored.value, record.value);
    assert_eq!(stored.record_type, RecordType::Url);
    assert_eq!(stored.playbook, playbook.id);
}

#[test]
fn test_update_can_move_record_between_playbooks() {
    let db = Database::new();
    let first = make_playbook(&db);
    let second = make_playbook(&db);
    let record = make_record(&db, &first, |r| r);

    let moved = serializer::update(
        &db,
        record.id,
        payload(json!({"playbook": second.id})),
    )
    .unwrap();
    assert_eq!(moved.playbook, second.id);

    let err = serializer::update(
        &db,
        record.id,
        payload(json!({"playbook": 999, "key": "lost"})),
    )
    .unwrap_err();
    assert!(matches!(err, DbError::Constraint(_)));
    // The rejected update must not have applied its key change
    assert_eq!(db.get_record(record.id).unwrap().key, "record-key");
}

#[test]
fn test_unknown_ids_are_not_found() {
    let db = Database::new();
    assert!(matches!(
        db.get_record(7),
        Err(DbError::RecordNotFound { id: 7 })
    ));
    assert!(matches!(
        db.delete_record(7),
        Err(DbError::RecordNotFound { id: 7 })
    ));
    assert!(matches!(
        serializer::update(
            &db,
            7,
            payload(json!({"value": "v"}))
        ),
        Err(DbError::RecordNotFound { id: 7 })
    ));
    assert!(matches!(
        db.get_playbook(3),
        Err(DbError::PlaybookNotFound { id: 3 })
    ));
}

#[test]
fn test_delete_removes_row_and_ids_are_not_reused() {
    let db = Database::new();
    let playbook = make_playbook(&db);
    let first = make_record(&db, &playbook, |r| r);
    assert_eq!(db.record_count().unwrap(), 1);

    let removed = db.delete_record(first.id).unwrap();
    assert_eq!(removed, first);
    assert_eq!(db.record_count().unwrap(), 0);

    let second = make_record(&db, &playbook, |r| r);
    assert!(second.id > first.id);
}

#[test]
fn test_list_records_filters_and_pages() {
    let db = Database::new();
    let first = make_playbook(&db);
    let second = make_playbook(&db);
    for key in ["c", "a", "b"] {
        make_record(&db, &first, |r| r.with_key(key));
    }
    make_record(&db, &second, |r| r.with_key("a").with_type(RecordType::Json));

    let all = db.list_records(&RecordQuery::default()).unwrap();
    assert_eq!(all.count, 4);
    assert!(all.items.windows(2).all(|w| w[0].id < w[1].id));

    let query = RecordQuery {
        playbook: Some(first.id),
        order: RecordOrder::KeyAsc,
        limit: Some(2),
        ..Default::default()
    };
    let page = db.list_records(&query).unwrap();
    assert_eq!(page.count, 3);
    assert_eq!(
        page.items.iter().map(|r| r.key.as_str()).collect::<Vec<_>>(),
        vec!["a", "b"]
    );

    let query = RecordQuery {
        key: Some("a".to_string()),
        record_type: Some(RecordType::Json),
        ..Default::default()
    };
    let page = db.list_records(&query).unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.items[0].playbook, second.id);
}

#[test]
fn test_list_playbooks() {
    let db = Database::new();
    for _ in 0..3 {
        make_playbook(&db);
    }
    let page = db.list_playbooks(Some(2), 1).unwrap();
    assert_eq!(page.count, 3);
    assert_eq!(page.items.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2, 3]);
    assert_eq!(db.playbook_count().unwrap(), 3);
}

#[test]
fn test_concurrent_mutations_on_distinct_rows() {
    const WORKERS: usize = 8;
    const PER_WORKER: usize = 25;

    let db = Arc::new(Database::new());
    let playbook = make_playbook(&db);

    let created: Vec<Vec<Record>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..WORKERS)
            .map(|worker| {
                let db = Arc::clone(&db);
                let playbook_id = playbook.id;
                scope.spawn(move || {
                    let mut kept = Vec::new();
                    for n in 0..PER_WORKER {
                        let record = db
                            .insert_record(NewRecord::new(playbook_id, format!("w{}-{}", worker, n)))
                            .unwrap();
                        if n % 2 == 0 {
                            db.delete_record(record.id).unwrap();
                        } else {
                            let updated = db
                                .update_record(
                                    record.id,
                                    RecordChanges {
                                        value: Some(format!("updated-{}", record.id)),
                                        ..Default::default()
                                    },
                                )
                                .unwrap();
                            kept.push(updated);
                        }
                    }
                    kept
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let kept: Vec<Record> = created.into_iter().flatten().collect();
    assert_eq!(kept.len(), WORKERS * (PER_WORKER / 2));
    assert_eq!(db.record_count().unwrap(), kept.len());

    let ids: BTreeSet<u64> = kept.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), kept.len());

    for record in &kept {
        let stored = db.get_record(record.id).unwrap();
        assert_eq!(stored, *record);
        assert_eq!(stored.value, format!("updated-{}", record.id));
    }

    // Every allocated id was distinct, including the deleted ones
    let next = make_record(&db, &playbook, |r| r);
    assert_eq!(next.id, (WORKERS * PER_WORKER + 1) as u64);
}
