use std::sync::{mpsc, Arc};
use std::thread;

use ntest::timeout;

use live_sync_core::{CommitBatch, Database, DataEventType, Params, Snapshot, Value};

use super::helpers::{todo, todo_db, Recorder};

#[timeout(1000)]
#[test]
fn test_batch_carries_pre_and_post_state() {
    let db = todo_db();
    let recorder = Recorder::attach(&db);

    let mut tx = db.begin_transaction().unwrap();
    tx.insert("todo", &todo("Milk", "N")).unwrap();
    tx.commit().unwrap();

    let mut tx = db.begin_transaction().unwrap();
    tx.update("todo", &Params::new().with("id", 1).with("is_done", "Y"))
        .unwrap();
    tx.commit().unwrap();

    let batches = recorder.batches.lock();
    assert_eq!(batches.len(), 2);
    let update = &batches[1];
    assert_eq!(update.events.len(), 1);
    assert_eq!(update.events[0].event_type, DataEventType::Update);

    let select = db
        .parse_select("SELECT is_done FROM todo WHERE id = 1", &Params::new())
        .unwrap();
    let before = update.pre.select(&select, &Params::new()).unwrap();
    let after = update.post.select(&select, &Params::new()).unwrap();
    assert_eq!(before[0]["is_done"], Value::from("N"));
    assert_eq!(after[0]["is_done"], Value::from("Y"));
}

#[timeout(1000)]
#[test]
fn test_delete_then_reinsert_is_update() {
    let db = todo_db();
    let mut tx = db.begin_transaction().unwrap();
    tx.insert("todo", &todo("Milk", "N")).unwrap();
    tx.commit().unwrap();

    let recorder = Recorder::attach(&db);
    let mut tx = db.begin_transaction().unwrap();
    tx.delete("todo", &Params::new().with("id", 1)).unwrap();
    tx.insert("todo", &todo("Milk", "Y").with("id", 1)).unwrap();
    tx.commit().unwrap();

    let batches = recorder.batches.lock();
    assert_eq!(batches[0].events.len(), 1);
    assert_eq!(batches[0].events[0].event_type, DataEventType::Update);
    assert_eq!(batches[0].events[0].key_value, "1");
}

#[timeout(1000)]
#[test]
fn test_dropped_subscription_stops_delivery() {
    let db = todo_db();
    let recorder = Recorder::attach(&db);
    db.execute(
        "INSERT INTO todo (name, is_done) VALUES ('Milk', 'N')",
        &Params::new(),
    )
    .unwrap();
    let batches = recorder.batches.clone();
    drop(recorder);
    db.execute("DELETE FROM todo WHERE id = 1", &Params::new())
        .unwrap();
    assert_eq!(batches.lock().len(), 1);
    assert!(db.commit_listeners().is_empty());
}

#[timeout(1000)]
#[test]
fn test_commits_from_threads_serialize() {
    let db = todo_db();
    let recorder = Recorder::attach(&db);

    thread::scope(|scope| {
        for t in 0..4 {
            let db = &db;
            scope.spawn(move || {
                let mut committed = 0;
                while committed < 5 {
                    let mut tx = db.begin_transaction().unwrap();
                    tx.insert("todo", &todo(&format!("t{}-{}", t, committed), "N"))
                        .unwrap();
                    if tx.commit().is_ok() {
                        committed += 1;
                    }
                }
            });
        }
    });

    assert_eq!(db.row_count("todo"), 20);
    let batches = recorder.batches.lock();
    assert_eq!(batches.len(), 20);
    for pair in batches.windows(2) {
        assert_eq!(pair[0].post.version() + 1, pair[1].post.version());
    }
}

#[timeout(1000)]
#[test]
fn test_listener_reads_and_hands_off_writes() {
    let db = Arc::new(todo_db());
    let (sender, receiver) = mpsc::channel();
    let reader = Arc::downgrade(&db);
    let _subscription = db.on_commit(Arc::new(move |_batch: Arc<CommitBatch>| {
        if let Some(db) = reader.upgrade() {
            let rows = db.select_rows("SELECT id FROM todo", &Params::new());
            let _ = sender.send(rows.map(|rows| rows.len()));
        }
    }));

    db.execute(
        "INSERT INTO todo (name, is_done) VALUES ('Milk', 'N')",
        &Params::new(),
    )
    .unwrap();
    assert_eq!(receiver.recv().unwrap().unwrap(), 1);

    // The follow-up write runs on another thread once the listener returned.
    let writer = Arc::clone(&db);
    thread::spawn(move || {
        writer
            .execute("UPDATE todo SET is_done = 'Y' WHERE id = 1", &Params::new())
            .unwrap();
    })
    .join()
    .unwrap();
    assert_eq!(receiver.recv().unwrap().unwrap(), 1);
}
