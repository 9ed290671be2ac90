use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use ntest::timeout;
use parking_lot::Mutex;

use live_sync_core::DataEventType::Insert;
use live_sync_core::{DataEventTransaction, Params, Value};
use live_sync_views::{ViewDefinition, ViewSetHandle};

use super::helpers::{commit, ev, summary, todo_db, view_set, Tail};

fn todo(id: i64, name: &str) -> (&'static str, &'static str, Params) {
    (
        "insert",
        "todo",
        Params::new().with("id", id).with("name", name).with("is_done", "N"),
    )
}

#[timeout(2000)]
#[test]
fn test_dispose_stops_delivery() {
    let db = todo_db();
    let mut set = view_set(&db);
    set.create_view(ViewDefinition::new("SELECT id, name FROM todo")).unwrap();
    let tail = Tail::start(set);
    assert!(tail.handle.is_active());

    commit(&db, &[todo(1, "Milk")]);
    assert_eq!(summary(&tail.next()), vec![ev(Insert, "todo", "1")]);

    tail.handle.dispose();
    tail.handle.dispose();
    assert!(!tail.handle.is_active());
    commit(&db, &[todo(2, "Tea")]);
    assert!(tail.next_opt().is_none());
}

#[timeout(2000)]
#[test]
fn test_join_drains_queued_commits() {
    let db = todo_db();
    let mut set = view_set(&db);
    set.create_view(ViewDefinition::new("SELECT id, name FROM todo")).unwrap();
    let tail = Tail::start(set);

    for id in 1..=3 {
        commit(&db, &[todo(id, "item")]);
    }
    let delivered = tail.join();
    assert_eq!(delivered.len(), 3);
    assert_eq!(summary(&delivered[2]), vec![ev(Insert, "todo", "3")]);
}

#[timeout(2000)]
#[test]
fn test_sets_receive_commits_independently() {
    let db = todo_db();
    let mut first = view_set(&db);
    first.create_view(ViewDefinition::new("SELECT id FROM todo")).unwrap();
    let mut second = view_set(&db);
    second
        .create_view(ViewDefinition::new("SELECT id, name FROM todo WHERE name = 'Tea'"))
        .unwrap();
    let first = Tail::start(first);
    let second = Tail::start(second);

    commit(&db, &[todo(1, "Milk")]);
    commit(&db, &[todo(2, "Tea")]);

    assert_eq!(summary(&first.next()), vec![ev(Insert, "todo", "1")]);
    assert_eq!(summary(&first.next()), vec![ev(Insert, "todo", "2")]);
    assert_eq!(summary(&second.next()), vec![ev(Insert, "todo", "2")]);
}

#[timeout(2000)]
#[test]
fn test_failing_view_does_not_block_others() {
    let db = todo_db();
    let mut set = view_set(&db);
    set.create_view(ViewDefinition::new("SELECT id FROM todo WHERE name - 1 > 0").name("broken"))
        .unwrap();
    set.create_view(ViewDefinition::new("SELECT id, name FROM todo").name("all"))
        .unwrap();
    let tail = Tail::start(set);

    commit(&db, &[todo(1, "Milk")]);
    let delivered = tail.next();
    assert_eq!(summary(&delivered), vec![ev(Insert, "all", "1")]);
    assert_eq!(
        delivered.data_events[0].record.as_ref().unwrap()["name"],
        Value::from("Milk")
    );
}

#[timeout(2000)]
#[test]
fn test_sink_may_dispose_from_worker() {
    let db = todo_db();
    let mut set = view_set(&db);
    set.create_view(ViewDefinition::new("SELECT id FROM todo")).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let slot: Arc<Mutex<Option<Arc<ViewSetHandle>>>> = Arc::default();
    let (done, disposed) = mpsc::channel();
    let counter = Arc::clone(&calls);
    let inner = Arc::clone(&slot);
    let handle = Arc::new(
        set.start(Box::new(move |_: DataEventTransaction| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return;
            }
            if let Some(handle) = inner.lock().take() {
                handle.dispose();
                let _ = done.send(());
            }
        }))
        .unwrap(),
    );
    *slot.lock() = Some(Arc::clone(&handle));

    commit(&db, &[todo(1, "Milk")]);
    disposed.recv_timeout(Duration::from_millis(500)).unwrap();
    assert!(!handle.is_active());

    commit(&db, &[todo(2, "Tea")]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
