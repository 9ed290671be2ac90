use ntest::timeout;

use live_sync_core::DataEventType::{Delete, Initial, InitialBegin, InitialEnd, Insert, Update};
use live_sync_core::{Database, Params, SyncError, Value};
use live_sync_views::{ViewDefinition, ViewState};

use super::helpers::{commit, ev, field, summary, todo_db, view_set, Tail};

fn todo(id: i64, name: &str, user_id: i64, is_done: &str) -> Params {
    Params::new()
        .with("id", id)
        .with("name", name)
        .with("user_id", user_id)
        .with("is_done", is_done)
}

#[timeout(2000)]
#[test]
fn test_open_todos_for_one_user() {
    let db = todo_db();
    let mut set = view_set(&db);
    set.create_view(
        ViewDefinition::new("SELECT id, name FROM todo WHERE user_id = @u AND is_done = 'N'").param("u", 42),
    )
    .unwrap();
    let tail = Tail::start(set);
    assert_eq!(
        summary(&tail.initial),
        vec![ev(InitialBegin, "todo", ""), ev(InitialEnd, "todo", "")]
    );

    commit(&db, &[("insert", "todo", todo(1, "A", 42, "N"))]);
    let inserted = tail.next();
    assert_eq!(summary(&inserted), vec![ev(Insert, "todo", "1")]);
    assert_eq!(field(&inserted, 0, "name"), Value::from("A"));
    assert_eq!(inserted.data_events[0].record.as_ref().unwrap().len(), 2);
    let wire = serde_json::to_value(&inserted).unwrap();
    assert_eq!(wire["dataEvents"][0]["eventType"], "Insert");
    assert_eq!(wire["dataEvents"][0]["record"]["name"], "A");

    commit(&db, &[("update", "todo", Params::new().with("id", 1).with("is_done", "Y"))]);
    let deleted = tail.next();
    assert_eq!(summary(&deleted), vec![ev(Delete, "todo", "1")]);
    assert_eq!(field(&deleted, 0, "name"), Value::from("A"));

    // Wrong user: nothing is delivered for this commit.
    commit(&db, &[("insert", "todo", todo(2, "B", 99, "N"))]);
    commit(&db, &[("insert", "todo", todo(3, "C", 42, "N"))]);
    assert_eq!(summary(&tail.next()), vec![ev(Insert, "todo", "3")]);
}

#[timeout(2000)]
#[test]
fn test_initial_snapshot_follows_statement_order() {
    let db = todo_db();
    commit(
        &db,
        &[
            ("insert", "todo", todo(1, "Milk", 42, "N")),
            ("insert", "todo", todo(2, "Bread", 42, "N")),
            ("insert", "todo", todo(3, "Eggs", 42, "Y")),
        ],
    );

    let mut set = view_set(&db);
    let open = set
        .create_view(ViewDefinition::new("SELECT id, name FROM todo WHERE is_done = 'N' ORDER BY name").name("open"))
        .unwrap();
    set.create_view(ViewDefinition::new("SELECT * FROM todo WHERE is_done = 'Y'").name("done"))
        .unwrap();
    assert_eq!(set.view(open).unwrap().state(), ViewState::Created);
    assert_eq!(set.view(open).unwrap().key_fields(), ["id".to_string()]);

    let initial = set.initial_transaction().unwrap();
    assert_eq!(
        summary(&initial),
        vec![
            ev(InitialBegin, "open", ""),
            ev(Initial, "open", "2"),
            ev(Initial, "open", "1"),
            ev(InitialEnd, "open", ""),
            ev(InitialBegin, "done", ""),
            ev(Initial, "done", "3"),
            ev(InitialEnd, "done", ""),
        ]
    );
    assert_eq!(field(&initial, 5, "user_id"), Value::Int(42));
    assert_eq!(set.view(open).unwrap().state(), ViewState::Started);
}

#[timeout(2000)]
#[test]
fn test_update_outside_projection_is_silent() {
    let db = todo_db();
    commit(&db, &[("insert", "todo", todo(1, "Milk", 42, "N"))]);
    let mut set = view_set(&db);
    set.create_view(ViewDefinition::new("SELECT id, name FROM todo")).unwrap();
    let tail = Tail::start(set);

    commit(&db, &[("update", "todo", Params::new().with("id", 1).with("user_id", 7))]);
    commit(&db, &[("update", "todo", Params::new().with("id", 1).with("name", "Oat milk"))]);

    let update = tail.next();
    assert_eq!(summary(&update), vec![ev(Update, "todo", "1")]);
    assert_eq!(field(&update, 0, "name"), Value::from("Oat milk"));
}

#[timeout(2000)]
#[test]
fn test_filter_transitions() {
    let db = todo_db();
    commit(&db, &[("insert", "todo", todo(1, "Milk", 42, "Y"))]);
    let mut set = view_set(&db);
    set.create_view(ViewDefinition::new("SELECT id, name, is_done FROM todo WHERE is_done = 'N'"))
        .unwrap();
    let tail = Tail::start(set);
    assert_eq!(tail.initial.len(), 2);

    commit(&db, &[("update", "todo", Params::new().with("id", 1).with("is_done", "N"))]);
    assert_eq!(summary(&tail.next()), vec![ev(Insert, "todo", "1")]);

    commit(&db, &[("delete", "todo", Params::new().with("id", 1))]);
    let deleted = tail.next();
    assert_eq!(summary(&deleted), vec![ev(Delete, "todo", "1")]);
    assert_eq!(field(&deleted, 0, "is_done"), Value::from("N"));
}

#[timeout(2000)]
#[test]
fn test_rollback_and_coalescing() {
    let db = todo_db();
    let mut set = view_set(&db);
    set.create_view(ViewDefinition::new("SELECT id, name FROM todo")).unwrap();
    let tail = Tail::start(set);

    let mut tx = db.begin_transaction().unwrap();
    tx.insert("todo", &todo(1, "Milk", 42, "N")).unwrap();
    tx.rollback().unwrap();

    commit(
        &db,
        &[
            ("insert", "todo", todo(2, "Tea", 42, "N")),
            ("delete", "todo", Params::new().with("id", 2)),
        ],
    );
    commit(
        &db,
        &[
            ("insert", "todo", todo(3, "Jam", 42, "N")),
            ("update", "todo", Params::new().with("id", 3).with("name", "Honey")),
        ],
    );

    let coalesced = tail.next();
    assert_eq!(summary(&coalesced), vec![ev(Insert, "todo", "3")]);
    assert_eq!(field(&coalesced, 0, "name"), Value::from("Honey"));
}

#[timeout(2000)]
#[test]
fn test_events_keep_operation_order() {
    let db = todo_db();
    commit(
        &db,
        &[
            ("insert", "todo", todo(1, "Milk", 42, "N")),
            ("insert", "todo", todo(2, "Tea", 42, "N")),
        ],
    );
    let mut set = view_set(&db);
    set.create_view(ViewDefinition::new("SELECT id, name FROM todo")).unwrap();
    let tail = Tail::start(set);

    commit(
        &db,
        &[
            ("update", "todo", Params::new().with("id", 2).with("name", "Green tea")),
            ("delete", "todo", Params::new().with("id", 1)),
        ],
    );
    assert_eq!(
        summary(&tail.next()),
        vec![ev(Update, "todo", "2"), ev(Delete, "todo", "1")]
    );
}

#[timeout(2000)]
#[test]
fn test_registration_errors() {
    let db = todo_db();
    let mut set = view_set(&db);

    let err = set.create_view(ViewDefinition::new("SELECT name FROM todo")).unwrap_err();
    assert!(matches!(err, SyncError::UnknownField { .. }));

    let err = set
        .create_view(ViewDefinition::new("SELECT id FROM todo WHERE user_id = @u"))
        .unwrap_err();
    assert!(matches!(err, SyncError::MissingParam { ref name } if name == "u"));

    let err = set.create_view(ViewDefinition::new("SELECT id FROM nothing")).unwrap_err();
    assert!(matches!(err, SyncError::UnknownTable { .. }));

    assert!(set.views().is_empty());
}
