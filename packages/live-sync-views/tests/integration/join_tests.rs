use ntest::timeout;

use live_sync_core::DataEventType::{Insert, Update};
use live_sync_core::{MemoryDbConfig, Params, SyncError, Value};
use live_sync_views::ViewDefinition;

use super::helpers::{commit, database, ev, field, summary, todo_db, view_set, Tail, EMPLOYEE_DDL};

fn staffed() -> std::sync::Arc<live_sync_core::MemoryDatabase> {
    let db = database(&EMPLOYEE_DDL, MemoryDbConfig::relational());
    let employee = |id: i64, name: &str, department: Option<i64>| {
        ("insert", "employee", Params::new().with("id", id).with("name", name).with("department_id", department))
    };
    commit(
        &db,
        &[
            ("insert", "department", Params::new().with("id", 5).with("name", "Sales")),
            ("insert", "department", Params::new().with("id", 6).with("name", "Ops")),
            employee(1, "Ann", Some(5)),
            employee(2, "Bob", Some(6)),
            employee(3, "Cid", None),
            employee(4, "Dee", Some(5)),
        ],
    );
    db
}

#[timeout(2000)]
#[test]
fn test_department_rename_reaches_only_its_employees() {
    let db = staffed();
    let mut set = view_set(&db);
    set.create_view(ViewDefinition::new(
        "SELECT e.id, e.name, d.name AS department FROM employee e LEFT JOIN department d ON e.department_id = d.id",
    ))
    .unwrap();
    let tail = Tail::start(set);
    assert_eq!(tail.initial.len(), 6);
    assert_eq!(field(&tail.initial, 3, "department"), Value::Null);

    commit(&db, &[("update", "department", Params::new().with("id", 5).with("name", "Field Sales"))]);
    let renamed = tail.next();
    assert_eq!(
        summary(&renamed),
        vec![ev(Update, "employee", "1"), ev(Update, "employee", "4")]
    );
    assert_eq!(field(&renamed, 0, "department"), Value::from("Field Sales"));
    assert_eq!(field(&renamed, 1, "name"), Value::from("Dee"));

    commit(
        &db,
        &[(
            "insert",
            "employee",
            Params::new().with("id", 7).with("name", "Eve").with("department_id", 6),
        )],
    );
    let hired = tail.next();
    assert_eq!(summary(&hired), vec![ev(Insert, "employee", "7")]);
    assert_eq!(field(&hired, 0, "department"), Value::from("Ops"));

    commit(&db, &[("delete", "department", Params::new().with("id", 6))]);
    let closed = tail.next();
    assert_eq!(
        summary(&closed),
        vec![ev(Update, "employee", "2"), ev(Update, "employee", "7")]
    );
    assert_eq!(field(&closed, 1, "department"), Value::Null);
}

#[timeout(2000)]
#[test]
fn test_untracked_join_table_is_ignored() {
    let db = staffed();
    let mut set = view_set(&db);
    set.create_view(
        ViewDefinition::new(
            "SELECT e.id, d.name AS department FROM employee e INNER JOIN department d ON e.department_id = d.id",
        )
        .name("staff")
        .dynamic_tables(&["e"]),
    )
    .unwrap();
    let tail = Tail::start(set);
    assert_eq!(tail.initial.len(), 5);

    commit(&db, &[("update", "department", Params::new().with("id", 5).with("name", "Field Sales"))]);
    commit(&db, &[("update", "employee", Params::new().with("id", 1).with("department_id", 6))]);

    let moved = tail.next();
    assert_eq!(summary(&moved), vec![ev(Update, "staff", "1")]);
    assert_eq!(field(&moved, 0, "department"), Value::from("Ops"));
}

#[timeout(2000)]
#[test]
fn test_joins_need_capable_backend() {
    let db = todo_db();
    let mut set = view_set(&db);
    let err = set
        .create_view(ViewDefinition::new(
            "SELECT a.id FROM todo a INNER JOIN todo b ON a.id = b.id",
        ))
        .unwrap_err();
    assert!(matches!(err, SyncError::Capability { .. }));

    let db = staffed();
    let mut set = view_set(&db);
    let err = set
        .create_view(
            ViewDefinition::new("SELECT e.id FROM employee e LEFT JOIN department d ON e.department_id = d.id")
                .dynamic_tables(&["x"]),
        )
        .unwrap_err();
    assert!(matches!(err, SyncError::UnknownTable { ref table } if table == "x"));
}
