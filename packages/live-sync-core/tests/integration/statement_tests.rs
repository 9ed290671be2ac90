use ntest::timeout;
use serde::Serialize;

use live_sync_core::{Database, ErrorKind, Params, Statement, SyncError, Value};

use super::helpers::{employee_db, todo, todo_db};

#[timeout(1000)]
#[test]
fn test_select_resolves_and_renders() {
    let db = todo_db();
    let select = db
        .parse_select(
            "select id, name from todo where is_done = @done and name like 'M%' order by name desc",
            &Params::new().with("done", "N"),
        )
        .unwrap();
    assert_eq!(select.param_names().to_vec(), vec!["done".to_string()]);
    assert_eq!(select.anchor().table.name, "todo");
    assert_eq!(
        select.to_sql(),
        "SELECT id, name FROM todo WHERE is_done = @done AND name LIKE 'M%' ORDER BY name DESC"
    );
}

#[timeout(1000)]
#[test]
fn test_resolution_errors() {
    let db = todo_db();
    let unknown_table = db.parse("SELECT * FROM nope", &Params::new()).unwrap_err();
    assert!(matches!(unknown_table, SyncError::UnknownTable { .. }));
    assert_eq!(unknown_table.kind(), ErrorKind::Resolution);

    let unknown_field = db
        .parse("SELECT id FROM todo WHERE colour = 'red'", &Params::new())
        .unwrap_err();
    assert!(matches!(unknown_field, SyncError::UnknownField { .. }));

    let syntax = db.parse("SELECT FROM todo", &Params::new()).unwrap_err();
    assert!(matches!(syntax, SyncError::Syntax { .. }));
}

#[timeout(1000)]
#[test]
fn test_capabilities_gate_joins_and_aliases() {
    let db = todo_db();
    let alias = db
        .parse("SELECT name AS title FROM todo", &Params::new())
        .unwrap_err();
    assert_eq!(alias.kind(), ErrorKind::Capability);

    let db = employee_db();
    assert!(db.can_join());
    let join = db
        .parse(
            "SELECT e.id, d.name AS department_name FROM employee e INNER JOIN department d ON e.department_id = d.id",
            &Params::new(),
        )
        .unwrap()
        .into_select()
        .unwrap();
    assert_eq!(join.from_refs().len(), 2);
    assert_eq!(join.output_name(1, "name"), Some("department_name"));
}

#[timeout(1000)]
#[test]
fn test_insert_names_values_expansion() {
    let db = todo_db();
    let values = todo("Milk", "N");
    match db
        .parse("INSERT INTO todo (@@names) VALUES (@@values)", &values)
        .unwrap()
    {
        Statement::Insert(insert) => {
            assert_eq!(insert.to_string(), "INSERT INTO todo (name, is_done) VALUES (@name, @is_done)");
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[derive(Serialize)]
struct NewTodo {
    name: &'static str,
    is_done: &'static str,
}

#[timeout(1000)]
#[test]
fn test_struct_record_expands_in_declaration_order() {
    let db = todo_db();
    let values = Params::from_serialize(&NewTodo {
        name: "Milk",
        is_done: "N",
    })
    .unwrap();
    match db
        .parse("INSERT INTO todo (@@names) VALUES (@@values)", &values)
        .unwrap()
    {
        Statement::Insert(insert) => {
            assert_eq!(insert.to_string(), "INSERT INTO todo (name, is_done) VALUES (@name, @is_done)");
        }
        other => panic!("unexpected statement {:?}", other),
    }

    db.execute("INSERT INTO todo (@@names) VALUES (@@values)", &values)
        .unwrap();
    let rows = db
        .select_rows("SELECT name, is_done FROM todo", &Params::new())
        .unwrap();
    assert_eq!(rows[0]["name"], Value::from("Milk"));
    assert_eq!(rows[0]["is_done"], Value::from("N"));
}

#[timeout(1000)]
#[test]
fn test_list_param_in_filter() {
    let db = todo_db();
    let mut tx = db.begin_transaction().unwrap();
    for name in ["a", "b", "c"] {
        tx.insert("todo", &todo(name, "N")).unwrap();
    }
    tx.commit().unwrap();

    let rows = db
        .select_rows(
            "SELECT name FROM todo WHERE id IN (@ids) ORDER BY id",
            &Params::new().with("ids", vec![1, 3]),
        )
        .unwrap();
    let names: Vec<&Value> = rows.iter().map(|r| &r["name"]).collect();
    assert_eq!(names, vec![&Value::from("a"), &Value::from("c")]);

    let none = db
        .select_rows(
            "SELECT name FROM todo WHERE id IN (@ids)",
            &Params::new().with("ids", Value::List(Vec::new())),
        )
        .unwrap();
    assert!(none.is_empty());
}

#[timeout(1000)]
#[test]
fn test_missing_param_on_execute() {
    let db = todo_db();
    let err = db
        .select_rows("SELECT * FROM todo WHERE id = @id", &Params::new())
        .unwrap_err();
    assert!(matches!(err, SyncError::MissingParam { name } if name == "id"));
}
