use ntest::timeout;

use live_sync_core::{Database, Params, Value};

use super::helpers::employee_db;

fn seed(db: &dyn Database) {
    let mut tx = db.begin_transaction().unwrap();
    tx.insert("department", &Params::new().with("id", 1).with("name", "Sales"))
        .unwrap();
    tx.insert("department", &Params::new().with("id", 2).with("name", "Ops"))
        .unwrap();
    for (id, name, department) in [(1, "Ann", Some(1)), (2, "Bob", Some(2)), (3, "Cy", None)] {
        tx.insert(
            "employee",
            &Params::new()
                .with("id", id)
                .with("name", name)
                .with("department_id", department),
        )
        .unwrap();
    }
    tx.commit().unwrap();
}

#[timeout(1000)]
#[test]
fn test_inner_join_projects_aliases() {
    let db = employee_db();
    seed(&db);
    let rows = db
        .select_rows(
            "SELECT e.id, e.name, d.name AS department_name FROM employee e INNER JOIN department d ON e.department_id = d.id ORDER BY e.id",
            &Params::new(),
        )
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], Value::from("Ann"));
    assert_eq!(rows[0]["department_name"], Value::from("Sales"));
    assert_eq!(rows[1]["department_name"], Value::from("Ops"));
}

#[timeout(1000)]
#[test]
fn test_left_join_keeps_unmatched_rows() {
    let db = employee_db();
    seed(&db);
    let rows = db
        .select_rows(
            "SELECT e.name, d.name AS department_name FROM employee e LEFT JOIN department d ON e.department_id = d.id WHERE d.id IS NULL",
            &Params::new(),
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], Value::from("Cy"));
    assert_eq!(rows[0]["department_name"], Value::Null);
}
