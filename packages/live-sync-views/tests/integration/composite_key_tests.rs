use ntest::timeout;

use live_sync_core::DataEventType::{Delete, Insert, Update};
use live_sync_core::{MemoryDbConfig, Params, Value};
use live_sync_views::ViewDefinition;

use super::helpers::{commit, database, ev, field, summary, view_set, Tail};

const SHIFT_DDL: &str =
    "CREATE TABLE shift (employee_id INT, day DATE, note TEXT, PRIMARY KEY (employee_id, day))";

fn day(text: &str) -> Value {
    Value::DateTime(Value::parse_date_time(text).unwrap())
}

fn shift(employee_id: i64, day: Value, note: &str) -> Params {
    Params::new()
        .with("employee_id", employee_id)
        .with("day", day)
        .with("note", note)
}

#[timeout(2000)]
#[test]
fn test_composite_key_changes_flow_through_view() {
    let db = database(&[SHIFT_DDL], MemoryDbConfig::default());
    commit(&db, &[("insert", "shift", shift(1, day("2024-03-01"), "early"))]);

    let mut set = view_set(&db);
    set.create_view(ViewDefinition::new("SELECT employee_id, day, note FROM shift"))
        .unwrap();
    let tail = Tail::start(set);
    assert_eq!(tail.initial.data_events[1].key_value, "1;2024-03-01 00:00:00");

    commit(
        &db,
        &[(
            "update",
            "shift",
            Params::new()
                .with("employee_id", 1)
                .with("day", day("2024-03-01"))
                .with("note", "late"),
        )],
    );
    let updated = tail.next();
    assert_eq!(summary(&updated), vec![ev(Update, "shift", "1;2024-03-01 00:00:00")]);
    assert_eq!(field(&updated, 0, "note"), Value::from("late"));

    commit(&db, &[("insert", "shift", shift(1, day("2024-03-02"), "early"))]);
    assert_eq!(summary(&tail.next()), vec![ev(Insert, "shift", "1;2024-03-02 00:00:00")]);

    commit(
        &db,
        &[(
            "delete",
            "shift",
            Params::new().with("employee_id", 1).with("day", day("2024-03-01")),
        )],
    );
    assert_eq!(summary(&tail.next()), vec![ev(Delete, "shift", "1;2024-03-01 00:00:00")]);
}

#[timeout(2000)]
#[test]
fn test_null_key_part_is_matched() {
    let db = database(&[SHIFT_DDL], MemoryDbConfig::default());
    let mut set = view_set(&db);
    set.create_view(ViewDefinition::new("SELECT employee_id, day, note FROM shift WHERE employee_id = 2"))
        .unwrap();
    let tail = Tail::start(set);

    commit(&db, &[("insert", "shift", shift(2, Value::Null, "open"))]);
    let inserted = tail.next();
    assert_eq!(summary(&inserted), vec![ev(Insert, "shift", "2;")]);
    assert_eq!(field(&inserted, 0, "day"), Value::Null);

    commit(
        &db,
        &[(
            "delete",
            "DELETE FROM shift WHERE employee_id = 2 AND day IS NULL",
            Params::new(),
        )],
    );
    assert_eq!(summary(&tail.next()), vec![ev(Delete, "shift", "2;")]);
}

#[timeout(2000)]
#[test]
fn test_text_key_part_with_delimiter() {
    let db = database(
        &["CREATE TABLE label (scope TEXT, name TEXT, color TEXT, PRIMARY KEY (scope, name))"],
        MemoryDbConfig::default(),
    );
    let mut set = view_set(&db);
    set.create_view(ViewDefinition::new("SELECT scope, name, color FROM label"))
        .unwrap();
    let tail = Tail::start(set);

    let label = Params::new().with("scope", "a;b").with("name", "c").with("color", "red");
    commit(&db, &[("insert", "label", label)]);
    assert_eq!(summary(&tail.next()), vec![ev(Insert, "label", "a\\;b;c")]);

    commit(
        &db,
        &[(
            "update",
            "label",
            Params::new().with("scope", "a;b").with("name", "c").with("color", "blue"),
        )],
    );
    let updated = tail.next();
    assert_eq!(summary(&updated), vec![ev(Update, "label", "a\\;b;c")]);
    assert_eq!(field(&updated, 0, "color"), Value::from("blue"));
}
