use std::sync::Arc;

use ntest::timeout;
use parking_lot::Mutex;

use live_sync_core::DataEventType::{Delete, Initial, InitialBegin, InitialEnd, Insert, Update};
use live_sync_core::{CommitBatch, Database, MemoryDbConfig, Params, Value};
use live_sync_views::{ParamKind, ViewDefinition};

use super::helpers::{commit, database, ev, summary, view_set, Tail, CHAT_DDL};

fn chat(id: i64, user_id: i64, title: &str) -> (&'static str, &'static str, Params) {
    (
        "insert",
        "chat",
        Params::new().with("id", id).with("user_id", user_id).with("title", title),
    )
}

fn message(id: i64, chat_id: i64, body: &str) -> (&'static str, &'static str, Params) {
    (
        "insert",
        "message",
        Params::new().with("id", id).with("chat_id", chat_id).with("body", body),
    )
}

#[timeout(2000)]
#[test]
fn test_messages_follow_chat_membership() {
    let db = database(&CHAT_DDL, MemoryDbConfig::default());
    commit(
        &db,
        &[chat(1, 42, "General"), chat(2, 7, "Random"), message(10, 1, "hi"), message(11, 2, "yo")],
    );

    let mut set = view_set(&db);
    let chat_ids = set.create_multi_value_param("chatIds");
    set.create_view(
        ViewDefinition::new("SELECT id, title FROM chat WHERE user_id = @u")
            .param("u", 42)
            .child_param(chat_ids, "id"),
    )
    .unwrap();
    set.create_view(
        ViewDefinition::new("SELECT id, chat_id, body FROM message WHERE chat_id IN (@chatIds)")
            .dynamic_param("chatIds", chat_ids),
    )
    .unwrap();
    assert_eq!(set.param(chat_ids).unwrap().kind(), ParamKind::Multi);

    let tail = Tail::start(set);
    assert_eq!(
        summary(&tail.initial),
        vec![
            ev(InitialBegin, "chat", ""),
            ev(Initial, "chat", "1"),
            ev(InitialEnd, "chat", ""),
            ev(InitialBegin, "message", ""),
            ev(Initial, "message", "10"),
            ev(InitialEnd, "message", ""),
        ]
    );

    // The message arrives in the same commit as the chat it belongs to.
    commit(&db, &[chat(3, 42, "Team"), message(12, 3, "welcome")]);
    assert_eq!(
        summary(&tail.next()),
        vec![ev(Insert, "chat", "3"), ev(Insert, "message", "12")]
    );

    commit(&db, &[("update", "chat", Params::new().with("id", 2).with("user_id", 42))]);
    assert_eq!(
        summary(&tail.next()),
        vec![ev(Insert, "chat", "2"), ev(Insert, "message", "11")]
    );

    commit(&db, &[("delete", "chat", Params::new().with("id", 1))]);
    assert_eq!(
        summary(&tail.next()),
        vec![ev(Delete, "chat", "1"), ev(Delete, "message", "10")]
    );

    commit(&db, &[message(13, 1, "orphan")]);
    commit(&db, &[message(14, 2, "again")]);
    assert_eq!(summary(&tail.next()), vec![ev(Insert, "message", "14")]);
}

#[timeout(2000)]
#[test]
fn test_single_value_param_rebinds_consumer() {
    let db = database(&CHAT_DDL, MemoryDbConfig::default());
    commit(&db, &[chat(1, 42, "General"), chat(2, 42, "Random"), chat(3, 7, "Other")]);

    let mut set = view_set(&db);
    let owner = set.create_single_value_param("owner");
    set.create_view(
        ViewDefinition::new("SELECT id, user_id FROM chat WHERE id = @chat")
            .name("pinned")
            .param("chat", 1)
            .child_param(owner, "user_id"),
    )
    .unwrap();
    set.create_view(
        ViewDefinition::new("SELECT id, title FROM chat WHERE user_id = @owner")
            .name("owned")
            .dynamic_param("owner", owner),
    )
    .unwrap();

    let initial = set.initial_transaction().unwrap();
    assert_eq!(initial.len(), 7);
    assert_eq!(set.param(owner).unwrap().value(), &Value::Int(42));
    assert!(!set.param(owner).unwrap().is_dirty());

    let recorded: Arc<Mutex<Vec<Arc<CommitBatch>>>> = Arc::default();
    let sink = Arc::clone(&recorded);
    let _subscription = db.on_commit(Arc::new(move |batch: Arc<CommitBatch>| sink.lock().push(batch)));
    commit(&db, &[("update", "chat", Params::new().with("id", 1).with("user_id", 7))]);

    let batch = recorded.lock().pop().unwrap();
    let transaction = set.process_commit(&batch);
    assert_eq!(
        summary(&transaction),
        vec![
            ev(Update, "pinned", "1"),
            ev(Delete, "owned", "1"),
            ev(Delete, "owned", "2"),
            ev(Insert, "owned", "1"),
            ev(Insert, "owned", "3"),
        ]
    );
    assert_eq!(transaction.date_time, batch.committed_at);
    assert_eq!(set.param(owner).unwrap().value(), &Value::Int(7));
    assert!(!set.param(owner).unwrap().is_dirty());
    assert_eq!(
        set.views()[1].bound_params().get("owner"),
        Some(&Value::Int(7))
    );
}
