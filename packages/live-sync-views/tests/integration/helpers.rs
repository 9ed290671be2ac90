//! Shared fixtures.

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;

use live_sync_core::{
    DataEventTransaction, DataEventType, Database, MemoryDatabase, MemoryDbConfig, Params, Value,
};
use live_sync_views::{DynamicViewSet, ViewSetConfig, ViewSetHandle};

pub const TODO_DDL: &str =
    "CREATE TABLE todo (id INT NOT NULL AUTO_INCREMENT, name TEXT NOT NULL, user_id INT, is_done VARCHAR(1), PRIMARY KEY (id))";

pub const CHAT_DDL: [&str; 2] = [
    "CREATE TABLE chat (id INT PRIMARY KEY, user_id INT, title TEXT)",
    "CREATE TABLE message (id INT PRIMARY KEY, chat_id INT, body TEXT)",
];

pub const EMPLOYEE_DDL: [&str; 2] = [
    "CREATE TABLE department (id INT PRIMARY KEY, name TEXT)",
    "CREATE TABLE employee (id INT PRIMARY KEY, name TEXT, department_id INT)",
];

const WAIT: Duration = Duration::from_millis(500);

pub fn database(ddl: &[&str], config: MemoryDbConfig) -> Arc<MemoryDatabase> {
    let db = MemoryDatabase::new(config);
    for statement in ddl {
        db.create_from_sql(statement).unwrap();
    }
    Arc::new(db)
}

pub fn todo_db() -> Arc<MemoryDatabase> {
    database(&[TODO_DDL], MemoryDbConfig::default())
}

pub fn view_set(db: &Arc<MemoryDatabase>) -> DynamicViewSet {
    let db: Arc<dyn Database> = db.clone();
    DynamicViewSet::new(db, ViewSetConfig::named("live-sync-test"))
}

/// Runs `writes` in one committed transaction.
pub fn commit(db: &MemoryDatabase, writes: &[(&str, &str, Params)]) {
    let mut tx = db.begin_transaction().unwrap();
    for (op, statement, values) in writes {
        match *op {
            "insert" => {
                tx.insert(statement, values).unwrap();
            }
            "update" => {
                tx.update(statement, values).unwrap();
            }
            "delete" => {
                tx.delete(statement, values).unwrap();
            }
            other => panic!("unknown op {}", other),
        }
    }
    tx.commit().unwrap();
}

/// A started view set whose deliveries land in a channel.
pub struct Tail {
    pub handle: ViewSetHandle,
    pub initial: DataEventTransaction,
    receiver: Receiver<DataEventTransaction>,
}

impl Tail {
    pub fn start(set: DynamicViewSet) -> Self {
        let (sender, receiver) = mpsc::channel();
        let handle = set
            .start(Box::new(move |transaction: DataEventTransaction| {
                let _ = sender.send(transaction);
            }))
            .unwrap();
        let initial = receiver.recv_timeout(WAIT).unwrap();
        Self {
            handle,
            initial,
            receiver,
        }
    }

    pub fn next(&self) -> DataEventTransaction {
        self.receiver.recv_timeout(WAIT).unwrap()
    }

    /// Waits for the worker to drain and returns every undelivered
    /// transaction.
    pub fn join(self) -> Vec<DataEventTransaction> {
        let Tail { handle, receiver, .. } = self;
        handle.join();
        receiver.try_iter().collect()
    }

    pub fn next_opt(&self) -> Option<DataEventTransaction> {
        self.receiver.recv_timeout(Duration::from_millis(100)).ok()
    }
}

/// `(event type, view name, key)` of every event.
pub fn summary(transaction: &DataEventTransaction) -> Vec<(DataEventType, String, String)> {
    transaction
        .data_events
        .iter()
        .map(|e| (e.event_type, e.name.clone(), e.key_value.clone()))
        .collect()
}

pub fn ev(event_type: DataEventType, name: &str, key: &str) -> (DataEventType, String, String) {
    (event_type, name.to_string(), key.to_string())
}

pub fn field(transaction: &DataEventTransaction, index: usize, name: &str) -> Value {
    transaction.data_events[index]
        .record
        .as_ref()
        .and_then(|r| r.get(name))
        .cloned()
        .unwrap_or(Value::Null)
}
