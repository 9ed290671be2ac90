//! Shared fixtures.

use std::sync::Arc;

use parking_lot::Mutex;

use live_sync_core::{
    CommitBatch, CommitSubscription, Database, MemoryDatabase, MemoryDbConfig, Params,
};

pub const TODO_DDL: &str =
    "CREATE TABLE todo (id INT NOT NULL AUTO_INCREMENT, name VARCHAR(100) NOT NULL, is_done VARCHAR(1), PRIMARY KEY (id))";

pub const EMPLOYEE_DDL: [&str; 2] = [
    "CREATE TABLE department (id INT PRIMARY KEY, name TEXT)",
    "CREATE TABLE employee (id INT PRIMARY KEY, name TEXT, department_id INT, INDEX ix_department (department_id))",
];

pub fn todo_db() -> MemoryDatabase {
    let db = MemoryDatabase::default();
    db.create_from_sql(TODO_DDL).unwrap();
    db
}

pub fn employee_db() -> MemoryDatabase {
    let db = MemoryDatabase::new(MemoryDbConfig::relational());
    for ddl in EMPLOYEE_DDL {
        db.create_from_sql(ddl).unwrap();
    }
    db
}

pub fn todo(name: &str, is_done: &str) -> Params {
    Params::new().with("name", name).with("is_done", is_done)
}

/// Records every published commit until the subscription drops.
pub struct Recorder {
    pub batches: Arc<Mutex<Vec<Arc<CommitBatch>>>>,
    _subscription: CommitSubscription,
}

impl Recorder {
    pub fn attach(db: &dyn Database) -> Self {
        let batches: Arc<Mutex<Vec<Arc<CommitBatch>>>> = Arc::default();
        let sink = Arc::clone(&batches);
        let subscription = db.on_commit(Arc::new(move |batch: Arc<CommitBatch>| {
            sink.lock().push(batch);
        }));
        Self {
            batches,
            _subscription: subscription,
        }
    }
}
