//! In-memory reference backend.
//!
//! Committed state is an immutable [`StoreSnapshot`] behind an `ArcSwap`;
//! readers never block. Transactions stage writes on a private copy of the
//! tables they touch and commit under a single writer lock, failing when
//! another transaction committed since they began.

mod backend;
mod eval;
mod query;
mod store;
mod translate;

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::info;

use crate::catalog::{Table, TableCatalog};
use crate::config::MemoryDbConfig;
use crate::database::{CommitListeners, Database, Snapshot, TransactionBackend};
use crate::error::{Result, SyncError};
use crate::statement::{Capabilities, Statement};
use crate::transaction::{Transaction, ValueHooks};
use crate::value::Params;

use backend::MemoryBackend;

pub use store::{StoreSnapshot, TableData};

/// Database kept entirely in process memory.
pub struct MemoryDatabase {
    config: MemoryDbConfig,
    catalog: TableCatalog,
    store: ArcSwap<StoreSnapshot>,
    commit_lock: Mutex<()>,
    listeners: CommitListeners,
    hooks: ValueHooks,
}

impl MemoryDatabase {
    pub fn new(config: MemoryDbConfig) -> Self {
        Self {
            config,
            catalog: TableCatalog::new(),
            store: ArcSwap::from_pointee(StoreSnapshot::default()),
            commit_lock: Mutex::new(()),
            listeners: CommitListeners::new(),
            hooks: ValueHooks::new(),
        }
    }

    pub fn config(&self) -> &MemoryDbConfig {
        &self.config
    }

    /// Registers `table`.
    ///
    /// # Errors
    /// `TableAlreadyExists` if the name is taken.
    pub fn create_table(&self, table: Table) -> Result<Arc<Table>> {
        let table = self.catalog.register(table)?;
        info!(
            table = %table.name,
            fields = table.fields.len(),
            indexes = table.indexes.len(),
            "table created"
        );
        Ok(table)
    }

    /// Parses a `CREATE TABLE` statement and registers the table.
    pub fn create_from_sql(&self, sql: &str) -> Result<Arc<Table>> {
        match Statement::parse(sql, &Params::new(), &self.catalog, self.capabilities())? {
            Statement::CreateTable(table) => self.create_table(table),
            _ => Err(SyncError::syntax("expected a CREATE TABLE statement", 0)),
        }
    }

    /// Latest committed version.
    pub fn version(&self) -> u64 {
        self.store.load().version
    }

    /// Committed row count of `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.store.load().row_count(table)
    }

    /// Current committed state with its concrete type.
    pub fn store_snapshot(&self) -> Arc<StoreSnapshot> {
        self.store.load_full()
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new(MemoryDbConfig::default())
    }
}

impl Database for MemoryDatabase {
    fn catalog(&self) -> &TableCatalog {
        &self.catalog
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            can_join: self.config.can_join,
            can_field_alias: self.config.can_field_alias,
        }
    }

    fn snapshot(&self) -> Arc<dyn Snapshot> {
        self.store.load_full()
    }

    fn begin_backend(&self) -> Result<Box<dyn TransactionBackend + '_>> {
        Ok(Box::new(MemoryBackend::new(self)))
    }

    fn begin_transaction(&self) -> Result<Transaction<'_>> {
        Transaction::begin(self)
    }

    fn commit_listeners(&self) -> &CommitListeners {
        &self.listeners
    }

    fn value_hooks(&self) -> &ValueHooks {
        &self.hooks
    }
}

impl fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDatabase")
            .field("config", &self.config)
            .field("tables", &self.catalog.table_names())
            .field("version", &self.version())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn todo_db() -> MemoryDatabase {
        let db = MemoryDatabase::default();
        db.create_from_sql(
            "CREATE TABLE todo (id INT NOT NULL AUTO_INCREMENT, name VARCHAR(50), is_done VARCHAR(1), PRIMARY KEY (id), UNIQUE INDEX ux_name (name))",
        )
        .unwrap();
        db
    }

    #[test]
    fn test_auto_increment_and_select() {
        let db = todo_db();
        let mut tx = db.begin_transaction().unwrap();
        let first = tx
            .insert("todo", &Params::new().with("name", "Milk").with("is_done", "N"))
            .unwrap();
        let second = tx
            .insert("todo", &Params::new().with("name", "Eggs").with("is_done", "Y"))
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(first.get("id"), Some(&Value::Int(1)));
        assert_eq!(second.get("id"), Some(&Value::Int(2)));
        let open = db
            .select_rows("SELECT * FROM todo WHERE is_done = 'N'", &Params::new())
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].get("name"), Some(&Value::from("Milk")));
        assert_eq!(db.version(), 1);
    }

    #[test]
    fn test_unique_index_rejects_duplicate() {
        let db = todo_db();
        let mut tx = db.begin_transaction().unwrap();
        tx.insert("todo", &Params::new().with("name", "Milk")).unwrap();
        let err = tx.insert("todo", &Params::new().with("name", "Milk")).unwrap_err();
        assert!(err.is_retryable());
        assert!(tx.is_active());
        tx.commit().unwrap();
        assert_eq!(db.row_count("todo"), 1);
    }

    #[test]
    fn test_uncommitted_writes_are_invisible() {
        let db = todo_db();
        let mut tx = db.begin_transaction().unwrap();
        tx.insert("todo", &Params::new().with("name", "Milk")).unwrap();
        assert_eq!(db.row_count("todo"), 0);
        drop(tx);
        assert_eq!(db.row_count("todo"), 0);
        assert_eq!(db.version(), 0);
    }

    #[test]
    fn test_write_conflict_is_storage_error() {
        let db = todo_db();
        let mut slow = db.begin_transaction().unwrap();
        slow.insert("todo", &Params::new().with("name", "Milk")).unwrap();

        let mut fast = db.begin_transaction().unwrap();
        fast.insert("todo", &Params::new().with("name", "Eggs")).unwrap();
        fast.commit().unwrap();

        let err = slow.commit().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Storage);
        assert_eq!(db.row_count("todo"), 1);
    }

    #[test]
    fn test_order_by_and_update_expression() {
        let db = todo_db();
        for name in ["b", "c", "a"] {
            db.execute(
                "INSERT INTO todo (name, is_done) VALUES (@name, 'N')",
                &Params::new().with("name", name),
            )
            .unwrap();
        }
        db.execute("UPDATE todo SET name = name + '!' WHERE id > 1", &Params::new())
            .unwrap();
        let rows = db
            .select_rows("SELECT name FROM todo ORDER BY name DESC", &Params::new())
            .unwrap();
        let names: Vec<String> = rows
            .iter()
            .map(|r| r.get("name").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["c!", "b", "a!"]);
        assert_eq!(
            db.select_value("SELECT id FROM todo WHERE name = 'b'", &Params::new())
                .unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn test_create_table_twice_fails() {
        let db = todo_db();
        let err = db
            .create_from_sql("CREATE TABLE todo (id INT, PRIMARY KEY (id))")
            .unwrap_err();
        assert!(matches!(err, SyncError::TableAlreadyExists(_)));
    }
}
