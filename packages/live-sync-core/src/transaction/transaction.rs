//! Scoped unit of work producing one ordered batch of change events.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::database::{CommitBatch, Database, KeyChange, TransactionBackend};
use crate::error::{ErrorKind, Result, SyncError};
use crate::event::DataEventType;
use crate::statement::{
    shorthand_table, DeleteStatement, InsertStatement, Statement, UpdateStatement,
};
use crate::value::{Params, Row};

use super::pending::PendingEvents;
use super::value_hooks::WriteKind;

/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

impl TransactionState {
    fn name(&self) -> &'static str {
        match self {
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
        }
    }
}

/// RAII guard over one unit of work.
///
/// Writes are buffered by the backend and recorded as key-level events.
/// `commit` publishes the net events to every commit listener of the
/// database; dropping an active transaction rolls it back.
///
/// Statement text may be a bare table name: `insert` then writes the
/// supplied values, while `update` and `delete` address the row by the
/// primary key fields found in the values.
pub struct Transaction<'a> {
    db: &'a dyn Database,
    backend: Option<Box<dyn TransactionBackend + 'a>>,
    pending: PendingEvents,
    state: TransactionState,
}

impl<'a> Transaction<'a> {
    /// Begins a transaction on `db`.
    pub fn begin(db: &'a dyn Database) -> Result<Self> {
        let backend = db.begin_backend()?;
        Ok(Self {
            db,
            backend: Some(backend),
            pending: PendingEvents::new(),
            state: TransactionState::Active,
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Number of distinct rows written so far.
    pub fn touched_rows(&self) -> usize {
        self.pending.len()
    }

    /// Inserts one row and returns its key fields.
    pub fn insert(&mut self, statement: &str, values: &Params) -> Result<Row> {
        self.ensure_active()?;
        let insert = match shorthand_table(statement, self.db.catalog()) {
            Some(table) => InsertStatement::from_values(table, values)?,
            None => match self.db.parse(statement, values)? {
                Statement::Insert(insert) => insert,
                _ => return Err(SyncError::syntax("expected an INSERT statement", 0)),
            },
        };
        self.run_insert(insert, values)
    }

    /// Updates matching rows and returns how many were updated.
    pub fn update(&mut self, statement: &str, values: &Params) -> Result<usize> {
        self.ensure_active()?;
        let update = match shorthand_table(statement, self.db.catalog()) {
            Some(table) => UpdateStatement::by_key(table, values)?,
            None => match self.db.parse(statement, values)? {
                Statement::Update(update) => update,
                _ => return Err(SyncError::syntax("expected an UPDATE statement", 0)),
            },
        };
        self.run_update(update, values)
    }

    /// Deletes matching rows and returns how many were deleted.
    pub fn delete(&mut self, statement: &str, values: &Params) -> Result<usize> {
        self.ensure_active()?;
        let delete = match shorthand_table(statement, self.db.catalog()) {
            Some(table) => DeleteStatement::by_key(table, values)?,
            None => match self.db.parse(statement, values)? {
                Statement::Delete(delete) => delete,
                _ => return Err(SyncError::syntax("expected a DELETE statement", 0)),
            },
        };
        self.run_delete(delete, values)
    }

    /// Runs an INSERT, UPDATE or DELETE given as SQL text and returns the
    /// number of affected rows.
    pub fn execute(&mut self, sql: &str, values: &Params) -> Result<usize> {
        self.ensure_active()?;
        match self.db.parse(sql, values)? {
            Statement::Insert(insert) => self.run_insert(insert, values).map(|_| 1),
            Statement::Update(update) => self.run_update(update, values),
            Statement::Delete(delete) => self.run_delete(delete, values),
            _ => Err(SyncError::syntax(
                "expected an INSERT, UPDATE or DELETE statement",
                0,
            )),
        }
    }

    fn run_insert(&mut self, mut insert: InsertStatement, values: &Params) -> Result<Row> {
        let params = self.db.value_hooks().apply(&insert.table, values, WriteKind::Insert);
        for field in hooked_fields(values, &params) {
            insert.bind_field_to_param(&field)?;
        }

        let result = self
            .backend_mut()?
            .insert(&insert, &params)
            .and_then(|resolve_key| resolve_key());
        let key_row = self.guard(result)?;
        let key_value = insert.table.key_value(&key_row)?;
        self.pending
            .record(&insert.table.name, &key_value, DataEventType::Insert);
        Ok(key_row)
    }

    fn run_update(&mut self, mut update: UpdateStatement, values: &Params) -> Result<usize> {
        let params = self.db.value_hooks().apply(&update.table, values, WriteKind::Update);
        let key_fields = update.table.key_field_names().to_vec();
        for field in hooked_fields(values, &params) {
            if !key_fields.contains(&field) {
                update.bind_field_to_param(&field)?;
            }
        }

        let result = self.backend_mut()?.update(&update, &params);
        let changes = self.guard(result)?;
        let table = &update.table.name;
        for KeyChange { old_key, new_key } in &changes {
            if old_key == new_key {
                self.pending.record(table, new_key, DataEventType::Update);
            } else {
                self.pending.record(table, old_key, DataEventType::Delete);
                self.pending.record(table, new_key, DataEventType::Insert);
            }
        }
        Ok(changes.len())
    }

    fn run_delete(&mut self, delete: DeleteStatement, values: &Params) -> Result<usize> {
        let result = self.backend_mut()?.delete(&delete, values);
        let keys = self.guard(result)?;
        for key in &keys {
            self.pending
                .record(&delete.table.name, key, DataEventType::Delete);
        }
        Ok(keys.len())
    }

    /// Commits the backend, then publishes the net events as one batch.
    ///
    /// A transaction without net changes publishes nothing.
    pub fn commit(mut self) -> Result<()> {
        self.ensure_active()?;
        let backend = self.take_backend()?;
        let events = std::mem::take(&mut self.pending).into_events();
        let listeners = self.db.commit_listeners();

        let mut events = Some(events);
        let result = backend.commit(&mut |pre, post| {
            let events = events.take().unwrap_or_default();
            if events.is_empty() {
                debug!(version = post.version(), "commit without net changes");
                return;
            }
            debug!(
                events = events.len(),
                version = post.version(),
                listeners = listeners.len(),
                "publishing commit"
            );
            listeners.publish(Arc::new(CommitBatch {
                events,
                pre,
                post,
                committed_at: Utc::now(),
            }));
        });

        match result {
            Ok(()) => {
                self.state = TransactionState::Committed;
                Ok(())
            }
            Err(e) => {
                self.state = TransactionState::RolledBack;
                Err(e)
            }
        }
    }

    /// Discards every write; no listener is called.
    pub fn rollback(mut self) -> Result<()> {
        self.ensure_active()?;
        self.abort()
    }

    fn abort(&mut self) -> Result<()> {
        self.state = TransactionState::RolledBack;
        self.pending.clear();
        match self.backend.take() {
            Some(backend) => backend.rollback(),
            None => Ok(()),
        }
    }

    /// Rolls back on storage failures; other errors leave the transaction
    /// usable.
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.kind() == ErrorKind::Storage {
                warn!(error = %e, "storage failure, rolling back transaction");
                if let Err(rollback_error) = self.abort() {
                    warn!(error = %rollback_error, "rollback after storage failure failed");
                }
            }
        }
        result
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(SyncError::TransactionState(self.state.name()))
        }
    }

    fn backend_mut(&mut self) -> Result<&mut (dyn TransactionBackend + 'a)> {
        let state = self.state.name();
        self.backend
            .as_deref_mut()
            .ok_or(SyncError::TransactionState(state))
    }

    fn take_backend(&mut self) -> Result<Box<dyn TransactionBackend + 'a>> {
        let state = self.state.name();
        self.backend.take().ok_or(SyncError::TransactionState(state))
    }
}

/// Names whose value the hooks added or replaced.
fn hooked_fields(before: &Params, after: &Params) -> Vec<String> {
    after
        .iter()
        .filter(|(name, value)| before.get(name) != Some(*value))
        .map(|(name, _)| name.to_string())
        .collect()
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.is_active() {
            debug!("rolling back dropped transaction");
            if let Err(e) = self.abort() {
                warn!(error = %e, "rollback of dropped transaction failed");
            }
        }
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("state", &self.state)
            .field("touched_rows", &self.pending.len())
            .finish()
    }
}
