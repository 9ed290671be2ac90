//! Database contract: catalog ownership, capabilities, statement execution,
//! transactions and commit notification.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::catalog::TableCatalog;
use crate::error::{Result, SyncError};
use crate::event::KeyValueDataEvent;
use crate::statement::{
    Capabilities, DeleteStatement, InsertStatement, SelectStatement, Statement, UpdateStatement,
};
use crate::transaction::{Transaction, ValueHooks};
use crate::value::{Params, Row, Value};

/// Immutable, versioned read view of a database.
pub trait Snapshot: Send + Sync {
    /// Monotonic commit version this snapshot reflects.
    fn version(&self) -> u64;

    /// Executes `statement` with `params` bound.
    ///
    /// Rows carry the statement's output columns in projection order.
    fn select(&self, statement: &SelectStatement, params: &Params) -> Result<Vec<Row>>;
}

/// Produces the key fields of an inserted row once the physical write has
/// completed.
pub type KeyResolver = Box<dyn FnOnce() -> Result<Row> + Send>;

/// Encoded key of an updated row before and after the update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChange {
    pub old_key: String,
    pub new_key: String,
}

/// Backend half of a transaction: applies writes to a private staging
/// area and makes them durable on commit.
pub trait TransactionBackend: Send {
    fn insert(&mut self, statement: &InsertStatement, params: &Params) -> Result<KeyResolver>;

    /// Returns one entry per affected row, in the order rows were updated.
    fn update(&mut self, statement: &UpdateStatement, params: &Params) -> Result<Vec<KeyChange>>;

    /// Returns the keys of deleted rows, in the order rows were deleted.
    fn delete(&mut self, statement: &DeleteStatement, params: &Params) -> Result<Vec<String>>;

    /// Makes the staged writes visible.
    ///
    /// `publish` receives the snapshots before and after the commit and is
    /// called exactly once, after the physical commit succeeded and before
    /// any later commit becomes visible.
    fn commit(
        self: Box<Self>,
        publish: &mut dyn FnMut(Arc<dyn Snapshot>, Arc<dyn Snapshot>),
    ) -> Result<()>;

    fn rollback(self: Box<Self>) -> Result<()>;
}

/// One commit as seen by listeners.
pub struct CommitBatch {
    /// Net changes in operation order
    pub events: Vec<KeyValueDataEvent>,
    /// State before the commit
    pub pre: Arc<dyn Snapshot>,
    /// State after the commit
    pub post: Arc<dyn Snapshot>,
    pub committed_at: DateTime<Utc>,
}

impl fmt::Debug for CommitBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitBatch")
            .field("events", &self.events)
            .field("pre_version", &self.pre.version())
            .field("post_version", &self.post.version())
            .field("committed_at", &self.committed_at)
            .finish()
    }
}

/// Callback invoked for every published commit. See [`Database::on_commit`]
/// for what a listener may do.
pub type CommitListener = Arc<dyn Fn(Arc<CommitBatch>) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(u64, CommitListener)>>,
}

/// Subscribe/unsubscribe registry of commit listeners.
#[derive(Clone, Default)]
pub struct CommitListeners {
    registry: Arc<ListenerRegistry>,
}

impl CommitListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` until the returned subscription is cancelled
    /// or dropped.
    pub fn subscribe(&self, listener: CommitListener) -> CommitSubscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.listeners.write().push((id, listener));
        CommitSubscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Calls every listener with `batch`, in subscription order.
    ///
    /// Listeners are called outside the registry lock, so a listener may
    /// unsubscribe itself.
    pub fn publish(&self, batch: Arc<CommitBatch>) {
        let listeners: Vec<CommitListener> = self
            .registry
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(Arc::clone(&batch));
        }
    }

    pub fn len(&self) -> usize {
        self.registry.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CommitListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitListeners").field("len", &self.len()).finish()
    }
}

/// Handle of a registered commit listener.
#[derive(Debug)]
pub struct CommitSubscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl CommitSubscription {
    /// Removes the listener. Calling this more than once is harmless.
    pub fn cancel(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.listeners.write().retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for CommitSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry").finish_non_exhaustive()
    }
}

/// A storage engine exposing the statement model.
pub trait Database: Send + Sync {
    fn catalog(&self) -> &TableCatalog;

    fn capabilities(&self) -> Capabilities;

    /// Current committed state.
    fn snapshot(&self) -> Arc<dyn Snapshot>;

    /// Opens the backend half of a new transaction.
    fn begin_backend(&self) -> Result<Box<dyn TransactionBackend + '_>>;

    /// Opens a transaction.
    fn begin_transaction(&self) -> Result<Transaction<'_>>;

    fn commit_listeners(&self) -> &CommitListeners;

    fn value_hooks(&self) -> &ValueHooks;

    fn can_join(&self) -> bool {
        self.capabilities().can_join
    }

    fn can_field_alias(&self) -> bool {
        self.capabilities().can_field_alias
    }

    /// Parses `sql` against this database's catalog and capabilities.
    fn parse(&self, sql: &str, params: &Params) -> Result<Statement> {
        Statement::parse(sql, params, self.catalog(), self.capabilities())
    }

    fn parse_select(&self, sql: &str, params: &Params) -> Result<SelectStatement> {
        self.parse(sql, params)?.into_select()
    }

    /// Runs `sql`. SELECT reads the current snapshot; mutations run in
    /// their own transaction and return no rows.
    fn execute(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        match self.parse(sql, params)? {
            Statement::Select(select) => self.snapshot().select(&select, params),
            Statement::CreateTable(_) => Err(SyncError::Capability {
                feature: "CREATE TABLE through execute",
            }),
            _ => {
                let mut transaction = self.begin_transaction()?;
                transaction.execute(sql, params)?;
                transaction.commit()?;
                Ok(Vec::new())
            }
        }
    }

    fn select_rows(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        let select = self.parse_select(sql, params)?;
        self.snapshot().select(&select, params)
    }

    /// First row, if any.
    fn select_row(&self, sql: &str, params: &Params) -> Result<Option<Row>> {
        Ok(self.select_rows(sql, params)?.into_iter().next())
    }

    /// First column of the first row, or `Null`.
    fn select_value(&self, sql: &str, params: &Params) -> Result<Value> {
        Ok(self
            .select_row(sql, params)?
            .and_then(|row| row.into_iter().next().map(|(_, v)| v))
            .unwrap_or(Value::Null))
    }

    /// Registers a commit listener. Dropping the returned subscription
    /// unregisters it.
    ///
    /// Listeners run synchronously on the committing thread while later
    /// commits wait, which keeps deliveries in commit order. A listener may
    /// read the database, but it must not commit a transaction on the same
    /// thread: that commit waits for the one being published and never
    /// returns. Hand such work to another thread, as a view set does.
    fn on_commit(&self, listener: CommitListener) -> CommitSubscription {
        self.commit_listeners().subscribe(listener)
    }
}
