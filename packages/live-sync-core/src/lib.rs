//! Core of the live view engine.
//!
//! Provides the value model, table catalog, SQL statement model, the
//! database and transaction contracts, the change event vocabulary and an
//! in-memory reference backend.

pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod event;
pub mod memory;
pub mod statement;
pub mod transaction;
pub mod value;

pub use catalog::{FieldDef, FieldType, Index, IndexKind, Table, TableCatalog};
pub use config::MemoryDbConfig;
pub use database::{
    CommitBatch, CommitListener, CommitListeners, CommitSubscription, Database, Snapshot,
    TransactionBackend,
};
pub use error::{ErrorKind, Result, SyncError};
pub use event::{DataEventTransaction, DataEventType, KeyValueDataEvent, RecordDataEvent};
pub use memory::MemoryDatabase;
pub use statement::{Capabilities, SelectStatement, Statement};
pub use transaction::{Transaction, ValueHooks};
pub use value::{Params, Row, Value};
