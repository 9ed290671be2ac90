//! Table catalog: the registry of table descriptions a database exposes.

mod field;
mod index;
mod table;

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::error::{Result, SyncError};

pub use field::{FieldDef, FieldType};
pub use index::{Index, IndexKind};
pub use table::{encode_key_value, Table, TableBuilder, KEY_VALUE_DELIMITER, KEY_VALUE_ESCAPE};

/// Per-database registry of [`Table`] descriptions.
///
/// Reads are lock-free; registration swaps in a new map under a writer mutex.
#[derive(Debug)]
pub struct TableCatalog {
    tables: ArcSwap<HashMap<String, Arc<Table>>>,
    write_lock: Mutex<()>,
}

impl TableCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            tables: ArcSwap::from_pointee(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Registers a table.
    ///
    /// # Returns
    /// The shared table, or `TableAlreadyExists`.
    pub fn register(&self, table: Table) -> Result<Arc<Table>> {
        let _guard = self.write_lock.lock();
        let current = self.tables.load();
        if current.contains_key(&table.name) {
            return Err(SyncError::TableAlreadyExists(table.name));
        }
        let table = Arc::new(table);
        let mut next = HashMap::clone(&current);
        next.insert(table.name.clone(), Arc::clone(&table));
        self.tables.store(Arc::new(next));
        Ok(table)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.load().get(name).cloned()
    }

    /// Looks up a table, failing with `UnknownTable`.
    pub fn resolve(&self, name: &str) -> Result<Arc<Table>> {
        self.get(name).ok_or_else(|| SyncError::UnknownTable {
            table: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.load().contains_key(name)
    }

    /// Table names in sorted order.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.load().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TableCatalog {
    fn default() -> Self {
        Self::new()
    }
}
