//! Committed table contents, shared copy-on-write between snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::database::Snapshot;
use crate::error::Result;
use crate::statement::SelectStatement;
use crate::value::{Params, Row};

use super::query;

/// Rows of one table keyed by encoded primary key, in insertion order.
#[derive(Debug, Clone)]
pub struct TableData {
    pub rows: IndexMap<String, Row>,
    /// Next value handed out by the auto-increment field
    pub next_auto_id: i64,
}

impl TableData {
    pub fn new(first_auto_id: i64) -> Self {
        Self {
            rows: IndexMap::new(),
            next_auto_id: first_auto_id,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One committed version of every table.
///
/// Tables untouched by a commit share their `TableData` with the previous
/// version.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub(crate) version: u64,
    pub(crate) tables: HashMap<String, Arc<TableData>>,
}

impl StoreSnapshot {
    /// Contents of `table`; `None` when nothing was ever written to it.
    pub fn table(&self, table: &str) -> Option<&TableData> {
        self.tables.get(table).map(Arc::as_ref)
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.table(table).map_or(0, TableData::len)
    }

    /// Rows of `table` in insertion order.
    pub fn rows<'s>(&'s self, table: &str) -> Box<dyn Iterator<Item = &'s Row> + 's> {
        match self.table(table) {
            Some(data) => Box::new(data.rows.values()),
            None => Box::new(std::iter::empty()),
        }
    }
}

impl Snapshot for StoreSnapshot {
    fn version(&self) -> u64 {
        self.version
    }

    fn select(&self, statement: &SelectStatement, params: &Params) -> Result<Vec<Row>> {
        query::select(self, statement, params)
    }
}
