//! Transaction staging for the in-memory backend.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::catalog::{encode_key_value, Table};
use crate::database::{KeyChange, KeyResolver, Snapshot, TransactionBackend};
use crate::error::{Result, SyncError};
use crate::statement::expr::Expr;
use crate::statement::{DeleteStatement, InsertStatement, UpdateStatement};
use crate::value::{Params, Row, Value};

use super::eval::{eval, is_true};
use super::store::{StoreSnapshot, TableData};
use super::translate::bind;
use super::MemoryDatabase;

/// Writes of one transaction, staged against the snapshot it began on.
///
/// The first write to a table copies that table's data; later writes
/// mutate the private copy. Commit swaps in a new store version.
pub(crate) struct MemoryBackend<'a> {
    db: &'a MemoryDatabase,
    base: Arc<StoreSnapshot>,
    staged: HashMap<String, Arc<TableData>>,
}

impl<'a> MemoryBackend<'a> {
    pub fn new(db: &'a MemoryDatabase) -> Self {
        Self {
            db,
            base: db.store.load_full(),
            staged: HashMap::new(),
        }
    }

    fn table_data(&mut self, table: &Table) -> &mut TableData {
        let base = &self.base;
        let first_auto_id = self.db.config.first_auto_increment;
        let entry = self.staged.entry(table.name.clone()).or_insert_with(|| {
            base.tables
                .get(&table.name)
                .cloned()
                .unwrap_or_else(|| Arc::new(TableData::new(first_auto_id)))
        });
        Arc::make_mut(entry)
    }

    /// Rows of `table` as this transaction sees them.
    fn matching_keys(&mut self, table: &Table, filter: Option<&Expr>) -> Result<Vec<String>> {
        let data = self.table_data(table);
        let mut keys = Vec::new();
        for (key, row) in &data.rows {
            let keep = match filter {
                Some(filter) => is_true(filter, &[Some(row)])?,
                None => true,
            };
            if keep {
                keys.push(key.clone());
            }
        }
        Ok(keys)
    }
}

/// Rejects `row` if it collides with another row on a unique index.
///
/// Rows with a NULL in the index fields never collide.
fn check_unique(table: &Table, data: &TableData, row: &Row, skip_key: Option<&str>) -> Result<()> {
    for index in table.indexes.iter().skip(1).filter(|i| i.is_unique()) {
        if index.field_names.iter().any(|f| row.get(f).map_or(true, Value::is_null)) {
            continue;
        }
        let Some(encoded) = encode_key_value(row, &index.field_names) else {
            continue;
        };
        let clash = data.rows.iter().any(|(key, other)| {
            Some(key.as_str()) != skip_key
                && encode_key_value(other, &index.field_names).as_deref() == Some(encoded.as_str())
        });
        if clash {
            return Err(SyncError::DuplicateKey {
                table: table.name.clone(),
                key: encoded,
            });
        }
    }
    Ok(())
}

fn key_row(table: &Table, row: &Row) -> Row {
    table
        .key_field_names()
        .iter()
        .map(|f| (f.clone(), row.get(f).cloned().unwrap_or(Value::Null)))
        .collect()
}

impl TransactionBackend for MemoryBackend<'_> {
    fn insert(&mut self, statement: &InsertStatement, params: &Params) -> Result<KeyResolver> {
        let table = Arc::clone(&statement.table);
        let mut row = Row::new();
        for (field, expr) in &statement.values {
            row.insert(field.clone(), eval(&bind(expr, params)?, &[])?);
        }

        let data = self.table_data(&table);
        let mut next_auto_id = data.next_auto_id;
        if let Some(auto) = table.auto_increment_field() {
            if row.get(&auto.name).map_or(true, Value::is_null) {
                row.insert(auto.name.clone(), Value::Int(next_auto_id));
            }
        }
        let row = table.coerce_row(row)?;
        if let Some(auto) = table.auto_increment_field() {
            if let Some(id) = row.get(&auto.name).and_then(Value::as_i64) {
                next_auto_id = next_auto_id.max(id.saturating_add(1));
            }
        }

        let key = table.key_value(&row)?;
        if data.rows.contains_key(&key) {
            return Err(SyncError::DuplicateKey {
                table: table.name.clone(),
                key,
            });
        }
        check_unique(&table, data, &row, None)?;

        let resolved = key_row(&table, &row);
        data.rows.insert(key, row);
        data.next_auto_id = next_auto_id;
        Ok(Box::new(move || Ok(resolved)))
    }

    fn update(&mut self, statement: &UpdateStatement, params: &Params) -> Result<Vec<KeyChange>> {
        let table = Arc::clone(&statement.table);
        let filter = statement
            .where_clause
            .as_ref()
            .map(|w| bind(w, params))
            .transpose()?;
        let assignments = statement
            .assignments
            .iter()
            .map(|(field, expr)| Ok((field.clone(), bind(expr, params)?)))
            .collect::<Result<Vec<_>>>()?;
        let keys = self.matching_keys(&table, filter.as_ref())?;

        // Applied to a working copy so a failing row leaves the table as it was.
        let data = self.table_data(&table);
        let mut working = data.clone();
        let mut changes = Vec::with_capacity(keys.len());
        for old_key in keys {
            let Some(old_row) = working.rows.get(&old_key).cloned() else {
                continue;
            };
            let mut new_row = old_row.clone();
            for (field, expr) in &assignments {
                new_row.insert(field.clone(), eval(expr, &[Some(&old_row)])?);
            }
            let new_row = table.coerce_row(new_row)?;
            let new_key = table.key_value(&new_row)?;
            if new_key != old_key && working.rows.contains_key(&new_key) {
                return Err(SyncError::DuplicateKey {
                    table: table.name.clone(),
                    key: new_key,
                });
            }
            check_unique(&table, &working, &new_row, Some(&old_key))?;

            if new_key == old_key {
                working.rows.insert(old_key.clone(), new_row);
            } else {
                working.rows.shift_remove(&old_key);
                working.rows.insert(new_key.clone(), new_row);
            }
            changes.push(KeyChange { old_key, new_key });
        }
        *data = working;
        Ok(changes)
    }

    fn delete(&mut self, statement: &DeleteStatement, params: &Params) -> Result<Vec<String>> {
        let filter = statement
            .where_clause
            .as_ref()
            .map(|w| bind(w, params))
            .transpose()?;
        let keys = self.matching_keys(&statement.table, filter.as_ref())?;
        let data = self.table_data(&statement.table);
        for key in &keys {
            data.rows.shift_remove(key);
        }
        Ok(keys)
    }

    fn commit(
        self: Box<Self>,
        publish: &mut dyn FnMut(Arc<dyn Snapshot>, Arc<dyn Snapshot>),
    ) -> Result<()> {
        let db = self.db;
        let _writer = db.commit_lock.lock();
        let current = db.store.load_full();
        if self.staged.is_empty() {
            publish(Arc::clone(&current) as Arc<dyn Snapshot>, current);
            return Ok(());
        }
        if current.version != self.base.version {
            return Err(SyncError::Storage(format!(
                "write conflict: transaction began at version {}, store is at version {}",
                self.base.version, current.version
            )));
        }

        let mut tables = current.tables.clone();
        tables.extend(self.staged);
        let post = Arc::new(StoreSnapshot {
            version: current.version + 1,
            tables,
        });
        db.store.store(Arc::clone(&post));
        debug!(version = post.version, "store version committed");
        publish(current, post);
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        debug!(
            tables = self.staged.len(),
            base_version = self.base.version,
            "discarding staged writes"
        );
        Ok(())
    }
}
