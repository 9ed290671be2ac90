//! Per-database default and override value generators.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::Table;
use crate::value::{Params, Value};

/// Produces a field value; receives the table name.
pub type ValueGenerator = Arc<dyn Fn(&str) -> Value + Send + Sync>;

#[derive(Clone)]
struct Hook {
    field: String,
    /// `None` applies to every table having the field
    table: Option<String>,
    generator: ValueGenerator,
}

impl Hook {
    fn applies_to(&self, table: &Table) -> bool {
        self.table.as_deref().map_or(true, |t| t == table.name) && table.has_field(&self.field)
    }
}

/// Which write a set of values is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
}

/// Value generators applied by transactions before a write is dispatched.
///
/// Defaults fill fields missing from an insert. Overrides replace the
/// value on every insert and update.
#[derive(Default)]
pub struct ValueHooks {
    defaults: RwLock<Vec<Hook>>,
    overrides: RwLock<Vec<Hook>>,
}

impl ValueHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills `field` with `generator`'s value when an insert omits it.
    ///
    /// With `table` set only that table is affected. A later hook for the
    /// same field and table replaces the earlier one.
    pub fn set_default_value<F>(&self, field: &str, table: Option<&str>, generator: F)
    where
        F: Fn(&str) -> Value + Send + Sync + 'static,
    {
        Self::set(&self.defaults, field, table, Arc::new(generator));
    }

    /// Forces `field` to `generator`'s value on every insert and update.
    pub fn set_override_value<F>(&self, field: &str, table: Option<&str>, generator: F)
    where
        F: Fn(&str) -> Value + Send + Sync + 'static,
    {
        Self::set(&self.overrides, field, table, Arc::new(generator));
    }

    /// Removes every hook.
    pub fn clear(&self) {
        self.defaults.write().clear();
        self.overrides.write().clear();
    }

    fn set(hooks: &RwLock<Vec<Hook>>, field: &str, table: Option<&str>, generator: ValueGenerator) {
        let mut hooks = hooks.write();
        hooks.retain(|h| !(h.field == field && h.table.as_deref() == table));
        hooks.push(Hook {
            field: field.to_string(),
            table: table.map(str::to_string),
            generator,
        });
    }

    /// Returns `values` with the hooks for `table` applied.
    ///
    /// Table-specific hooks take precedence over global ones.
    pub fn apply(&self, table: &Table, values: &Params, kind: WriteKind) -> Params {
        let mut result = values.clone();
        if kind == WriteKind::Insert {
            for hook in Self::ordered(&self.defaults, table) {
                if !result.contains(&hook.field) {
                    result.insert(hook.field.clone(), (hook.generator)(&table.name));
                }
            }
        }
        for hook in Self::ordered(&self.overrides, table) {
            result.insert(hook.field.clone(), (hook.generator)(&table.name));
        }
        result
    }

    /// Applicable hooks, table-specific ones first, one per field.
    fn ordered(hooks: &RwLock<Vec<Hook>>, table: &Table) -> Vec<Hook> {
        let hooks = hooks.read();
        let mut ordered: Vec<Hook> = Vec::new();
        let specific = hooks.iter().filter(|h| h.table.is_some());
        let global = hooks.iter().filter(|h| h.table.is_none());
        for hook in specific.chain(global) {
            if hook.applies_to(table) && !ordered.iter().any(|h| h.field == hook.field) {
                ordered.push(hook.clone());
            }
        }
        ordered
    }
}

impl fmt::Debug for ValueHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueHooks")
            .field("defaults", &self.defaults.read().len())
            .field("overrides", &self.overrides.read().len())
            .finish()
    }
}
