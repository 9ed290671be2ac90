//! Resolved INSERT, UPDATE and DELETE statements.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::catalog::{Table, TableCatalog};
use crate::error::{Result, SyncError};
use crate::value::Params;

use super::expr::{ColumnRef, Expr};
use super::from_ref::{resolve_column, FromRef, JoinKind};
use super::parser::{RawDelete, RawInsert, RawUpdate};

fn single_scope(table: &Arc<Table>) -> [FromRef; 1] {
    [FromRef {
        table: Arc::clone(table),
        alias: None,
        join_kind: JoinKind::Anchor,
        join_condition: None,
    }]
}

fn check_field(table: &Table, field: &str) -> Result<()> {
    if table.has_field(field) {
        Ok(())
    } else {
        Err(SyncError::UnknownField {
            table: table.name.clone(),
            field: field.to_string(),
        })
    }
}

/// Maps each field whose value is a bare `@param` to that parameter name.
fn params_by_field<'a>(pairs: impl Iterator<Item = (&'a String, &'a Expr)>) -> IndexMap<String, String> {
    pairs
        .filter_map(|(field, expr)| match expr {
            Expr::Param(name) => Some((field.clone(), name.clone())),
            _ => None,
        })
        .collect()
}

fn bind_param(pairs: &mut Vec<(String, Expr)>, param_for_field: &mut IndexMap<String, String>, field: &str) {
    let param = Expr::Param(field.to_string());
    match pairs.iter_mut().find(|(f, _)| f == field) {
        Some((_, expr)) => *expr = param,
        None => pairs.push((field.to_string(), param)),
    }
    param_for_field.insert(field.to_string(), field.to_string());
}

/// `field = @field AND ...` over the primary key.
fn key_condition(table: &Table, values: &Params) -> Result<Expr> {
    let mut conditions = Vec::new();
    for field in table.key_field_names() {
        if !values.contains(field) {
            return Err(SyncError::MissingParam {
                name: field.clone(),
            });
        }
        conditions.push(Expr::column_eq_param(
            ColumnRef::resolved(None, field.clone(), 0),
            field.clone(),
        ));
    }
    Expr::conjunction(conditions).ok_or_else(|| SyncError::InvalidSchema {
        table: table.name.clone(),
        message: "table has no key fields".to_string(),
    })
}

fn write_where(f: &mut fmt::Formatter<'_>, where_clause: &Option<Expr>) -> fmt::Result {
    match where_clause {
        Some(expr) => write!(f, " WHERE {}", expr),
        None => Ok(()),
    }
}

/// A resolved INSERT.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    pub table: Arc<Table>,
    /// Field to value expression, in statement order
    pub values: Vec<(String, Expr)>,
    /// Field to source parameter, for name-keyed binding
    pub param_for_field: IndexMap<String, String>,
}

impl InsertStatement {
    pub(crate) fn resolve(raw: RawInsert, catalog: &TableCatalog) -> Result<Self> {
        let table = catalog.resolve(&raw.table)?;
        let scope = single_scope(&table);
        let mut values: Vec<(String, Expr)> = Vec::with_capacity(raw.fields.len());
        for (field, mut expr) in raw.fields.into_iter().zip(raw.values) {
            check_field(&table, &field)?;
            if values.iter().any(|(f, _)| *f == field) {
                return Err(SyncError::DuplicateAlias { alias: field });
            }
            expr.resolve_columns(&mut |c| resolve_column(&scope, c))?;
            values.push((field, expr));
        }
        Ok(Self::from_parts(table, values))
    }

    /// `INSERT INTO table (@@names) VALUES (@@values)` over `values`.
    pub fn from_values(table: Arc<Table>, values: &Params) -> Result<Self> {
        let mut pairs = Vec::with_capacity(values.len());
        for name in values.names() {
            check_field(&table, name)?;
            pairs.push((name.to_string(), Expr::Param(name.to_string())));
        }
        Ok(Self::from_parts(table, pairs))
    }

    fn from_parts(table: Arc<Table>, values: Vec<(String, Expr)>) -> Self {
        let param_for_field = params_by_field(values.iter().map(|(f, e)| (f, e)));
        Self {
            table,
            values,
            param_for_field,
        }
    }

    /// Makes `field` take its value from the parameter of the same name.
    pub fn bind_field_to_param(&mut self, field: &str) -> Result<()> {
        check_field(&self.table, field)?;
        bind_param(&mut self.values, &mut self.param_for_field, field);
        Ok(())
    }

    pub fn param_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (_, expr) in &self.values {
            expr.collect_params(&mut names);
        }
        names
    }
}

impl fmt::Display for InsertStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INSERT INTO {} (", self.table.name)?;
        for (i, (field, _)) in self.values.iter().enumerate() {
            write!(f, "{}{}", if i > 0 { ", " } else { "" }, field)?;
        }
        write!(f, ") VALUES (")?;
        for (i, (_, expr)) in self.values.iter().enumerate() {
            write!(f, "{}{}", if i > 0 { ", " } else { "" }, expr)?;
        }
        write!(f, ")")
    }
}

/// A resolved UPDATE.
#[derive(Debug, Clone)]
pub struct UpdateStatement {
    pub table: Arc<Table>,
    /// `SET` assignments in statement order
    pub assignments: Vec<(String, Expr)>,
    pub where_clause: Option<Expr>,
    pub param_for_field: IndexMap<String, String>,
}

impl UpdateStatement {
    pub(crate) fn resolve(raw: RawUpdate, catalog: &TableCatalog) -> Result<Self> {
        let table = catalog.resolve(&raw.table)?;
        let scope = single_scope(&table);
        let mut assignments = Vec::with_capacity(raw.assignments.len());
        for (field, mut expr) in raw.assignments {
            check_field(&table, &field)?;
            expr.resolve_columns(&mut |c| resolve_column(&scope, c))?;
            assignments.push((field, expr));
        }
        let mut where_clause = raw.where_clause;
        if let Some(expr) = where_clause.as_mut() {
            expr.resolve_columns(&mut |c| resolve_column(&scope, c))?;
        }
        Ok(Self::from_parts(table, assignments, where_clause))
    }

    /// Updates every non-key field in `values` on the row whose primary key
    /// matches the key fields in `values`.
    pub fn by_key(table: Arc<Table>, values: &Params) -> Result<Self> {
        let where_clause = key_condition(&table, values)?;
        let key_fields = table.key_field_names();
        let mut assignments = Vec::new();
        for name in values.names() {
            check_field(&table, name)?;
            if !key_fields.iter().any(|k| k == name) {
                assignments.push((name.to_string(), Expr::Param(name.to_string())));
            }
        }
        Ok(Self::from_parts(table, assignments, Some(where_clause)))
    }

    fn from_parts(table: Arc<Table>, assignments: Vec<(String, Expr)>, where_clause: Option<Expr>) -> Self {
        let param_for_field = params_by_field(assignments.iter().map(|(f, e)| (f, e)));
        Self {
            table,
            assignments,
            where_clause,
            param_for_field,
        }
    }

    /// Makes `field` take its value from the parameter of the same name.
    pub fn bind_field_to_param(&mut self, field: &str) -> Result<()> {
        check_field(&self.table, field)?;
        bind_param(&mut self.assignments, &mut self.param_for_field, field);
        Ok(())
    }

    pub fn param_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (_, expr) in &self.assignments {
            expr.collect_params(&mut names);
        }
        if let Some(expr) = &self.where_clause {
            expr.collect_params(&mut names);
        }
        names
    }
}

impl fmt::Display for UpdateStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UPDATE {} SET ", self.table.name)?;
        for (i, (field, expr)) in self.assignments.iter().enumerate() {
            write!(f, "{}{} = {}", if i > 0 { ", " } else { "" }, field, expr)?;
        }
        write_where(f, &self.where_clause)
    }
}

/// A resolved DELETE.
#[derive(Debug, Clone)]
pub struct DeleteStatement {
    pub table: Arc<Table>,
    pub where_clause: Option<Expr>,
}

impl DeleteStatement {
    pub(crate) fn resolve(raw: RawDelete, catalog: &TableCatalog) -> Result<Self> {
        let table = catalog.resolve(&raw.table)?;
        let scope = single_scope(&table);
        let mut where_clause = raw.where_clause;
        if let Some(expr) = where_clause.as_mut() {
            expr.resolve_columns(&mut |c| resolve_column(&scope, c))?;
        }
        Ok(Self {
            table,
            where_clause,
        })
    }

    /// Deletes the row whose primary key matches the key fields in `values`.
    pub fn by_key(table: Arc<Table>, values: &Params) -> Result<Self> {
        let where_clause = key_condition(&table, values)?;
        Ok(Self {
            table,
            where_clause: Some(where_clause),
        })
    }

    pub fn param_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(expr) = &self.where_clause {
            expr.collect_params(&mut names);
        }
        names
    }
}

impl fmt::Display for DeleteStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DELETE FROM {}", self.table.name)?;
        write_where(f, &self.where_clause)
    }
}
