//! Statement model: SQL text plus named parameters, parsed once and
//! resolved against a [`TableCatalog`].

pub mod expr;
pub mod from_ref;
mod lexer;
mod mutation;
mod parser;
mod select;

use std::sync::Arc;

use crate::catalog::{Table, TableCatalog};
use crate::error::{Result, SyncError};
use crate::value::Params;

pub use expr::{BinaryOp, ColumnRef, Expr};
pub use from_ref::{FromRef, JoinKind};
pub use lexer::{Lexer, SpannedToken, Token};
pub use mutation::{DeleteStatement, InsertStatement, UpdateStatement};
pub use select::{FieldRef, OrderItem, OutputColumn, ProjectionItem, SelectStatement};

use parser::{Parser, RawStatement};

/// Statement features a backend accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// More than one FROM/JOIN participant
    pub can_join: bool,
    /// `field AS alias` projections
    pub can_field_alias: bool,
}

/// One parsed and resolved SQL operation.
#[derive(Debug, Clone)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    CreateTable(Table),
}

impl Statement {
    /// Parses `sql` and resolves it against `catalog`.
    ///
    /// `params` supplies the names `@@names`/`@@values` expand to, in order.
    pub fn parse(
        sql: &str,
        params: &Params,
        catalog: &TableCatalog,
        capabilities: Capabilities,
    ) -> Result<Self> {
        let supplied: Vec<String> = params.names().map(str::to_string).collect();
        Ok(match Parser::parse(sql, &supplied)? {
            RawStatement::Select(raw) => {
                Statement::Select(SelectStatement::resolve(sql, raw, catalog, capabilities)?)
            }
            RawStatement::Insert(raw) => Statement::Insert(InsertStatement::resolve(raw, catalog)?),
            RawStatement::Update(raw) => Statement::Update(UpdateStatement::resolve(raw, catalog)?),
            RawStatement::Delete(raw) => Statement::Delete(DeleteStatement::resolve(raw, catalog)?),
            RawStatement::CreateTable(table) => Statement::CreateTable(table),
        })
    }

    /// Name of the table the statement targets (the anchor for SELECT).
    pub fn table_name(&self) -> &str {
        match self {
            Statement::Select(s) => &s.anchor().table.name,
            Statement::Insert(s) => &s.table.name,
            Statement::Update(s) => &s.table.name,
            Statement::Delete(s) => &s.table.name,
            Statement::CreateTable(t) => &t.name,
        }
    }

    /// Distinct `@name` parameters referenced by the statement.
    pub fn param_names(&self) -> Vec<String> {
        match self {
            Statement::Select(s) => s.param_names().to_vec(),
            Statement::Insert(s) => s.param_names(),
            Statement::Update(s) => s.param_names(),
            Statement::Delete(s) => s.param_names(),
            Statement::CreateTable(_) => Vec::new(),
        }
    }

    pub fn into_select(self) -> Result<SelectStatement> {
        match self {
            Statement::Select(s) => Ok(s),
            other => Err(SyncError::syntax(
                format!("expected a SELECT statement on '{}'", other.table_name()),
                0,
            )),
        }
    }
}

/// Returns the table when `text` is nothing but a table name.
///
/// Transactions accept a bare table name in place of statement text and
/// build the statement from the supplied values.
pub fn shorthand_table(text: &str, catalog: &TableCatalog) -> Option<Arc<Table>> {
    let text = text.trim();
    if text.is_empty() || !text.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    catalog.get(text)
}
