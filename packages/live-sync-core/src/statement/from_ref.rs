//! FROM/JOIN participants of a statement.

use std::fmt;
use std::sync::Arc;

use crate::catalog::Table;
use crate::error::{Result, SyncError};

use super::expr::{ColumnRef, Expr};

/// How a FromRef takes part in the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// The first FROM table
    Anchor,
    Inner,
    Left,
}

/// One resolved FROM/JOIN participant.
#[derive(Debug, Clone)]
pub struct FromRef {
    /// Resolved table
    pub table: Arc<Table>,
    /// Alias as written
    pub alias: Option<String>,
    pub join_kind: JoinKind,
    /// `ON` condition; `None` for the anchor
    pub join_condition: Option<Expr>,
}

impl FromRef {
    /// Name other clauses use to refer to this participant.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table.name)
    }

    pub fn is_anchor(&self) -> bool {
        self.join_kind == JoinKind::Anchor
    }

    /// Returns whether `name` refers to this participant by alias or table name.
    pub fn answers_to(&self, name: &str) -> bool {
        self.alias.as_deref() == Some(name) || self.table.name == name
    }
}

impl fmt::Display for FromRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.join_kind {
            JoinKind::Anchor => {}
            JoinKind::Inner => write!(f, "INNER JOIN ")?,
            JoinKind::Left => write!(f, "LEFT JOIN ")?,
        }
        write!(f, "{}", self.table.name)?;
        if let Some(alias) = &self.alias {
            write!(f, " {}", alias)?;
        }
        if let Some(condition) = &self.join_condition {
            write!(f, " ON {}", condition)?;
        }
        Ok(())
    }
}

/// Binds `column` to the FromRef it refers to.
///
/// Qualified names must match an alias or table name; unqualified names
/// must exist in exactly one participant.
pub(crate) fn resolve_column(from_refs: &[FromRef], column: &mut ColumnRef) -> Result<()> {
    let source = match &column.qualifier {
        Some(qualifier) => {
            let index = from_refs
                .iter()
                .position(|r| r.answers_to(qualifier))
                .ok_or_else(|| SyncError::UnknownTable {
                    table: qualifier.clone(),
                })?;
            if !from_refs[index].table.has_field(&column.name) {
                return Err(SyncError::UnknownField {
                    table: from_refs[index].table.name.clone(),
                    field: column.name.clone(),
                });
            }
            index
        }
        None => {
            let mut candidates = from_refs
                .iter()
                .enumerate()
                .filter(|(_, r)| r.table.has_field(&column.name))
                .map(|(i, _)| i);
            let first = candidates.next().ok_or_else(|| SyncError::UnknownField {
                table: from_refs
                    .first()
                    .map(|r| r.table.name.clone())
                    .unwrap_or_default(),
                field: column.name.clone(),
            })?;
            if candidates.next().is_some() {
                return Err(SyncError::AmbiguousField {
                    field: column.name.clone(),
                });
            }
            first
        }
    };
    column.source = Some(source);
    Ok(())
}
