//! Resolved SELECT statements.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::catalog::TableCatalog;
use crate::error::{Result, SyncError};

use super::expr::Expr;
use super::from_ref::{resolve_column, FromRef};
use super::parser::{RawProjectionItem, RawSelect};
use super::Capabilities;

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub descending: bool,
}

/// A projected field bound to its FromRef.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    /// Index into the statement's FromRefs
    pub from_ref: usize,
    pub field: String,
    pub alias: Option<String>,
}

impl FieldRef {
    /// Column name in result rows.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.field)
    }
}

/// One item of the select list.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionItem {
    /// `*`: every field of every FromRef
    Wildcard,
    Field(FieldRef),
}

/// A result column after wildcard expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    pub from_ref: usize,
    pub field: String,
    pub name: String,
}

/// A SELECT resolved against a catalog.
#[derive(Debug, Clone)]
pub struct SelectStatement {
    sql: String,
    from_refs: Vec<FromRef>,
    projection: Vec<ProjectionItem>,
    columns: Vec<OutputColumn>,
    where_clause: Option<Expr>,
    order_by: Vec<OrderItem>,
    param_names: Vec<String>,
}

impl SelectStatement {
    pub(crate) fn resolve(
        sql: &str,
        raw: RawSelect,
        catalog: &TableCatalog,
        capabilities: Capabilities,
    ) -> Result<Self> {
        let mut from_refs: Vec<FromRef> = Vec::with_capacity(raw.from.len());
        let mut qualifiers = HashSet::new();
        for raw_ref in raw.from {
            let table = catalog.resolve(&raw_ref.table)?;
            let from_ref = FromRef {
                table,
                alias: raw_ref.alias,
                join_kind: raw_ref.join_kind,
                join_condition: raw_ref.condition,
            };
            if !qualifiers.insert(from_ref.qualifier().to_string()) {
                return Err(SyncError::DuplicateAlias {
                    alias: from_ref.qualifier().to_string(),
                });
            }
            from_refs.push(from_ref);
        }

        if from_refs.len() > 1 && !capabilities.can_join {
            return Err(SyncError::Capability { feature: "joins" });
        }

        // Conditions are resolved against the full FromRef list.
        let scope = from_refs.clone();
        for from_ref in from_refs.iter_mut() {
            if let Some(condition) = from_ref.join_condition.as_mut() {
                condition.resolve_columns(&mut |c| resolve_column(&scope, c))?;
            }
        }
        let mut where_clause = raw.where_clause;
        if let Some(expr) = where_clause.as_mut() {
            expr.resolve_columns(&mut |c| resolve_column(&from_refs, c))?;
        }
        let mut order_by = raw.order_by;
        for item in order_by.iter_mut() {
            item.expr.resolve_columns(&mut |c| resolve_column(&from_refs, c))?;
        }

        let mut projection = Vec::with_capacity(raw.projection.len());
        for item in raw.projection {
            match item {
                RawProjectionItem::Wildcard => projection.push(ProjectionItem::Wildcard),
                RawProjectionItem::Column { mut column, alias } => {
                    if alias.is_some() && !capabilities.can_field_alias {
                        return Err(SyncError::Capability {
                            feature: "field aliases",
                        });
                    }
                    resolve_column(&from_refs, &mut column)?;
                    projection.push(ProjectionItem::Field(FieldRef {
                        from_ref: column.source.unwrap_or(0),
                        field: column.name,
                        alias,
                    }));
                }
            }
        }

        let mut statement = Self {
            sql: sql.trim().to_string(),
            from_refs,
            projection,
            columns: Vec::new(),
            where_clause,
            order_by,
            param_names: Vec::new(),
        };
        statement.columns = statement.expand_columns()?;
        statement.param_names = statement.collect_param_names();
        Ok(statement)
    }

    /// Statement text as registered.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn from_refs(&self) -> &[FromRef] {
        &self.from_refs
    }

    pub fn anchor(&self) -> &FromRef {
        &self.from_refs[0]
    }

    pub fn projection(&self) -> &[ProjectionItem] {
        &self.projection
    }

    /// Result columns in output order.
    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    pub fn where_clause(&self) -> Option<&Expr> {
        self.where_clause.as_ref()
    }

    pub fn order_by(&self) -> &[OrderItem] {
        &self.order_by
    }

    /// Distinct `@name` parameters in first-occurrence order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Output column name of `field` of FromRef `from_ref`, if projected.
    pub fn output_name(&self, from_ref: usize, field: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.from_ref == from_ref && c.field == field)
            .map(|c| c.name.as_str())
    }

    /// Returns a copy with `condition` ANDed into the clause that filters
    /// FromRef `from_ref`: the WHERE clause for the anchor, the JOIN
    /// condition otherwise.
    pub fn narrowed(&self, from_ref: usize, condition: Expr) -> Self {
        let mut narrowed = self.clone();
        if from_ref == 0 {
            narrowed.where_clause = Some(Expr::and_also(narrowed.where_clause.take(), condition));
        } else if let Some(target) = narrowed.from_refs.get_mut(from_ref) {
            target.join_condition = Some(Expr::and_also(target.join_condition.take(), condition));
        }
        narrowed.param_names = narrowed.collect_param_names();
        narrowed.sql = narrowed.to_sql();
        narrowed
    }

    /// Renders the statement back to SQL text.
    pub fn to_sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        for (i, item) in self.projection.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            match item {
                ProjectionItem::Wildcard => sql.push('*'),
                ProjectionItem::Field(field) => {
                    if self.from_refs.len() > 1 {
                        let _ = write!(sql, "{}.", self.from_refs[field.from_ref].qualifier());
                    }
                    sql.push_str(&field.field);
                    if let Some(alias) = &field.alias {
                        let _ = write!(sql, " AS {}", alias);
                    }
                }
            }
        }
        sql.push_str(" FROM ");
        for (i, from_ref) in self.from_refs.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
            }
            let _ = write!(sql, "{}", from_ref);
        }
        if let Some(where_clause) = &self.where_clause {
            let _ = write!(sql, " WHERE {}", where_clause);
        }
        for (i, item) in self.order_by.iter().enumerate() {
            sql.push_str(if i == 0 { " ORDER BY " } else { ", " });
            let _ = write!(sql, "{}", item.expr);
            if item.descending {
                sql.push_str(" DESC");
            }
        }
        sql
    }

    fn expand_columns(&self) -> Result<Vec<OutputColumn>> {
        let mut columns: Vec<OutputColumn> = Vec::new();
        for item in &self.projection {
            match item {
                ProjectionItem::Wildcard => {
                    for (index, from_ref) in self.from_refs.iter().enumerate() {
                        for field in &from_ref.table.fields {
                            // First FromRef wins on name clashes.
                            if columns.iter().any(|c| c.name == field.name) {
                                continue;
                            }
                            columns.push(OutputColumn {
                                from_ref: index,
                                field: field.name.clone(),
                                name: field.name.clone(),
                            });
                        }
                    }
                }
                ProjectionItem::Field(field) => {
                    let name = field.output_name();
                    if columns.iter().any(|c| c.name == name) {
                        return Err(SyncError::DuplicateAlias {
                            alias: name.to_string(),
                        });
                    }
                    columns.push(OutputColumn {
                        from_ref: field.from_ref,
                        field: field.field.clone(),
                        name: name.to_string(),
                    });
                }
            }
        }
        Ok(columns)
    }

    fn collect_param_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for from_ref in &self.from_refs {
            if let Some(condition) = &from_ref.join_condition {
                condition.collect_params(&mut names);
            }
        }
        if let Some(where_clause) = &self.where_clause {
            where_clause.collect_params(&mut names);
        }
        for item in &self.order_by {
            item.expr.collect_params(&mut names);
        }
        names
    }
}
