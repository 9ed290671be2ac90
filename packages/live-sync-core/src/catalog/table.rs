//! Table description: fields, indexes and key encoding.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::value::{Row, Value};

use super::field::{FieldDef, FieldType};
use super::index::{Index, IndexKind};

/// Separator between field values in an encoded key.
///
/// In composite keys a part containing the separator or
/// [`KEY_VALUE_ESCAPE`] has that character prefixed with the escape.
/// Single-field keys are never escaped.
pub const KEY_VALUE_DELIMITER: char = ';';

/// Escape character inside composite key parts.
pub const KEY_VALUE_ESCAPE: char = '\\';

/// Encodes the values of `field_names` in `row` into one key string.
///
/// Returns `None` if a field is missing from the row.
pub fn encode_key_value(row: &Row, field_names: &[String]) -> Option<String> {
    if let [name] = field_names {
        return Some(row.get(name)?.key_text());
    }
    let mut key = String::new();
    for (i, name) in field_names.iter().enumerate() {
        if i > 0 {
            key.push(KEY_VALUE_DELIMITER);
        }
        for c in row.get(name)?.key_text().chars() {
            if c == KEY_VALUE_DELIMITER || c == KEY_VALUE_ESCAPE {
                key.push(KEY_VALUE_ESCAPE);
            }
            key.push(c);
        }
    }
    Some(key)
}

/// Splits an encoded composite key into its unescaped parts.
fn split_key_value(key_value: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut chars = key_value.chars();
    while let Some(c) = chars.next() {
        match c {
            KEY_VALUE_ESCAPE => {
                if let (Some(next), Some(part)) = (chars.next(), parts.last_mut()) {
                    part.push(next);
                }
            }
            KEY_VALUE_DELIMITER => parts.push(String::new()),
            other => {
                if let Some(part) = parts.last_mut() {
                    part.push(other);
                }
            }
        }
    }
    parts
}

/// A relation: name, fields and indexes.
///
/// `indexes[0]` is always the primary key and provides row identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name
    pub name: String,
    /// Field definitions in declaration order
    pub fields: Vec<FieldDef>,
    /// Indexes, primary key first
    pub indexes: Vec<Index>,
}

impl Table {
    /// Creates a validated table.
    ///
    /// The primary index is moved to position 0 if declared elsewhere.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>, mut indexes: Vec<Index>) -> Result<Self> {
        let name = name.into();
        let invalid = |message: String| SyncError::InvalidSchema {
            table: name.clone(),
            message,
        };

        if fields.is_empty() {
            return Err(invalid("table has no fields".to_string()));
        }

        let mut seen_names = HashSet::new();
        for field in &fields {
            if !seen_names.insert(field.name.as_str()) {
                return Err(invalid(format!("duplicate field '{}'", field.name)));
            }
        }

        let primary_count = indexes
            .iter()
            .filter(|index| index.kind == IndexKind::Primary)
            .count();
        if primary_count != 1 {
            return Err(invalid(format!(
                "expected exactly one primary index, found {}",
                primary_count
            )));
        }

        for index in &indexes {
            if index.field_names.is_empty() {
                return Err(invalid(format!("index '{}' has no fields", index.name)));
            }
            for field_name in &index.field_names {
                if !seen_names.contains(field_name.as_str()) {
                    return Err(invalid(format!(
                        "index '{}' references unknown field '{}'",
                        index.name, field_name
                    )));
                }
            }
        }

        if let Some(pos) = indexes.iter().position(|i| i.kind == IndexKind::Primary) {
            let primary = indexes.remove(pos);
            indexes.insert(0, primary);
        }

        Ok(Self {
            name,
            fields,
            indexes,
        })
    }

    /// Starts a table builder.
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder {
            name: name.into(),
            fields: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Returns the primary index.
    pub fn primary_index(&self) -> &Index {
        &self.indexes[0]
    }

    /// Field names of the primary key in key order.
    pub fn key_field_names(&self) -> &[String] {
        &self.primary_index().field_names
    }

    /// Returns the auto-increment field, if any.
    pub fn auto_increment_field(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.auto_increment)
    }

    /// Encodes the primary key of `row`.
    pub fn key_value(&self, row: &Row) -> Result<String> {
        encode_key_value(row, self.key_field_names()).ok_or_else(|| {
            let missing = self
                .key_field_names()
                .iter()
                .find(|f| !row.contains_key(f.as_str()))
                .cloned()
                .unwrap_or_default();
            SyncError::UnknownField {
                table: self.name.clone(),
                field: missing,
            }
        })
    }

    /// Decodes an encoded primary key back into typed field/value pairs.
    pub fn decode_key_value(&self, key_value: &str) -> Result<Vec<(String, Value)>> {
        let key_fields = self.key_field_names();
        let parts: Vec<String> = if key_fields.len() == 1 {
            vec![key_value.to_string()]
        } else {
            split_key_value(key_value)
        };
        if parts.len() != key_fields.len() {
            return Err(SyncError::TypeMismatch {
                expected: format!("{} key parts for '{}'", key_fields.len(), self.name),
                got: format!("'{}'", key_value),
            });
        }

        key_fields
            .iter()
            .zip(parts)
            .map(|(name, part)| {
                let field_type = self.field(name).map(|f| f.field_type).unwrap_or(FieldType::Text);
                let value = if part.is_empty() && field_type != FieldType::Text {
                    Value::Null
                } else {
                    field_type.coerce(Value::Text(part))?
                };
                Ok((name.clone(), value))
            })
            .collect()
    }

    /// Coerces every value of `row` to its field type and checks
    /// nullability and length limits.
    pub fn coerce_row(&self, row: Row) -> Result<Row> {
        let mut coerced = Row::with_capacity(self.fields.len());
        for (name, value) in row {
            let field = self.field(&name).ok_or_else(|| SyncError::UnknownField {
                table: self.name.clone(),
                field: name.clone(),
            })?;
            coerced.insert(name, field.field_type.coerce(value)?);
        }
        for field in &self.fields {
            let value = coerced.entry(field.name.clone()).or_insert(Value::Null);
            if value.is_null() && !field.nullable {
                return Err(SyncError::ConstraintViolation {
                    table: self.name.clone(),
                    message: format!("field '{}' cannot be null", field.name),
                });
            }
            if let (Some(max), Value::Text(text)) = (field.max_length, &*value) {
                if text.chars().count() > max {
                    return Err(SyncError::ConstraintViolation {
                        table: self.name.clone(),
                        message: format!("field '{}' exceeds {} characters", field.name, max),
                    });
                }
            }
        }
        // Declaration order, so projections of `*` are stable.
        coerced.sort_by_cached_key(|name, _| {
            self.fields.iter().position(|f| &f.name == name).unwrap_or(usize::MAX)
        });
        Ok(coerced)
    }
}

/// Builder for [`Table`].
#[derive(Debug)]
pub struct TableBuilder {
    name: String,
    fields: Vec<FieldDef>,
    indexes: Vec<Index>,
}

impl TableBuilder {
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn primary_key(mut self, field_names: &[&str]) -> Self {
        self.indexes.push(Index::new(
            "PRIMARY",
            IndexKind::Primary,
            field_names.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn unique_index(mut self, name: &str, field_names: &[&str]) -> Self {
        self.indexes.push(Index::new(
            name,
            IndexKind::Unique,
            field_names.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn index(mut self, name: &str, field_names: &[&str]) -> Self {
        self.indexes.push(Index::new(
            name,
            IndexKind::Other,
            field_names.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn build(self) -> Result<Table> {
        Table::new(self.name, self.fields, self.indexes)
    }
}
