//! Field definition within a table.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::value::Value;

/// Logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Int,
    Float,
    Text,
    Bool,
    DateTime,
}

impl FieldType {
    /// Maps a SQL type name (case-insensitive) to a logical type.
    pub fn from_sql_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" => Some(FieldType::Int),
            "FLOAT" | "DOUBLE" | "DECIMAL" | "REAL" | "NUMERIC" => Some(FieldType::Float),
            "VARCHAR" | "CHAR" | "TEXT" | "STRING" => Some(FieldType::Text),
            "BOOL" | "BOOLEAN" | "BIT" => Some(FieldType::Bool),
            "DATETIME" | "DATE" | "TIMESTAMP" => Some(FieldType::DateTime),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::Bool => "bool",
            FieldType::DateTime => "datetime",
        }
    }

    /// Converts a value into this type, or fails with `TypeMismatch`.
    ///
    /// `Null` passes through unchanged; nullability is checked by the table.
    pub fn coerce(&self, value: Value) -> Result<Value> {
        let mismatch = |value: &Value| SyncError::TypeMismatch {
            expected: self.name().to_string(),
            got: format!("{} '{}'", value.type_name(), value),
        };
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (FieldType::Int, Value::Int(i)) => Ok(Value::Int(i)),
            (FieldType::Int, v @ Value::Float(_)) => v.as_i64().map(Value::Int).ok_or_else(|| mismatch(&v)),
            (FieldType::Int, Value::Bool(b)) => Ok(Value::Int(b as i64)),
            (FieldType::Int, Value::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| mismatch(&Value::Text(s))),
            (FieldType::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (FieldType::Float, Value::Float(f)) => Ok(Value::Float(f)),
            (FieldType::Float, Value::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| mismatch(&Value::Text(s))),
            (FieldType::Text, Value::Text(s)) => Ok(Value::Text(s)),
            (FieldType::Text, v @ (Value::Int(_) | Value::Float(_) | Value::Bool(_) | Value::DateTime(_))) => {
                Ok(Value::Text(v.to_string()))
            }
            (FieldType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (FieldType::Bool, Value::Int(0)) => Ok(Value::Bool(false)),
            (FieldType::Bool, Value::Int(1)) => Ok(Value::Bool(true)),
            (FieldType::Bool, Value::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(mismatch(&Value::Text(s))),
            },
            (FieldType::DateTime, Value::DateTime(dt)) => Ok(Value::DateTime(dt)),
            (FieldType::DateTime, Value::Text(s)) => Value::parse_date_time(&s)
                .map(Value::DateTime)
                .ok_or_else(|| mismatch(&Value::Text(s))),
            (_, other) => Err(mismatch(&other)),
        }
    }
}

/// Column definition within a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name, unique within its table
    pub name: String,
    /// Logical type
    pub field_type: FieldType,
    /// Maximum text length, if declared
    pub max_length: Option<usize>,
    /// Whether `NULL` is accepted
    pub nullable: bool,
    /// Value generated by the backend on insert
    pub auto_increment: bool,
}

impl FieldDef {
    /// Creates a nullable field with no length limit.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            max_length: None,
            nullable: true,
            auto_increment: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self.nullable = false;
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }
}
