//! Index (key) definitions.

use serde::{Deserialize, Serialize};

/// Kind of index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    Primary,
    Unique,
    Other,
}

/// Ordered list of fields forming a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// Index name
    pub name: String,
    /// Primary, unique or plain
    pub kind: IndexKind,
    /// Field names in key order
    pub field_names: Vec<String>,
}

impl Index {
    pub fn new(name: impl Into<String>, kind: IndexKind, field_names: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            field_names,
        }
    }

    /// Returns whether rows must differ on this index.
    pub fn is_unique(&self) -> bool {
        matches!(self.kind, IndexKind::Primary | IndexKind::Unique)
    }
}
