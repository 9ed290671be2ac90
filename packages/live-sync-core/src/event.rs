//! Change event vocabulary.
//!
//! [`KeyValueDataEvent`]s are produced by the transaction engine, one per
//! net mutated row. [`RecordDataEvent`]s are the view-scoped events
//! delivered to subscribers, batched per commit in a
//! [`DataEventTransaction`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Row;

/// Kind of a data event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataEventType {
    /// Start of a view's initial snapshot
    InitialBegin,
    /// One row of the initial snapshot
    Initial,
    /// End of a view's initial snapshot
    InitialEnd,
    Insert,
    Update,
    Delete,
}

impl DataEventType {
    pub fn is_initial(&self) -> bool {
        matches!(
            self,
            DataEventType::InitialBegin | DataEventType::Initial | DataEventType::InitialEnd
        )
    }
}

impl fmt::Display for DataEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataEventType::InitialBegin => "InitialBegin",
            DataEventType::Initial => "Initial",
            DataEventType::InitialEnd => "InitialEnd",
            DataEventType::Insert => "Insert",
            DataEventType::Update => "Update",
            DataEventType::Delete => "Delete",
        };
        f.write_str(name)
    }
}

/// Minimal committed change: which row of which table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValueDataEvent {
    pub event_type: DataEventType,
    /// Table name
    pub name: String,
    /// Encoded primary key
    pub key_value: String,
}

impl KeyValueDataEvent {
    pub fn new(event_type: DataEventType, name: impl Into<String>, key_value: impl Into<String>) -> Self {
        Self {
            event_type,
            name: name.into(),
            key_value: key_value.into(),
        }
    }
}

/// A view-scoped change carrying the row as the view projects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDataEvent {
    pub event_type: DataEventType,
    /// View name
    pub name: String,
    /// Encoded view key; empty for `InitialBegin`/`InitialEnd`
    pub key_value: String,
    /// Row snapshot; `None` for `InitialBegin`/`InitialEnd`
    pub record: Option<Row>,
}

impl RecordDataEvent {
    pub fn new(event_type: DataEventType, name: impl Into<String>, key_value: impl Into<String>, record: Option<Row>) -> Self {
        Self {
            event_type,
            name: name.into(),
            key_value: key_value.into(),
            record,
        }
    }

    /// Snapshot delimiter (`InitialBegin` or `InitialEnd`) for view `name`.
    pub fn marker(event_type: DataEventType, name: impl Into<String>) -> Self {
        Self::new(event_type, name, String::new(), None)
    }
}

/// One commit's ordered batch of record events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataEventTransaction {
    /// Commit time of the underlying transaction
    pub date_time: DateTime<Utc>,
    pub data_events: Vec<RecordDataEvent>,
}

impl DataEventTransaction {
    pub fn new(date_time: DateTime<Utc>, data_events: Vec<RecordDataEvent>) -> Self {
        Self {
            date_time,
            data_events,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data_events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data_events.len()
    }
}
