//! Parameters derived from another view's live rows.

use std::fmt;

use indexmap::IndexMap;
use live_sync_core::{DataEventType, RecordDataEvent, Value};

/// Identifier of a [`DynamicParam`] within its view set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(pub(crate) usize);

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "param#{}", self.0)
    }
}

/// How many values a parameter materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// At most one value; `Null` when the parent view is empty
    Single,
    /// Distinct values as a sorted list, for `IN (@param)`
    Multi,
}

/// A value fed by one field of a parent view's current rows.
///
/// The parameter mirrors the parent's rows as view key to field value and
/// materializes that map into a [`Value`]. It turns dirty only when the
/// materialized value changes, and stays dirty until the view set resets
/// it after every consumer has bound the new value.
#[derive(Debug, Clone)]
pub struct DynamicParam {
    id: ParamId,
    name: String,
    kind: ParamKind,
    by_key: IndexMap<String, Value>,
    value: Value,
    dirty: bool,
}

impl DynamicParam {
    pub(crate) fn new(id: ParamId, name: impl Into<String>, kind: ParamKind) -> Self {
        let mut param = Self {
            id,
            name: name.into(),
            kind,
            by_key: IndexMap::new(),
            value: Value::Null,
            dirty: false,
        };
        param.value = param.materialize();
        param
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    /// Current materialized value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn reset_dirty(&mut self) {
        self.dirty = false;
    }

    /// Applies a parent view's events, reading `field` from each record.
    ///
    /// Returns whether the materialized value changed.
    pub fn apply_events(&mut self, events: &[RecordDataEvent], field: &str) -> bool {
        for event in events {
            match event.event_type {
                DataEventType::InitialBegin => self.by_key.clear(),
                DataEventType::InitialEnd => {}
                DataEventType::Initial | DataEventType::Insert | DataEventType::Update => {
                    let value = event
                        .record
                        .as_ref()
                        .and_then(|r| r.get(field))
                        .cloned()
                        .unwrap_or(Value::Null);
                    self.by_key.insert(event.key_value.clone(), value);
                }
                DataEventType::Delete => {
                    self.by_key.shift_remove(&event.key_value);
                }
            }
        }

        let value = self.materialize();
        if value == self.value {
            return false;
        }
        self.value = value;
        self.dirty = true;
        true
    }

    fn materialize(&self) -> Value {
        match self.kind {
            ParamKind::Single => self
                .by_key
                .values()
                .find(|v| !v.is_null())
                .cloned()
                .unwrap_or(Value::Null),
            ParamKind::Multi => {
                let mut values: Vec<Value> = self
                    .by_key
                    .values()
                    .filter(|v| !v.is_null())
                    .cloned()
                    .collect();
                values.sort();
                values.dedup();
                Value::List(values)
            }
        }
    }
}
