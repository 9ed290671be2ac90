//! Buffered key-level changes of an open transaction.

use std::collections::HashMap;

use crate::event::{DataEventType, KeyValueDataEvent};

#[derive(Debug, Clone)]
struct PendingEntry {
    table: String,
    key_value: String,
    first: DataEventType,
    last: DataEventType,
}

impl PendingEntry {
    /// Net effect of every operation on this key.
    fn net(&self) -> Option<DataEventType> {
        use DataEventType::{Delete, Insert, Update};
        match (self.first, self.last) {
            (Insert, Delete) => None,
            (Insert, _) => Some(Insert),
            (Delete, Delete) => Some(Delete),
            (Delete, _) => Some(Update),
            (_, Delete) => Some(Delete),
            _ => Some(Update),
        }
    }
}

/// Per-key change buffer.
///
/// Only the first and last operation per key are kept; the net event takes
/// the position of the key's first operation.
#[derive(Debug, Default)]
pub(crate) struct PendingEvents {
    entries: Vec<PendingEntry>,
    positions: HashMap<(String, String), usize>,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, table: &str, key_value: &str, event_type: DataEventType) {
        let id = (table.to_string(), key_value.to_string());
        match self.positions.get(&id) {
            Some(&position) => self.entries[position].last = event_type,
            None => {
                self.positions.insert(id, self.entries.len());
                self.entries.push(PendingEntry {
                    table: table.to_string(),
                    key_value: key_value.to_string(),
                    first: event_type,
                    last: event_type,
                });
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
    }

    /// Number of keys touched so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Net events in operation order.
    pub fn into_events(self) -> Vec<KeyValueDataEvent> {
        self.entries
            .into_iter()
            .filter_map(|entry| {
                entry
                    .net()
                    .map(|event_type| KeyValueDataEvent::new(event_type, entry.table, entry.key_value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DataEventType::{Delete, Insert, Update};

    fn net(ops: &[DataEventType]) -> Vec<DataEventType> {
        let mut pending = PendingEvents::new();
        for op in ops {
            pending.record("t", "1", *op);
        }
        pending.into_events().into_iter().map(|e| e.event_type).collect()
    }

    #[test]
    fn test_insert_then_delete_cancels() {
        assert!(net(&[Insert, Update, Delete]).is_empty());
    }

    #[test]
    fn test_net_types() {
        assert_eq!(net(&[Insert, Update]), vec![Insert]);
        assert_eq!(net(&[Delete, Insert]), vec![Update]);
        assert_eq!(net(&[Update, Delete]), vec![Delete]);
        assert_eq!(net(&[Update, Update]), vec![Update]);
        assert_eq!(net(&[Delete, Insert, Delete]), vec![Delete]);
    }

    #[test]
    fn test_keeps_first_position() {
        let mut pending = PendingEvents::new();
        pending.record("t", "1", Update);
        pending.record("t", "2", Delete);
        pending.record("u", "1", Insert);
        pending.record("t", "1", Update);
        let keys: Vec<(String, String)> = pending
            .into_events()
            .into_iter()
            .map(|e| (e.name, e.key_value))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("t".to_string(), "1".to_string()),
                ("t".to_string(), "2".to_string()),
                ("u".to_string(), "1".to_string()),
            ]
        );
    }
}
