//! One live SELECT: snapshot, relevance, narrowing and diffing.

use std::fmt;

use indexmap::IndexMap;
use live_sync_core::catalog::encode_key_value;
use live_sync_core::{
    DataEventType, Database, KeyValueDataEvent, Params, RecordDataEvent, Result, Row,
    SelectStatement, Snapshot, SyncError,
};

use crate::definition::ViewDefinition;
use crate::dynamic_param::{DynamicParam, ParamId};
use crate::narrowing::narrow;

/// Identifier of a view within its view set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub(crate) usize);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Lifecycle of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Created,
    /// Initial snapshot emitted
    Started,
    Disposed,
}

/// A child parameter fed from one output column of this view.
#[derive(Debug, Clone)]
pub(crate) struct ChildParam {
    pub param: ParamId,
    pub column: String,
}

/// A statement parameter whose value comes from a dynamic parameter.
#[derive(Debug, Clone)]
pub(crate) struct ConsumedParam {
    pub name: String,
    pub param: ParamId,
}

/// A live view over one SELECT statement.
#[derive(Debug)]
pub struct DynamicView {
    id: ViewId,
    name: String,
    statement: SelectStatement,
    static_params: Params,
    key_fields: Vec<String>,
    /// Per FromRef: whether changes to it are narrowed
    tracked: Vec<bool>,
    pub(crate) child_params: Vec<ChildParam>,
    pub(crate) consumed: Vec<ConsumedParam>,
    /// Dynamic parameter values the view currently reflects
    bound: Params,
    state: ViewState,
}

impl DynamicView {
    /// Resolves `definition` against `db`.
    ///
    /// # Errors
    /// Any statement resolution error; `UnknownField` when the key fields
    /// or a child parameter column are not projected; `UnknownTable` for a
    /// dynamic table entry that names no FromRef; `MissingParam` when a
    /// statement parameter has neither a static nor a dynamic value.
    pub(crate) fn new(
        id: ViewId,
        db: &dyn Database,
        definition: ViewDefinition,
        params: &[DynamicParam],
    ) -> Result<Self> {
        let statement = db.parse_select(&definition.sql, &definition.params)?;
        let anchor = statement.anchor();
        let name = definition
            .name
            .unwrap_or_else(|| anchor.table.name.clone());

        let column_names: Vec<&str> = statement.columns().iter().map(|c| c.name.as_str()).collect();
        let key_fields = match definition.key_fields {
            Some(fields) => {
                for field in &fields {
                    if !column_names.contains(&field.as_str()) {
                        return Err(SyncError::UnknownField {
                            table: name.clone(),
                            field: field.clone(),
                        });
                    }
                }
                fields
            }
            None => anchor
                .table
                .key_field_names()
                .iter()
                .map(|field| {
                    statement
                        .output_name(0, field)
                        .map(str::to_string)
                        .ok_or_else(|| SyncError::UnknownField {
                            table: name.clone(),
                            field: field.clone(),
                        })
                })
                .collect::<Result<Vec<_>>>()?,
        };

        let tracked = match &definition.dynamic_tables {
            None => vec![true; statement.from_refs().len()],
            Some(names) => {
                let mut tracked = vec![false; statement.from_refs().len()];
                for entry in names {
                    let mut found = false;
                    for (index, from_ref) in statement.from_refs().iter().enumerate() {
                        if from_ref.answers_to(entry) {
                            tracked[index] = true;
                            found = true;
                        }
                    }
                    if !found {
                        return Err(SyncError::UnknownTable {
                            table: entry.clone(),
                        });
                    }
                }
                tracked
            }
        };

        let mut child_params = Vec::with_capacity(definition.child_params.len());
        for (param, column) in definition.child_params {
            if !column_names.contains(&column.as_str()) {
                return Err(SyncError::UnknownField {
                    table: name.clone(),
                    field: column,
                });
            }
            child_params.push(ChildParam { param, column });
        }

        let consumed: Vec<ConsumedParam> = definition
            .dynamic_params
            .into_iter()
            .map(|(name, param)| ConsumedParam { name, param })
            .collect();
        for needed in statement.param_names() {
            let supplied = definition.params.contains(needed) || consumed.iter().any(|c| &c.name == needed);
            if !supplied {
                return Err(SyncError::MissingParam {
                    name: needed.clone(),
                });
            }
        }

        let mut view = Self {
            id,
            name,
            statement,
            static_params: definition.params,
            key_fields,
            tracked,
            child_params,
            consumed,
            bound: Params::new(),
            state: ViewState::Created,
        };
        view.bound = view.current_dynamic_values(params);
        Ok(view)
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    /// Name carried by every event of this view.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn statement(&self) -> &SelectStatement {
        &self.statement
    }

    /// Output columns that identify a row of this view.
    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ViewState) {
        self.state = state;
    }

    /// Static parameters merged with the dynamic values currently bound.
    pub fn bound_params(&self) -> Params {
        let mut params = self.static_params.clone();
        params.merge(&self.bound);
        params
    }

    /// Latest values of the dynamic parameters this view consumes.
    pub(crate) fn current_dynamic_values(&self, params: &[DynamicParam]) -> Params {
        let mut values = Params::new();
        for consumed in &self.consumed {
            if let Some(param) = params.get(consumed.param.0) {
                values.insert(consumed.name.clone(), param.value().clone());
            }
        }
        values
    }

    /// Binds `fresh` without reading any rows.
    pub(crate) fn rebind(&mut self, fresh: Params) {
        self.bound = fresh;
    }

    /// Whether the view lags behind a dynamic parameter it consumes.
    pub(crate) fn is_stale(&self, params: &[DynamicParam]) -> bool {
        self.current_dynamic_values(params) != self.bound
    }

    /// Whether this view has bound the latest value of `param`.
    pub(crate) fn has_bound_latest(&self, param: &DynamicParam) -> bool {
        self.consumed
            .iter()
            .filter(|c| c.param == param.id())
            .all(|c| self.bound.get(&c.name) == Some(param.value()))
    }

    /// Whether changes to `table` can affect this view.
    pub fn is_relevant(&self, table: &str) -> bool {
        self.statement
            .from_refs()
            .iter()
            .zip(&self.tracked)
            .any(|(from_ref, tracked)| *tracked && from_ref.table.name == table)
    }

    /// Runs the statement unmodified and frames the rows as
    /// `InitialBegin, Initial..., InitialEnd`.
    ///
    /// Rows repeating an already emitted key are skipped.
    pub fn initial_snapshot(&self, snapshot: &dyn Snapshot) -> Result<Vec<RecordDataEvent>> {
        let rows = snapshot.select(&self.statement, &self.bound_params())?;
        let mut events = Vec::with_capacity(rows.len() + 2);
        events.push(RecordDataEvent::marker(DataEventType::InitialBegin, &self.name));
        let mut seen = std::collections::HashSet::new();
        for row in rows {
            let key = self.key_of(&row);
            if seen.insert(key.clone()) {
                events.push(RecordDataEvent::new(DataEventType::Initial, &self.name, key, Some(row)));
            }
        }
        events.push(RecordDataEvent::marker(DataEventType::InitialEnd, &self.name));
        Ok(events)
    }

    /// Rows of this view joined with the row `change` refers to, read from
    /// `snapshot` with `params` bound.
    ///
    /// An untracked table yields no rows.
    ///
    /// # Errors
    /// `Narrowing` wrapping the backend failure.
    pub fn impacted_records(
        &self,
        change: &KeyValueDataEvent,
        snapshot: &dyn Snapshot,
        params: &Params,
    ) -> Result<Vec<Row>> {
        self.narrowed_rows(change, snapshot, params)
            .map_err(|e| SyncError::Narrowing {
                view: self.name.clone(),
                message: e.to_string(),
            })
    }

    fn narrowed_rows(&self, change: &KeyValueDataEvent, snapshot: &dyn Snapshot, params: &Params) -> Result<Vec<Row>> {
        let mut rows: IndexMap<String, Row> = IndexMap::new();
        for narrowed in narrow(&self.statement, &self.tracked, change)? {
            let mut bound = params.clone();
            bound.merge(&narrowed.params);
            for row in snapshot.select(&narrowed.statement, &bound)? {
                rows.entry(self.key_of(&row)).or_insert(row);
            }
        }
        Ok(rows.into_values().collect())
    }

    /// Turns the impacted rows before and after a change into events.
    ///
    /// Deletes and updates follow `pre` order, inserts follow `post` order.
    /// Deletes carry the last known row.
    pub fn diff(&self, pre: &[Row], post: &[Row]) -> Vec<RecordDataEvent> {
        let pre_keyed: IndexMap<String, &Row> = pre.iter().map(|r| (self.key_of(r), r)).collect();
        let post_keyed: IndexMap<String, &Row> = post.iter().map(|r| (self.key_of(r), r)).collect();

        let mut events = Vec::new();
        for (key, old) in &pre_keyed {
            match post_keyed.get(key) {
                None => events.push(self.event(DataEventType::Delete, key, old)),
                Some(new) if new != old => events.push(self.event(DataEventType::Update, key, new)),
                Some(_) => {}
            }
        }
        for (key, new) in &post_keyed {
            if !pre_keyed.contains_key(key) {
                events.push(self.event(DataEventType::Insert, key, new));
            }
        }
        events
    }

    /// Feeds this view's events into its child parameters.
    pub fn update_child_params(&self, events: &[RecordDataEvent], params: &mut [DynamicParam]) {
        if events.is_empty() {
            return;
        }
        for child in &self.child_params {
            if let Some(param) = params.get_mut(child.param.0) {
                param.apply_events(events, &child.column);
            }
        }
    }

    /// Moves the view to fresh dynamic parameter values.
    ///
    /// The full statement is run on `snapshot` with the previously bound
    /// values and with `fresh`; the difference is returned.
    pub(crate) fn reevaluate(&mut self, snapshot: &dyn Snapshot, fresh: Params) -> Result<Vec<RecordDataEvent>> {
        let before = snapshot.select(&self.statement, &self.bound_params())?;
        let mut after_params = self.static_params.clone();
        after_params.merge(&fresh);
        let after = snapshot.select(&self.statement, &after_params)?;
        self.bound = fresh;
        Ok(self.diff(&before, &after))
    }

    fn key_of(&self, row: &Row) -> String {
        encode_key_value(row, &self.key_fields).unwrap_or_default()
    }

    fn event(&self, event_type: DataEventType, key: &str, row: &Row) -> RecordDataEvent {
        RecordDataEvent::new(event_type, &self.name, key, Some(row.clone()))
    }
}
