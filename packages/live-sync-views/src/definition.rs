//! Builder describing a view before registration.

use live_sync_core::{Params, Value};

use crate::dynamic_param::ParamId;

/// Registration input of a [`DynamicView`](crate::DynamicView).
///
/// ```ignore
/// let chats = set.create_multi_value_param("chatIds");
/// set.create_view(ViewDefinition::new("SELECT id FROM chat WHERE user_id = @u")
///     .param("u", 42)
///     .child_param(chats, "id"))?;
/// set.create_view(ViewDefinition::new("SELECT * FROM message WHERE chat_id IN (@chatIds)")
///     .dynamic_param("chatIds", chats))?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ViewDefinition {
    pub(crate) sql: String,
    pub(crate) params: Params,
    pub(crate) name: Option<String>,
    pub(crate) key_fields: Option<Vec<String>>,
    pub(crate) dynamic_tables: Option<Vec<String>>,
    pub(crate) child_params: Vec<(ParamId, String)>,
    pub(crate) dynamic_params: Vec<(String, ParamId)>,
}

impl ViewDefinition {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }

    /// Replaces the static parameters.
    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Adds one static parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name, value);
        self
    }

    /// Event name; defaults to the anchor table's name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Output columns identifying a row; defaults to the anchor table's
    /// primary key as projected.
    pub fn key_fields(mut self, fields: &[&str]) -> Self {
        self.key_fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Restricts narrowing to the FromRefs named here by alias or table
    /// name. Changes to other tables of the statement are ignored.
    pub fn dynamic_tables(mut self, names: &[&str]) -> Self {
        self.dynamic_tables = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Feeds output column `column` of this view into `param`.
    pub fn child_param(mut self, param: ParamId, column: impl Into<String>) -> Self {
        self.child_params.push((param, column.into()));
        self
    }

    /// Binds statement parameter `@name` to `param`.
    pub fn dynamic_param(mut self, name: impl Into<String>, param: ParamId) -> Self {
        self.dynamic_params.push((name.into(), param));
        self
    }
}
