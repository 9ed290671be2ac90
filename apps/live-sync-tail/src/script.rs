//! Workload script format.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;

use live_sync_core::{Params, Transaction};
use live_sync_views::{ParamId, ViewDefinition};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    /// `CREATE TABLE` statements
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    #[serde(default)]
    pub views: Vec<ViewSpec>,
    /// Each inner list commits as one transaction
    #[serde(default)]
    pub transactions: Vec<Vec<Operation>>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamKindSpec {
    Single,
    Multi,
}

#[derive(Debug, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKindSpec,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSpec {
    pub sql: String,
    #[serde(default)]
    pub params: Params,
    pub name: Option<String>,
    pub key_fields: Option<Vec<String>>,
    pub dynamic_tables: Option<Vec<String>>,
    #[serde(default)]
    pub child_params: Vec<ChildParamSpec>,
    #[serde(default)]
    pub dynamic_params: Vec<DynamicParamSpec>,
}

/// Feeds output column `field` into dynamic param `param`.
#[derive(Debug, Deserialize)]
pub struct ChildParamSpec {
    pub param: String,
    pub field: String,
}

/// Binds statement parameter `@name` to dynamic param `param`.
#[derive(Debug, Deserialize)]
pub struct DynamicParamSpec {
    pub name: String,
    pub param: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Deserialize)]
pub struct Operation {
    pub op: OpKind,
    /// Table name or full statement text
    pub statement: String,
    #[serde(default)]
    pub values: Params,
}

impl Script {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid script {}", path.display()))
    }
}

impl ViewSpec {
    /// Builds the view definition, resolving dynamic param names.
    pub fn definition(&self, params: &HashMap<String, ParamId>) -> anyhow::Result<ViewDefinition> {
        let lookup = |name: &str| -> anyhow::Result<ParamId> {
            match params.get(name) {
                Some(id) => Ok(*id),
                None => bail!("view {:?} refers to undeclared param {:?}", self.sql, name),
            }
        };

        let mut definition = ViewDefinition::new(self.sql.clone()).params(self.params.clone());
        if let Some(name) = &self.name {
            definition = definition.name(name.clone());
        }
        if let Some(fields) = &self.key_fields {
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            definition = definition.key_fields(&fields);
        }
        if let Some(tables) = &self.dynamic_tables {
            let tables: Vec<&str> = tables.iter().map(String::as_str).collect();
            definition = definition.dynamic_tables(&tables);
        }
        for child in &self.child_params {
            definition = definition.child_param(lookup(&child.param)?, child.field.clone());
        }
        for consumed in &self.dynamic_params {
            definition = definition.dynamic_param(consumed.name.clone(), lookup(&consumed.param)?);
        }
        Ok(definition)
    }
}

impl Operation {
    pub fn apply(&self, transaction: &mut Transaction<'_>) -> live_sync_core::Result<()> {
        match self.op {
            OpKind::Insert => transaction.insert(&self.statement, &self.values).map(|_| ()),
            OpKind::Update => transaction.update(&self.statement, &self.values).map(|_| ()),
            OpKind::Delete => transaction.delete(&self.statement, &self.values).map(|_| ()),
        }
    }
}
