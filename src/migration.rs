//! Migration and migration group definitions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::pipeline::Pipeline;

pub const ENFORCED_KEY: &str = "enforced";

fn empty_mapping() -> Value {
    Value::Mapping(Mapping::new())
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Mapping(mapping) => mapping.is_empty(),
        _ => false,
    }
}

/// A template or derived migration.
///
/// Keys this crate does not model (`uuid`, `langcode`, `status`, ...) are kept
/// in `extra` so writing a loaded definition back preserves them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MigrationDefinition {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_group: Option<String>,
    #[serde(default = "empty_mapping")]
    pub source: Value,
    #[serde(default)]
    pub process: IndexMap<String, Pipeline>,
    #[serde(default = "empty_mapping")]
    pub destination: Value,
    #[serde(default = "empty_mapping", skip_serializing_if = "is_empty_value")]
    pub dependencies: Value,
    #[serde(default)]
    pub migration_dependencies: IndexMap<String, Vec<String>>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl MigrationDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        MigrationDefinition {
            id: id.into(),
            source: empty_mapping(),
            destination: empty_mapping(),
            dependencies: empty_mapping(),
            ..Default::default()
        }
    }

    /// Two migrations share a group only when both declare the same,
    /// non-empty group.
    pub fn same_group_as(&self, other: &MigrationDefinition) -> bool {
        match (self.group(), other.group()) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }

    pub fn group(&self) -> Option<&str> {
        self.migration_group.as_deref().filter(|g| !g.is_empty())
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.group() == Some(group)
    }

    /// Whether `dependencies.enforced.{key}` lists `name`.
    pub fn is_enforced_by(&self, key: &str, name: &str) -> bool {
        enforced_names(&self.dependencies, key).any(|entry| entry == name)
    }
}

fn enforced_names<'a>(dependencies: &'a Value, key: &str) -> impl Iterator<Item = &'a str> {
    dependencies
        .get(ENFORCED_KEY)
        .and_then(|enforced| enforced.get(key))
        .and_then(Value::as_sequence)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MigrationGroup {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default = "empty_mapping", skip_serializing_if = "is_empty_value")]
    pub shared_configuration: Value,
    #[serde(default = "empty_mapping", skip_serializing_if = "is_empty_value")]
    pub dependencies: Value,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl MigrationGroup {
    pub fn shared_source(&self) -> Option<&Value> {
        self.shared_configuration.get("source")
    }

    pub fn is_enforced_by(&self, key: &str, name: &str) -> bool {
        enforced_names(&self.dependencies, key).any(|entry| entry == name)
    }
}
