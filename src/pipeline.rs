//! Process pipelines and the step shapes the deriver understands.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

pub const PLAIN_LOOKUP: &str = "get";
pub const MIGRATION_LOOKUP: &str = "migration_lookup";
/// Source names starting with this marker refer to pipeline-internal values
/// rather than spreadsheet columns.
pub const INTERNAL_VALUE_MARKER: char = '@';

/// A single process step: a plugin name plus its plugin-specific parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(flatten)]
    pub params: IndexMap<String, Value>,
}

/// How the deriver treats a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind<'a> {
    PlainLookup,
    MigrationLookup,
    Other(&'a str),
}

impl ProcessStep {
    pub fn get(source: impl Into<String>) -> Self {
        let mut params = IndexMap::new();
        params.insert("source".to_string(), Value::String(source.into()));
        ProcessStep {
            plugin: None,
            params,
        }
    }

    pub fn plugin_name(&self) -> &str {
        self.plugin.as_deref().unwrap_or(PLAIN_LOOKUP)
    }

    pub fn kind(&self) -> StepKind<'_> {
        match self.plugin_name() {
            PLAIN_LOOKUP => StepKind::PlainLookup,
            MIGRATION_LOOKUP => StepKind::MigrationLookup,
            other => StepKind::Other(other),
        }
    }

    /// Names listed under `source`, whether given as one string or a list.
    pub fn sources(&self) -> Vec<String> {
        self.params.get("source").map(string_list).unwrap_or_default()
    }

    /// Migrations referenced by a lookup step's `migration` parameter.
    pub fn migrations(&self) -> Vec<String> {
        self.params
            .get("migration")
            .map(string_list)
            .unwrap_or_default()
    }

    /// `source_ids`: referenced migration → id field names.
    pub fn source_ids(&self) -> IndexMap<String, Vec<String>> {
        let Some(Value::Mapping(mapping)) = self.params.get("source_ids") else {
            return IndexMap::new();
        };
        mapping
            .iter()
            .filter_map(|(key, ids)| key.as_str().map(|key| (key.to_string(), string_list(ids))))
            .collect()
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Sequence(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Ordered steps producing one destination field. Accepts the shorthand
/// forms `field: column` and `field: {plugin: ...}` when deserializing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "PipelineRepr")]
pub struct Pipeline(pub Vec<ProcessStep>);

#[derive(Deserialize)]
#[serde(untagged)]
enum PipelineRepr {
    Source(String),
    Steps(Vec<ProcessStep>),
    Single(ProcessStep),
}

impl From<PipelineRepr> for Pipeline {
    fn from(repr: PipelineRepr) -> Self {
        match repr {
            PipelineRepr::Source(source) => Pipeline(vec![ProcessStep::get(source)]),
            PipelineRepr::Steps(steps) => Pipeline(steps),
            PipelineRepr::Single(step) => Pipeline(vec![step]),
        }
    }
}

impl Pipeline {
    pub fn steps(&self) -> &[ProcessStep] {
        &self.0
    }
}

impl FromIterator<ProcessStep> for Pipeline {
    fn from_iter<I: IntoIterator<Item = ProcessStep>>(iter: I) -> Self {
        Pipeline(iter.into_iter().collect())
    }
}
