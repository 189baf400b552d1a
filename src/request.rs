//! Ingest requests: a worksheet plus the user's field mappings against a
//! template migration group.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;

pub const DEFAULT_ORIGINAL_MAPPING: &str = "migration_group:isi";
pub const CONFIG_DEPENDENCY_KEY: &str = "config";
const CONFIG_PREFIX: &str = "sheet_ingest.request";

fn default_original_mapping() -> String {
    DEFAULT_ORIGINAL_MAPPING.to_string()
}

fn enabled() -> bool {
    true
}

/// Where the worksheet lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SheetCoordinates {
    /// Candidate file references; only the first is used.
    #[serde(default)]
    pub file: Vec<PathBuf>,
    #[serde(default)]
    pub sheet: String,
}

impl SheetCoordinates {
    pub fn file(&self) -> Option<&PathBuf> {
        self.file.first()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldMapping {
    #[serde(default)]
    pub pipeline: Pipeline,
}

/// Field mappings for one migration of the template group.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MigrationMapping {
    pub original_migration_id: String,
    #[serde(default)]
    pub mappings: IndexMap<String, FieldMapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "enabled")]
    pub status: bool,
    #[serde(default)]
    pub sheet: SheetCoordinates,
    #[serde(rename = "originalMapping", default = "default_original_mapping")]
    pub original_mapping: String,
    /// Stays empty until the user completes the mapping step.
    #[serde(default)]
    pub mappings: Option<IndexMap<String, MigrationMapping>>,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Request {
    pub fn new(id: impl Into<String>) -> Self {
        Request {
            id: id.into(),
            label: String::new(),
            status: true,
            sheet: SheetCoordinates::default(),
            original_mapping: default_original_mapping(),
            mappings: None,
            active: false,
            owner: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status
    }

    /// Whether the request may be materialized into migrations.
    pub fn is_eligible(&self) -> bool {
        self.status && self.active
    }

    pub fn config_dependency_key(&self) -> &'static str {
        CONFIG_DEPENDENCY_KEY
    }

    pub fn config_dependency_name(&self) -> String {
        format!("{CONFIG_PREFIX}.{}", self.id)
    }

    pub fn migration_mappings(&self) -> impl Iterator<Item = (&String, &MigrationMapping)> {
        self.mappings.iter().flatten()
    }

    /// The template group id named by `originalMapping`
    /// (`migration_group:{id}`).
    pub fn original_group(&self) -> Option<&str> {
        self.original_mapping
            .strip_prefix("migration_group:")
            .filter(|id| !id.is_empty())
    }
}
