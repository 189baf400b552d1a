//! Migration groups owned by requests.
//!
//! Each request gets its own group, cloned from the template group named by
//! its `originalMapping`. The clone's shared source configuration points at
//! the request's worksheet so every derived migration reads the same sheet.

use anyhow::{Result, anyhow};
use log::info;
use serde_yaml::{Mapping, Value};

use crate::{
    merge,
    migration::MigrationGroup,
    request::Request,
    store::MigrationStore,
};

pub const GROUP_PREFIX: &str = "ingest__";
pub const SOURCE_PLUGIN: &str = "spreadsheet";

/// Maps a request onto the name of the group holding its migrations.
pub trait GroupNamer {
    fn derive_name(&self, request: &Request) -> String;
}

#[derive(Debug, Clone)]
pub struct PrefixGroupNamer {
    prefix: String,
}

impl PrefixGroupNamer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for PrefixGroupNamer {
    fn default() -> Self {
        Self::new(GROUP_PREFIX)
    }
}

impl GroupNamer for PrefixGroupNamer {
    fn derive_name(&self, request: &Request) -> String {
        format!("{}{}", self.prefix, request.id)
    }
}

pub struct GroupDeriver<'a> {
    store: &'a dyn MigrationStore,
    namer: &'a dyn GroupNamer,
}

impl<'a> GroupDeriver<'a> {
    pub fn new(store: &'a dyn MigrationStore, namer: &'a dyn GroupNamer) -> Self {
        Self { store, namer }
    }

    pub fn derive_name(&self, request: &Request) -> String {
        self.namer.derive_name(request)
    }

    /// Creates or refreshes the request's group from its template group.
    pub fn create(&self, request: &Request) -> Result<MigrationGroup> {
        let template_id = request.original_group().ok_or_else(|| {
            anyhow!(
                "Request '{}' has no template group in '{}'",
                request.id,
                request.original_mapping
            )
        })?;
        let template = self
            .store
            .load_group(template_id)?
            .ok_or_else(|| anyhow!("Template group '{template_id}' does not exist"))?;

        let name = self.derive_name(request);
        let existing = self.store.load_group(&name)?;
        let mut group = existing.clone().unwrap_or_default();
        group.id = name;
        group.label = if request.label.is_empty() {
            template.label.clone()
        } else {
            request.label.clone()
        };
        group.description = template.description.clone();
        group.source_type = template.source_type.clone();
        group.shared_configuration = merge::merge_deep(
            template.shared_configuration.clone(),
            sheet_source(request),
        );
        group.dependencies = merge::merge_recursive(
            template.dependencies.clone(),
            enforced(request.config_dependency_key(), request.config_dependency_name()),
        );
        self.store.save_group(&group)?;
        info!(
            "{} migration group {} for request {}",
            if existing.is_some() { "Updated" } else { "Created" },
            group.id,
            request.id
        );
        Ok(group)
    }

    pub fn delete(&self, request: &Request) -> Result<()> {
        let name = self.derive_name(request);
        self.store.delete_group(&name)?;
        info!("Deleted migration group {name}");
        Ok(())
    }
}

fn sheet_source(request: &Request) -> Value {
    let mut source = Mapping::new();
    source.insert("plugin".into(), SOURCE_PLUGIN.into());
    if let Some(file) = request.sheet.file() {
        source.insert("file".into(), file.display().to_string().into());
    }
    if !request.sheet.sheet.is_empty() {
        source.insert("worksheet".into(), request.sheet.sheet.clone().into());
    }
    let mut shared = Mapping::new();
    shared.insert("source".into(), Value::Mapping(source));
    Value::Mapping(shared)
}

/// `{enforced: {key: [name]}}`
pub fn enforced(key: &str, name: String) -> Value {
    let mut by_key = Mapping::new();
    by_key.insert(key.into(), Value::Sequence(vec![name.into()]));
    let mut dependencies = Mapping::new();
    dependencies.insert(
        crate::migration::ENFORCED_KEY.into(),
        Value::Mapping(by_key),
    );
    Value::Mapping(dependencies)
}
