//! Renaming of cross-migration references when a template group is cloned.
//!
//! A reference is internal when the referenced migration declares the same
//! group as the template migration being cloned. Internal references are
//! renamed to `{group}_{name}`; references to other groups are left alone in
//! pipelines and dropped from declared dependencies.

use anyhow::Result;
use indexmap::IndexMap;
use log::{debug, warn};
use serde_yaml::Value;

use crate::{
    migration::MigrationDefinition,
    pipeline::{INTERNAL_VALUE_MARKER, Pipeline, ProcessStep, StepKind},
    request::FieldMapping,
    store::MigrationStore,
};

pub fn derive_migration_name(group: &str, target: &str) -> String {
    format!("{group}_{target}")
}

pub struct DependencyRemapper<'a> {
    store: &'a dyn MigrationStore,
}

impl<'a> DependencyRemapper<'a> {
    pub fn new(store: &'a dyn MigrationStore) -> Self {
        Self { store }
    }

    /// Whether `target` belongs to the group of `original`. A target missing
    /// from the store is treated as external.
    pub fn same_group(&self, original: &MigrationDefinition, target: &str) -> Result<bool> {
        match self.store.load(target)? {
            Some(loaded) => Ok(loaded.same_group_as(original)),
            None => {
                warn!(
                    "Migration '{target}' referenced from '{}' is not stored; leaving it unmapped",
                    original.id
                );
                Ok(false)
            }
        }
    }

    /// Lazily remapped copies of `steps`; the input is never modified.
    pub fn remap_steps<'s>(
        &'s self,
        steps: &'s [ProcessStep],
        original: &'s MigrationDefinition,
        group: &'s str,
    ) -> impl Iterator<Item = Result<ProcessStep>> + 's {
        steps
            .iter()
            .map(move |step| self.remap_step(step, original, group))
    }

    pub fn remap_pipeline(
        &self,
        pipeline: &Pipeline,
        original: &MigrationDefinition,
        group: &str,
    ) -> Result<Pipeline> {
        self.remap_steps(pipeline.steps(), original, group).collect()
    }

    /// Remapped pipelines for every field of a migration mapping.
    pub fn remap_process(
        &self,
        fields: &IndexMap<String, FieldMapping>,
        original: &MigrationDefinition,
        group: &str,
    ) -> Result<IndexMap<String, Pipeline>> {
        fields
            .iter()
            .map(|(field, mapping)| {
                let pipeline = self.remap_pipeline(&mapping.pipeline, original, group)?;
                Ok((field.clone(), pipeline))
            })
            .collect()
    }

    pub fn remap_step(
        &self,
        step: &ProcessStep,
        original: &MigrationDefinition,
        group: &str,
    ) -> Result<ProcessStep> {
        let mut step = step.clone();
        if step.kind() != StepKind::MigrationLookup {
            return Ok(step);
        }
        match step.params.get("migration").cloned() {
            Some(Value::Sequence(entries)) => {
                let mut renamed = Vec::with_capacity(entries.len());
                for entry in entries {
                    let name = entry.as_str().map(str::to_string);
                    match name {
                        Some(old) if self.same_group(original, &old)? => {
                            let new = derive_migration_name(group, &old);
                            rename_source_ids(&mut step, &old, &new);
                            renamed.push(Value::String(new));
                        }
                        _ => renamed.push(entry),
                    }
                }
                step.params
                    .insert("migration".to_string(), Value::Sequence(renamed));
            }
            Some(Value::String(old)) => {
                if self.same_group(original, &old)? {
                    let new = derive_migration_name(group, &old);
                    rename_source_ids(&mut step, &old, &new);
                    step.params
                        .insert("migration".to_string(), Value::String(new));
                }
            }
            _ => {}
        }
        Ok(step)
    }

    /// Declared dependencies of the derived clone: same-group dependencies
    /// renamed, cross-group ones dropped. Every dependency class is kept.
    pub fn remap_dependencies(
        &self,
        original: &MigrationDefinition,
        group: &str,
    ) -> Result<IndexMap<String, Vec<String>>> {
        let mut remapped = IndexMap::new();
        for (class, targets) in &original.migration_dependencies {
            let mut kept = Vec::new();
            for target in targets {
                if self.same_group(original, target)? {
                    kept.push(derive_migration_name(group, target));
                } else {
                    debug!(
                        "Dropping {class} dependency '{target}' of '{}' from derived group {group}",
                        original.id
                    );
                }
            }
            remapped.insert(class.clone(), kept);
        }
        Ok(remapped)
    }
}

/// Moves the `source_ids` entry for `old` under `new`, if there is one.
fn rename_source_ids(step: &mut ProcessStep, old: &str, new: &str) {
    if let Some(Value::Mapping(ids)) = step.params.get_mut("source_ids") {
        if let Some(entry) = ids.remove(old) {
            ids.insert(Value::String(new.to_string()), entry);
        }
    }
}

/// Spreadsheet columns referenced by a set of field pipelines, in pipeline
/// order. Internal values (`@name`) are skipped; duplicates are kept.
pub fn used_columns(fields: &IndexMap<String, FieldMapping>) -> impl Iterator<Item = String> + '_ {
    fields
        .values()
        .flat_map(|mapping| mapping.pipeline.steps())
        .flat_map(step_sources)
        .filter(|source| !source.starts_with(INTERNAL_VALUE_MARKER))
}

fn step_sources(step: &ProcessStep) -> Vec<String> {
    let mut sources = step.sources();
    if step.kind() == StepKind::MigrationLookup {
        sources.extend(step.source_ids().into_values().flatten());
    }
    sources
}
