//! Synthesis and teardown of a request's derived migrations.

use anyhow::{Context, Result};
use log::{debug, info};
use serde_yaml::{Mapping, Value};

use crate::{
    cache::{CacheInvalidator, MIGRATION_PLUGINS_TAG},
    error::IngestError,
    group::{self, GroupNamer},
    merge,
    migration::MigrationDefinition,
    remap::{DependencyRemapper, derive_migration_name},
    request::{MigrationMapping, Request},
    store::MigrationStore,
};

pub struct MigrationDeriver<'a> {
    store: &'a dyn MigrationStore,
    invalidator: &'a dyn CacheInvalidator,
    namer: &'a dyn GroupNamer,
}

impl<'a> MigrationDeriver<'a> {
    pub fn new(
        store: &'a dyn MigrationStore,
        invalidator: &'a dyn CacheInvalidator,
        namer: &'a dyn GroupNamer,
    ) -> Self {
        Self {
            store,
            invalidator,
            namer,
        }
    }

    pub fn group_name(&self, request: &Request) -> String {
        self.namer.derive_name(request)
    }

    /// Upserts one derived migration per migration mapping of the request.
    ///
    /// Requests that are disabled or inactive are skipped without touching
    /// the store or the cache. The request's group must already exist.
    pub fn create_all(&self, request: &Request) -> Result<()> {
        if !request.is_eligible() {
            info!("Call to create on non-active request {}.", request.id);
            return Ok(());
        }

        let group = self.group_name(request);
        if self.store.load_group(&group)?.is_none() {
            return Err(IngestError::MissingGroup(group).into());
        }

        let remapper = DependencyRemapper::new(self.store);
        for (name, mapping) in request.migration_mappings() {
            let original = self
                .store
                .load(&mapping.original_migration_id)?
                .ok_or_else(|| IngestError::UnknownMigration(mapping.original_migration_id.clone()))
                .with_context(|| {
                    format!("Deriving migration '{name}' for request {}", request.id)
                })?;
            let derived = self.derive(request, &group, name, mapping, &original, &remapper)?;
            self.upsert(derived)?;
        }

        self.invalidate();
        Ok(())
    }

    /// Builds the derived definition for one migration mapping.
    pub fn derive(
        &self,
        request: &Request,
        group: &str,
        name: &str,
        mapping: &MigrationMapping,
        original: &MigrationDefinition,
        remapper: &DependencyRemapper<'_>,
    ) -> Result<MigrationDefinition> {
        let mut derived = MigrationDefinition::new(derive_migration_name(group, name));
        derived.label = original.label.clone();
        derived.migration_group = Some(group.to_string());
        // Column restriction is left empty: every derived migration sees all
        // worksheet columns. See `remap::used_columns` for the referenced set.
        derived.source = Value::Mapping(Mapping::new());
        derived.process = remapper.remap_process(&mapping.mappings, original, group)?;
        derived.destination = original.destination.clone();
        derived.dependencies = merge::merge_recursive(
            original.dependencies.clone(),
            group::enforced(request.config_dependency_key(), request.config_dependency_name()),
        );
        derived.migration_dependencies = remapper.remap_dependencies(original, group)?;
        Ok(derived)
    }

    /// Overwrites every derived field of a stored definition, keeping keys
    /// this crate does not manage.
    fn upsert(&self, derived: MigrationDefinition) -> Result<()> {
        let migration = match self.store.load(&derived.id)? {
            Some(existing) => {
                debug!("Updating derived migration {}", derived.id);
                MigrationDefinition {
                    extra: existing.extra,
                    ..derived
                }
            }
            None => {
                debug!("Creating derived migration {}", derived.id);
                derived
            }
        };
        self.store
            .save(&migration)
            .with_context(|| format!("Saving migration {}", migration.id))
    }

    /// Deletes every migration in the request's group.
    pub fn delete_all(&self, request: &Request) -> Result<()> {
        let group = self.group_name(request);
        let ids: Vec<String> = self
            .store
            .load_by_group(&group)?
            .into_iter()
            .map(|migration| migration.id)
            .collect();
        debug!("Deleting {} migration(s) of group {group}", ids.len());
        self.store.delete(&ids)?;
        self.invalidate();
        Ok(())
    }

    /// Deletes every migration carrying an enforced dependency on the
    /// request, wherever it is grouped. Used when the request itself goes.
    pub fn delete_dependents(&self, request: &Request) -> Result<()> {
        let key = request.config_dependency_key();
        let name = request.config_dependency_name();
        let ids: Vec<String> = self
            .store
            .load_where(&|migration: &MigrationDefinition| migration.is_enforced_by(key, &name))?
            .into_iter()
            .map(|migration| migration.id)
            .collect();
        debug!("Deleting {} migration(s) depending on {name}", ids.len());
        self.store.delete(&ids)?;
        self.invalidate();
        Ok(())
    }

    fn invalidate(&self) {
        debug!("Invalidating cache for \"{MIGRATION_PLUGINS_TAG}\"");
        self.invalidator.invalidate_tags(&[MIGRATION_PLUGINS_TAG]);
        info!("Invalidated cache for \"{MIGRATION_PLUGINS_TAG}\"");
    }
}
