//! Persistence of migration definitions and groups.
//!
//! [`MigrationStore`] is the repository seam used by the deriver. Two
//! implementations ship with the crate: [`MemoryStore`] for embedding and
//! tests, and [`DirectoryStore`] which keeps one YAML document per
//! definition in a config directory.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::debug;

use crate::{
    error::IngestError,
    migration::{MigrationDefinition, MigrationGroup},
    yaml_provider,
};

const MIGRATION_PREFIX: &str = "migrate_plus.migration.";
const GROUP_PREFIX: &str = "migrate_plus.migration_group.";
const DOCUMENT_SUFFIX: &str = ".yml";

pub trait MigrationStore {
    fn load(&self, id: &str) -> Result<Option<MigrationDefinition>>;

    fn load_where(
        &self,
        predicate: &dyn Fn(&MigrationDefinition) -> bool,
    ) -> Result<Vec<MigrationDefinition>>;

    fn save(&self, migration: &MigrationDefinition) -> Result<()>;

    /// Deleting ids that are not stored is not an error.
    fn delete(&self, ids: &[String]) -> Result<()>;

    fn load_group(&self, id: &str) -> Result<Option<MigrationGroup>>;

    fn save_group(&self, group: &MigrationGroup) -> Result<()>;

    fn delete_group(&self, id: &str) -> Result<()>;

    fn groups(&self) -> Result<Vec<MigrationGroup>>;

    fn load_by_group(&self, group: &str) -> Result<Vec<MigrationDefinition>> {
        self.load_where(&|migration: &MigrationDefinition| migration.in_group(group))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    migrations: RefCell<BTreeMap<String, MigrationDefinition>>,
    groups: RefCell<BTreeMap<String, MigrationGroup>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.migrations.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.borrow().is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.migrations.borrow().keys().cloned().collect()
    }
}

impl MigrationStore for MemoryStore {
    fn load(&self, id: &str) -> Result<Option<MigrationDefinition>> {
        Ok(self.migrations.borrow().get(id).cloned())
    }

    fn load_where(
        &self,
        predicate: &dyn Fn(&MigrationDefinition) -> bool,
    ) -> Result<Vec<MigrationDefinition>> {
        Ok(self
            .migrations
            .borrow()
            .values()
            .filter(|migration| predicate(migration))
            .cloned()
            .collect())
    }

    fn save(&self, migration: &MigrationDefinition) -> Result<()> {
        self.migrations
            .borrow_mut()
            .insert(migration.id.clone(), migration.clone());
        Ok(())
    }

    fn delete(&self, ids: &[String]) -> Result<()> {
        let mut migrations = self.migrations.borrow_mut();
        for id in ids {
            migrations.remove(id);
        }
        Ok(())
    }

    fn load_group(&self, id: &str) -> Result<Option<MigrationGroup>> {
        Ok(self.groups.borrow().get(id).cloned())
    }

    fn save_group(&self, group: &MigrationGroup) -> Result<()> {
        self.groups
            .borrow_mut()
            .insert(group.id.clone(), group.clone());
        Ok(())
    }

    fn delete_group(&self, id: &str) -> Result<()> {
        self.groups.borrow_mut().remove(id);
        Ok(())
    }

    fn groups(&self) -> Result<Vec<MigrationGroup>> {
        Ok(self.groups.borrow().values().cloned().collect())
    }
}

/// Definitions stored as `migrate_plus.migration.{id}.yml` and groups as
/// `migrate_plus.migration_group.{id}.yml` under one directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).with_context(|| format!("Creating config directory {root:?}"))?;
        Ok(Self { root })
    }

    pub fn migration_path(&self, id: &str) -> Result<PathBuf> {
        self.document_path(MIGRATION_PREFIX, id)
    }

    pub fn group_path(&self, id: &str) -> Result<PathBuf> {
        self.document_path(GROUP_PREFIX, id)
    }

    /// Ids become file names, so they may not carry path separators.
    fn document_path(&self, prefix: &str, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\', '\0']) {
            return Err(IngestError::InvalidDocumentId(id.to_string()).into());
        }
        Ok(self.root.join(format!("{prefix}{id}{DOCUMENT_SUFFIX}")))
    }

    /// Ids of the documents carrying `prefix`, sorted.
    fn document_ids(&self, prefix: &str) -> Result<Vec<String>> {
        let entries =
            fs::read_dir(&self.root).with_context(|| format!("Listing {:?}", self.root))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("Listing {:?}", self.root))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(id) = name
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(DOCUMENT_SUFFIX))
            {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {path:?}");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("Removing {path:?}")),
    }
}

impl MigrationStore for DirectoryStore {
    fn load(&self, id: &str) -> Result<Option<MigrationDefinition>> {
        yaml_provider::load_optional(&self.migration_path(id)?)
    }

    fn load_where(
        &self,
        predicate: &dyn Fn(&MigrationDefinition) -> bool,
    ) -> Result<Vec<MigrationDefinition>> {
        let mut matches = Vec::new();
        for id in self.document_ids(MIGRATION_PREFIX)? {
            if let Some(migration) = self.load(&id)? {
                if predicate(&migration) {
                    matches.push(migration);
                }
            }
        }
        Ok(matches)
    }

    fn save(&self, migration: &MigrationDefinition) -> Result<()> {
        yaml_provider::save_to_path(&self.migration_path(&migration.id)?, migration)
    }

    fn delete(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            remove_if_present(&self.migration_path(id)?)?;
        }
        Ok(())
    }

    fn load_group(&self, id: &str) -> Result<Option<MigrationGroup>> {
        yaml_provider::load_optional(&self.group_path(id)?)
    }

    fn save_group(&self, group: &MigrationGroup) -> Result<()> {
        yaml_provider::save_to_path(&self.group_path(&group.id)?, group)
    }

    fn delete_group(&self, id: &str) -> Result<()> {
        remove_if_present(&self.group_path(id)?)
    }

    fn groups(&self) -> Result<Vec<MigrationGroup>> {
        let mut groups = Vec::new();
        for id in self.document_ids(GROUP_PREFIX)? {
            if let Some(group) = self.load_group(&id)? {
                groups.push(group);
            }
        }
        Ok(groups)
    }
}
