//! Extension points: template providers and post-creation object hooks.
//!
//! Providers and hooks are registered explicitly on a registry and are called
//! synchronously, in registration order.

use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::store::MigrationStore;

/// A mapping template a request can derive from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub dsids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_transform: Option<String>,
}

pub trait TemplateProvider {
    fn templates(&self) -> Result<Vec<Template>>;
}

/// Offers every stored migration group as a `migration_group:{id}` template.
pub struct GroupTemplateProvider<'a> {
    store: &'a dyn MigrationStore,
}

impl<'a> GroupTemplateProvider<'a> {
    pub fn new(store: &'a dyn MigrationStore) -> Self {
        Self { store }
    }
}

impl TemplateProvider for GroupTemplateProvider<'_> {
    fn templates(&self) -> Result<Vec<Template>> {
        Ok(self
            .store
            .groups()?
            .into_iter()
            .map(|group| Template {
                id: format!("migration_group:{}", group.id),
                name: if group.label.is_empty() {
                    group.id.clone()
                } else {
                    group.label
                },
                uri: String::new(),
                dsids: Vec::new(),
                self_transform: None,
            })
            .collect())
    }
}

#[derive(Default)]
pub struct TemplateRegistry<'a> {
    providers: Vec<Box<dyn TemplateProvider + 'a>>,
}

impl<'a> TemplateRegistry<'a> {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn register(&mut self, provider: impl TemplateProvider + 'a) {
        self.providers.push(Box::new(provider));
    }

    /// Templates from every provider; a later duplicate id is ignored.
    pub fn templates(&self) -> Result<Vec<Template>> {
        let mut templates: Vec<Template> = Vec::new();
        for provider in &self.providers {
            for template in provider.templates()? {
                if templates.iter().any(|known| known.id == template.id) {
                    debug!("Ignoring duplicate template {}", template.id);
                    continue;
                }
                templates.push(template);
            }
        }
        Ok(templates)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub predicate: String,
    pub object: String,
}

/// Relationship set of an ingested object. While auto-commit is off, changes
/// are staged and only persisted by [`Relationships::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationships {
    auto_commit: bool,
    committed: Vec<Relationship>,
    pending: Vec<Relationship>,
}

impl Default for Relationships {
    fn default() -> Self {
        Self {
            auto_commit: true,
            committed: Vec::new(),
            pending: Vec::new(),
        }
    }
}

impl Relationships {
    pub fn add(&mut self, predicate: impl Into<String>, object: impl Into<String>) {
        let relationship = Relationship {
            predicate: predicate.into(),
            object: object.into(),
        };
        if self.auto_commit {
            self.committed.push(relationship);
        } else {
            self.pending.push(relationship);
        }
    }

    pub fn set_auto_commit(&mut self, enabled: bool) {
        self.auto_commit = enabled;
        if enabled {
            self.commit();
        }
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    pub fn commit(&mut self) {
        self.committed.append(&mut self.pending);
    }

    pub fn committed(&self) -> &[Relationship] {
        &self.committed
    }

    pub fn pending(&self) -> &[Relationship] {
        &self.pending
    }
}

pub const PARENT_PREDICATE: &str = "isMemberOf";

/// An object produced by a derived migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestedObject {
    pub id: String,
    pub models: Vec<String>,
    pub state: String,
    pub relationships: Relationships,
}

pub trait ObjectAlterHook {
    fn alter(&self, object: &mut IngestedObject) -> Result<()>;
}

impl<F> ObjectAlterHook for F
where
    F: Fn(&mut IngestedObject) -> Result<()>,
{
    fn alter(&self, object: &mut IngestedObject) -> Result<()> {
        self(object)
    }
}

#[derive(Default)]
pub struct HookRegistry<'a> {
    hooks: Vec<Box<dyn ObjectAlterHook + 'a>>,
}

impl<'a> HookRegistry<'a> {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn register(&mut self, hook: impl ObjectAlterHook + 'a) {
        self.hooks.push(Box::new(hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Attaches `parents`, then runs every hook with relationship auto-commit
    /// suspended. Relationships are committed once all hooks have returned;
    /// if a hook fails, staged changes stay uncommitted.
    pub fn finish_object(&self, object: &mut IngestedObject, parents: &[String]) -> Result<()> {
        object.relationships.set_auto_commit(false);
        for parent in parents {
            object.relationships.add(PARENT_PREDICATE, parent.clone());
        }
        for hook in &self.hooks {
            hook.alter(object)?;
        }
        object.relationships.set_auto_commit(true);
        debug!(
            "Committed {} relationship(s) for {}",
            object.relationships.committed().len(),
            object.id
        );
        Ok(())
    }
}
