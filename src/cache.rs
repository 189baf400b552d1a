use std::cell::RefCell;

use log::info;

/// Tag covering the set of migration plugins derivable from stored
/// definitions.
pub const MIGRATION_PLUGINS_TAG: &str = "migration_plugins";

/// Receives tag invalidations. Invalidating a tag twice is harmless.
pub trait CacheInvalidator {
    fn invalidate_tags(&self, tags: &[&str]);
}

/// Invalidator for callers with no downstream cache; records the event in the
/// log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogInvalidator;

impl CacheInvalidator for LogInvalidator {
    fn invalidate_tags(&self, tags: &[&str]) {
        info!("Cache tags invalidated: {}", tags.join(", "));
    }
}

/// Keeps every invalidated tag, in order.
#[derive(Debug, Default)]
pub struct RecordingInvalidator {
    tags: RefCell<Vec<String>>,
}

impl RecordingInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tags(&self) -> Vec<String> {
        self.tags.borrow().clone()
    }

    pub fn count(&self, tag: &str) -> usize {
        self.tags.borrow().iter().filter(|t| *t == tag).count()
    }
}

impl CacheInvalidator for RecordingInvalidator {
    fn invalidate_tags(&self, tags: &[&str]) {
        self.tags
            .borrow_mut()
            .extend(tags.iter().map(|tag| tag.to_string()));
    }
}
