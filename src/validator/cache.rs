//! Process-wide flyweight cache of validator instances

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use once_cell::sync::Lazy;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

use super::{Item, Validator, ValidatorId};
use crate::error::{Result, ValidationError};

static GLOBAL: Lazy<ValidatorCache> = Lazy::new(ValidatorCache::new);

/// One instance per validator id, shared by every graph and run in the process.
///
/// Entries are stored type-erased so a single map can serve every item type;
/// asking for an id under a different item type than it was created with is
/// an error.
pub struct ValidatorCache {
    instances: DashMap<ValidatorId, Arc<dyn Any + Send + Sync>>,
}

impl ValidatorCache {
    pub fn new() -> Self {
        Self {
            instances: DashMap::new(),
        }
    }

    pub fn global() -> &'static ValidatorCache {
        &GLOBAL
    }

    pub fn get_or_create<T, F>(&self, id: &ValidatorId, create: F) -> Result<Arc<dyn Validator<T>>>
    where
        T: Item,
        F: FnOnce() -> Arc<dyn Validator<T>>,
    {
        match self.instances.entry(id.clone()) {
            Entry::Occupied(entry) => entry
                .get()
                .downcast_ref::<Arc<dyn Validator<T>>>()
                .cloned()
                .ok_or_else(|| ValidationError::ValidatorTypeMismatch { id: id.clone() }),
            Entry::Vacant(entry) => {
                let instance = create();
                entry.insert(Arc::new(Arc::clone(&instance)) as Arc<dyn Any + Send + Sync>);
                debug!("Created validator instance {id}");
                Ok(instance)
            }
        }
    }

    /// Drop the cached instance so the next use builds a fresh one.
    pub fn evict(&self, id: &ValidatorId) -> bool {
        let removed = self.instances.remove(id).is_some();
        if removed {
            debug!("Evicted validator instance {id}");
        }
        removed
    }

    pub fn contains(&self, id: &ValidatorId) -> bool {
        self.instances.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl Default for ValidatorCache {
    fn default() -> Self {
        Self::new()
    }
}
