//! Run-wide state shared by every validator invocation of one run

mod invocation;

use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;

use crate::config::{RunConfig, ValidationMode};
use crate::error::{Result, ValidationError};
use crate::message::Severity;
use crate::provider::DataProvider;
use crate::skip;

pub use invocation::{Cancelled, ValidatorContext};
pub(crate) use invocation::BranchFlags;

/// State of one validation run.
///
/// Created when a run starts and closed when it ends; after closing the
/// keyed store and the ignore list are cleared and writes are refused.
pub struct RunContext {
    id: Uuid,
    validation_name: String,
    config: RunConfig,
    ignore_all_following: AtomicBool,
    ignored: RwLock<BTreeSet<String>>,
    store: DashMap<String, Arc<dyn Any + Send + Sync>>,
    closed: AtomicBool,
}

impl RunContext {
    pub(crate) fn new(validation_name: impl Into<String>, config: RunConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            validation_name: validation_name.into(),
            config,
            ignore_all_following: AtomicBool::new(false),
            ignored: RwLock::new(BTreeSet::new()),
            store: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn validation_name(&self) -> &str {
        &self.validation_name
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn mode(&self) -> ValidationMode {
        self.config.mode
    }

    pub fn stop_severity(&self) -> Severity {
        self.config.stop_severity
    }

    /// Whether every remaining validator is skipped for every item.
    pub fn ignore_all_following(&self) -> bool {
        self.ignore_all_following.load(Ordering::SeqCst)
    }

    pub fn set_ignore_all_following(&self, ignore: bool) {
        self.ignore_all_following.store(ignore, Ordering::SeqCst);
    }

    pub fn ignored_validators(&self) -> BTreeSet<String> {
        self.ignored.read().clone()
    }

    /// Replace the run-wide ignore list. Entries are validator names or
    /// `/regex/` patterns.
    pub fn set_ignored_validators<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_open()?;
        let names = names
            .into_iter()
            .map(Into::into)
            .map(|name: String| skip::validate_pattern(&name).map(|()| name))
            .collect::<Result<BTreeSet<_>>>()?;
        *self.ignored.write() = names;
        Ok(())
    }

    pub fn ignore_validator(&self, name: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        let name = name.into();
        skip::validate_pattern(&name)?;
        self.ignored.write().insert(name);
        Ok(())
    }

    pub fn unignore_validator(&self, name: &str) -> bool {
        self.ignored.write().remove(name)
    }

    pub fn clear_ignored_validators(&self) {
        self.ignored.write().clear();
    }

    pub fn is_ignored(&self, validator_name: &str) -> bool {
        skip::matches_any(self.ignored.read().iter(), validator_name)
    }

    pub fn put<V: Send + Sync + 'static>(
        &self,
        key: impl Into<String>,
        provider: DataProvider<V>,
    ) -> Result<()> {
        self.ensure_open()?;
        self.store
            .insert(key.into(), Arc::new(provider) as Arc<dyn Any + Send + Sync>);
        Ok(())
    }

    pub fn put_value<V: Send + Sync + 'static>(&self, key: impl Into<String>, value: V) -> Result<()> {
        self.put(key, DataProvider::immediate(value))
    }

    pub fn provider<V: Send + Sync + 'static>(&self, key: &str) -> Result<Option<DataProvider<V>>> {
        let Some(entry) = self.store.get(key) else {
            return Ok(None);
        };
        entry
            .value()
            .downcast_ref::<DataProvider<V>>()
            .cloned()
            .map(Some)
            .ok_or_else(|| ValidationError::StoreTypeMismatch {
                key: key.to_string(),
            })
    }

    /// The value behind `key`, generating it if its provider is lazy.
    pub fn get<V: Send + Sync + 'static>(&self, key: &str) -> Result<Option<Arc<V>>> {
        match self.provider::<V>(key)? {
            Some(provider) => provider.get().map(Some),
            None => Ok(None),
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.store.remove(key).is_some()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.store.clear();
        self.ignored.write().clear();
        debug!("Closed run {} of '{}'", self.id, self.validation_name);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(ValidationError::NotInValidationRun)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("id", &self.id)
            .field("validation_name", &self.validation_name)
            .field("config", &self.config)
            .field("ignore_all_following", &self.ignore_all_following())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
