//! Registry of named validations and the entry points that run them

pub mod executor;
mod walk;

use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::context::{BranchFlags, RunContext};
use crate::data_wrapper::DataWrapper;
use crate::error::{Result, ValidationError};
use crate::graph::Validation;
use crate::result::ValidationReport;
use crate::validator::Item;

pub use executor::{Executor, Substrate, Task, ThreadSpawner};
use walk::{Dispatch, Run, walk};

/// Holds validations by name and runs them.
///
/// Runs work on the graph as registered when the run started. Edits go
/// through [`edit`](Self::edit), which replaces the registered graph with an
/// edited copy, so they never disturb a run in flight.
pub struct ValidationManager<T: Item> {
    registry: DashMap<String, Arc<Validation<T>>>,
}

impl<T: Item> ValidationManager<T> {
    pub fn new() -> Self {
        Self {
            registry: DashMap::new(),
        }
    }

    /// Register `validation` under `name`, returning the graph it replaced.
    pub fn register(
        &self,
        name: impl Into<String>,
        validation: Validation<T>,
    ) -> Option<Arc<Validation<T>>> {
        let name = name.into();
        debug!("Registering validation '{name}' with {} validator(s)", validation.len());
        let previous = self.registry.insert(name.clone(), Arc::new(validation));
        if previous.is_some() {
            debug!("Replaced previously registered validation '{name}'");
        }
        previous
    }

    pub fn deregister(&self, name: &str) -> Option<Arc<Validation<T>>> {
        let removed = self.registry.remove(name).map(|(_, validation)| validation);
        if removed.is_some() {
            debug!("Deregistered validation '{name}'");
        }
        removed
    }

    pub fn get_validation(&self, name: &str) -> Option<Arc<Validation<T>>> {
        self.registry.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.registry.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Apply `edit` to a copy of the registered graph and register the copy
    /// if the edit succeeds. On error the registered graph is unchanged.
    pub fn edit<R>(
        &self,
        name: &str,
        edit: impl FnOnce(&mut Validation<T>) -> Result<R>,
    ) -> Result<R> {
        let mut entry = self
            .registry
            .get_mut(name)
            .ok_or_else(|| ValidationError::NoSuchValidation {
                name: name.to_string(),
            })?;
        let mut draft = entry.value().as_ref().clone();
        let outcome = edit(&mut draft)?;
        *entry.value_mut() = Arc::new(draft);
        debug!("Edited validation '{name}'");
        Ok(outcome)
    }

    pub fn disable_validator(&self, name: &str, validator: &str) -> Result<()> {
        self.edit(name, |validation| validation.disable(validator).map(|_| ()))
    }

    pub fn enable_validator(&self, name: &str, validator: &str) -> Result<()> {
        self.edit(name, |validation| validation.enable(validator).map(|_| ()))
    }

    /// Run on the calling thread. Fails before running anything when the
    /// validation has parallel containers.
    pub fn validate(
        &self,
        name: &str,
        items: impl IntoIterator<Item = T>,
    ) -> Result<ValidationReport<T>> {
        self.run(name, items, Substrate::Inline, RunConfig::default())
    }

    /// Run parallel branches as tasks on `executor`.
    pub fn validate_with<E: Executor + 'static>(
        &self,
        name: &str,
        items: impl IntoIterator<Item = T>,
        executor: &Arc<E>,
    ) -> Result<ValidationReport<T>> {
        let executor: Arc<dyn Executor> = Arc::clone(executor) as Arc<dyn Executor>;
        self.run(name, items, Substrate::Pool(executor), RunConfig::default())
    }

    /// Run parallel branches with fork/join on `pool`.
    pub fn validate_fork_join(
        &self,
        name: &str,
        items: impl IntoIterator<Item = T>,
        pool: &rayon::ThreadPool,
    ) -> Result<ValidationReport<T>> {
        self.run(name, items, Substrate::ForkJoin(pool), RunConfig::default())
    }

    /// Run the validation registered under `name` over `items`.
    ///
    /// Duplicate items are validated once. All parallel branches are joined
    /// before this returns, also when one of them failed.
    pub fn run(
        &self,
        name: &str,
        items: impl IntoIterator<Item = T>,
        substrate: Substrate<'_>,
        config: RunConfig,
    ) -> Result<ValidationReport<T>> {
        let graph = self
            .get_validation(name)
            .ok_or_else(|| ValidationError::NoSuchValidation {
                name: name.to_string(),
            })?;
        if matches!(substrate, Substrate::Inline) && graph.has_parallel() {
            return Err(ValidationError::MissingExecutor {
                name: name.to_string(),
            });
        }

        let ctx = Arc::new(RunContext::new(name, config));
        let mut seen = HashSet::new();
        let items: Vec<_> = items
            .into_iter()
            .filter(|item| seen.insert(item.clone()))
            .map(|item| DataWrapper::new(item, ctx.id()))
            .collect();
        info!(
            "Running validation '{name}' over {} item(s) ({substrate:?}, {:?})",
            items.len(),
            config.mode
        );

        let run = Arc::new(Run {
            ctx: Arc::clone(&ctx),
            graph,
            items,
        });
        let flags = BranchFlags::root();
        let outcome = match run.graph.root() {
            None => Ok(Vec::new()),
            Some(root) => match substrate {
                Substrate::Inline => walk(&run, root, &flags, &Dispatch::Inline),
                Substrate::Pool(executor) => walk(&run, root, &flags, &Dispatch::Pool(executor)),
                Substrate::ForkJoin(pool) => {
                    pool.install(|| walk(&run, root, &flags, &Dispatch::ForkJoin))
                }
            },
        };
        ctx.close();

        let records = match outcome {
            Ok(records) => records,
            Err(err) => {
                warn!("Validation '{name}' aborted: {err}");
                return Err(err);
            }
        };

        let results: HashMap<_, _> = run
            .items
            .iter()
            .map(|wrapper| (wrapper.data().clone(), wrapper.result()))
            .collect();
        let report = ValidationReport::new(ctx.id(), name.to_string(), results, records);
        info!(
            "✓ Validation '{name}' finished: {} message(s) from {} invocation(s)",
            report.message_count(),
            report.records().len()
        );
        Ok(report)
    }
}

impl<T: Item> Default for ValidationManager<T> {
    fn default() -> Self {
        Self::new()
    }
}
