use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

use super::RunContext;
use crate::config::ValidationMode;
use crate::data_wrapper::DataWrapper;
use crate::error::{Result, ValidationError};
use crate::graph::{NodeId, Validation};
use crate::message::{Provenance, Report, Severity, ValidationMessage};
use crate::validator::{Item, ValidatorId};

/// Returned by [`ValidatorContext::check_cancellation`] once another branch
/// asked this one to stop. Propagate it with `?`; the engine absorbs it at
/// the end of the invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("validator invocation cancelled by a parallel branch")]
pub struct Cancelled;

/// Cancellation flags of one branch: its own and those of its siblings in
/// the same parallel container.
#[derive(Debug, Clone)]
pub(crate) struct BranchFlags {
    own: Arc<AtomicBool>,
    siblings: Vec<Arc<AtomicBool>>,
}

impl BranchFlags {
    pub fn root() -> Self {
        Self {
            own: Arc::new(AtomicBool::new(false)),
            siblings: Vec::new(),
        }
    }

    /// Flags for the branches of a container entered from this branch.
    /// Each starts out with this branch's current value.
    pub fn fan_out(&self, branches: usize) -> Vec<BranchFlags> {
        let initial = self.is_cancelled();
        let flags: Vec<_> = (0..branches)
            .map(|_| Arc::new(AtomicBool::new(initial)))
            .collect();
        (0..branches)
            .map(|index| BranchFlags {
                own: Arc::clone(&flags[index]),
                siblings: flags
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != index)
                    .map(|(_, flag)| Arc::clone(flag))
                    .collect(),
            })
            .collect()
    }

    pub fn is_cancelled(&self) -> bool {
        self.own.load(Ordering::SeqCst)
    }

    fn cancel_siblings(&self) {
        for flag in &self.siblings {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

struct Invocation<T: Item> {
    run: Arc<RunContext>,
    graph: Arc<Validation<T>>,
    node: NodeId,
    validator_name: String,
    validator_id: ValidatorId,
    flags: BranchFlags,
    observed: AtomicBool,
    active: AtomicBool,
    reported: AtomicUsize,
}

/// Handle a validator uses during one invocation.
///
/// Cheap to clone and usable from helper threads, but only until the
/// invocation returns; afterwards every operation fails with
/// [`ValidationError::NotInValidationRun`].
pub struct ValidatorContext<T: Item> {
    inner: Arc<Invocation<T>>,
}

impl<T: Item> Clone for ValidatorContext<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Item> ValidatorContext<T> {
    pub(crate) fn new(
        run: Arc<RunContext>,
        graph: Arc<Validation<T>>,
        node: NodeId,
        validator_id: ValidatorId,
        flags: BranchFlags,
    ) -> Self {
        let validator_name = graph
            .get(node)
            .map(|n| n.name().to_string())
            .unwrap_or_default();
        Self {
            inner: Arc::new(Invocation {
                run,
                graph,
                node,
                validator_name,
                validator_id,
                flags,
                observed: AtomicBool::new(false),
                active: AtomicBool::new(true),
                reported: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn close(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
    }

    pub(crate) fn cancellation_observed(&self) -> bool {
        self.inner.observed.load(Ordering::SeqCst)
    }

    pub(crate) fn reported(&self) -> usize {
        self.inner.reported.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn run(&self) -> &RunContext {
        &self.inner.run
    }

    pub fn validation_name(&self) -> &str {
        self.inner.run.validation_name()
    }

    /// Name of the graph node being run.
    pub fn validator_name(&self) -> &str {
        &self.inner.validator_name
    }

    pub fn validator_id(&self) -> &ValidatorId {
        &self.inner.validator_id
    }

    #[track_caller]
    pub fn report(
        &self,
        item: &DataWrapper<T>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Result<()> {
        self.report_with(item, Report::new(severity, message))
    }

    #[track_caller]
    pub fn debug(&self, item: &DataWrapper<T>, message: impl Into<String>) -> Result<()> {
        self.report_with(item, Report::new(Severity::Debug, message))
    }

    #[track_caller]
    pub fn info(&self, item: &DataWrapper<T>, message: impl Into<String>) -> Result<()> {
        self.report_with(item, Report::new(Severity::Info, message))
    }

    #[track_caller]
    pub fn warning(&self, item: &DataWrapper<T>, message: impl Into<String>) -> Result<()> {
        self.report_with(item, Report::new(Severity::Warning, message))
    }

    #[track_caller]
    pub fn error(&self, item: &DataWrapper<T>, message: impl Into<String>) -> Result<()> {
        self.report_with(item, Report::new(Severity::Error, message))
    }

    #[track_caller]
    pub fn fatal(&self, item: &DataWrapper<T>, message: impl Into<String>) -> Result<()> {
        self.report_with(item, Report::new(Severity::Fatal, message))
    }

    /// Record `report` against `item` and apply the run's stop policy.
    pub fn report_with(&self, item: &DataWrapper<T>, report: Report) -> Result<()> {
        self.ensure_active()?;
        let run = &self.inner.run;
        if item.run_id() != run.id() {
            return Err(ValidationError::ItemNotInRun { run: run.id() });
        }
        if report.message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }

        let severity = report.severity;
        let message = ValidationMessage::from_report(
            report,
            Provenance {
                run_id: run.id(),
                validation_name: run.validation_name().to_string(),
                validator_name: self.inner.validator_name.clone(),
                validator_id: self.inner.validator_id.clone(),
            },
        );
        if item.record(message) {
            self.inner.reported.fetch_add(1, Ordering::SeqCst);
        }

        if run.config().stops_on(severity) {
            match run.mode() {
                ValidationMode::ImmediateStopSingleData => item.skip_all_remaining(),
                ValidationMode::ImmediateStopAllData => run.set_ignore_all_following(true),
                ValidationMode::Sustainable => {}
            }
        }
        Ok(())
    }

    /// Fails with [`Cancelled`] once a sibling branch cancelled this one.
    pub fn check_cancellation(&self) -> Result<(), Cancelled> {
        if !self.is_active() {
            return Err(Cancelled);
        }
        if self.inner.flags.is_cancelled() {
            self.inner.observed.store(true, Ordering::SeqCst);
            debug!("Validator '{}' observed cancellation", self.inner.validator_name);
            return Err(Cancelled);
        }
        Ok(())
    }

    /// Peek at the cancellation flag without acting on it.
    pub fn is_cancellation_requested(&self) -> bool {
        self.inner.flags.is_cancelled()
    }

    /// Ask every other branch of the enclosing parallel container to stop.
    /// Outside a container this does nothing.
    pub fn cancel_other_parallel_validators(&self) -> Result<()> {
        self.ensure_active()?;
        self.inner.flags.cancel_siblings();
        debug!(
            "Validator '{}' cancelled {} sibling branch(es)",
            self.inner.validator_name,
            self.inner.flags.siblings.len()
        );
        Ok(())
    }

    /// Validators `item` may still meet after this one: the remaining graph
    /// minus disabled nodes and anything ignored for the item or the run.
    pub fn future_validators(&self, item: &DataWrapper<T>) -> Result<BTreeSet<String>> {
        self.ensure_active()?;
        let run = &self.inner.run;
        if item.is_skip_all_remaining() || run.ignore_all_following() {
            return Ok(BTreeSet::new());
        }
        Ok(self
            .inner
            .graph
            .future_validators(self.inner.node)
            .into_iter()
            .filter(|name| !item.ignores(name) && !run.is_ignored(name))
            .map(str::to_string)
            .collect())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() && !self.inner.run.is_closed() {
            Ok(())
        } else {
            Err(ValidationError::NotInValidationRun)
        }
    }
}

impl<T: Item> std::fmt::Debug for ValidatorContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorContext")
            .field("validation", &self.validation_name())
            .field("validator", &self.inner.validator_name)
            .field("id", &self.inner.validator_id)
            .field("active", &self.is_active())
            .finish()
    }
}
