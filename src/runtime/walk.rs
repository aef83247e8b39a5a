//! Walking a validation graph for one run

use chrono::Utc;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, mpsc};
use std::time::Instant;
use tracing::{debug, warn};

use super::executor::Executor;
use crate::context::{BranchFlags, Cancelled, RunContext, ValidatorContext};
use crate::data_wrapper::DataWrapper;
use crate::error::{Result, ValidationError};
use crate::graph::{NodeId, NodeKind, Validation, ValidatorNode};
use crate::result::ValidationRecord;
use crate::validator::{Item, ValidatorRef};

/// Everything branch tasks share: the run context, the graph snapshot the
/// run started with, and the wrapped items.
pub(crate) struct Run<T: Item> {
    pub ctx: Arc<RunContext>,
    pub graph: Arc<Validation<T>>,
    pub items: Vec<DataWrapper<T>>,
}

#[derive(Clone)]
pub(crate) enum Dispatch {
    Inline,
    Pool(Arc<dyn Executor>),
    /// Only valid while running inside the rayon pool's `install`.
    ForkJoin,
}

/// Run the sequence starting at `head`, fanning out at parallel containers.
/// Returns the invocation records in completion order.
pub(crate) fn walk<T: Item>(
    run: &Arc<Run<T>>,
    head: NodeId,
    flags: &BranchFlags,
    dispatch: &Dispatch,
) -> Result<Vec<ValidationRecord>> {
    let mut records = Vec::new();
    let mut stack = vec![head];
    while let Some(id) = stack.pop() {
        let Some(node) = run.graph.get(id) else {
            continue;
        };
        if let Some(next) = node.next() {
            stack.push(next);
        }
        match node.kind() {
            NodeKind::Leaf(validator) => {
                records.extend(execute_leaf(run, id, node, validator, flags)?);
            }
            NodeKind::Parallel(branches) => {
                records.extend(fan_out(run, branches, flags, dispatch)?);
            }
        }
    }
    Ok(records)
}

fn fan_out<T: Item>(
    run: &Arc<Run<T>>,
    branches: &[NodeId],
    flags: &BranchFlags,
    dispatch: &Dispatch,
) -> Result<Vec<ValidationRecord>> {
    if run.ctx.ignore_all_following() {
        debug!("Skipping parallel group: run is stopping");
        return Ok(Vec::new());
    }
    let branch_flags = flags.fan_out(branches.len());
    debug!("Fanning out {} parallel branches", branches.len());

    let records = match dispatch {
        Dispatch::Inline => Err(ValidationError::MissingExecutor {
            name: run.ctx.validation_name().to_string(),
        }),
        Dispatch::Pool(executor) => fan_out_pool(run, branches, branch_flags, executor, dispatch),
        Dispatch::ForkJoin => fan_out_fork_join(run, branches, branch_flags),
    }?;
    debug!("Joined {} parallel branches", branches.len());
    Ok(records)
}

fn fan_out_pool<T: Item>(
    run: &Arc<Run<T>>,
    branches: &[NodeId],
    flags: Vec<BranchFlags>,
    executor: &Arc<dyn Executor>,
    dispatch: &Dispatch,
) -> Result<Vec<ValidationRecord>> {
    let (tx, rx) = mpsc::channel();
    for (head, flags) in branches.iter().copied().zip(flags) {
        let tx = tx.clone();
        let run = Arc::clone(run);
        let dispatch = dispatch.clone();
        executor.execute(Box::new(move || {
            let outcome = walk(&run, head, &flags, &dispatch);
            // The receiver only goes away if the walking thread itself died.
            let _ = tx.send(outcome);
        }));
    }
    drop(tx);
    join_branches(rx.iter(), branches.len(), &run.ctx)
}

fn fan_out_fork_join<T: Item>(
    run: &Arc<Run<T>>,
    branches: &[NodeId],
    flags: Vec<BranchFlags>,
) -> Result<Vec<ValidationRecord>> {
    let outcomes: Vec<_> = branches
        .par_iter()
        .zip(flags.par_iter())
        .map(|(head, flags)| walk(run, *head, flags, &Dispatch::ForkJoin))
        .collect();
    join_branches(outcomes.into_iter(), branches.len(), &run.ctx)
}

/// Wait for every branch, then report the first failure if there was one.
fn join_branches(
    outcomes: impl Iterator<Item = Result<Vec<ValidationRecord>>>,
    expected: usize,
    ctx: &RunContext,
) -> Result<Vec<ValidationRecord>> {
    let mut records = Vec::new();
    let mut failure = None;
    let mut received = 0;
    for outcome in outcomes {
        received += 1;
        match outcome {
            Ok(branch) => records.extend(branch),
            Err(err) if failure.is_none() => failure = Some(err),
            Err(err) => warn!("Additional branch failure in '{}': {err}", ctx.validation_name()),
        }
    }
    if let Some(err) = failure {
        return Err(err);
    }
    if received < expected {
        warn!(
            "{} of {expected} branches of '{}' never reported back",
            expected - received,
            ctx.validation_name()
        );
        return Err(ValidationError::BranchLost {
            validation: ctx.validation_name().to_string(),
        });
    }
    Ok(records)
}

fn execute_leaf<T: Item>(
    run: &Arc<Run<T>>,
    id: NodeId,
    node: &ValidatorNode<T>,
    validator: &ValidatorRef<T>,
    flags: &BranchFlags,
) -> Result<Option<ValidationRecord>> {
    let name = node.name();
    if !node.is_enabled() {
        debug!("Skipping disabled validator '{name}'");
        return Ok(None);
    }
    if run.ctx.ignore_all_following() {
        debug!("Skipping '{name}': run is stopping");
        return Ok(None);
    }
    if run.ctx.is_ignored(name) {
        debug!("Skipping '{name}': ignored for this run");
        return Ok(None);
    }

    let batch: Vec<&DataWrapper<T>> = run
        .items
        .iter()
        .filter(|item| !item.is_skip_all_remaining() && !item.ignores(name))
        .collect();
    if batch.is_empty() {
        debug!("Skipping '{name}': no eligible items");
        return Ok(None);
    }

    let instance = match panic::catch_unwind(AssertUnwindSafe(|| validator.instance())) {
        Ok(instance) => instance?,
        Err(payload) => {
            let message = panic_message(&*payload);
            warn!("Constructing validator '{name}' panicked: {message}");
            return Err(ValidationError::ValidatorPanicked {
                node: name.to_string(),
                validator: validator.id().clone(),
                message,
            });
        }
    };
    let ctx = ValidatorContext::new(
        Arc::clone(&run.ctx),
        Arc::clone(&run.graph),
        id,
        validator.id().clone(),
        flags.clone(),
    );
    debug!("Running '{name}' ({}) on {} item(s)", validator.id(), batch.len());

    let started_at = Utc::now();
    let clock = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| instance.validate(&batch, &ctx)));
    ctx.close();
    let duration = clock.elapsed();

    let cancelled = match outcome {
        Ok(Ok(())) => false,
        Ok(Err(err)) if is_cancellation(&err) => {
            debug!("Validator '{name}' stopped after cancellation");
            true
        }
        Ok(Err(source)) => {
            warn!("Validator '{name}' failed: {source:#}");
            return Err(ValidationError::ValidatorFailed {
                node: name.to_string(),
                validator: validator.id().clone(),
                source,
            });
        }
        Err(payload) => {
            let message = panic_message(&*payload);
            warn!("Validator '{name}' panicked: {message}");
            return Err(ValidationError::ValidatorPanicked {
                node: name.to_string(),
                validator: validator.id().clone(),
                message,
            });
        }
    };

    if !cancelled && ctx.cancellation_observed() {
        return Err(ValidationError::CancellationSwallowed {
            node: name.to_string(),
            validator: validator.id().clone(),
        });
    }

    Ok(Some(ValidationRecord {
        validation_name: run.ctx.validation_name().to_string(),
        validator_name: name.to_string(),
        validator_id: validator.id().clone(),
        started_at,
        finished_at: Utc::now(),
        duration,
        item_count: batch.len(),
        message_count: ctx.reported(),
        cancelled,
        thread_name: std::thread::current().name().map(str::to_string),
    }))
}

fn is_cancellation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<Cancelled>())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
