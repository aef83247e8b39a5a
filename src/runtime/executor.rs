//! Execution substrates for parallel branches

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs branch tasks submitted by the engine.
///
/// An implementation may run the task on any thread. Dropping a task without
/// running it is tolerated: the run fails with
/// [`ValidationError::BranchLost`](crate::ValidationError::BranchLost)
/// instead of waiting forever.
pub trait Executor: Send + Sync {
    fn execute(&self, task: Task);
}

/// Spawns each branch onto the pool.
///
/// A branch that reaches a nested parallel group keeps its worker blocked
/// until the nested branches finish, so the pool needs more threads than the
/// deepest nesting of parallel groups or the run never completes. Prefer
/// [`ValidationManager::validate_fork_join`](crate::ValidationManager::validate_fork_join)
/// with rayon pools; it has no such limit.
impl Executor for rayon::ThreadPool {
    fn execute(&self, task: Task) {
        self.spawn(task);
    }
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, task: Task) {
        (**self).execute(task);
    }
}

/// Starts one named OS thread per task.
#[derive(Debug, Default)]
pub struct ThreadSpawner {
    prefix: Option<String>,
    spawned: AtomicUsize,
}

impl ThreadSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            spawned: AtomicUsize::new(0),
        }
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl Executor for ThreadSpawner {
    fn execute(&self, task: Task) {
        let n = self.spawned.fetch_add(1, Ordering::SeqCst);
        let prefix = self.prefix.as_deref().unwrap_or("valchain-branch");
        let spawned = std::thread::Builder::new()
            .name(format!("{prefix}-{n}"))
            .spawn(task);
        if let Err(err) = spawned {
            warn!("Failed to spawn branch thread: {err}");
        }
    }
}

/// Where parallel branches of a run execute.
pub enum Substrate<'a> {
    /// On the calling thread only. Validations with parallel containers are
    /// rejected up front.
    Inline,
    /// Each branch is submitted to the executor; results are collected off a
    /// completion queue in arrival order.
    Pool(Arc<dyn Executor>),
    /// Branches are forked and joined on a rayon pool with work stealing.
    ForkJoin(&'a rayon::ThreadPool),
}

impl std::fmt::Debug for Substrate<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Substrate::Inline => f.write_str("Inline"),
            Substrate::Pool(_) => f.write_str("Pool"),
            Substrate::ForkJoin(pool) => write!(f, "ForkJoin({} threads)", pool.current_num_threads()),
        }
    }
}
