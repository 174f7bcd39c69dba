//! Fixed-size worker pool for job execution.
//!
//! Jobs run on named OS threads so a slow deployment never blocks the thread
//! that polls the queue. Each task reports its outcome through a
//! [`TaskHandle`]; a panicking task is reported as
//! [`ExecutionFault::Panicked`] and leaves its worker alive.
//!
//! Deployment tooling commonly starts processes of its own. Whether pool
//! tasks may do so is an explicit [`ChildProcessPolicy`] carried by the
//! [`PoolSettings`] and exposed to every task through its
//! [`WorkerContext`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{ExecutionFault, PoolError};

const POOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pool");

type Task = Box<dyn FnOnce(&WorkerContext) + Send + 'static>;

/// Whether pool tasks may start child processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChildProcessPolicy {
    /// Tasks may spawn processes.
    Allowed,
    /// Tasks must not spawn processes.
    #[default]
    Forbidden,
}

impl ChildProcessPolicy {
    /// Returns `true` when spawning is permitted.
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Pool construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    size: usize,
    child_processes: ChildProcessPolicy,
}

impl PoolSettings {
    /// Settings for `size` workers that may not start child processes.
    #[must_use]
    pub const fn new(size: usize) -> Self {
        Self {
            size,
            child_processes: ChildProcessPolicy::Forbidden,
        }
    }

    /// Permits tasks to start child processes.
    #[must_use]
    pub const fn allow_child_processes(mut self) -> Self {
        self.child_processes = ChildProcessPolicy::Allowed;
        self
    }

    /// Number of workers.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Child process policy applied to every task.
    #[must_use]
    pub const fn child_processes(&self) -> ChildProcessPolicy {
        self.child_processes
    }
}

/// What a task knows about the worker running it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerContext {
    index: usize,
    child_processes: ChildProcessPolicy,
}

impl WorkerContext {
    /// Zero-based index of the worker.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Child process policy of the pool.
    #[must_use]
    pub const fn child_processes(&self) -> ChildProcessPolicy {
        self.child_processes
    }
}

/// Receives the outcome of one submitted task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    outcome: Receiver<Result<T, ExecutionFault>>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task finishes.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionFault::Panicked`] when the task panicked and
    /// [`PoolError::WorkerLost`] when no outcome was ever reported.
    pub fn wait(self) -> Result<T, ExecutionFault> {
        self.outcome
            .recv()
            .unwrap_or_else(|_| Err(ExecutionFault::Pool(PoolError::WorkerLost)))
    }
}

/// A fixed set of worker threads consuming a shared task queue.
///
/// Dropping the pool stops accepting work, lets queued tasks finish and joins
/// every worker.
#[derive(Debug)]
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    settings: PoolSettings,
}

impl WorkerPool {
    /// Starts `settings.size()` workers named `bang-worker-<n>`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidSize`] for an empty pool and
    /// [`PoolError::Spawn`] when a worker thread cannot be started.
    pub fn new(settings: PoolSettings) -> Result<Self, PoolError> {
        if settings.size == 0 {
            return Err(PoolError::InvalidSize);
        }
        let (sender, receiver) = mpsc::channel::<Task>();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(settings.size),
            settings,
        };
        for index in 0..settings.size {
            let context = WorkerContext {
                index,
                child_processes: settings.child_processes,
            };
            let queue = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("bang-worker-{index}"))
                .spawn(move || run_worker(&context, &queue))
                .map_err(|source| PoolError::Spawn {
                    index,
                    source: Arc::new(source),
                })?;
            pool.workers.push(handle);
        }
        debug!(
            target: POOL_TARGET,
            size = settings.size,
            child_processes = settings.child_processes.is_allowed(),
            "worker pool started"
        );
        Ok(pool)
    }

    /// Settings the pool was built with.
    #[must_use]
    pub const fn settings(&self) -> PoolSettings {
        self.settings
    }

    /// Queues `task` for execution on the next free worker.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Closed`] when the workers are gone.
    pub fn submit<T, F>(&self, task: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce(&WorkerContext) -> T + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolError::Closed)?;
        let (outcome_tx, outcome_rx) = mpsc::sync_channel(1);
        let wrapped: Task = Box::new(move |context: &WorkerContext| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(context))).map_err(
                |payload| ExecutionFault::Panicked {
                    message: panic_message(payload.as_ref()),
                },
            );
            drop(outcome_tx.send(outcome));
        });
        sender.send(wrapped).map_err(|_| PoolError::Closed)?;
        Ok(TaskHandle {
            outcome: outcome_rx,
        })
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!(target: POOL_TARGET, "worker thread terminated abnormally");
            }
        }
    }
}

fn run_worker(context: &WorkerContext, queue: &Mutex<Receiver<Task>>) {
    loop {
        let next = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        match next {
            Ok(task) => task(context),
            Err(_) => break,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_owned();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    String::from("non-string panic payload")
}

#[cfg(test)]
mod tests;
