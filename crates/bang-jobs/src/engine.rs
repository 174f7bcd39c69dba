//! The seam between job coordination and the deployment tooling.
//!
//! A [`DeploymentEngine`] performs the actual work of a [`Job`]. Engines run
//! on a pool worker and stream human-readable progress through the
//! [`ProgressSink`] in their [`ExecutionContext`]. The production engine is
//! [`CommandEngine`](crate::process::CommandEngine); tests inject doubles.

use crate::error::EngineFault;
use crate::job::Job;
use crate::pool::ChildProcessPolicy;

/// Receives progress lines while a job runs.
pub trait ProgressSink {
    /// Publishes one line of progress.
    fn emit(&self, line: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str),
{
    fn emit(&self, line: &str) {
        self(line);
    }
}

/// Per-execution state handed to an engine.
pub struct ExecutionContext<'a> {
    request_id: &'a str,
    progress: &'a dyn ProgressSink,
    child_processes: ChildProcessPolicy,
}

impl<'a> ExecutionContext<'a> {
    /// Creates a context for one execution.
    #[must_use]
    pub fn new(
        request_id: &'a str,
        progress: &'a dyn ProgressSink,
        child_processes: ChildProcessPolicy,
    ) -> Self {
        Self {
            request_id,
            progress,
            child_processes,
        }
    }

    /// Identifier of the request that triggered the job.
    #[must_use]
    pub const fn request_id(&self) -> &str {
        self.request_id
    }

    /// Sink for progress lines.
    #[must_use]
    pub fn progress(&self) -> &dyn ProgressSink {
        self.progress
    }

    /// Whether the engine may start child processes.
    #[must_use]
    pub const fn child_processes(&self) -> ChildProcessPolicy {
        self.child_processes
    }
}

/// Executes jobs.
pub trait DeploymentEngine: Send + Sync {
    /// Runs `job` to completion.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineFault`] describing why the deployment failed.
    fn execute(&self, job: &Job, context: &ExecutionContext<'_>) -> Result<(), EngineFault>;
}
