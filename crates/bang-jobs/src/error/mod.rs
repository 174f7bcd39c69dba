//! Domain errors raised while resolving and executing jobs.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. I/O errors are wrapped in `Arc`
//! to satisfy the `result_large_err` Clippy lint.

use std::error::Error as StdError;
use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Opaque failure raised by a [`DeploymentEngine`](crate::DeploymentEngine).
pub type EngineFault = Box<dyn StdError + Send + Sync + 'static>;

/// Errors raised while reading the job catalog.
#[derive(Debug, Clone, Error)]
pub enum CatalogLoadError {
    /// The catalog file could not be read.
    #[error("failed to read job catalog '{path}': {source}")]
    Read {
        /// Catalog location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The catalog file is not a mapping of job names to definitions.
    #[error("job catalog '{path}' is invalid: {message}")]
    Parse {
        /// Catalog location, or `<inline>` for catalogs parsed from text.
        path: Utf8PathBuf,
        /// Description of the structural problem.
        message: String,
    },
}

/// The requested job has no catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job '{name}' is not defined in the job catalog")]
pub struct JobNotFound {
    /// Name that was looked up.
    pub name: String,
}

/// Errors raised by the worker pool itself rather than by a job.
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    /// A pool must hold at least one worker.
    #[error("worker pool size must be at least 1")]
    InvalidSize,

    /// A worker thread could not be started.
    #[error("failed to start worker thread {index}: {source}")]
    Spawn {
        /// Index of the worker that failed to start.
        index: usize,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The pool no longer accepts work.
    #[error("worker pool is shut down")]
    Closed,

    /// The worker running a task went away without reporting an outcome.
    #[error("worker exited before reporting a result")]
    WorkerLost,
}

/// Reasons a submitted job did not complete successfully.
#[derive(Debug, Error)]
pub enum ExecutionFault {
    /// The deployment engine reported a failure.
    #[error("{0}")]
    Engine(#[source] EngineFault),

    /// The task panicked on its worker.
    #[error("job panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// The pool failed to run the task.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl ExecutionFault {
    /// Renders the fault and every underlying cause on one line.
    ///
    /// Causes already contained in their parent's message are skipped so
    /// wrapped errors are not repeated.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = self.to_string();
        let mut cause = self.source_chain_start();
        while let Some(error) = cause {
            let text = error.to_string();
            if !summary.contains(&text) {
                summary.push_str(": ");
                summary.push_str(&text);
            }
            cause = error.source();
        }
        summary
    }

    fn source_chain_start(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Engine(fault) => fault.source(),
            Self::Pool(error) => error.source(),
            Self::Panicked { .. } => None,
        }
    }
}
