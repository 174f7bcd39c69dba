//! Job catalog and execution machinery for the bang queue listener.
//!
//! A request names a job; the [`JobCatalog`] turns that name into a [`Job`]
//! carrying the deployment resource specs configured for it. Jobs run on a
//! [`WorkerPool`] through a [`DeploymentEngine`], which streams progress
//! lines while it works and reports success or an [`EngineFault`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use bang_jobs::{ExecutionContext, JobCatalog, PoolSettings, WorkerPool};
//! use bang_jobs::engine::DeploymentEngine;
//! use bang_jobs::process::CommandEngine;
//!
//! let catalog = JobCatalog::from_yaml("web:\n  bang-stacks: [web.yml]\n").expect("catalog");
//! let job = catalog.resolve("web", None).expect("job exists");
//! let pool = WorkerPool::new(PoolSettings::new(5).allow_child_processes()).expect("pool");
//! let engine = CommandEngine::new("bang", Duration::from_secs(3600));
//! let handle = pool.submit(move |worker| {
//!     let progress = |line: &str| println!("{line}");
//!     let context = ExecutionContext::new("req-1", &progress, worker.child_processes());
//!     engine.execute(&job, &context).map_err(|fault| fault.to_string())
//! });
//! ```

pub mod catalog;
pub mod engine;
pub mod error;
pub mod job;
pub mod pool;
pub mod process;

#[cfg(test)]
mod tests;

pub use self::catalog::{JobCatalog, JobDefinition};
pub use self::engine::{DeploymentEngine, ExecutionContext, ProgressSink};
pub use self::error::{CatalogLoadError, EngineFault, ExecutionFault, JobNotFound, PoolError};
pub use self::job::Job;
pub use self::pool::{ChildProcessPolicy, PoolSettings, TaskHandle, WorkerContext, WorkerPool};
pub use self::process::{CommandEngine, EngineError};
