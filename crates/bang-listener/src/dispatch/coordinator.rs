//! Runs resolved jobs on the worker pool and reports their progress.
//!
//! For one request the coordinator publishes a `started` response, hands the
//! job to the pool and publishes one `working` response per progress line the
//! engine emits, as it is emitted. It then blocks until the job finishes and
//! returns the terminal response for the caller to publish. Execution faults
//! never escape: they are logged in full and folded into a `failure`
//! response.

use std::sync::Arc;

use tracing::{debug, error, info};

use bang_jobs::{
    DeploymentEngine, ExecutionContext, ExecutionFault, Job, ProgressSink, TaskHandle,
    WorkerPool,
};

use crate::queue::ResponseChannel;

use super::response::{Response, ResponseState, publish};

const COORDINATOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch::coordinator");

/// Message of every `started` response.
pub const STARTED_MESSAGE: &str = "Request has been received and the job is in progress.";

/// Message of every `success` response.
pub const SUCCESS_MESSAGE: &str = "Job completed successfully.";

/// Executes jobs through a [`DeploymentEngine`] on a [`WorkerPool`].
pub struct ExecutionCoordinator {
    pool: WorkerPool,
    engine: Arc<dyn DeploymentEngine>,
}

impl ExecutionCoordinator {
    /// Creates a coordinator owning `pool`.
    #[must_use]
    pub fn new(pool: WorkerPool, engine: Arc<dyn DeploymentEngine>) -> Self {
        Self { pool, engine }
    }

    /// Runs `job` for `request_id` and returns its terminal response.
    ///
    /// `started` and `working` responses are published on `channel` while
    /// the job runs; the terminal response is returned unpublished.
    pub fn run(&self, job: Job, request_id: &str, channel: &Arc<dyn ResponseChannel>) -> Response {
        let job_name = job.name().to_owned();
        publish(
            channel.as_ref(),
            &Response::build(&job_name, request_id, ResponseState::Started, STARTED_MESSAGE),
        );
        info!(
            target: COORDINATOR_TARGET,
            job = %job_name,
            request_id,
            specs = job.resource_specs().len(),
            "job submitted"
        );

        match self.execute(job, request_id, channel) {
            Ok(()) => {
                info!(
                    target: COORDINATOR_TARGET,
                    job = %job_name,
                    request_id,
                    "job succeeded"
                );
                Response::build(job_name, request_id, ResponseState::Success, SUCCESS_MESSAGE)
            }
            Err(fault) => {
                error!(
                    target: COORDINATOR_TARGET,
                    job = %job_name,
                    request_id,
                    error = %fault.summary(),
                    fault = ?fault,
                    "job failed"
                );
                Response::build(
                    job_name,
                    request_id,
                    ResponseState::Failure,
                    failure_message(&fault),
                )
            }
        }
    }

    fn execute(
        &self,
        job: Job,
        request_id: &str,
        channel: &Arc<dyn ResponseChannel>,
    ) -> Result<(), ExecutionFault> {
        let engine = Arc::clone(&self.engine);
        let sink = WorkingSink {
            channel: Arc::clone(channel),
            job_name: job.name().to_owned(),
            request_id: request_id.to_owned(),
        };
        self.pool
            .submit(move |worker| {
                debug!(
                    target: COORDINATOR_TARGET,
                    worker = worker.index(),
                    job = job.name(),
                    request_id = %sink.request_id,
                    "job running"
                );
                let context =
                    ExecutionContext::new(&sink.request_id, &sink, worker.child_processes());
                engine.execute(&job, &context)
            })
            .map_err(ExecutionFault::from)
            .and_then(TaskHandle::wait)
            .and_then(|outcome| outcome.map_err(ExecutionFault::Engine))
    }
}

/// Failure text pointing the operator at the listener's own logs.
#[must_use]
pub fn failure_message(fault: &ExecutionFault) -> String {
    format!(
        "{}. See bang-listener logs for a complete trace.",
        fault.summary()
    )
}

/// Publishes each progress line as a `working` response.
struct WorkingSink {
    channel: Arc<dyn ResponseChannel>,
    job_name: String,
    request_id: String,
}

impl ProgressSink for WorkingSink {
    fn emit(&self, line: &str) {
        let response = Response::build(
            self.job_name.as_str(),
            self.request_id.as_str(),
            ResponseState::Working,
            line,
        );
        publish(self.channel.as_ref(), &response);
    }
}
