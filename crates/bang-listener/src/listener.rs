//! The polling loop.
//!
//! A [`Listener`] owns everything a request needs: the queues, the job
//! catalog and the execution coordinator. Each cycle receives a batch of
//! messages and processes them one at a time. Processing always publishes
//! at least one response and acknowledges the message exactly once, whatever
//! happened in between; there is no automatic retry.

use std::sync::Arc;

use tracing::{debug, info, warn};

use bang_config::Config;
use bang_jobs::{DeploymentEngine, JobCatalog, PoolSettings, WorkerPool};

use crate::bootstrap::BootstrapError;
use crate::dispatch::{
    ExecutionCoordinator, JOB_MISSING_MESSAGE, Response, ResponseState, decode, invalid_message,
    publish,
};
use crate::health::HealthReporter;
use crate::queue::{InboundMessage, QueuePair, QueueSource, ResponseChannel};
use crate::shutdown::StopFlag;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::listener");

/// A bootstrapped queue listener.
pub struct Listener {
    config: Config,
    source: Box<dyn QueueSource>,
    responses: Arc<dyn ResponseChannel>,
    catalog: JobCatalog,
    coordinator: ExecutionCoordinator,
    reporter: Arc<dyn HealthReporter>,
}

impl Listener {
    /// Loads the job catalog and starts the worker pool.
    ///
    /// Workers are allowed to start child processes. Nothing is published
    /// when construction fails.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Catalog`] when the catalog cannot be loaded
    /// and [`BootstrapError::Pool`] when the pool cannot start.
    pub fn bootstrap(
        config: Config,
        queues: QueuePair,
        engine: Arc<dyn DeploymentEngine>,
        reporter: Arc<dyn HealthReporter>,
    ) -> Result<Self, BootstrapError> {
        let catalog = JobCatalog::load(config.jobs_config_path())
            .map_err(|source| BootstrapError::Catalog { source })?;
        let pool = WorkerPool::new(
            PoolSettings::new(config.pool_processes()).allow_child_processes(),
        )
        .map_err(|source| BootstrapError::Pool { source })?;
        info!(
            target: LISTENER_TARGET,
            jobs = ?catalog.names().collect::<Vec<_>>(),
            pool_processes = pool.settings().size(),
            child_processes = pool.settings().child_processes().is_allowed(),
            "listener ready"
        );
        Ok(Self {
            config,
            source: queues.source,
            responses: queues.responses,
            catalog,
            coordinator: ExecutionCoordinator::new(pool, engine),
            reporter,
        })
    }

    /// Resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Job catalog loaded at start-up.
    #[must_use]
    pub fn catalog(&self) -> &JobCatalog {
        &self.catalog
    }

    /// Polls until `stop` is raised.
    ///
    /// The flag is checked between cycles and during the idle sleep; a job
    /// that is already running always finishes.
    pub fn run(&self, stop: &StopFlag) {
        let queue = self.config.job_queue_name();
        self.reporter.polling_started(queue);
        while !stop.is_raised() {
            self.poll_once();
            stop.sleep(self.config.polling_interval());
        }
        self.reporter.polling_stopped(queue);
    }

    /// Runs one receive, process and acknowledge cycle.
    ///
    /// Returns the number of messages handled. A receive failure is logged
    /// and counts as an empty batch.
    pub fn poll_once(&self) -> usize {
        let batch = match self.source.receive(self.config.max_messages_per_poll()) {
            Ok(batch) => batch,
            Err(error) => {
                warn!(
                    target: LISTENER_TARGET,
                    queue = self.config.job_queue_name(),
                    %error,
                    "failed to receive messages"
                );
                return 0;
            }
        };
        for message in &batch {
            self.process(Some(message));
        }
        batch.len()
    }

    /// Handles one message and returns the terminal response published for
    /// it.
    pub fn process(&self, message: Option<&InboundMessage>) -> Response {
        debug!(
            target: LISTENER_TARGET,
            message_id = message.map(InboundMessage::id),
            "processing message"
        );
        let terminal = self.respond(message);
        publish(self.responses.as_ref(), &terminal);
        self.acknowledge(message);
        self.reporter.message_processed(&terminal);
        terminal
    }

    fn respond(&self, message: Option<&InboundMessage>) -> Response {
        let request = match decode(message) {
            Ok(request) => request,
            Err(error) => {
                let (job_name, request_id) = error.identity();
                warn!(
                    target: LISTENER_TARGET,
                    job = job_name,
                    request_id,
                    %error,
                    "invalid message"
                );
                return Response::build(
                    job_name,
                    request_id,
                    ResponseState::Failure,
                    invalid_message(&error),
                );
            }
        };

        let (job_name, request_id, parameters) = request.into_parts();
        match self.catalog.resolve(&job_name, parameters) {
            Ok(job) => self.coordinator.run(job, &request_id, &self.responses),
            Err(error) => {
                warn!(
                    target: LISTENER_TARGET,
                    job = %job_name,
                    request_id = %request_id,
                    %error,
                    "job definition missing"
                );
                Response::build(
                    job_name,
                    request_id,
                    ResponseState::Failure,
                    JOB_MISSING_MESSAGE,
                )
            }
        }
    }

    fn acknowledge(&self, message: Option<&InboundMessage>) {
        let Some(message) = message else {
            return;
        };
        if let Err(error) = self.source.delete(message) {
            warn!(
                target: LISTENER_TARGET,
                message_id = message.id(),
                %error,
                "failed to acknowledge message"
            );
        }
    }
}
