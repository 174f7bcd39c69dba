//! Structured health reporting for listener lifecycle events.

use std::sync::Arc;

use bang_config::Config;

use crate::bootstrap::BootstrapError;
use crate::dispatch::{Response, ResponseState};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked when the polling loop starts.
    fn polling_started(&self, queue: &str);

    /// Invoked when the polling loop observes the stop flag.
    fn polling_stopped(&self, queue: &str);

    /// Invoked with the terminal response of every processed message.
    fn message_processed(&self, response: &Response);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn polling_started(&self, queue: &str) {
        (**self).polling_started(queue);
    }

    fn polling_stopped(&self, queue: &str) {
        (**self).polling_stopped(queue);
    }

    fn message_processed(&self, response: &Response) {
        (**self).message_processed(response);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting listener bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            endpoint = %config.endpoint(),
            job_queue = config.job_queue_name(),
            response_queue = config.response_queue_name(),
            jobs_config = %config.jobs_config_path(),
            pool_processes = config.pool_processes(),
            log_format = %config.log_format(),
            "listener bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "listener bootstrap failed"
        );
    }

    fn polling_started(&self, queue: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "polling_started",
            queue,
            "polling for job requests"
        );
    }

    fn polling_stopped(&self, queue: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "polling_stopped",
            queue,
            "stopped polling"
        );
    }

    fn message_processed(&self, response: &Response) {
        if response.state() == ResponseState::Failure {
            tracing::warn!(
                target: HEALTH_TARGET,
                event = "message_processed",
                job = response.job_name(),
                request_id = response.request_id(),
                state = %response.state(),
                message = response.message(),
                "request failed"
            );
        } else {
            tracing::info!(
                target: HEALTH_TARGET,
                event = "message_processed",
                job = response.job_name(),
                request_id = response.request_id(),
                state = %response.state(),
                "request completed"
            );
        }
    }
}
