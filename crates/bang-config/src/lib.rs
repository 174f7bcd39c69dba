//! Layered configuration for the bang queue listener.
//!
//! [`Config`] is resolved by `ortho_config` from, in increasing precedence,
//! the built-in defaults in [`defaults`], a configuration file, `BANG_*`
//! environment variables and command-line flags. A value present in the
//! configuration file therefore always beats the default the listener was
//! built with.
//!
//! The listener reads queue names, the spool endpoint, the polling cadence,
//! the job catalog location and the worker pool size from here. Nothing in
//! this crate touches the network or the filesystem beyond what the loader
//! does to find the configuration file.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod defaults;
mod logging;

pub use defaults::{
    DEFAULT_DEPLOY_TIMEOUT_SECS, DEFAULT_MAX_MESSAGES_PER_POLL, DEFAULT_POLLING_INTERVAL_SECS,
    DEFAULT_POOL_PROCESSES, default_deploy_command, default_endpoint, default_job_queue_name,
    default_jobs_config_path, default_log_filter, default_log_filter_string, default_log_format,
    default_response_queue_name,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "BANG")]
pub struct Config {
    /// `tracing` filter expression, for example `info,bang_listener=debug`.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format of the log stream.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Root directory of the spool transport holding one directory per queue.
    #[ortho_config(default = defaults::default_endpoint())]
    pub endpoint: Utf8PathBuf,
    /// Queue polled for job requests.
    #[ortho_config(default = defaults::default_job_queue_name())]
    pub job_queue_name: String,
    /// Queue receiving status responses.
    #[ortho_config(default = defaults::default_response_queue_name())]
    pub response_queue_name: String,
    /// YAML file mapping job names to their resource specs.
    #[ortho_config(default = defaults::default_jobs_config_path())]
    pub jobs_config_path: Utf8PathBuf,
    /// Seconds slept between polling cycles.
    #[ortho_config(default = DEFAULT_POLLING_INTERVAL_SECS)]
    pub polling_interval_secs: u64,
    /// Maximum number of messages requested per poll.
    #[ortho_config(default = DEFAULT_MAX_MESSAGES_PER_POLL)]
    pub max_messages_per_poll: usize,
    /// Size of the worker pool executing deployments.
    #[ortho_config(default = DEFAULT_POOL_PROCESSES)]
    pub pool_processes: usize,
    /// Executable launched once per job with the job's resource specs.
    #[ortho_config(default = defaults::default_deploy_command())]
    pub deploy_command: String,
    /// Seconds a deployment may run before it is killed.
    #[ortho_config(default = DEFAULT_DEPLOY_TIMEOUT_SECS)]
    pub deploy_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            endpoint: default_endpoint(),
            job_queue_name: default_job_queue_name(),
            response_queue_name: default_response_queue_name(),
            jobs_config_path: default_jobs_config_path(),
            polling_interval_secs: DEFAULT_POLLING_INTERVAL_SECS,
            max_messages_per_poll: DEFAULT_MAX_MESSAGES_PER_POLL,
            pool_processes: DEFAULT_POOL_PROCESSES,
            deploy_command: default_deploy_command(),
            deploy_timeout_secs: DEFAULT_DEPLOY_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Log filter expression handed to the subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Output format of the log stream.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Spool root directory.
    #[must_use]
    pub fn endpoint(&self) -> &Utf8Path {
        &self.endpoint
    }

    /// Inbound queue name.
    #[must_use]
    pub fn job_queue_name(&self) -> &str {
        &self.job_queue_name
    }

    /// Outbound queue name.
    #[must_use]
    pub fn response_queue_name(&self) -> &str {
        &self.response_queue_name
    }

    /// Job catalog location.
    #[must_use]
    pub fn jobs_config_path(&self) -> &Utf8Path {
        &self.jobs_config_path
    }

    /// Idle time between polling cycles.
    #[must_use]
    pub const fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    /// Upper bound passed to the queue on each poll.
    #[must_use]
    pub const fn max_messages_per_poll(&self) -> usize {
        self.max_messages_per_poll
    }

    /// Worker pool size.
    #[must_use]
    pub const fn pool_processes(&self) -> usize {
        self.pool_processes
    }

    /// Deployment executable.
    #[must_use]
    pub fn deploy_command(&self) -> &str {
        &self.deploy_command
    }

    /// Deployment time budget.
    #[must_use]
    pub const fn deploy_timeout(&self) -> Duration {
        Duration::from_secs(self.deploy_timeout_secs)
    }

    /// Rejects values the listener cannot start with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValidationError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.pool_processes == 0 {
            return Err(ConfigValidationError::ZeroPoolSize);
        }
        if self.max_messages_per_poll == 0 {
            return Err(ConfigValidationError::ZeroBatchSize);
        }
        for (field, value) in [
            ("job_queue_name", self.job_queue_name.as_str()),
            ("response_queue_name", self.response_queue_name.as_str()),
            ("deploy_command", self.deploy_command.as_str()),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::Blank { field });
            }
        }
        if self.job_queue_name == self.response_queue_name {
            return Err(ConfigValidationError::SharedQueue {
                name: self.job_queue_name.clone(),
            });
        }
        Ok(())
    }
}

/// Configuration values that parse but cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    /// The worker pool must hold at least one worker.
    #[error("pool_processes must be at least 1")]
    ZeroPoolSize,
    /// Each poll must request at least one message.
    #[error("max_messages_per_poll must be at least 1")]
    ZeroBatchSize,
    /// A required string setting is empty.
    #[error("{field} must not be empty")]
    Blank {
        /// Name of the offending setting.
        field: &'static str,
    },
    /// Requests and responses would share one queue.
    #[error("job and response queues must differ, both are '{name}'")]
    SharedQueue {
        /// The shared queue name.
        name: String,
    },
}
