use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default log filter expression used by the listener.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Root directory of the spool transport when no endpoint is configured.
pub const DEFAULT_ENDPOINT: &str = "/var/spool/bang";

/// Name of the inbound request queue.
pub const DEFAULT_JOB_QUEUE_NAME: &str = "bang-queue";

/// Name of the outbound response queue.
pub const DEFAULT_RESPONSE_QUEUE_NAME: &str = "bang-response";

/// Location of the job catalog.
pub const DEFAULT_JOBS_CONFIG_PATH: &str = "/etc/bang/jobs.yml";

/// Seconds slept between polling cycles.
pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 2;

/// Upper bound on messages requested per poll.
pub const DEFAULT_MAX_MESSAGES_PER_POLL: usize = 1;

/// Number of worker threads in the execution pool.
pub const DEFAULT_POOL_PROCESSES: usize = 5;

/// Executable launched for each deployment.
pub const DEFAULT_DEPLOY_COMMAND: &str = "bang";

/// Wall-clock budget for a single deployment.
pub const DEFAULT_DEPLOY_TIMEOUT_SECS: u64 = 60 * 60;

/// Default log filter expression used by the listener.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the listener.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default spool root.
#[must_use]
pub fn default_endpoint() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_ENDPOINT)
}

/// Default inbound queue name.
#[must_use]
pub fn default_job_queue_name() -> String {
    DEFAULT_JOB_QUEUE_NAME.to_owned()
}

/// Default outbound queue name.
#[must_use]
pub fn default_response_queue_name() -> String {
    DEFAULT_RESPONSE_QUEUE_NAME.to_owned()
}

/// Default job catalog path.
#[must_use]
pub fn default_jobs_config_path() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_JOBS_CONFIG_PATH)
}

/// Default deployment executable.
#[must_use]
pub fn default_deploy_command() -> String {
    DEFAULT_DEPLOY_COMMAND.to_owned()
}
