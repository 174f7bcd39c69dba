//! Log output for the listener process.
//!
//! Everything the listener logs goes to stderr through one global
//! subscriber. Failure responses tell operators to "see bang-listener logs",
//! so events carry the thread name: the polling thread, `bang-worker-<n>`
//! pool threads and the `bang-stdout`/`bang-stderr` readers of a deployment
//! command can all be told apart. JSON output flattens event fields such as
//! `job`, `request_id` and `state` to the top level for log shippers.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, info, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use bang_config::{Config, LogFormat};

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Proof that listener logging is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// `log_filter` is not a valid filter expression.
    #[error("invalid log filter '{expression}': {message}")]
    Filter {
        /// The configured expression.
        expression: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Something else installed a global subscriber before the listener.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs listener logging on first use.
///
/// Bootstrap calls this once per process. Later calls return a fresh
/// [`TelemetryHandle`] and keep the subscriber of the first call.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when `log_filter` does not parse and
/// [`TelemetryError::Subscriber`] when another subscriber got there first.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn listener_filter(config: &Config) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
        expression: config.log_filter().to_owned(),
        message: error.to_string(),
    })
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = listener_filter(config)?;

    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    info!(
        target: TELEMETRY_TARGET,
        log_filter = config.log_filter(),
        log_format = %config.log_format(),
        "listener logging installed"
    );
    Ok(())
}
