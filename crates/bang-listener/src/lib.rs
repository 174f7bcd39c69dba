//! Queue listener that turns job requests into deployments.
//!
//! The listener polls an inbound queue for YAML requests naming a job,
//! resolves the job against a catalog loaded at start-up, and runs it on a
//! worker pool through a deployment engine. Progress flows back on a
//! response queue as a `started` response, one `working` response per line
//! of engine output, and a final `success` or `failure`. Every inbound
//! message is acknowledged exactly once whatever its outcome.
//!
//! Start-up is handled by [`bootstrap_with`], which loads configuration,
//! installs structured telemetry, connects to the queues and builds the
//! [`Listener`]. Health hooks emit structured events at each stage so
//! operators can see why a listener refused to start.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bang_listener::{
//!     CommandEngineProvider, HealthReporter, StopFlag, StructuredHealthReporter,
//!     SystemConfigLoader, bootstrap_with,
//! };
//! use bang_listener::queue::SpoolConnector;
//!
//! let reporter: Arc<dyn HealthReporter> = Arc::new(StructuredHealthReporter::new());
//! let listener = bootstrap_with(
//!     &SystemConfigLoader,
//!     &reporter,
//!     &SpoolConnector,
//!     &CommandEngineProvider,
//! )
//! .expect("listener starts");
//! listener.run(&StopFlag::new());
//! ```

mod bootstrap;
pub mod dispatch;
mod health;
mod listener;
pub mod queue;
pub mod shutdown;
mod telemetry;

pub use bootstrap::{
    BootstrapError, CommandEngineProvider, ConfigLoader, EngineProvider, StaticConfigLoader,
    SystemConfigLoader, bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use listener::Listener;
pub use shutdown::{ShutdownError, SignalGuard, StopFlag, install_signal_handlers};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
