//! Listener bootstrap orchestration.
//!
//! Start-up runs in a fixed order: load configuration, validate it, install
//! telemetry, connect to the queues, then let [`Listener::bootstrap`] load
//! the job catalog and start the worker pool. The first failure aborts the
//! sequence with a [`BootstrapError`]; no response is ever published for a
//! start-up fault.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use bang_config::{Config, ConfigValidationError};
use bang_jobs::{CatalogLoadError, CommandEngine, DeploymentEngine, PoolError};

use crate::health::HealthReporter;
use crate::listener::Listener;
use crate::queue::{QueueConnector, QueueError};
use crate::telemetry::{self, TelemetryError};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the listener configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when no configuration can be assembled.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Creates a loader that always yields `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Chooses the deployment engine for a configuration.
pub trait EngineProvider {
    /// Builds the engine jobs will run on.
    fn engine(&self, config: &Config) -> Arc<dyn DeploymentEngine>;
}

/// Provider of the process-backed [`CommandEngine`].
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandEngineProvider;

impl EngineProvider for CommandEngineProvider {
    fn engine(&self, config: &Config) -> Arc<dyn DeploymentEngine> {
        Arc::new(CommandEngine::new(
            config.deploy_command(),
            config.deploy_timeout(),
        ))
    }
}

impl EngineProvider for Arc<dyn DeploymentEngine> {
    fn engine(&self, _config: &Config) -> Arc<dyn DeploymentEngine> {
        Arc::clone(self)
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but holds unusable values.
    #[error("invalid configuration: {source}")]
    InvalidConfiguration {
        /// The offending value.
        #[source]
        source: ConfigValidationError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// A required queue is unavailable.
    #[error("failed to connect to queues: {source}")]
    Queue {
        /// Underlying transport error.
        #[source]
        source: QueueError,
    },
    /// The job catalog could not be loaded.
    #[error("failed to load job catalog: {source}")]
    Catalog {
        /// Underlying catalog error.
        #[source]
        source: CatalogLoadError,
    },
    /// The worker pool could not be started.
    #[error("failed to start worker pool: {source}")]
    Pool {
        /// Underlying pool error.
        #[source]
        source: PoolError,
    },
}

/// Bootstraps the listener using the supplied collaborators.
///
/// # Errors
///
/// Returns the first [`BootstrapError`] encountered; `reporter` has been told
/// about it before this returns.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: &Arc<dyn HealthReporter>,
    connector: &dyn QueueConnector,
    engines: &dyn EngineProvider,
) -> Result<Listener, BootstrapError> {
    reporter.bootstrap_starting();
    match assemble(loader, Arc::clone(reporter), connector, engines) {
        Ok(listener) => {
            reporter.bootstrap_succeeded(listener.config());
            Ok(listener)
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn assemble(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    connector: &dyn QueueConnector,
    engines: &dyn EngineProvider,
) -> Result<Listener, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    config
        .validate()
        .map_err(|source| BootstrapError::InvalidConfiguration { source })?;
    telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    let queues = connector
        .connect(&config)
        .map_err(|source| BootstrapError::Queue { source })?;
    let engine = engines.engine(&config);
    Listener::bootstrap(config, queues, engine, reporter)
}
