//! Test doubles and fixtures shared by the listener suites.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::sync::{Arc, Mutex, PoisonError};

use camino::Utf8PathBuf;
use mockall::mock;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use bang_config::Config;
use bang_jobs::{ChildProcessPolicy, DeploymentEngine, EngineFault, ExecutionContext, Job};

use crate::bootstrap::{BootstrapError, ConfigLoader, StaticConfigLoader, bootstrap_with};
use crate::dispatch::{Response, ResponseState};
use crate::health::HealthReporter;
use crate::listener::Listener;
use crate::queue::{
    InboundMessage, MemoryQueue, QueueConnector, QueueError, QueuePair, QueueSource,
    ResponseChannel, SpoolConnector,
};

/// Catalog used by most scenarios.
pub const CATALOG: &str = concat!(
    "jobA:\n",
    "  bang-stacks:\n",
    "    - s1\n",
    "    - s2\n",
    "test_job_1:\n",
    "  bang-stacks:\n",
    "    - /etc/bang/stacks/first.yml\n",
);

mock! {
    pub Responses {}
    impl ResponseChannel for Responses {
        fn send(&self, body: &str) -> Result<(), QueueError>;
    }
}

mock! {
    pub Source {}
    impl QueueSource for Source {
        fn receive(&self, max: usize) -> Result<Vec<InboundMessage>, QueueError>;
        fn delete(&self, message: &InboundMessage) -> Result<(), QueueError>;
    }
}

/// What a [`ScriptedEngine`] does when asked to run a job.
#[derive(Debug, Clone, Default)]
pub enum Script {
    #[default]
    Succeed,
    Progress(Vec<String>),
    Fail(String),
    Panic,
}

/// Deployment engine double that records every call.
#[derive(Default)]
pub struct ScriptedEngine {
    script: Script,
    calls: Mutex<Vec<(Job, ChildProcessPolicy)>>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Job, ChildProcessPolicy)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DeploymentEngine for ScriptedEngine {
    fn execute(&self, job: &Job, context: &ExecutionContext<'_>) -> Result<(), EngineFault> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((job.clone(), context.child_processes()));
        match &self.script {
            Script::Succeed => Ok(()),
            Script::Progress(lines) => {
                for line in lines {
                    context.progress().emit(line);
                }
                Ok(())
            }
            Script::Fail(message) => Err(message.clone().into()),
            Script::Panic => panic!("engine exploded"),
        }
    }
}

/// Structured health events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    PollingStarted(String),
    PollingStopped(String),
    MessageProcessed(ResponseState),
}

/// Records health events for assertions.
#[derive(Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn polling_started(&self, queue: &str) {
        self.record(HealthEvent::PollingStarted(queue.to_owned()));
    }

    fn polling_stopped(&self, queue: &str) {
        self.record(HealthEvent::PollingStopped(queue.to_owned()));
    }

    fn message_processed(&self, response: &Response) {
        self.record(HealthEvent::MessageProcessed(response.state()));
    }
}

/// Connector handing out in-memory queues.
#[derive(Clone)]
pub struct MemoryConnector {
    pub requests: MemoryQueue,
    pub responses: MemoryQueue,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self {
            requests: MemoryQueue::new("bang-queue"),
            responses: MemoryQueue::new("bang-response"),
        }
    }
}

impl MemoryConnector {
    pub fn pair(&self) -> QueuePair {
        QueuePair::new(
            Box::new(self.requests.clone()),
            Arc::new(self.responses.clone()),
        )
    }
}

impl QueueConnector for MemoryConnector {
    fn connect(&self, _config: &Config) -> Result<QueuePair, QueueError> {
        Ok(self.pair())
    }
}

/// Loader that fails by passing an unparsable CLI value.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("bang-listener"),
            OsString::from("--polling-interval-secs"),
            OsString::from("soon"),
        ];
        Config::load_from_iter(args)
    }
}

/// A temporary directory holding a job catalog.
pub struct CatalogDir {
    _dir: TempDir,
    pub path: Utf8PathBuf,
}

impl CatalogDir {
    pub fn with_contents(contents: &str) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("jobs.yml")).expect("utf-8 path");
        fs::write(&path, contents).expect("write catalog");
        Self { _dir: dir, path }
    }

    pub fn config(&self) -> Config {
        Config {
            jobs_config_path: self.path.clone(),
            polling_interval_secs: 1,
            pool_processes: 2,
            ..Config::default()
        }
    }
}

/// A listener wired to in-memory queues.
pub struct Harness {
    _catalog: CatalogDir,
    pub queues: MemoryConnector,
    pub engine: Arc<ScriptedEngine>,
    pub reporter: Arc<RecordingHealthReporter>,
    pub listener: Listener,
}

impl Harness {
    pub fn new(catalog: &str, script: Script) -> Self {
        let catalog = CatalogDir::with_contents(catalog);
        Self::with_config(catalog, script, |config| config)
    }

    pub fn with_config(
        catalog: CatalogDir,
        script: Script,
        adjust: impl FnOnce(Config) -> Config,
    ) -> Self {
        let queues = MemoryConnector::default();
        let engine = Arc::new(ScriptedEngine::new(script));
        let reporter = Arc::new(RecordingHealthReporter::default());
        let listener = Listener::bootstrap(
            adjust(catalog.config()),
            queues.pair(),
            engine.clone(),
            reporter.clone(),
        )
        .expect("listener bootstraps");
        Self {
            _catalog: catalog,
            queues,
            engine,
            reporter,
            listener,
        }
    }

    /// Responses published so far, parsed back from the wire.
    pub fn responses(&self) -> Vec<Response> {
        parse_all(&self.queues.responses.sent())
    }
}

pub fn parse_all(bodies: &[String]) -> Vec<Response> {
    bodies
        .iter()
        .map(|body| Response::parse(body).expect("response parses"))
        .collect()
}

pub fn states(responses: &[Response]) -> Vec<ResponseState> {
    responses.iter().map(Response::state).collect()
}

pub fn request_body(job: &str, request_id: &str, parameters: Option<&[&str]>) -> String {
    let mut body = format!("---\n{job}:\n  request_id: {request_id}\n");
    if let Some(parameters) = parameters {
        body.push_str("  parameters:\n");
        for parameter in parameters {
            body.push_str(&format!("    - {parameter}\n"));
        }
    }
    body
}

/// Which loader a bootstrap scenario uses.
enum LoaderChoice {
    Static,
    Invalid,
    Failing,
}

/// Bootstrap world backed by a spool directory.
pub struct TestWorld {
    root: TempDir,
    loader: LoaderChoice,
    reporter: Arc<RecordingHealthReporter>,
    listener: Option<Listener>,
    error: Option<BootstrapError>,
}

pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}

impl TestWorld {
    fn new() -> Self {
        Self {
            root: TempDir::new().expect("temp dir"),
            loader: LoaderChoice::Static,
            reporter: Arc::new(RecordingHealthReporter::default()),
            listener: None,
            error: None,
        }
    }

    fn root(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.root.path().to_path_buf()).expect("utf-8 path")
    }

    fn config(&self) -> Config {
        Config {
            endpoint: self.root(),
            jobs_config_path: self.root().join("jobs.yml"),
            pool_processes: 1,
            ..Config::default()
        }
    }

    pub fn write_catalog(&self) {
        fs::write(self.root().join("jobs.yml"), CATALOG).expect("write catalog");
    }

    pub fn create_queue(&self, name: &str) {
        fs::create_dir_all(self.root().join(name)).expect("create queue directory");
    }

    pub fn use_invalid_config(&mut self) {
        self.loader = LoaderChoice::Invalid;
    }

    pub fn use_failing_loader(&mut self) {
        self.loader = LoaderChoice::Failing;
    }

    pub fn bootstrap(&mut self) {
        let reporter: Arc<dyn HealthReporter> = self.reporter.clone();
        let engine: Arc<dyn DeploymentEngine> = Arc::new(ScriptedEngine::default());
        let result = match self.loader {
            LoaderChoice::Static => bootstrap_with(
                &StaticConfigLoader::new(self.config()),
                &reporter,
                &SpoolConnector,
                &engine,
            ),
            LoaderChoice::Invalid => bootstrap_with(
                &StaticConfigLoader::new(Config {
                    pool_processes: 0,
                    ..self.config()
                }),
                &reporter,
                &SpoolConnector,
                &engine,
            ),
            LoaderChoice::Failing => {
                bootstrap_with(&FailingConfigLoader, &reporter, &SpoolConnector, &engine)
            }
        };
        match result {
            Ok(listener) => self.listener = Some(listener),
            Err(error) => self.error = Some(error),
        }
    }

    pub fn listener(&self) -> Option<&Listener> {
        self.listener.as_ref()
    }

    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.error.as_ref()
    }

    pub fn events(&self) -> Vec<HealthEvent> {
        self.reporter.events()
    }

    /// Files published to the response queue directory, if it exists.
    pub fn published_responses(&self) -> usize {
        fs::read_dir(self.root().join("bang-response"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}
