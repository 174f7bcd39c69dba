//! Crate-level integration and BDD tests.

use std::sync::{Arc, Mutex, PoisonError};

use crate::catalog::JobCatalog;
use crate::engine::{DeploymentEngine, ExecutionContext};
use crate::error::EngineFault;
use crate::job::Job;
use crate::pool::{PoolSettings, WorkerPool};


/// Engine double that records the jobs it sees.
#[derive(Default)]
pub(super) struct RecordingEngine {
    behaviour: EngineBehaviour,
    seen: Mutex<Vec<Job>>,
}

#[derive(Default, Clone)]
pub(super) enum EngineBehaviour {
    #[default]
    Succeed,
    Progress(Vec<String>),
    Fail(String),
    Panic,
}

impl RecordingEngine {
    pub(super) fn new(behaviour: EngineBehaviour) -> Self {
        Self {
            behaviour,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn seen(&self) -> Vec<Job> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DeploymentEngine for RecordingEngine {
    fn execute(&self, job: &Job, context: &ExecutionContext<'_>) -> Result<(), EngineFault> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(job.clone());
        match &self.behaviour {
            EngineBehaviour::Succeed => Ok(()),
            EngineBehaviour::Progress(lines) => {
                for line in lines {
                    context.progress().emit(line);
                }
                Ok(())
            }
            EngineBehaviour::Fail(message) => Err(message.clone().into()),
            EngineBehaviour::Panic => panic!("engine exploded"),
        }
    }
}

#[test]
fn end_to_end_resolution_and_execution() {
    let catalog =
        JobCatalog::from_yaml("deploy:\n  bang-stacks: [site.yml]\n").expect("catalog parses");
    let job = catalog
        .resolve("deploy", Some(vec![String::from("fast")]))
        .expect("job resolves");
    let engine = Arc::new(RecordingEngine::default());
    let pool = WorkerPool::new(PoolSettings::new(1).allow_child_processes()).expect("pool");

    let worker_engine = Arc::clone(&engine);
    let outcome = pool
        .submit(move |worker| {
            let progress = |_: &str| {};
            let context = ExecutionContext::new("req-1", &progress, worker.child_processes());
            worker_engine.execute(&job, &context)
        })
        .expect("submit")
        .wait()
        .expect("worker reports");

    assert!(outcome.is_ok());
    let seen = engine.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen.first().map(Job::name), Some("deploy"));
}
