//! Process-based deployment execution.
//!
//! [`CommandEngine`] implements [`DeploymentEngine`] by launching the
//! deployment tool once per job with the job's resource specs as arguments.
//! Each line the tool writes to stdout becomes a progress line; stderr is
//! drained into the log. The tool learns about the request through
//! environment variables:
//!
//! | Variable | Value |
//! | --- | --- |
//! | `BANG_JOB_NAME` | catalog name of the job |
//! | `BANG_REQUEST_ID` | identifier of the triggering request |
//! | `BANG_JOB_PARAMETERS` | request parameters, one per line (unset when absent) |

use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::{DeploymentEngine, ExecutionContext, ProgressSink};
use crate::error::EngineFault;
use crate::job::Job;

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Environment variable carrying the job name.
pub const JOB_NAME_VAR: &str = "BANG_JOB_NAME";
/// Environment variable carrying the request identifier.
pub const REQUEST_ID_VAR: &str = "BANG_REQUEST_ID";
/// Environment variable carrying newline-separated request parameters.
pub const PARAMETERS_VAR: &str = "BANG_JOB_PARAMETERS";

/// Errors raised while running the deployment command.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The worker is not permitted to start processes.
    #[error("deployment command '{program}' cannot run: child processes are forbidden")]
    ChildProcessesForbidden {
        /// Command that would have been launched.
        program: String,
    },

    /// The command could not be started.
    #[error("failed to start deployment command '{program}': {source}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Communication with the running command failed.
    #[error("I/O error while running deployment command '{program}': {source}")]
    Io {
        /// Running command.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The command outlived its time budget and was killed.
    #[error("deployment command '{program}' timed out after {timeout_secs}s")]
    Timeout {
        /// Killed command.
        program: String,
        /// Configured budget in seconds.
        timeout_secs: u64,
    },

    /// The command exited unsuccessfully.
    #[error("deployment command '{program}' exited with non-zero status {status}")]
    NonZeroExit {
        /// Failed command.
        program: String,
        /// Exit status, or `-1` when terminated by a signal.
        status: i32,
    },
}

/// Runs deployments as child processes.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use bang_jobs::process::CommandEngine;
///
/// let engine = CommandEngine::new("bang", Duration::from_secs(3600));
/// assert_eq!(engine.program(), "bang");
/// ```
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<OsString>,
    timeout: Duration,
}

impl CommandEngine {
    /// Creates an engine launching `program` with a per-job time budget.
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    /// Adds fixed arguments placed before the resource specs.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Executable launched per job.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Per-job time budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `job` and waits for the command to exit.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the command cannot start, times out or
    /// exits unsuccessfully.
    pub fn run(&self, job: &Job, context: &ExecutionContext<'_>) -> Result<(), EngineError> {
        if !context.child_processes().is_allowed() {
            return Err(EngineError::ChildProcessesForbidden {
                program: self.program.clone(),
            });
        }

        let mut command = self.build_command(job, context);
        debug!(
            target: PROCESS_TARGET,
            program = %self.program,
            job = job.name(),
            request_id = context.request_id(),
            specs = job.resource_specs().len(),
            "spawning deployment command"
        );
        let mut child = command.spawn().map_err(|source| EngineError::Spawn {
            program: self.program.clone(),
            source: Arc::new(source),
        })?;

        if let Some(stderr) = child.stderr.take() {
            self.drain_stderr(stderr);
        }
        let deadline = Instant::now().checked_add(self.timeout);
        let lines = match child.stdout.take() {
            Some(stdout) => match self.spawn_line_reader(stdout) {
                Ok(lines) => Some(lines),
                Err(error) => {
                    terminate(&mut child);
                    return Err(error);
                }
            },
            None => None,
        };
        let outcome = self.supervise(&mut child, lines.as_ref(), deadline, context.progress());
        if outcome.is_err() {
            terminate(&mut child);
        }
        outcome
    }

    fn build_command(&self, job: &Job, context: &ExecutionContext<'_>) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .args(job.resource_specs())
            .env(JOB_NAME_VAR, job.name())
            .env(REQUEST_ID_VAR, context.request_id())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        match job.parameters() {
            Some(parameters) => command.env(PARAMETERS_VAR, parameters.join("\n")),
            None => command.env_remove(PARAMETERS_VAR),
        };
        command
    }

    fn io_error(&self, source: io::Error) -> EngineError {
        EngineError::Io {
            program: self.program.clone(),
            source: Arc::new(source),
        }
    }

    fn timed_out(&self) -> EngineError {
        EngineError::Timeout {
            program: self.program.clone(),
            timeout_secs: self.timeout.as_secs(),
        }
    }

    /// Reads stdout on a helper thread so the deadline can be enforced while
    /// the command is silent.
    fn spawn_line_reader(
        &self,
        stdout: impl Read + Send + 'static,
    ) -> Result<Receiver<io::Result<String>>, EngineError> {
        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name(String::from("bang-stdout"))
            .spawn(move || {
                let mut reader = BufReader::new(stdout);
                let mut buffer = Vec::new();
                loop {
                    buffer.clear();
                    let line = match reader.read_until(b'\n', &mut buffer) {
                        Ok(0) => break,
                        Ok(_) => Ok(String::from_utf8_lossy(&buffer).trim_end().to_owned()),
                        Err(error) => Err(error),
                    };
                    let failed = line.is_err();
                    if sender.send(line).is_err() || failed {
                        break;
                    }
                }
            })
            .map_err(|source| self.io_error(source))?;
        Ok(receiver)
    }

    /// Forwards progress until the command exits or the deadline passes.
    ///
    /// Completion is decided by the exit status, not by stdout closing: a
    /// background process started by the command may hold the pipe open long
    /// after the command itself has finished. `None` as the deadline means the
    /// budget is too large to represent and never expires.
    fn supervise(
        &self,
        child: &mut Child,
        mut lines: Option<&Receiver<io::Result<String>>>,
        deadline: Option<Instant>,
        progress: &dyn ProgressSink,
    ) -> Result<(), EngineError> {
        loop {
            match lines {
                Some(receiver) => match receiver.recv_timeout(EXIT_POLL_INTERVAL) {
                    Ok(line) => self.forward(line, progress)?,
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => lines = None,
                },
                None => thread::sleep(EXIT_POLL_INTERVAL),
            }

            if let Some(status) = child.try_wait().map_err(|source| self.io_error(source))? {
                if let Some(receiver) = lines {
                    self.flush_buffered(receiver, progress)?;
                }
                debug!(
                    target: PROCESS_TARGET,
                    program = %self.program,
                    ?status,
                    "deployment command exited"
                );
                if status.success() {
                    return Ok(());
                }
                return Err(EngineError::NonZeroExit {
                    program: self.program.clone(),
                    status: status.code().unwrap_or(-1),
                });
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!(
                    target: PROCESS_TARGET,
                    program = %self.program,
                    timeout_secs = self.timeout.as_secs(),
                    "deployment timed out, killing process"
                );
                return Err(self.timed_out());
            }
        }
    }

    /// Emits lines the command wrote before exiting.
    ///
    /// Stops at end of stream or after one quiet poll interval, whichever
    /// comes first.
    fn flush_buffered(
        &self,
        lines: &Receiver<io::Result<String>>,
        progress: &dyn ProgressSink,
    ) -> Result<(), EngineError> {
        while let Ok(line) = lines.recv_timeout(EXIT_POLL_INTERVAL) {
            self.forward(line, progress)?;
        }
        Ok(())
    }

    fn forward(
        &self,
        line: io::Result<String>,
        progress: &dyn ProgressSink,
    ) -> Result<(), EngineError> {
        let line = line.map_err(|source| self.io_error(source))?;
        if !line.trim().is_empty() {
            progress.emit(&line);
        }
        Ok(())
    }

    /// Logs stderr without blocking the command on a full pipe buffer.
    fn drain_stderr(&self, stderr: impl Read + Send + 'static) {
        let program = self.program.clone();
        let spawned = thread::Builder::new()
            .name(String::from("bang-stderr"))
            .spawn(move || {
                let reader = BufReader::new(stderr);
                for line in reader.split(b'\n').map_while(Result::ok) {
                    let text = String::from_utf8_lossy(&line);
                    if !text.trim().is_empty() {
                        debug!(
                            target: PROCESS_TARGET,
                            program = %program,
                            stderr = %text.trim_end(),
                            "deployment stderr output"
                        );
                    }
                }
            });
        if let Err(error) = spawned {
            warn!(
                target: PROCESS_TARGET,
                program = %self.program,
                %error,
                "failed to start stderr drain"
            );
        }
    }

}

impl DeploymentEngine for CommandEngine {
    fn execute(&self, job: &Job, context: &ExecutionContext<'_>) -> Result<(), EngineFault> {
        self.run(job, context).map_err(Into::into)
    }
}

fn terminate(child: &mut Child) {
    drop(child.kill());
    drop(child.wait());
}
