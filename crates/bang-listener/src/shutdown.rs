//! Cooperative shutdown.
//!
//! The polling loop checks a [`StopFlag`] between cycles. Termination
//! signals raise the flag; a job already running is allowed to finish.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::info;

const SHUTDOWN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::shutdown");
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Signals that stop the listener.
pub const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Shared flag asking the polling loop to stop.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Creates a lowered flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every holder of the flag to stop.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once the flag has been raised.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` or until the flag is raised.
    ///
    /// Returns `true` when the sleep ended because of the flag. A duration
    /// too large to add to the current instant only ends when the flag is
    /// raised.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_raised() {
                return true;
            }
            let remaining = deadline.map_or(SLEEP_SLICE, |deadline| {
                deadline.saturating_duration_since(Instant::now())
            });
            if remaining.is_zero() {
                return false;
            }
            thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }
}

/// Errors reported while installing signal handlers.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Keeps the signal handlers installed; dropping it removes them.
#[derive(Debug)]
pub struct SignalGuard {
    handle: Handle,
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
    }
}

/// Raises `stop` when the process receives a termination signal.
///
/// # Errors
///
/// Returns [`ShutdownError::Install`] when the handlers or their watcher
/// thread cannot be set up.
pub fn install_signal_handlers(stop: &StopFlag) -> Result<SignalGuard, ShutdownError> {
    let mut signals =
        Signals::new(TERMINATION_SIGNALS).map_err(|source| ShutdownError::Install { source })?;
    let handle = signals.handle();
    let flag = stop.clone();
    thread::Builder::new()
        .name(String::from("bang-signals"))
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(
                    target: SHUTDOWN_TARGET,
                    signal,
                    "shutdown signal received, finishing current cycle"
                );
                flag.raise();
            }
        })
        .map_err(|source| ShutdownError::Install { source })?;
    Ok(SignalGuard { handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let flag = StopFlag::new();
        let other = flag.clone();
        assert!(!other.is_raised());
        flag.raise();
        assert!(other.is_raised());
    }

    #[test]
    fn sleep_runs_to_completion_when_lowered() {
        let flag = StopFlag::new();
        assert!(!flag.sleep(Duration::from_millis(10)));
    }

    #[test]
    fn sleep_returns_early_once_raised() {
        let flag = StopFlag::new();
        let raiser = flag.clone();
        let started = Instant::now();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            raiser.raise();
        });
        assert!(flag.sleep(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        worker.join().expect("raiser thread");
    }

    #[test]
    fn unbounded_sleep_ends_on_a_raised_flag() {
        let flag = StopFlag::new();
        flag.raise();
        assert!(flag.sleep(Duration::from_secs(u64::MAX)));

        let lowered = StopFlag::new();
        let raiser = lowered.clone();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            raiser.raise();
        });
        assert!(lowered.sleep(Duration::MAX));
        worker.join().expect("raiser thread");
    }

    #[test]
    fn termination_signal_raises_the_flag() {
        let flag = StopFlag::new();
        let _guard = install_signal_handlers(&flag).expect("handlers install");
        signal_hook::low_level::raise(SIGHUP).expect("raise SIGHUP");
        assert!(flag.sleep(Duration::from_secs(5)));
    }
}
