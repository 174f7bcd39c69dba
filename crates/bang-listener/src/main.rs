//! Entry point for the `bang-listener` binary.
//!
//! Bootstraps against the directory spool named by the configuration, then
//! polls until a termination signal arrives. Start-up faults are written to
//! stderr and end the process with a failure status.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use bang_listener::queue::SpoolConnector;
use bang_listener::{
    CommandEngineProvider, HealthReporter, StopFlag, StructuredHealthReporter, SystemConfigLoader,
    bootstrap_with, install_signal_handlers,
};

fn main() -> ExitCode {
    let reporter: Arc<dyn HealthReporter> = Arc::new(StructuredHealthReporter::new());
    let listener = match bootstrap_with(
        &SystemConfigLoader,
        &reporter,
        &SpoolConnector,
        &CommandEngineProvider,
    ) {
        Ok(listener) => listener,
        Err(error) => {
            let _ = writeln!(io::stderr(), "bang-listener: {error}");
            return ExitCode::FAILURE;
        }
    };

    let stop = StopFlag::new();
    let _signals = match install_signal_handlers(&stop) {
        Ok(guard) => guard,
        Err(error) => {
            let _ = writeln!(io::stderr(), "bang-listener: {error}");
            return ExitCode::FAILURE;
        }
    };

    listener.run(&stop);
    ExitCode::SUCCESS
}
