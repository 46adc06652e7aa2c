mod bootstrap;
mod loop_runner;
mod script;

use std::process::ExitCode;

use tracing::error;

pub(crate) fn run() -> ExitCode {
    match bootstrap::build_app() {
        Ok(Some(app)) => loop_runner::run(app),
        Ok(None) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
