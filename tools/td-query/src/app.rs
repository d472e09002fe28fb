//! Process-level flow: arguments, run, rendering and exit status

use std::ffi::OsString;
use std::io::Write;

use job_lifecycle::JobLifecycleController;
use tracing::debug;

use crate::args::{Cli, Invocation, ABOUT};
use crate::error::ArgumentError;
use crate::sink::ResultSink;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

/// Parse `args`, build a controller with `prepare`, run the query and print it.
///
/// `prepare` is only called once the arguments are valid, so a bad command
/// line never reaches the remote service. Returns the process exit status.
pub async fn run_cli<I, T, F, O, E>(args: I, prepare: F, out: &mut O, err: &mut E) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    F: FnOnce(&Invocation) -> anyhow::Result<JobLifecycleController>,
    O: Write,
    E: Write,
{
    let invocation = match Cli::parse_invocation(args) {
        Ok(invocation) => invocation,
        Err(e) => return report_argument_error(&e, out, err),
    };

    let controller = match prepare(&invocation) {
        Ok(controller) => controller,
        Err(e) => {
            report_failure(err, &format!("{:#}", e));
            return EXIT_FAILURE;
        }
    };

    execute(&invocation, &controller, out, err).await
}

/// Run a validated invocation and print its result
pub async fn execute<O: Write, E: Write>(
    invocation: &Invocation,
    controller: &JobLifecycleController,
    out: &mut O,
    err: &mut E,
) -> u8 {
    let result = match invocation.timeout {
        Some(deadline) => {
            controller.run_with_deadline(&invocation.query, invocation.format, deadline).await
        }
        None => controller.run(&invocation.query, invocation.format).await,
    };

    let rows = match result {
        Ok(rows) => rows,
        Err(e) => {
            report_failure(err, &e.to_string());
            return EXIT_FAILURE;
        }
    };

    match ResultSink::new(&mut *out).render(rows) {
        Ok(count) => {
            debug!(rows = count, "Printed query result");
            EXIT_SUCCESS
        }
        Err(e) => {
            report_failure(err, &format!("Failed to write result: {}", e));
            EXIT_FAILURE
        }
    }
}

fn report_argument_error<O: Write, E: Write>(error: &ArgumentError, out: &mut O, err: &mut E) -> u8 {
    if let ArgumentError::Usage(clap_error) = error {
        if error.is_informational() {
            let _ = write!(out, "{}", clap_error);
            return EXIT_SUCCESS;
        }
    }

    report_failure(err, &error.to_string());
    let _ = writeln!(out, "\n{}", ABOUT);
    let _ = write!(out, "{}", Cli::usage());
    EXIT_FAILURE
}

fn report_failure<E: Write>(err: &mut E, message: &str) {
    // Nothing sensible is left to do if stderr itself is gone
    let _ = writeln!(err, "FAILED: {}", message);
}
