//! Run command - execute one script and report the result.

use std::process::ExitCode;

use colored::Colorize;
use scriptdock_host::{ExecutionResult, RunOptions, ScriptHost};

use crate::theme::Theme;

/// Exit code when the user declined to run a flagged script.
const EXIT_ABORTED: u8 = 2;

/// Run `script` and print its output, warnings and errors.
pub(crate) fn run_script(
    host: &ScriptHost,
    script: &str,
    options: &RunOptions,
    verbose: bool,
) -> anyhow::Result<ExitCode> {
    let result = host.run(script, options)?;
    Ok(report(&result, verbose))
}

fn report(result: &ExecutionResult, verbose: bool) -> ExitCode {
    if result.aborted {
        eprintln!("{}", Theme::warning("Run cancelled"));
        return ExitCode::from(EXIT_ABORTED);
    }

    print!("{}", result.stdout);
    eprint!("{}", result.stderr);

    for warning in &result.warnings {
        eprintln!("{}", Theme::risk(warning));
    }

    match &result.error {
        None => {
            eprintln!("{}", Theme::success("Script executed successfully"));
            ExitCode::SUCCESS
        },
        Some(failure) => {
            eprintln!(
                "{}",
                Theme::error(&format!("{} error: {}", failure.kind, failure.message))
            );
            if verbose && failure.trace != failure.message {
                eprintln!("{}", failure.trace.dimmed());
            }
            ExitCode::FAILURE
        },
    }
}
