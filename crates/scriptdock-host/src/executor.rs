//! Runs one script and reports what happened.
//!
//! The executor never returns an error: every outcome (success, abort,
//! unreadable file, runtime fault) is an [`ExecutionResult`].

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::bindings::HostBindings;
use crate::engine::{Invocation, ScriptEngine};
use crate::risk::RiskScanner;

/// Asks the user whether to run a script that tripped the risk scan.
pub trait ConfirmPrompt: Send + Sync {
    /// Return `true` to run the script anyway.
    fn confirm(&self, script: &Path, warnings: &[String]) -> bool;
}

/// Confirms everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl ConfirmPrompt for AlwaysConfirm {
    fn confirm(&self, _script: &Path, _warnings: &[String]) -> bool {
        true
    }
}

/// Declines everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysDecline;

impl ConfirmPrompt for AlwaysDecline {
    fn confirm(&self, _script: &Path, _warnings: &[String]) -> bool {
        false
    }
}

/// Whether the confirmation collaborator is consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Ask before running a script with warnings.
    #[default]
    Interactive,
    /// Never ask; warnings are still reported.
    Batch,
}

/// Per-run options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Redirect output into the result's buffers.
    pub capture_output: bool,
    /// Confirmation behaviour.
    pub mode: RunMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            capture_output: true,
            mode: RunMode::Interactive,
        }
    }
}

/// Where a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The script could not be read; it never started.
    Discovery,
    /// The script failed to compile or raised while running.
    Execution,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovery => f.write_str("discovery"),
            Self::Execution => f.write_str("execution"),
        }
    }
}

/// A structured script failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFailure {
    /// Failure category.
    pub kind: ErrorKind,
    /// One-line summary.
    pub message: String,
    /// Full diagnostic text.
    pub trace: String,
}

/// Outcome of one run.
///
/// `error` is present exactly when the run neither succeeded nor was
/// aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// The script ran to completion.
    pub succeeded: bool,
    /// The user declined to run a flagged script.
    pub aborted: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Risk scan warnings, in pattern order.
    pub warnings: Vec<String>,
    /// Failure details.
    pub error: Option<ScriptFailure>,
}

impl ExecutionResult {
    fn aborted(warnings: Vec<String>) -> Self {
        Self {
            succeeded: false,
            aborted: true,
            stdout: String::new(),
            stderr: String::new(),
            warnings,
            error: None,
        }
    }

    fn failed(failure: ScriptFailure, warnings: Vec<String>) -> Self {
        Self {
            succeeded: false,
            aborted: false,
            stdout: String::new(),
            stderr: String::new(),
            warnings,
            error: Some(failure),
        }
    }
}

/// Executes scripts through a [`ScriptEngine`].
pub struct Executor {
    engine: Arc<dyn ScriptEngine>,
    scanner: RiskScanner,
    bindings: HostBindings,
    confirm: Box<dyn ConfirmPrompt>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("engine", &self.engine.name())
            .field("scanner", &self.scanner)
            .field("bindings", &self.bindings.len())
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Create an executor.
    #[must_use]
    pub fn new(
        engine: Arc<dyn ScriptEngine>,
        scanner: RiskScanner,
        bindings: HostBindings,
        confirm: Box<dyn ConfirmPrompt>,
    ) -> Self {
        Self {
            engine,
            scanner,
            bindings,
            confirm,
        }
    }

    /// The bindings injected into every run.
    #[must_use]
    pub fn bindings(&self) -> &HostBindings {
        &self.bindings
    }

    /// The engine runs go through.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn ScriptEngine> {
        &self.engine
    }

    /// Run the script at `script_path`.
    ///
    /// The file is read fresh, so the run always sees the current contents
    /// even if the registry has not been rescanned yet.
    #[must_use]
    pub fn run(&self, script_path: &Path, options: &RunOptions) -> ExecutionResult {
        let source = match std::fs::read_to_string(script_path) {
            Ok(source) => source,
            Err(e) => {
                let message = format!("cannot read {}: {e}", script_path.display());
                error!(script = %script_path.display(), error = %e, "Script could not be read");
                return ExecutionResult::failed(
                    ScriptFailure {
                        kind: ErrorKind::Discovery,
                        trace: message.clone(),
                        message,
                    },
                    Vec::new(),
                );
            },
        };

        let warnings = self.scanner.scan(&source);
        if !warnings.is_empty() {
            warn!(
                script = %script_path.display(),
                warnings = ?warnings,
                "Script uses risky constructs"
            );
            if options.mode == RunMode::Interactive
                && !self.confirm.confirm(script_path, &warnings)
            {
                info!(script = %script_path.display(), "Run declined");
                return ExecutionResult::aborted(warnings);
            }
        }

        let outcome = self.engine.invoke(Invocation {
            script_path,
            source: &source,
            bindings: &self.bindings,
            capture_output: options.capture_output,
        });

        match outcome.result {
            Ok(()) => {
                info!(script = %script_path.display(), "Script executed successfully");
                ExecutionResult {
                    succeeded: true,
                    aborted: false,
                    stdout: outcome.stdout,
                    stderr: outcome.stderr,
                    warnings,
                    error: None,
                }
            },
            Err(failure) => {
                error!(
                    script = %script_path.display(),
                    error = %failure.message,
                    trace = %failure.trace,
                    "Script execution failed"
                );
                ExecutionResult {
                    stdout: outcome.stdout,
                    stderr: outcome.stderr,
                    ..ExecutionResult::failed(
                        ScriptFailure {
                            kind: ErrorKind::Execution,
                            message: failure.message,
                            trace: failure.trace,
                        },
                        warnings,
                    )
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    use super::*;
    use crate::engine::LuaEngine;

    struct CountingPrompt {
        answer: bool,
        calls: Arc<AtomicUsize>,
    }

    impl ConfirmPrompt for CountingPrompt {
        fn confirm(&self, _script: &Path, warnings: &[String]) -> bool {
            assert!(!warnings.is_empty());
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    fn executor(confirm: Box<dyn ConfirmPrompt>) -> Executor {
        Executor::new(
            Arc::new(LuaEngine::new().unwrap()),
            RiskScanner::default(),
            HostBindings::new("1.0"),
            confirm,
        )
    }

    fn write(dir: &TempDir, name: &str, source: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, source).unwrap();
        path
    }

    #[test]
    fn test_successful_run() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "ok.lua", "print('hi')");
        let result = executor(Box::new(AlwaysConfirm)).run(&path, &RunOptions::default());

        assert!(result.succeeded);
        assert!(!result.aborted);
        assert_eq!(result.stdout, "hi\n");
        assert!(result.warnings.is_empty());
        assert!(result.error.is_none());
    }

    #[test]
    fn test_runtime_fault_is_execution_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "fault.lua", "print('partial')\nlocal n = 0\nreturn 10 // n\n");
        let result = executor(Box::new(AlwaysConfirm)).run(&path, &RunOptions::default());

        assert!(!result.succeeded);
        assert!(!result.aborted);
        assert_eq!(result.stdout, "partial\n");
        let failure = result.error.unwrap();
        assert_eq!(failure.kind, ErrorKind::Execution);
        assert!(!failure.message.contains('\n'));
        assert!(failure.trace.contains(&failure.message));
    }

    #[test]
    fn test_compile_error_at_run_time_is_execution_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.lua", "local = 1");
        let result = executor(Box::new(AlwaysConfirm)).run(&path, &RunOptions::default());
        assert_eq!(result.error.unwrap().kind, ErrorKind::Execution);
    }

    #[test]
    fn test_missing_file_is_discovery_error() {
        let dir = TempDir::new().unwrap();
        let result = executor(Box::new(AlwaysConfirm))
            .run(&dir.path().join("gone.lua"), &RunOptions::default());

        assert!(!result.succeeded);
        assert!(!result.aborted);
        assert_eq!(result.error.unwrap().kind, ErrorKind::Discovery);
    }

    #[test]
    fn test_declined_run_is_aborted() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "risky.lua", "print('ran')\nos.execute('true')\n");
        let result = executor(Box::new(AlwaysDecline)).run(&path, &RunOptions::default());

        assert!(!result.succeeded);
        assert!(result.aborted);
        assert!(result.error.is_none());
        assert!(result.stdout.is_empty());
        assert_eq!(result.warnings, vec!["os.execute: runs a shell command"]);
    }

    #[test]
    fn test_prompt_only_called_for_flagged_interactive_runs() {
        let dir = TempDir::new().unwrap();
        let clean = write(&dir, "clean.lua", "local x = 1");
        let risky = write(&dir, "risky.lua", "local f = dofile\n");

        let calls = Arc::new(AtomicUsize::new(0));
        let exec = executor(Box::new(CountingPrompt {
            answer: true,
            calls: Arc::clone(&calls),
        }));

        assert!(exec.run(&clean, &RunOptions::default()).succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let result = exec.run(&risky, &RunOptions::default());
        assert!(result.succeeded);
        assert_eq!(result.warnings, vec!["dofile: executes another file"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let batch = RunOptions {
            capture_output: true,
            mode: RunMode::Batch,
        };
        assert!(exec.run(&risky, &batch).succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_batch_mode_ignores_decline() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "risky.lua", "local f = loadfile\nprint('ran')\n");
        let result = executor(Box::new(AlwaysDecline)).run(
            &path,
            &RunOptions {
                capture_output: true,
                mode: RunMode::Batch,
            },
        );
        assert!(result.succeeded);
        assert_eq!(result.stdout, "ran\n");
        assert_eq!(result.warnings.len(), 1);
    }
}
