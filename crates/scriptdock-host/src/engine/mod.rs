//! Script engine abstraction.
//!
//! The registry only needs a compile-only check and the executor only needs
//! "invoke this source with this namespace". Everything interpreter-specific
//! lives behind [`ScriptEngine`]; [`LuaEngine`] is the shipped implementation.

mod lua;

use std::path::Path;

pub use lua::LuaEngine;

use crate::bindings::HostBindings;

/// A compile or runtime failure reported by an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    /// First line of the error text.
    pub message: String,
    /// Full error text including the traceback.
    pub trace: String,
}

impl EngineFailure {
    /// Build a failure from the engine's full error text.
    #[must_use]
    pub fn from_trace(trace: impl Into<String>) -> Self {
        let trace = trace.into();
        let message = trace.lines().next().unwrap_or_default().trim().to_string();
        Self { message, trace }
    }
}

impl std::fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// One script invocation.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Absolute path of the script; its directory goes on the search path.
    pub script_path: &'a Path,
    /// Source text read by the caller.
    pub source: &'a str,
    /// Capability bindings for the namespace.
    pub bindings: &'a HostBindings,
    /// Redirect output into buffers for the duration of the run.
    pub capture_output: bool,
}

/// What an invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeOutcome {
    /// `Ok` if the chunk ran to completion.
    pub result: Result<(), EngineFailure>,
    /// Captured standard output (empty when not capturing).
    pub stdout: String,
    /// Captured standard error (empty when not capturing).
    pub stderr: String,
}

/// Interpreter-wide state that runs must leave untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedState {
    /// Module search path.
    pub search_path: String,
    /// Whether output is currently redirected into buffers.
    pub capturing: bool,
    /// Whether the host's output and exit hooks are the ones installed in
    /// the interpreter, not replacements left behind by a script.
    pub hooks_intact: bool,
}

/// An embedded interpreter.
///
/// Implementations serialise invocations internally and must restore any
/// interpreter-wide state they mutate before `invoke` returns, on every exit
/// path.
pub trait ScriptEngine: Send + Sync {
    /// Short engine name, e.g. `"Lua 5.4"`.
    fn name(&self) -> String;

    /// Compile `source` without running it.
    ///
    /// # Errors
    ///
    /// Returns the compiler's message if the source does not compile.
    fn validate(&self, chunk_name: &str, source: &str) -> Result<(), EngineFailure>;

    /// Run `source` as a main chunk in a fresh namespace.
    fn invoke(&self, invocation: Invocation<'_>) -> InvokeOutcome;

    /// Snapshot of the interpreter-wide state.
    fn shared_state(&self) -> SharedState;
}
