//! Hot-reloading host for user-authored Lua scripts.
//!
//! The crate watches one directory, keeps a registry of the scripts found
//! there with metadata pulled from their source, and runs a selected script
//! on demand with its output captured and its failures reported as data.
//!
//! - [`MetadataExtractor`]: display name and description of a script
//! - [`RiskScanner`]: advisory substring scan for risky constructs
//! - [`ScriptRegistry`]: filename → [`ScriptEntry`], replaced wholesale on rescan
//! - [`ScriptEngine`] / [`LuaEngine`]: compile check and namespaced invocation
//! - [`Executor`]: one run, producing an [`ExecutionResult`]
//! - [`ChangeWatcher`]: directory and per-file change notification
//! - [`ReloadDebouncer`]: trailing-edge coalescing of change bursts
//! - [`ScriptHost`]: owns all of the above and their lifecycle
//!
//! # Example
//!
//! ```rust,no_run
//! use scriptdock_host::{AlwaysConfirm, HostOptions, RunOptions, ScriptHost};
//!
//! # fn main() -> Result<(), scriptdock_host::HostError> {
//! let host = ScriptHost::with_lua(HostOptions::new("scripts"), Box::new(AlwaysConfirm))?;
//! for entry in host.scripts().values() {
//!     println!("{} - {}", entry.display_name, entry.description);
//! }
//! let result = host.run("hello_world.lua", &RunOptions::default())?;
//! print!("{}", result.stdout);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod bindings;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod executor;
pub mod host;
pub mod metadata;
pub mod registry;
pub mod risk;
pub mod watcher;

pub use bindings::{BindingFn, BindingValue, HostBindings};
pub use debounce::ReloadDebouncer;
pub use engine::{EngineFailure, Invocation, InvokeOutcome, LuaEngine, ScriptEngine, SharedState};
pub use error::{DiscoveryError, HostError, HostResult};
pub use executor::{
    AlwaysConfirm, AlwaysDecline, ConfirmPrompt, ErrorKind, ExecutionResult, Executor, RunMode,
    RunOptions, ScriptFailure,
};
pub use host::{HostOptions, ReloadSummary, ScriptHost};
pub use metadata::{MetadataExtractor, ScriptMetadata};
pub use registry::{RescanSummary, ScriptEntry, ScriptLayout, ScriptRegistry, seed_example_script};
pub use risk::{RiskPattern, RiskScanner};
pub use watcher::{ChangeEvent, ChangeKind, ChangeWatcher};
