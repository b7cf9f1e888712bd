#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered configuration for the scriptdock script host.
//!
//! A single [`Config`] type describes where scripts live, how the watcher
//! debounces, which description labels and risk patterns apply, how scripts
//! are executed by default, and how logging is set up.
//!
//! # Usage
//!
//! ```rust,no_run
//! use scriptdock_config::Config;
//!
//! let resolved = Config::load(Some(std::path::Path::new(".")), None).unwrap();
//! println!("Scripts live in {}", resolved.config.scripts_directory().display());
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment variables** (`SCRIPTDOCK_SCRIPTS_DIR`, `SCRIPTDOCK_LOG`)
//! 2. **Explicit file** (`--config <path>`)
//! 3. **Workspace** (`{workspace}/.scriptdock/config.toml`)
//! 4. **User** (`~/.scriptdock/config.toml`)
//! 5. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! # Design
//!
//! This crate has **no dependencies on other internal scriptdock crates**.
//! Conversion into host types happens in the CLI's config bridge.

/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered configuration merging.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ResolvedConfig;
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// See [`loader::load`] for the algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(
        workspace_root: Option<&std::path::Path>,
        explicit: Option<&std::path::Path>,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, None, explicit)
    }
}
