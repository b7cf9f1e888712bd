//! Host error types.
//!
//! Only [`HostError`] is ever returned as an `Err`. Discovery problems are
//! collected into [`RescanSummary`](crate::registry::RescanSummary) and
//! script failures travel inside
//! [`ExecutionResult`](crate::executor::ExecutionResult).

use std::path::PathBuf;

/// A candidate script that was left out of the registry.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The file could not be read (permissions, invalid UTF-8, raced delete).
    #[error("failed to read script {path}: {source}")]
    Read {
        /// The candidate file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file did not pass the compile-only check.
    #[error("script {path} does not compile: {message}")]
    Syntax {
        /// The candidate file.
        path: PathBuf,
        /// Compiler message.
        message: String,
    },

    /// The filename is not valid UTF-8, so it cannot be a script id.
    #[error("script file name is not valid UTF-8: {path}")]
    InvalidName {
        /// The candidate file.
        path: PathBuf,
    },
}

impl DiscoveryError {
    /// The file this error is about.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Read { path, .. } | Self::Syntax { path, .. } | Self::InvalidName { path } => {
                path
            },
        }
    }
}

/// Errors from host operations.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The requested script is not in the current registry snapshot.
    #[error("script not found: {0}")]
    ScriptNotFound(String),

    /// The scripting engine could not be initialised.
    #[error("engine initialisation failed: {0}")]
    EngineInit(String),

    /// The filesystem watcher could not be created or armed.
    #[error("filesystem watcher: {0}")]
    Watch(String),

    /// Watching was requested twice on the same host.
    #[error("host is already watching {0}")]
    AlreadyWatching(PathBuf),

    /// I/O error (seeding the scripts directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<notify::Error> for HostError {
    fn from(e: notify::Error) -> Self {
        Self::Watch(e.to_string())
    }
}

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;
