//! Configuration types for the scriptdock host.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header produces a working
//! configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration for the scriptdock host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where scripts live and which files count as scripts.
    pub scripts: ScriptsSection,
    /// Hot-reload watcher settings.
    pub watch: WatchSection,
    /// Description extraction settings.
    pub metadata: MetadataSection,
    /// Pre-execution risk scan patterns.
    pub risk: RiskSection,
    /// Default execution behaviour.
    pub execution: ExecutionSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

impl Config {
    /// The scripts directory, falling back to the platform data directory
    /// (`$XDG_DATA_HOME/scriptdock/scripts` on Linux) when unset.
    #[must_use]
    pub fn scripts_directory(&self) -> PathBuf {
        self.scripts
            .directory
            .as_ref()
            .map_or_else(default_scripts_dir, PathBuf::from)
    }
}

fn default_scripts_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "scriptdock").map_or_else(
        || PathBuf::from(".scriptdock").join("scripts"),
        |dirs| dirs.data_dir().join("scripts"),
    )
}

// ---------------------------------------------------------------------------
// ScriptsSection
// ---------------------------------------------------------------------------

/// Script discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsSection {
    /// Scripts directory. Relative paths are resolved against the directory
    /// of the config file that set them. `None` uses the platform default.
    pub directory: Option<String>,
    /// Recognised script extension, without the leading dot.
    pub extension: String,
    /// Files starting with this prefix are internal and never listed.
    pub reserved_prefix: String,
    /// Create the directory and an example script when it does not exist.
    pub seed_example: bool,
}

impl Default for ScriptsSection {
    fn default() -> Self {
        Self {
            directory: None,
            extension: "lua".to_owned(),
            reserved_prefix: "__".to_owned(),
            seed_example: true,
        }
    }
}

// ---------------------------------------------------------------------------
// WatchSection
// ---------------------------------------------------------------------------

/// Hot-reload settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    /// Whether `scriptdock watch` reloads on filesystem changes.
    pub enabled: bool,
    /// Quiet interval in milliseconds before a burst of changes triggers a
    /// rescan.
    pub debounce_ms: u64,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 500,
        }
    }
}

// ---------------------------------------------------------------------------
// MetadataSection
// ---------------------------------------------------------------------------

/// Description extraction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSection {
    /// Description labels in priority order. The first label found anywhere
    /// in a script wins, regardless of where the others appear.
    pub description_labels: Vec<String>,
    /// Description used when no label is found or the label line is empty.
    pub generic_description: String,
}

impl Default for MetadataSection {
    fn default() -> Self {
        Self {
            description_labels: vec![
                "Description:".to_owned(),
                "Descrição:".to_owned(),
                "Descripción:".to_owned(),
                "Beschreibung:".to_owned(),
            ],
            generic_description: "Lua script".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// RiskSection
// ---------------------------------------------------------------------------

/// Pre-execution risk scan settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSection {
    /// Patterns in reporting order.
    pub patterns: Vec<RiskPatternSection>,
}

/// One risk pattern: a case-sensitive substring and why it is flagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskPatternSection {
    /// Substring to look for.
    pub needle: String,
    /// Human-readable reason shown with the warning.
    pub reason: String,
}

impl RiskPatternSection {
    /// Create a pattern entry.
    #[must_use]
    pub fn new(needle: &str, reason: &str) -> Self {
        Self {
            needle: needle.to_owned(),
            reason: reason.to_owned(),
        }
    }
}

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            patterns: vec![
                RiskPatternSection::new("os.execute", "runs a shell command"),
                RiskPatternSection::new("os.exit", "tries to terminate the host process"),
                RiskPatternSection::new("io.popen", "spawns a child process"),
                RiskPatternSection::new("loadstring", "evaluates dynamically built code"),
                RiskPatternSection::new("load(", "evaluates dynamically built code"),
                RiskPatternSection::new("dofile", "executes another file"),
                RiskPatternSection::new("loadfile", "loads code from another file"),
                RiskPatternSection::new("package.loadlib", "loads a native library"),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionSection
// ---------------------------------------------------------------------------

/// Default execution behaviour for `scriptdock run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Capture script stdout/stderr instead of letting it through.
    pub capture_output: bool,
    /// Ask for confirmation when the risk scan reports warnings.
    pub interactive: bool,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            capture_output: true,
            interactive: true,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["scriptdock_host=debug"]`).
    pub directives: Vec<String>,
    /// Write daily-rotated log files into this directory instead of stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
            directory: None,
        }
    }
}
