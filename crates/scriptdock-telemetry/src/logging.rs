//! Subscriber setup for the host's own diagnostics.
//!
//! Script output never passes through here. The target only decides where
//! the host's log lines land: stderr by default, so a script's stdout stays
//! clean when capture is off.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Directives applied before user directives. The filesystem watcher
/// backends log every raw event at debug level.
const QUIET_DEPENDENCIES: &[&str] = &["notify=warn", "mio=warn"];

/// Prefix for rolling log files.
const LOG_FILE_PREFIX: &str = "scriptdock.log";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-oriented.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
    /// Newline-delimited JSON.
    Json,
    /// The `tracing-subscriber` default layout.
    Full,
}

impl std::str::FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            "full" => Ok(Self::Full),
            other => Err(TelemetryError::ConfigError(format!(
                "unknown log format '{other}'"
            ))),
        }
    }
}

/// Where log lines are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogTarget {
    /// Standard output.
    Stdout,
    /// Standard error.
    #[default]
    Stderr,
    /// Daily-rotated files in a directory.
    File(PathBuf),
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Base filter, e.g. `warn` or `scriptdock_host=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Output destination.
    pub target: LogTarget,
    /// Extra filter directives, applied last.
    pub directives: Vec<String>,
    /// Prefix lines with a timestamp.
    pub timestamps: bool,
    /// Colourise output. Ignored for JSON and files.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("warn")
    }
}

impl LogConfig {
    /// Compact stderr logging at `level`.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            directives: Vec::new(),
            timestamps: true,
            ansi: true,
        }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the output destination.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// Write daily-rotated files into `directory` instead of a stream.
    #[must_use]
    pub fn with_file_logging(mut self, directory: impl Into<PathBuf>) -> Self {
        self.target = LogTarget::File(directory.into());
        self.ansi = false;
        self
    }

    /// Append a filter directive.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Raise the base level to `debug` when `verbose` is set.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            "debug".clone_into(&mut self.level);
        }
        self
    }

    /// Omit timestamps (useful for tests and piped output).
    #[must_use]
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// Disable colours.
    #[must_use]
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    fn build_filter(&self) -> TelemetryResult<EnvFilter> {
        let invalid = |e: tracing_subscriber::filter::ParseError| {
            TelemetryError::ConfigError(e.to_string())
        };

        let mut filter = EnvFilter::try_new(&self.level).map_err(|e| {
            TelemetryError::ConfigError(format!("invalid log level '{}': {e}", self.level))
        })?;
        for directive in QUIET_DEPENDENCIES
            .iter()
            .copied()
            .chain(self.directives.iter().map(String::as_str))
        {
            filter = filter.add_directive(directive.parse().map_err(invalid)?);
        }
        Ok(filter)
    }
}

#[cfg(feature = "config")]
impl TryFrom<&scriptdock_config::LoggingSection> for LogConfig {
    type Error = TelemetryError;

    fn try_from(section: &scriptdock_config::LoggingSection) -> Result<Self, Self::Error> {
        let mut config = Self::new(section.level.clone()).with_format(section.format.parse()?);
        config.directives.clone_from(&section.directives);
        if let Some(dir) = &section.directory {
            config = config.with_file_logging(dir);
        }
        Ok(config)
    }
}

/// Install the registry with one fmt layer, honouring the timestamp flag.
macro_rules! install {
    ($filter:expr, $config:expr, $layer:expr) => {{
        if $config.timestamps {
            tracing_subscriber::registry()
                .with($filter)
                .with($layer)
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with($filter)
                .with($layer.without_time())
                .try_init()
        }
        .map_err(|e| TelemetryError::InitError(e.to_string()))
    }};
}

fn install_with_writer<W>(filter: EnvFilter, config: &LogConfig, writer: W) -> TelemetryResult<()>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let ansi = config.ansi;
    match config.format {
        LogFormat::Json => install!(filter, config, fmt::layer().json().with_writer(writer)),
        LogFormat::Pretty => install!(
            filter,
            config,
            fmt::layer().pretty().with_ansi(ansi).with_writer(writer)
        ),
        LogFormat::Compact => install!(
            filter,
            config,
            fmt::layer().compact().with_ansi(ansi).with_writer(writer)
        ),
        LogFormat::Full => install!(
            filter,
            config,
            fmt::layer().with_ansi(ansi).with_writer(writer)
        ),
    }
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Returns an error if a filter directive is invalid, the log directory
/// cannot be created, or a global subscriber is already installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.build_filter()?;

    match &config.target {
        LogTarget::Stdout => install_with_writer(filter, config, std::io::stdout),
        LogTarget::Stderr => install_with_writer(filter, config, std::io::stderr),
        LogTarget::File(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            install_with_writer(filter, config, appender)
        },
    }
}
