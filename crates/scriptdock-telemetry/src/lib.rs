//! scriptdock telemetry - logging setup for the script host.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats and targets
//! - Conversion from the `[logging]` config section (feature `config`)
//!
//! Logs default to stderr so a script's own stdout stays clean when output
//! capture is disabled.
//!
//! # Example
//!
//! ```rust,no_run
//! use scriptdock_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), scriptdock_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("scriptdock_host::watcher=trace");
//!
//! setup_logging(&config)?;
//! tracing::info!("Host starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_logging};
