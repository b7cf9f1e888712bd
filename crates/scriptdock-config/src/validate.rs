//! Post-merge configuration validation.
//!
//! Validates that deserialized [`Config`](crate::Config) values are within
//! acceptable ranges.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_scripts(config)?;
    validate_watch(config)?;
    validate_metadata(config)?;
    validate_risk(config)?;
    validate_logging(config)?;
    Ok(())
}

/// Debounce bounds in milliseconds.
const MIN_DEBOUNCE_MS: u64 = 10;
const MAX_DEBOUNCE_MS: u64 = 60_000;

fn validate_scripts(config: &Config) -> ConfigResult<()> {
    let s = &config.scripts;

    if s.extension.is_empty() || s.extension.contains('.') || s.extension.contains('/') {
        return Err(ConfigError::ValidationError {
            field: "scripts.extension".to_owned(),
            message: format!(
                "extension '{}' must be non-empty and must not contain '.' or '/'",
                s.extension
            ),
        });
    }

    if s.directory.as_deref().is_some_and(|d| d.trim().is_empty()) {
        return Err(ConfigError::ValidationError {
            field: "scripts.directory".to_owned(),
            message: "directory must not be empty; omit it to use the default".to_owned(),
        });
    }

    Ok(())
}

fn validate_watch(config: &Config) -> ConfigResult<()> {
    let ms = config.watch.debounce_ms;
    if !(MIN_DEBOUNCE_MS..=MAX_DEBOUNCE_MS).contains(&ms) {
        return Err(ConfigError::ValidationError {
            field: "watch.debounce_ms".to_owned(),
            message: format!(
                "debounce_ms {ms} is out of range; must be between {MIN_DEBOUNCE_MS} and {MAX_DEBOUNCE_MS}"
            ),
        });
    }
    Ok(())
}

fn validate_metadata(config: &Config) -> ConfigResult<()> {
    let m = &config.metadata;

    if m.description_labels.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "metadata.description_labels".to_owned(),
            message: "at least one description label is required".to_owned(),
        });
    }

    if let Some(idx) = m
        .description_labels
        .iter()
        .position(|l| l.trim().is_empty())
    {
        return Err(ConfigError::ValidationError {
            field: format!("metadata.description_labels[{idx}]"),
            message: "labels must not be blank".to_owned(),
        });
    }

    if m.generic_description.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "metadata.generic_description".to_owned(),
            message: "generic_description must not be blank".to_owned(),
        });
    }

    Ok(())
}

fn validate_risk(config: &Config) -> ConfigResult<()> {
    if let Some(idx) = config
        .risk
        .patterns
        .iter()
        .position(|p| p.needle.is_empty())
    {
        return Err(ConfigError::ValidationError {
            field: format!("risk.patterns[{idx}].needle"),
            message: "needle must not be empty".to_owned(),
        });
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        });
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskPatternSection;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_extension_with_dot_rejected() {
        let mut config = Config::default();
        config.scripts.extension = ".lua".to_owned();
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_debounce_out_of_range() {
        let mut config = Config::default();
        config.watch.debounce_ms = 0;
        assert!(validate(&config).is_err());

        config.watch.debounce_ms = 120_000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_labels_rejected() {
        let mut config = Config::default();
        config.metadata.description_labels.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_blank_label_reports_index() {
        let mut config = Config::default();
        config.metadata.description_labels.push("  ".to_owned());
        match validate(&config) {
            Err(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field, "metadata.description_labels[4]");
            },
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_needle_rejected() {
        let mut config = Config::default();
        config.risk.patterns.push(RiskPatternSection {
            needle: String::new(),
            reason: "nothing".to_owned(),
        });
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert!(validate(&config).is_err());
    }
}
