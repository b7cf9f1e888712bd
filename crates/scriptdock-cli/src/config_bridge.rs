//! Bridge from `scriptdock_config::Config` to host and telemetry types.

use std::path::PathBuf;
use std::time::Duration;

use scriptdock_config::Config;
use scriptdock_host::{
    HostBindings, HostOptions, MetadataExtractor, RiskPattern, RiskScanner, RunMode, RunOptions,
    ScriptLayout,
};
use scriptdock_telemetry::{LogConfig, LogFormat};

/// Convert config to [`LogConfig`].
///
/// Falls back to compact output at the configured level if the section
/// does not convert cleanly.
pub(crate) fn to_log_config(cfg: &Config) -> LogConfig {
    LogConfig::try_from(&cfg.logging).unwrap_or_else(|_| {
        LogConfig::new(cfg.logging.level.clone()).with_format(LogFormat::Compact)
    })
}

/// The scripts directory, with a `--scripts-dir` override applied.
pub(crate) fn scripts_directory(cfg: &Config, override_dir: Option<&PathBuf>) -> PathBuf {
    override_dir.cloned().unwrap_or_else(|| cfg.scripts_directory())
}

/// Convert config to [`HostOptions`].
pub(crate) fn to_host_options(
    cfg: &Config,
    directory: PathBuf,
    bindings: HostBindings,
) -> HostOptions {
    HostOptions {
        directory,
        layout: ScriptLayout {
            extension: cfg.scripts.extension.clone(),
            reserved_prefix: cfg.scripts.reserved_prefix.clone(),
        },
        extractor: MetadataExtractor::new(
            cfg.metadata.description_labels.iter().cloned(),
            cfg.metadata.generic_description.clone(),
        ),
        scanner: RiskScanner::new(
            cfg.risk
                .patterns
                .iter()
                .map(|p| RiskPattern::new(p.needle.clone(), p.reason.clone())),
        ),
        bindings,
        debounce: Duration::from_millis(cfg.watch.debounce_ms),
    }
}

/// Convert config plus `run` flags to [`RunOptions`].
pub(crate) fn to_run_options(cfg: &Config, no_capture: bool, yes: bool) -> RunOptions {
    let interactive = cfg.execution.interactive && !yes;
    RunOptions {
        capture_output: cfg.execution.capture_output && !no_capture,
        mode: if interactive {
            RunMode::Interactive
        } else {
            RunMode::Batch
        },
    }
}

#[cfg(test)]
mod tests {
    use scriptdock_config::RiskPatternSection;

    use super::*;

    #[test]
    fn test_host_options_from_config() {
        let mut cfg = Config::default();
        cfg.scripts.extension = "luau".to_string();
        cfg.watch.debounce_ms = 250;
        cfg.metadata.description_labels = vec!["Summary:".to_string()];
        cfg.metadata.generic_description = "Untitled".to_string();
        cfg.risk.patterns = vec![RiskPatternSection::new("require", "pulls in modules")];

        let opts = to_host_options(&cfg, PathBuf::from("/s"), HostBindings::default());

        assert_eq!(opts.directory, PathBuf::from("/s"));
        assert_eq!(opts.layout.extension, "luau");
        assert_eq!(opts.layout.reserved_prefix, "__");
        assert_eq!(opts.debounce, Duration::from_millis(250));
        assert_eq!(opts.extractor.labels().collect::<Vec<_>>(), vec!["Summary:"]);
        assert_eq!(opts.extractor.description("x"), "Untitled");
        assert_eq!(
            opts.scanner.scan("require('x')"),
            vec!["require: pulls in modules".to_string()]
        );
    }

    #[test]
    fn test_default_config_matches_host_defaults() {
        let opts = to_host_options(&Config::default(), PathBuf::from("/s"), HostBindings::default());
        assert_eq!(opts.layout, ScriptLayout::default());
        assert_eq!(opts.scanner, RiskScanner::default());
        assert_eq!(
            opts.extractor.labels().collect::<Vec<_>>(),
            MetadataExtractor::default().labels().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_run_options_flags() {
        let cfg = Config::default();
        let opts = to_run_options(&cfg, false, false);
        assert!(opts.capture_output);
        assert_eq!(opts.mode, RunMode::Interactive);

        let opts = to_run_options(&cfg, true, true);
        assert!(!opts.capture_output);
        assert_eq!(opts.mode, RunMode::Batch);

        let mut cfg = Config::default();
        cfg.execution.interactive = false;
        assert_eq!(to_run_options(&cfg, false, false).mode, RunMode::Batch);
    }

    #[test]
    fn test_scripts_dir_override() {
        let mut cfg = Config::default();
        cfg.scripts.directory = Some("/configured".to_string());
        assert_eq!(scripts_directory(&cfg, None), PathBuf::from("/configured"));
        let over = PathBuf::from("/flag");
        assert_eq!(scripts_directory(&cfg, Some(&over)), over);
    }

    #[test]
    fn test_log_config_from_section() {
        let mut cfg = Config::default();
        cfg.logging.level = "debug".to_string();
        cfg.logging.format = "json".to_string();
        let lc = to_log_config(&cfg);
        assert_eq!(lc.level, "debug");
        assert_eq!(lc.format, LogFormat::Json);
    }
}
