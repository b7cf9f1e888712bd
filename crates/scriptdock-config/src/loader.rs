//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `~/.scriptdock/config.toml` (user)
//! 3. Merge `{workspace}/.scriptdock/config.toml` (workspace)
//! 4. Merge the explicit `--config` file, if any
//! 5. Apply `SCRIPTDOCK_*` environment overrides
//! 6. Deserialize merged tree → `Config`
//! 7. Validate
//!
//! Relative `scripts.directory` and `logging.directory` values are made
//! absolute against the directory of the file that declared them before merging, so the final
//! value never depends on the process working directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::merge::deep_merge;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Environment variable overriding `scripts.directory`.
pub const ENV_SCRIPTS_DIR: &str = "SCRIPTDOCK_SCRIPTS_DIR";

/// Environment variable overriding `logging.level`.
pub const ENV_LOG_LEVEL: &str = "SCRIPTDOCK_LOG";

/// A fully merged configuration plus the files that contributed to it.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The validated configuration.
    pub config: Config,
    /// Config files that were found and merged, lowest precedence first.
    pub loaded_files: Vec<String>,
}

/// Load the configuration with layered file precedence.
///
/// `workspace_root` is the current project directory; `None` skips the
/// workspace layer. `home_override` replaces the user-level config
/// directory (the path is treated as the `.scriptdock` directory itself).
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(
    workspace_root: Option<&Path>,
    home_override: Option<&Path>,
    explicit: Option<&Path>,
) -> ConfigResult<ResolvedConfig> {
    load_with_env(workspace_root, home_override, explicit, &collect_env_vars())
}

fn load_with_env(
    workspace_root: Option<&Path>,
    home_override: Option<&Path>,
    explicit: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    // 1. Parse embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut loaded_files = Vec::new();

    // 2. User config.
    let user_path = match home_override {
        Some(dir) => dir.join("config.toml"),
        None => home_directory()?.join(".scriptdock").join("config.toml"),
    };
    if merge_layer(&mut merged, &user_path)? {
        info!(path = %user_path.display(), "loaded user config");
        loaded_files.push(user_path.display().to_string());
    }

    // 3. Workspace config.
    if let Some(root) = workspace_root {
        let ws_path = root.join(".scriptdock").join("config.toml");
        if merge_layer(&mut merged, &ws_path)? {
            info!(path = %ws_path.display(), "loaded workspace config");
            loaded_files.push(ws_path.display().to_string());
        }
    }

    // 4. Explicit config. Unlike the discovered layers it must exist.
    if let Some(path) = explicit {
        if !merge_layer(&mut merged, path)? {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }
        info!(path = %path.display(), "loaded explicit config");
        loaded_files.push(path.display().to_string());
    }

    // 5. Environment overrides.
    let env_count = apply_env_overrides(&mut merged, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable overrides");
    }

    // 6. Deserialize.
    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    // 7. Validate.
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        loaded_files,
    })
}

/// Merge one config file into `merged`. Returns `false` when the file does
/// not exist.
fn merge_layer(merged: &mut toml::Value, path: &Path) -> ConfigResult<bool> {
    let Some(mut overlay) = try_load_file(path)? else {
        return Ok(false);
    };
    if let Some(base) = path.parent() {
        resolve_relative_paths(&mut overlay, base);
    }
    deep_merge(merged, &overlay);
    Ok(true)
}

/// Try to load a file, returning `None` if the file doesn't exist.
///
/// Uses a single read operation to avoid TOCTOU races (no separate
/// exists/metadata checks before reading).
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Keys holding paths that are resolved against the declaring file.
const PATH_KEYS: &[(&str, &str)] = &[("scripts", "directory"), ("logging", "directory")];

/// Rewrite relative path values in `overlay` to be absolute against `base`.
fn resolve_relative_paths(overlay: &mut toml::Value, base: &Path) {
    for (section, key) in PATH_KEYS {
        let Some(value) = overlay
            .get_mut(*section)
            .and_then(|s| s.get_mut(*key))
        else {
            continue;
        };
        let Some(raw) = value.as_str() else {
            continue;
        };
        let path = PathBuf::from(raw);
        if path.is_relative() {
            *value = toml::Value::String(base.join(path).display().to_string());
        }
    }
}

/// Apply `SCRIPTDOCK_*` overrides. Returns how many were applied.
fn apply_env_overrides(merged: &mut toml::Value, env_vars: &HashMap<String, String>) -> usize {
    let mut applied = 0usize;
    for (var, section, key) in [
        (ENV_SCRIPTS_DIR, "scripts", "directory"),
        (ENV_LOG_LEVEL, "logging", "level"),
    ] {
        let Some(value) = env_vars.get(var).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        if let Some(table) = merged.as_table_mut() {
            let section = table
                .entry(section)
                .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
            if let Some(section) = section.as_table_mut() {
                section.insert(key.to_owned(), toml::Value::String(value.trim().to_owned()));
                applied = applied.saturating_add(1);
            }
        }
    }
    applied
}

fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("SCRIPTDOCK_"))
        .collect()
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_defaults_parse() {
        let val: toml::Value = toml::from_str(DEFAULTS_TOML).unwrap();
        assert!(val.as_table().unwrap().contains_key("scripts"));
        assert!(val.as_table().unwrap().contains_key("risk"));
        assert!(val.as_table().unwrap().contains_key("metadata"));
    }

    #[test]
    fn test_defaults_match_default_impls() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_without_files() {
        let home = tempfile::tempdir().unwrap();
        let resolved = load_with_env(None, Some(home.path()), None, &no_env()).unwrap();
        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
    }

    #[test]
    fn test_workspace_overrides_user() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[watch]\ndebounce_ms = 200\n[logging]\nlevel = \"info\"\n",
        )
        .unwrap();

        let ws = tempfile::tempdir().unwrap();
        std::fs::create_dir(ws.path().join(".scriptdock")).unwrap();
        std::fs::write(
            ws.path().join(".scriptdock").join("config.toml"),
            "[watch]\ndebounce_ms = 50\n",
        )
        .unwrap();

        let resolved =
            load_with_env(Some(ws.path()), Some(home.path()), None, &no_env()).unwrap();
        assert_eq!(resolved.config.watch.debounce_ms, 50);
        assert_eq!(resolved.config.logging.level, "info");
        assert_eq!(resolved.loaded_files.len(), 2);
    }

    #[test]
    fn test_relative_paths_resolved_against_file() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[scripts]\ndirectory = \"my-scripts\"\n[logging]\ndirectory = \"logs\"\n",
        )
        .unwrap();

        let resolved = load_with_env(None, Some(home.path()), None, &no_env()).unwrap();
        assert_eq!(
            resolved.config.scripts_directory(),
            home.path().join("my-scripts")
        );
        assert_eq!(
            resolved.config.logging.directory.as_deref(),
            Some(home.path().join("logs").display().to_string().as_str())
        );
    }

    #[test]
    fn test_env_overrides_files() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[scripts]\ndirectory = \"/from/file\"\n",
        )
        .unwrap();

        let mut env = HashMap::new();
        env.insert(ENV_SCRIPTS_DIR.to_owned(), "/from/env".to_owned());
        env.insert(ENV_LOG_LEVEL.to_owned(), "debug".to_owned());

        let resolved = load_with_env(None, Some(home.path()), None, &env).unwrap();
        assert_eq!(
            resolved.config.scripts.directory.as_deref(),
            Some("/from/env")
        );
        assert_eq!(resolved.config.logging.level, "debug");
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let home = tempfile::tempdir().unwrap();
        let result = load_with_env(
            None,
            Some(home.path()),
            Some(Path::new("/nonexistent/scriptdock.toml")),
            &no_env(),
        );
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_user_risk_patterns_replace_defaults() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[[risk.patterns]]\nneedle = \"http.request\"\nreason = \"talks to the network\"\n",
        )
        .unwrap();

        let resolved = load_with_env(None, Some(home.path()), None, &no_env()).unwrap();
        assert_eq!(resolved.config.risk.patterns.len(), 1);
        assert_eq!(resolved.config.risk.patterns[0].needle, "http.request");
    }

    #[test]
    fn test_explicit_file_with_invalid_toml() {
        let home = tempfile::tempdir().unwrap();
        let path = home.path().join("bad.toml");
        std::fs::write(&path, "[watch\ndebounce_ms = ").unwrap();

        let result = load_with_env(None, Some(home.path()), Some(&path), &no_env());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_try_load_file_missing() {
        let result = try_load_file(Path::new("/nonexistent/config.toml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(
            matches!(result, Err(ConfigError::ValidationError { .. })),
            "Expected ValidationError for oversized config, got: {result:?}"
        );
    }
}
