//! Subcommand implementations.

pub(crate) mod info;
pub(crate) mod init;
pub(crate) mod list;
pub(crate) mod run;
pub(crate) mod show;
pub(crate) mod watch;

use std::path::PathBuf;

use anyhow::Context;
use scriptdock_config::Config;
use scriptdock_host::{ConfirmPrompt, ScriptHost};

use crate::bindings::cli_bindings;
use crate::config_bridge::to_host_options;
use crate::theme::Theme;

/// Resolved configuration and paths shared by every subcommand.
pub(crate) struct AppContext {
    pub(crate) config: Config,
    pub(crate) loaded_files: Vec<String>,
    pub(crate) project_root: PathBuf,
    pub(crate) scripts_dir: PathBuf,
}

impl AppContext {
    /// Build a host for the configured scripts directory.
    ///
    /// Seeds the example script first when the directory does not exist and
    /// `scripts.seed_example` is set.
    pub(crate) fn host(&self, confirm: Box<dyn ConfirmPrompt>) -> anyhow::Result<ScriptHost> {
        let seed = self.config.scripts.seed_example && !self.scripts_dir.exists();

        let bindings = cli_bindings(&self.project_root, &self.scripts_dir);
        let options = to_host_options(&self.config, self.scripts_dir.clone(), bindings);
        let host = ScriptHost::with_lua(options, confirm).context("failed to start script host")?;

        if seed
            && let Some(path) = host
                .seed_example()
                .context("failed to create the scripts directory")?
        {
            eprintln!(
                "{}",
                Theme::info(&format!("Created example script {}", path.display()))
            );
        }
        Ok(host)
    }
}
