//! scriptdock CLI - hot-reloading Lua script host.
//!
//! Lists, inspects and runs the scripts in the configured scripts directory,
//! and can watch that directory to pick up new and edited scripts live.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scriptdock_config::Config;
use scriptdock_host::AlwaysDecline;

mod bindings;
mod commands;
mod config_bridge;
mod confirm;
mod theme;

use commands::{AppContext, info, init, list, run, show, watch};
use confirm::TerminalConfirm;

/// scriptdock - run and hot-reload Lua scripts
#[derive(Parser)]
#[command(name = "scriptdock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to an additional configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Scripts directory (overrides configuration)
    #[arg(long, global = true)]
    scripts_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered scripts
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show details of one script
    Show {
        /// Script filename
        script: String,
    },

    /// Run a script
    Run {
        /// Script filename
        script: String,

        /// Let script output through instead of capturing it
        #[arg(long)]
        no_capture: bool,

        /// Do not ask for confirmation when the risk scan reports warnings
        #[arg(short, long)]
        yes: bool,
    },

    /// Watch the scripts directory and reload on change
    Watch,

    /// Create the scripts directory with an example script
    Init,

    /// Show host, engine and configuration details
    Info,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir().context("cannot determine the current directory")?;
    let resolved = Config::load(Some(cwd.as_path()), cli.config.as_deref())
        .context("failed to load configuration")?;

    // Set up logging from config, with --verbose override.
    let log_config = config_bridge::to_log_config(&resolved.config).verbose(cli.verbose);
    if let Err(e) = scriptdock_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let scripts_dir = config_bridge::scripts_directory(
        &resolved.config,
        cli.scripts_dir.map(|dir| cwd.join(dir)).as_ref(),
    );
    let ctx = AppContext {
        config: resolved.config,
        loaded_files: resolved.loaded_files,
        project_root: cwd,
        scripts_dir,
    };

    match cli.command {
        Commands::List { json } => {
            list::list_scripts(&ctx.host(Box::new(AlwaysDecline))?, json)?;
        },
        Commands::Show { script } => {
            show::show_script(&ctx.host(Box::new(AlwaysDecline))?, &script)?;
        },
        Commands::Run {
            script,
            no_capture,
            yes,
        } => {
            let options = config_bridge::to_run_options(&ctx.config, no_capture, yes);
            let host = ctx.host(Box::new(TerminalConfirm))?;
            return run::run_script(&host, &script, &options, cli.verbose);
        },
        Commands::Watch => {
            let host = ctx.host(Box::new(AlwaysDecline))?;
            watch::watch_scripts(host, ctx.config.watch.enabled).await?;
        },
        Commands::Init => {
            init::run_init(&ctx.scripts_dir)?;
        },
        Commands::Info => {
            info::show_info(&ctx, &ctx.host(Box::new(AlwaysDecline))?);
        },
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "scriptdock",
            "--scripts-dir",
            "s",
            "run",
            "stats.lua",
            "--no-capture",
            "-y",
        ])
        .unwrap();

        assert_eq!(cli.scripts_dir, Some(PathBuf::from("s")));
        let Commands::Run {
            script,
            no_capture,
            yes,
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(script, "stats.lua");
        assert!(no_capture);
        assert!(yes);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["scriptdock", "list", "--json", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::List { json: true }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["scriptdock"]).is_err());
    }
}
