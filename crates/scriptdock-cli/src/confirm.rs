//! Terminal confirmation for scripts flagged by the risk scan.

use std::io::IsTerminal;
use std::path::Path;

use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use scriptdock_host::ConfirmPrompt;
use tracing::warn;

use crate::theme::Theme;

/// Asks on the terminal; declines when stdin is not a terminal.
pub(crate) struct TerminalConfirm;

impl ConfirmPrompt for TerminalConfirm {
    fn confirm(&self, script: &Path, warnings: &[String]) -> bool {
        eprintln!(
            "\n{}",
            Theme::warning(&format!(
                "{} uses potentially dangerous operations:",
                script.display()
            ))
        );
        for warning in warnings {
            eprintln!("{}", Theme::risk(warning));
        }
        eprintln!();

        if !std::io::stdin().is_terminal() {
            eprintln!(
                "{}",
                Theme::dimmed("Not running on a terminal; pass --yes to run anyway.")
            );
            return false;
        }

        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Run this script anyway?")
            .default(false)
            .interact()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Confirmation prompt failed");
                false
            })
    }
}
