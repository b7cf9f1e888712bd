//! Terminal styling shared by the subcommands.

use colored::Colorize;

/// Width of field labels in detail views.
const FIELD_WIDTH: usize = 12;

/// Width of the rule under a banner.
const RULE_WIDTH: usize = 50;

/// Styling helpers. Everything returns a `String` so callers choose the stream.
pub(crate) struct Theme;

impl Theme {
    /// A bold title with a rule underneath.
    pub(crate) fn banner(title: &str) -> String {
        format!("\n{}\n{}", title.bold().cyan(), "━".repeat(RULE_WIDTH).dimmed())
    }

    pub(crate) fn success(text: &str) -> String {
        format!("{} {text}", "✓".green())
    }

    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    pub(crate) fn info(text: &str) -> String {
        format!("{} {text}", "i".blue())
    }

    pub(crate) fn dimmed(text: &str) -> String {
        text.dimmed().to_string()
    }

    /// A label and value in a detail view, labels aligned.
    pub(crate) fn field(label: &str, value: &str) -> String {
        format!("{:<FIELD_WIDTH$} {value}", format!("{label}:").bold())
    }

    /// A script filename.
    pub(crate) fn script_id(id: &str) -> String {
        id.cyan().to_string()
    }

    /// A risk scan line (`needle: reason`) with the needle highlighted.
    pub(crate) fn risk(warning: &str) -> String {
        match warning.split_once(": ") {
            Some((needle, reason)) => {
                format!("  {} {}: {reason}", "⚠".yellow(), needle.yellow().bold())
            },
            None => format!("  {} {warning}", "⚠".yellow()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_keeps_needle_and_reason() {
        colored::control::set_override(false);
        assert_eq!(
            Theme::risk("os.execute: runs a shell command"),
            "  ⚠ os.execute: runs a shell command"
        );
        assert_eq!(Theme::risk("odd"), "  ⚠ odd");
    }

    #[test]
    fn test_field_aligns_labels() {
        colored::control::set_override(false);
        assert_eq!(Theme::field("File", "a.lua"), "File:        a.lua");
    }
}
