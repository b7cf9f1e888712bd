//! List command - show the registry snapshot.

use colored::Colorize;
use scriptdock_host::ScriptHost;
use serde::Serialize;

use crate::theme::Theme;

#[derive(Serialize)]
struct ScriptRow<'a> {
    id: &'a str,
    display_name: &'a str,
    description: &'a str,
    path: String,
}

/// List all discovered scripts.
pub(crate) fn list_scripts(host: &ScriptHost, json: bool) -> anyhow::Result<()> {
    let scripts = host.scripts();

    if json {
        let rows: Vec<ScriptRow<'_>> = scripts
            .values()
            .map(|entry| ScriptRow {
                id: &entry.id,
                display_name: &entry.display_name,
                description: &entry.description,
                path: entry.source_path.display().to_string(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if scripts.is_empty() {
        println!("{}", Theme::info("No scripts found"));
        println!(
            "{}",
            Theme::dimmed(&format!("Add scripts to {}", host.directory().display()))
        );
        return Ok(());
    }

    println!("{}", Theme::banner("Scripts"));
    println!(
        "{:<24} {:<28} {}",
        "NAME".dimmed(),
        "FILE".dimmed(),
        "DESCRIPTION".dimmed()
    );

    for entry in scripts.values() {
        println!(
            "{:<24} {:<28} {}",
            entry.display_name,
            Theme::script_id(&entry.id),
            entry.description.dimmed()
        );
    }

    println!();
    Ok(())
}
