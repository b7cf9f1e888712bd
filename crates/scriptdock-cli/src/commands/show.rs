//! Show command - details of one script.

use anyhow::bail;
use scriptdock_host::ScriptHost;

use crate::theme::Theme;

/// Print the registry entry for `script`.
pub(crate) fn show_script(host: &ScriptHost, script: &str) -> anyhow::Result<()> {
    let Some(entry) = host.get(script) else {
        bail!(
            "script not found: {script} (looked in {})",
            host.directory().display()
        );
    };

    println!("{}", Theme::banner(&entry.display_name));
    println!("{}", Theme::field("File", &entry.id));
    println!(
        "{}",
        Theme::field("Location", &entry.source_path.display().to_string())
    );
    println!("{}", Theme::field("Description", &entry.description));
    println!(
        "{}",
        Theme::field("Lines", &entry.content.lines().count().to_string())
    );
    println!();
    Ok(())
}
