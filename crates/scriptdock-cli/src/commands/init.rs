//! Init command - create the scripts directory with an example script.

use std::path::Path;

use anyhow::Context;
use scriptdock_host::registry::EXAMPLE_SCRIPT_NAME;
use scriptdock_host::seed_example_script;

use crate::theme::Theme;

/// Create `scripts_dir` and seed the example script. Never overwrites.
pub(crate) fn run_init(scripts_dir: &Path) -> anyhow::Result<()> {
    let written = seed_example_script(scripts_dir)
        .with_context(|| format!("failed to initialize {}", scripts_dir.display()))?;

    match written {
        Some(path) => println!(
            "{}",
            Theme::success(&format!("Created example script {}", path.display()))
        ),
        None => println!(
            "{}",
            Theme::info(&format!(
                "Example script already exists in {}",
                scripts_dir.display()
            ))
        ),
    }

    println!("  Scripts: {}", scripts_dir.display());
    println!("  Try:     scriptdock run {EXAMPLE_SCRIPT_NAME}");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let scripts = dir.path().join("scripts");

        run_init(&scripts).unwrap();
        let example = scripts.join(EXAMPLE_SCRIPT_NAME);
        std::fs::write(&example, "-- edited").unwrap();

        run_init(&scripts).unwrap();
        assert_eq!(std::fs::read_to_string(example).unwrap(), "-- edited");
    }
}
