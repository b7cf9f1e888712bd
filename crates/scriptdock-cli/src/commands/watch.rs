//! Watch command - hot reload until Ctrl-C.

use anyhow::Context;
use scriptdock_host::ScriptHost;

use crate::theme::Theme;

/// Watch the scripts directory and report every reload.
pub(crate) async fn watch_scripts(mut host: ScriptHost, enabled: bool) -> anyhow::Result<()> {
    if !enabled {
        println!(
            "{}",
            Theme::warning("Hot reload is disabled ([watch] enabled = false)")
        );
        return Ok(());
    }

    let mut updates = host.subscribe();
    updates.borrow_and_update();
    host.start_watching()
        .context("failed to start watching the scripts directory")?;

    println!(
        "{}",
        Theme::info(&format!(
            "Watching {} ({} scripts). Press Ctrl-C to stop.",
            host.directory().display(),
            host.scripts().len()
        ))
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let summary = *updates.borrow_and_update();
                println!(
                    "{}",
                    Theme::success(&format!("Scripts reloaded ({} scripts)", summary.scripts))
                );
                if summary.skipped > 0 {
                    println!(
                        "{}",
                        Theme::warning(&format!(
                            "{} file(s) skipped, see the log for details",
                            summary.skipped
                        ))
                    );
                }
            }
        }
    }

    host.dispose().await;
    println!("{}", Theme::dimmed("Stopped watching"));
    Ok(())
}
