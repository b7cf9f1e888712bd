//! Info command - host, engine and configuration details.

use scriptdock_host::ScriptHost;

use super::AppContext;
use crate::theme::Theme;

/// Print where scripts come from and what runs them.
pub(crate) fn show_info(ctx: &AppContext, host: &ScriptHost) {
    println!("{}", Theme::banner("scriptdock"));
    println!("{}", Theme::field("Version", env!("CARGO_PKG_VERSION")));
    println!("{}", Theme::field("Engine", &host.engine_name()));
    println!("{}", Theme::field("Script API", host.api_version()));
    println!(
        "{}",
        Theme::field("Scripts", &host.directory().display().to_string())
    );
    println!(
        "{}",
        Theme::field("Loaded", &host.scripts().len().to_string())
    );

    let watch = &ctx.config.watch;
    let reload = if watch.enabled {
        format!("enabled ({} ms debounce)", watch.debounce_ms)
    } else {
        "disabled".to_string()
    };
    println!("{}", Theme::field("Hot reload", &reload));

    if ctx.loaded_files.is_empty() {
        println!("{}", Theme::field("Config", &Theme::dimmed("built-in defaults")));
    } else {
        println!("{}", Theme::field("Config", ""));
        for file in &ctx.loaded_files {
            println!("  - {file}");
        }
    }
    println!();
}
