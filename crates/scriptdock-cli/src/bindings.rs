//! Capability bindings the CLI exposes to scripts.
//!
//! - `project()`: table with `name`, `root` and `scripts_dir`
//! - `notify(...)`: show a message to the user on stderr
//! - `log(level, message)`: write into the `script` tracing target

use std::collections::BTreeMap;
use std::path::Path;

use scriptdock_host::{BindingValue, HostBindings};
use tracing::{debug, error, info, trace, warn};

use crate::theme::Theme;

/// Build the bindings for scripts run from `project_root`.
pub(crate) fn cli_bindings(project_root: &Path, scripts_dir: &Path) -> HostBindings {
    let name = project_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut project = BTreeMap::new();
    project.insert("name".to_string(), BindingValue::Text(name));
    project.insert(
        "root".to_string(),
        BindingValue::Text(project_root.display().to_string()),
    );
    project.insert(
        "scripts_dir".to_string(),
        BindingValue::Text(scripts_dir.display().to_string()),
    );
    let project = BindingValue::Table(project);

    HostBindings::default()
        .with_function("project", move |_| Ok(project.clone()))
        .with_function("notify", |args| {
            let message = join(args);
            eprintln!("{}", Theme::info(&message));
            info!(target: "script", text = %message, "Script notification");
            Ok(BindingValue::Nil)
        })
        .with_function("log", |args| {
            let level = args.first().and_then(BindingValue::as_text).unwrap_or("info");
            let message = args.get(1..).map(join).unwrap_or_default();
            log_at(level, &message).map(|()| BindingValue::Nil)
        })
}

fn join(args: &[BindingValue]) -> String {
    args.iter()
        .map(BindingValue::display)
        .collect::<Vec<_>>()
        .join(" ")
}

fn log_at(level: &str, message: &str) -> Result<(), String> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => trace!(target: "script", "{message}"),
        "debug" => debug!(target: "script", "{message}"),
        "info" => info!(target: "script", "{message}"),
        "warn" | "warning" => warn!(target: "script", "{message}"),
        "error" => error!(target: "script", "{message}"),
        other => return Err(format!("unknown log level '{other}'")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(bindings: &HostBindings, name: &str, args: &[BindingValue]) -> Result<BindingValue, String> {
        match bindings.get(name) {
            Some(BindingValue::Function(f)) => f(args),
            other => panic!("{name} is not a function: {other:?}"),
        }
    }

    #[test]
    fn test_project_table() {
        let bindings = cli_bindings(Path::new("/work/demo"), Path::new("/work/demo/scripts"));
        let BindingValue::Table(project) = call(&bindings, "project", &[]).unwrap() else {
            panic!("project() should return a table");
        };
        assert_eq!(project["name"], BindingValue::from("demo"));
        assert_eq!(project["root"], BindingValue::from("/work/demo"));
        assert_eq!(project["scripts_dir"], BindingValue::from("/work/demo/scripts"));
    }

    #[test]
    fn test_log_levels() {
        let bindings = cli_bindings(Path::new("/p"), Path::new("/p/s"));
        assert_eq!(
            call(&bindings, "log", &["warn".into(), "careful".into()]).unwrap(),
            BindingValue::Nil
        );
        assert!(call(&bindings, "log", &["loud".into(), "x".into()]).is_err());
        assert!(call(&bindings, "log", &[]).is_ok());
    }

    #[test]
    fn test_notify_returns_nil() {
        let bindings = cli_bindings(Path::new("/p"), Path::new("/p/s"));
        assert_eq!(
            call(&bindings, "notify", &["done".into(), 3.0.into()]).unwrap(),
            BindingValue::Nil
        );
    }

    #[test]
    fn test_join_renders_values() {
        assert_eq!(
            join(&[BindingValue::from("a"), BindingValue::Bool(true), BindingValue::Nil]),
            "a true nil"
        );
    }
}
