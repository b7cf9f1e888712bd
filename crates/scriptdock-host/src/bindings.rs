//! Host capability bindings injected into each script namespace.
//!
//! The host never interprets these values. The embedding application builds
//! a [`HostBindings`] once and the engine converts every entry into the
//! script's environment on each run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Version string exposed to scripts as `HOST_API_VERSION`.
pub const DEFAULT_API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A host function callable from scripts.
///
/// Arguments arrive already converted; an `Err` is raised as a script error.
pub type BindingFn = Arc<dyn Fn(&[BindingValue]) -> Result<BindingValue, String> + Send + Sync>;

/// A value that can cross the host/script boundary.
#[derive(Clone)]
pub enum BindingValue {
    /// `nil`.
    Nil,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    Text(String),
    /// A table with string keys.
    Table(BTreeMap<String, BindingValue>),
    /// A callable.
    Function(BindingFn),
}

impl BindingValue {
    /// Wrap a closure as a function value.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[BindingValue]) -> Result<BindingValue, String> + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    /// The string contents, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Lossy rendering used by bindings that print their arguments.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Self::Nil => "nil".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
            Self::Table(_) => "table".to_string(),
            Self::Function(_) => "function".to_string(),
        }
    }
}

impl fmt::Debug for BindingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("Nil"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Table(t) => f.debug_tuple("Table").field(t).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl PartialEq for BindingValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Table(a), Self::Table(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for BindingValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for BindingValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for BindingValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for BindingValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<BTreeMap<String, BindingValue>> for BindingValue {
    fn from(t: BTreeMap<String, BindingValue>) -> Self {
        Self::Table(t)
    }
}

/// Named values every script sees, plus the API version.
#[derive(Debug, Clone, PartialEq)]
pub struct HostBindings {
    version: String,
    entries: BTreeMap<String, BindingValue>,
}

impl Default for HostBindings {
    fn default() -> Self {
        Self::new(DEFAULT_API_VERSION)
    }
}

impl HostBindings {
    /// Empty bindings with the given API version.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace a named binding.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<BindingValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add a named function binding.
    #[must_use]
    pub fn with_function<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[BindingValue]) -> Result<BindingValue, String> + Send + Sync + 'static,
    {
        self.with(name, BindingValue::function(f))
    }

    /// Add or replace a named binding in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<BindingValue>) {
        self.entries.insert(name.into(), value.into());
    }

    /// The API version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Look up a binding.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BindingValue> {
        self.entries.get(name)
    }

    /// All bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BindingValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no bindings are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_lookup() {
        let bindings = HostBindings::new("2.0")
            .with("project_name", "demo")
            .with("debug", true)
            .with_function("double", |args| match args.first() {
                Some(BindingValue::Number(n)) => Ok(BindingValue::Number(n * 2.0)),
                _ => Err("expected a number".to_string()),
            });

        assert_eq!(bindings.version(), "2.0");
        assert_eq!(bindings.len(), 3);
        assert_eq!(
            bindings.get("project_name"),
            Some(&BindingValue::Text("demo".to_string()))
        );

        let Some(BindingValue::Function(double)) = bindings.get("double") else {
            panic!("expected function binding");
        };
        assert_eq!(
            double(&[BindingValue::Number(21.0)]).unwrap(),
            BindingValue::Number(42.0)
        );
        assert!(double(&[]).is_err());
    }

    #[test]
    fn test_iter_is_name_ordered() {
        let bindings = HostBindings::default().with("b", 1.0).with("a", 2.0);
        let names: Vec<_> = bindings.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_debug_hides_function_body() {
        let value = BindingValue::function(|_| Ok(BindingValue::Nil));
        assert_eq!(format!("{value:?}"), "Function(..)");
    }

    #[test]
    fn test_display() {
        assert_eq!(BindingValue::from("x").display(), "x");
        assert_eq!(BindingValue::Nil.display(), "nil");
        assert_eq!(BindingValue::Bool(false).display(), "false");
    }
}
