//! Advisory static scan for risky constructs.
//!
//! This is a plain substring match. It is not a sandbox and does not parse
//! the script; obfuscated code passes straight through.

/// A needle and the reason it is considered risky.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskPattern {
    /// Case-sensitive substring searched for.
    pub needle: String,
    /// Short human-readable reason.
    pub reason: String,
}

impl RiskPattern {
    /// Create a pattern.
    #[must_use]
    pub fn new(needle: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
            reason: reason.into(),
        }
    }
}

/// Default Lua patterns, in reporting order.
pub const DEFAULT_PATTERNS: &[(&str, &str)] = &[
    ("os.execute", "runs a shell command"),
    ("os.exit", "tries to terminate the host process"),
    ("io.popen", "spawns a child process"),
    ("loadstring", "evaluates dynamically built code"),
    ("load(", "evaluates dynamically built code"),
    ("dofile", "executes another file"),
    ("loadfile", "loads code from another file"),
    ("package.loadlib", "loads a native library"),
];

/// Scans script text against an ordered list of patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskScanner {
    patterns: Vec<RiskPattern>,
}

impl Default for RiskScanner {
    fn default() -> Self {
        Self::new(
            DEFAULT_PATTERNS
                .iter()
                .map(|(needle, reason)| RiskPattern::new(*needle, *reason)),
        )
    }
}

impl RiskScanner {
    /// Create a scanner. Patterns are reported in the order given.
    #[must_use]
    pub fn new(patterns: impl IntoIterator<Item = RiskPattern>) -> Self {
        Self {
            patterns: patterns.into_iter().collect(),
        }
    }

    /// One `"<needle>: <reason>"` warning per pattern found in `source`.
    #[must_use]
    pub fn scan(&self, source: &str) -> Vec<String> {
        self.patterns
            .iter()
            .filter(|p| !p.needle.is_empty() && source.contains(&p.needle))
            .map(|p| format!("{}: {}", p.needle, p.reason))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_script_has_no_warnings() {
        let scanner = RiskScanner::default();
        assert!(scanner.scan("print('hello')\nreturn 1\n").is_empty());
    }

    #[test]
    fn test_warnings_follow_declared_order() {
        let scanner = RiskScanner::default();
        let source = "local f = io.popen('ls')\nos.execute('rm -rf /tmp/x')\nos.exit(1)\n";
        assert_eq!(
            scanner.scan(source),
            vec![
                "os.execute: runs a shell command".to_string(),
                "os.exit: tries to terminate the host process".to_string(),
                "io.popen: spawns a child process".to_string(),
            ]
        );
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let scanner = RiskScanner::default();
        assert!(scanner.scan("OS.EXECUTE('x')").is_empty());
    }

    #[test]
    fn test_one_warning_per_pattern() {
        let scanner = RiskScanner::default();
        let warnings = scanner.scan("dofile('a.lua')\ndofile('b.lua')\n");
        assert_eq!(warnings, vec!["dofile: executes another file".to_string()]);
    }

    #[test]
    fn test_custom_patterns() {
        let scanner = RiskScanner::new([RiskPattern::new("require", "pulls in modules")]);
        assert_eq!(
            scanner.scan("local m = require('m')"),
            vec!["require: pulls in modules".to_string()]
        );
        assert!(scanner.scan("os.execute('x')").is_empty());
    }

    #[test]
    fn test_empty_needle_never_matches() {
        let scanner = RiskScanner::new([RiskPattern::new("", "everything")]);
        assert!(scanner.scan("anything").is_empty());
    }
}
