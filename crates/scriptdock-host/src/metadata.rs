//! Script metadata extraction.
//!
//! The display name comes from the filename alone; the description comes
//! from the first recognised label line in the source. Labels are tried in
//! their declared order and the first label with any occurrence wins, so a
//! script quoting another script's `Beschreibung:` line inside a comment
//! still resolves to its own `Description:`.

use std::path::Path;

use regex::Regex;
use tracing::warn;

/// Default description labels, in priority order.
pub const DEFAULT_LABELS: &[&str] = &[
    "Description:",
    "Descrição:",
    "Descripción:",
    "Beschreibung:",
];

/// Description used when a script declares none.
pub const DEFAULT_GENERIC_DESCRIPTION: &str = "Lua script";

/// Filename characters turned into spaces in display names.
const NAME_SEPARATORS: &[char] = &['_', '-'];

/// Quote characters stripped from both ends of a description.
const QUOTE_CHARS: &[char] = &['"', '\''];

/// Metadata derived from one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptMetadata {
    /// Human-friendly name derived from the filename.
    pub display_name: String,
    /// Description from the source, or the generic description.
    pub description: String,
}

#[derive(Debug, Clone)]
struct LabelPattern {
    label: String,
    regex: Regex,
}

/// Extracts display names and descriptions. Pure; never fails.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    labels: Vec<LabelPattern>,
    generic_description: String,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_LABELS.iter().copied(), DEFAULT_GENERIC_DESCRIPTION)
    }
}

impl MetadataExtractor {
    /// Build an extractor from labels in priority order.
    ///
    /// Labels match case-insensitively and literally (regex metacharacters
    /// in a label have no special meaning).
    #[must_use]
    pub fn new<I, S>(labels: I, generic_description: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels = labels
            .into_iter()
            .filter_map(|label| {
                let label = label.into();
                let pattern = format!(r"(?i){}[ \t]*([^\r\n]*)", regex::escape(&label));
                match Regex::new(&pattern) {
                    Ok(regex) => Some(LabelPattern { label, regex }),
                    Err(e) => {
                        warn!(label = %label, error = %e, "Ignoring unusable description label");
                        None
                    },
                }
            })
            .collect();

        Self {
            labels,
            generic_description: generic_description.into(),
        }
    }

    /// Labels in the order they are tried.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|l| l.label.as_str())
    }

    /// Derive metadata for `file_name` with contents `source`.
    #[must_use]
    pub fn extract(&self, file_name: &str, source: &str) -> ScriptMetadata {
        ScriptMetadata {
            display_name: display_name(file_name),
            description: self.description(source),
        }
    }

    /// The description declared in `source`, or the generic description.
    #[must_use]
    pub fn description(&self, source: &str) -> String {
        let found = self
            .labels
            .iter()
            .find_map(|l| l.regex.captures(source))
            .and_then(|caps| caps.get(1))
            .map(|m| clean_description(m.as_str()))
            .filter(|d| !d.is_empty());

        found.map_or_else(|| self.generic_description.clone(), str::to_owned)
    }
}

/// Turn `layer_stats.lua` into `Layer Stats`.
///
/// Strips the extension, replaces separators with spaces and title-cases:
/// a letter is upper-cased when the previous character is not a letter and
/// lower-cased otherwise.
#[must_use]
pub fn display_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map_or_else(|| file_name.to_owned(), |s| s.to_string_lossy().into_owned());

    let mut out = String::with_capacity(stem.len());
    let mut prev_alpha = false;
    for c in stem.chars() {
        if NAME_SEPARATORS.contains(&c) {
            out.push(' ');
            prev_alpha = false;
        } else if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

fn clean_description(raw: &str) -> &str {
    let text = raw.trim();
    // `--[[ Description: ... ]]` on a single line.
    let text = text.strip_suffix("]]").unwrap_or(text);
    text.trim_matches(|c: char| c.is_whitespace() || QUOTE_CHARS.contains(&c))
}
