//! Discovered scripts, keyed by filename.
//!
//! Every [`rescan`](ScriptRegistry::rescan) builds a complete new map and
//! swaps it in; readers holding a [`snapshot`](ScriptRegistry::snapshot)
//! keep the previous one. There is no incremental update.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::ScriptEngine;
use crate::error::DiscoveryError;
use crate::metadata::MetadataExtractor;

/// Filename of the script written by [`seed_example_script`].
pub const EXAMPLE_SCRIPT_NAME: &str = "hello_world.lua";

const EXAMPLE_SCRIPT: &str = r#"-- Description: Prints a greeting and the host details

print("Hello from scriptdock!")
print("Host API version: " .. HOST_API_VERSION)
print("Running " .. SCRIPT_NAME)

if project then
    local info = project()
    print("Project: " .. tostring(info.name))
end
"#;

/// One discovered script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    /// Filename, unique within the directory.
    pub id: String,
    /// Human-friendly name.
    pub display_name: String,
    /// Absolute path.
    pub source_path: PathBuf,
    /// Declared or generic description.
    pub description: String,
    /// Full text as of the last rescan.
    pub content: String,
}

/// Which files count as scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLayout {
    /// Extension without the dot.
    pub extension: String,
    /// Filenames starting with this are ignored.
    pub reserved_prefix: String,
}

impl Default for ScriptLayout {
    fn default() -> Self {
        Self {
            extension: "lua".to_string(),
            reserved_prefix: "__".to_string(),
        }
    }
}

impl ScriptLayout {
    /// Whether `file_name` is a script under this layout.
    #[must_use]
    pub fn matches(&self, file_name: &str) -> bool {
        if !self.reserved_prefix.is_empty() && file_name.starts_with(&self.reserved_prefix) {
            return false;
        }
        file_name
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| !stem.is_empty() && ext == self.extension)
    }
}

/// Outcome of one rescan.
#[derive(Debug, Default)]
pub struct RescanSummary {
    /// Scripts in the new snapshot.
    pub loaded: usize,
    /// Candidates left out, with the reason.
    pub skipped: Vec<DiscoveryError>,
}

/// An immutable view of the registry.
pub type Snapshot = Arc<BTreeMap<String, ScriptEntry>>;

/// Maps filenames to [`ScriptEntry`] for one directory.
pub struct ScriptRegistry {
    directory: PathBuf,
    layout: ScriptLayout,
    extractor: MetadataExtractor,
    engine: Arc<dyn ScriptEngine>,
    scripts: Snapshot,
}

impl fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRegistry")
            .field("directory", &self.directory)
            .field("layout", &self.layout)
            .field("scripts", &self.scripts.len())
            .finish_non_exhaustive()
    }
}

impl ScriptRegistry {
    /// Create an empty registry. Call [`rescan`](Self::rescan) to populate it.
    #[must_use]
    pub fn new(
        directory: impl Into<PathBuf>,
        layout: ScriptLayout,
        extractor: MetadataExtractor,
        engine: Arc<dyn ScriptEngine>,
    ) -> Self {
        Self {
            directory: directory.into(),
            layout,
            extractor,
            engine,
            scripts: Arc::default(),
        }
    }

    /// Re-enumerate the directory and replace the registry contents.
    ///
    /// A missing directory yields an empty registry. Unreadable or
    /// non-compiling files, and files whose names are not valid UTF-8, are
    /// skipped and reported in the summary.
    pub fn rescan(&mut self) -> RescanSummary {
        let mut summary = RescanSummary::default();
        let mut next = BTreeMap::new();

        let (candidates, invalid) = self.candidates();
        for e in invalid {
            warn!(path = %e.path().display(), error = %e, "Skipping script");
            summary.skipped.push(e);
        }

        for (file_name, path) in candidates {
            match self.load_entry(&file_name, &path) {
                Ok(entry) => {
                    next.insert(file_name, entry);
                },
                Err(e) => {
                    warn!(path = %e.path().display(), error = %e, "Skipping script");
                    summary.skipped.push(e);
                },
            }
        }

        summary.loaded = next.len();
        self.scripts = Arc::new(next);

        info!(
            directory = %self.directory.display(),
            loaded = summary.loaded,
            skipped = summary.skipped.len(),
            "Scripts rescanned"
        );
        summary
    }

    /// Direct children matching the layout, sorted by filename, and the
    /// matching children whose names are not valid UTF-8.
    fn candidates(&self) -> (Vec<(String, PathBuf)>, Vec<DiscoveryError>) {
        let entries = match std::fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(directory = %self.directory.display(), "Scripts directory does not exist");
                return (Vec::new(), Vec::new());
            },
            Err(e) => {
                warn!(
                    directory = %self.directory.display(),
                    error = %e,
                    "Failed to read scripts directory"
                );
                return (Vec::new(), Vec::new());
            },
        };

        let mut found = Vec::new();
        let mut invalid = Vec::new();
        for entry in entries.filter_map(Result::ok) {
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(file_name) => {
                    if self.layout.matches(&file_name) {
                        found.push((file_name, entry.path()));
                    }
                },
                Err(raw) => {
                    if self.layout.matches(&raw.to_string_lossy()) {
                        invalid.push(DiscoveryError::InvalidName { path: entry.path() });
                    }
                },
            }
        }
        found.sort();
        invalid.sort_by(|a, b| a.path().cmp(b.path()));
        (found, invalid)
    }

    fn load_entry(&self, file_name: &str, path: &Path) -> Result<ScriptEntry, DiscoveryError> {
        let content = std::fs::read_to_string(path).map_err(|source| DiscoveryError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        self.engine
            .validate(&path.display().to_string(), &content)
            .map_err(|f| DiscoveryError::Syntax {
                path: path.to_path_buf(),
                message: f.message,
            })?;

        let meta = self.extractor.extract(file_name, &content);
        let source_path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        Ok(ScriptEntry {
            id: file_name.to_string(),
            display_name: meta.display_name,
            source_path,
            description: meta.description,
            content,
        })
    }

    /// Look up a script by filename.
    #[must_use]
    pub fn get(&self, file_name: &str) -> Option<&ScriptEntry> {
        self.scripts.get(file_name)
    }

    /// All scripts in filename order.
    pub fn all(&self) -> impl Iterator<Item = &ScriptEntry> {
        self.scripts.values()
    }

    /// A cheap, immutable copy of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.scripts)
    }

    /// Number of scripts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Whether no scripts are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Source paths of every registered script.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.scripts
            .values()
            .map(|e| e.source_path.clone())
            .collect()
    }

    /// The watched directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// Create `directory` and write an example script into it.
///
/// Returns the path written, or `None` if the example already exists.
///
/// # Errors
///
/// Returns an I/O error if the directory or file cannot be created.
pub fn seed_example_script(directory: &Path) -> std::io::Result<Option<PathBuf>> {
    std::fs::create_dir_all(directory)?;
    let path = directory.join(EXAMPLE_SCRIPT_NAME);

    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
    {
        Ok(mut file) => {
            use std::io::Write;
            file.write_all(EXAMPLE_SCRIPT.as_bytes())?;
            info!(path = %path.display(), "Created example script");
            Ok(Some(path))
        },
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::engine::LuaEngine;

    fn registry(dir: &Path) -> ScriptRegistry {
        ScriptRegistry::new(
            dir,
            ScriptLayout::default(),
            MetadataExtractor::default(),
            Arc::new(LuaEngine::new().unwrap()),
        )
    }

    #[test]
    fn test_layout_matching() {
        let layout = ScriptLayout::default();
        assert!(layout.matches("stats.lua"));
        assert!(!layout.matches("__init__.lua"));
        assert!(!layout.matches("notes.txt"));
        assert!(!layout.matches("stats.lua.bak"));
        assert!(!layout.matches(".lua"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir.path().join("nope"));
        let summary = reg.rescan();
        assert_eq!(summary.loaded, 0);
        assert!(summary.skipped.is_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_rescan_filters_and_extracts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("layer_stats.lua"),
            "-- Description: Computes totals\nprint(1)\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("__private.lua"), "print(1)").unwrap();
        std::fs::write(dir.path().join("readme.md"), "# hi").unwrap();
        std::fs::create_dir(dir.path().join("nested.lua")).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("deep.lua"), "print(1)").unwrap();

        let mut reg = registry(dir.path());
        let summary = reg.rescan();

        assert_eq!(summary.loaded, 1);
        let entry = reg.get("layer_stats.lua").unwrap();
        assert_eq!(entry.id, "layer_stats.lua");
        assert_eq!(entry.display_name, "Layer Stats");
        assert_eq!(entry.description, "Computes totals");
        assert!(entry.source_path.is_absolute());
        assert!(entry.content.contains("print(1)"));
    }

    #[test]
    fn test_syntax_errors_are_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("good.lua"), "return 1").unwrap();
        std::fs::write(dir.path().join("bad.lua"), "function (").unwrap();

        let mut reg = registry(dir.path());
        let summary = reg.rescan();

        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.skipped.len(), 1);
        assert!(matches!(summary.skipped[0], DiscoveryError::Syntax { .. }));
        assert!(summary.skipped[0].path().ends_with("bad.lua"));
        assert!(reg.get("bad.lua").is_none());
    }

    #[test]
    fn test_invalid_utf8_is_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("binary.lua"), [0xff, 0xfe, 0x00]).unwrap();

        let mut reg = registry(dir.path());
        let summary = reg.rescan();
        assert_eq!(summary.loaded, 0);
        assert!(matches!(summary.skipped[0], DiscoveryError::Read { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_file_name_is_reported() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let raw = dir.path().join(OsStr::from_bytes(b"caf\xe9.lua"));
        std::fs::write(&raw, "return 1").unwrap();
        std::fs::write(dir.path().join(OsStr::from_bytes(b"\xff.txt")), "x").unwrap();
        std::fs::write(dir.path().join("ok.lua"), "return 1").unwrap();

        let mut reg = registry(dir.path());
        let summary = reg.rescan();

        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.skipped.len(), 1);
        assert!(matches!(summary.skipped[0], DiscoveryError::InvalidName { .. }));
        assert_eq!(summary.skipped[0].path(), raw.as_path());
        assert!(summary.skipped[0].to_string().contains("not valid UTF-8"));
    }

    #[test]
    fn test_all_is_lexicographic_and_snapshot_is_stable() {
        let dir = TempDir::new().unwrap();
        for name in ["b.lua", "a.lua", "c.lua"] {
            std::fs::write(dir.path().join(name), "return 1").unwrap();
        }

        let mut reg = registry(dir.path());
        reg.rescan();
        let ids: Vec<_> = reg.all().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a.lua", "b.lua", "c.lua"]);

        let before = reg.snapshot();
        std::fs::remove_file(dir.path().join("b.lua")).unwrap();
        reg.rescan();
        assert_eq!(before.len(), 3);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.paths().len(), 2);
    }

    #[test]
    fn test_seed_example_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let scripts = dir.path().join("scripts");

        let written = seed_example_script(&scripts).unwrap().unwrap();
        assert!(written.ends_with(EXAMPLE_SCRIPT_NAME));

        std::fs::write(&written, "-- mine").unwrap();
        assert!(seed_example_script(&scripts).unwrap().is_none());
        assert_eq!(std::fs::read_to_string(&written).unwrap(), "-- mine");
    }

    #[test]
    fn test_seeded_example_is_valid() {
        let dir = TempDir::new().unwrap();
        seed_example_script(dir.path()).unwrap();
        let mut reg = registry(dir.path());
        reg.rescan();
        let entry = reg.get(EXAMPLE_SCRIPT_NAME).unwrap();
        assert_eq!(entry.display_name, "Hello World");
        assert_eq!(entry.description, "Prints a greeting and the host details");
    }
}
