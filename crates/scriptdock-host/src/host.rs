//! The script host: owns the registry, executor and hot-reload pipeline.
//!
//! ```text
//! ChangeWatcher ──mpsc──▶ ReloadDebouncer ──quiet──▶ reload()
//!                                                      ├─ ScriptRegistry::rescan
//!                                                      ├─ ChangeWatcher::watch_files
//!                                                      └─ watch::Sender<ReloadSummary>
//! run(file) ──▶ Executor::run ──▶ ExecutionResult
//! ```
//!
//! The registry mutex is held for the whole of a rescan and the whole of a
//! run, so the two never interleave.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bindings::HostBindings;
use crate::debounce::{DEFAULT_DEBOUNCE, ReloadDebouncer};
use crate::engine::{LuaEngine, ScriptEngine};
use crate::error::{HostError, HostResult};
use crate::executor::{ConfirmPrompt, ExecutionResult, Executor, RunOptions};
use crate::metadata::MetadataExtractor;
use crate::registry::{
    RescanSummary, ScriptEntry, ScriptLayout, ScriptRegistry, Snapshot, seed_example_script,
};
use crate::risk::RiskScanner;
use crate::watcher::ChangeWatcher;

/// Everything needed to build a [`ScriptHost`].
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// The scripts directory.
    pub directory: PathBuf,
    /// Which files count as scripts.
    pub layout: ScriptLayout,
    /// Description extraction rules.
    pub extractor: MetadataExtractor,
    /// Risk patterns.
    pub scanner: RiskScanner,
    /// Capability bindings for every run.
    pub bindings: HostBindings,
    /// Quiet interval for hot reload.
    pub debounce: Duration,
}

impl HostOptions {
    /// Defaults for everything except the directory.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            layout: ScriptLayout::default(),
            extractor: MetadataExtractor::default(),
            scanner: RiskScanner::default(),
            bindings: HostBindings::default(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Published after every rescan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    /// Increments on every rescan; the initial scan is generation 1.
    pub generation: u64,
    /// Scripts in the registry.
    pub scripts: usize,
    /// Candidates skipped in that rescan.
    pub skipped: usize,
}

struct HostShared {
    registry: Mutex<ScriptRegistry>,
    executor: Executor,
    watcher: Mutex<Option<ChangeWatcher>>,
    updates: watch::Sender<ReloadSummary>,
}

impl HostShared {
    fn lock_registry(&self) -> MutexGuard<'_, ScriptRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_watcher(&self) -> MutexGuard<'_, Option<ChangeWatcher>> {
        self.watcher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reload(&self) -> RescanSummary {
        let mut registry = self.lock_registry();
        let summary = registry.rescan();

        if let Some(watcher) = self.lock_watcher().as_mut() {
            watcher.watch_files(&registry.paths());
        }

        self.updates.send_modify(|s| {
            s.generation = s.generation.saturating_add(1);
            s.scripts = summary.loaded;
            s.skipped = summary.skipped.len();
        });
        summary
    }
}

struct WatchHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// A hot-reloading script host for one directory.
///
/// Several hosts may coexist; each owns its registry, watcher and task.
pub struct ScriptHost {
    directory: PathBuf,
    debounce: Duration,
    shared: Arc<HostShared>,
    watch: Option<WatchHandle>,
}

impl std::fmt::Debug for ScriptHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptHost")
            .field("directory", &self.directory)
            .field("debounce", &self.debounce)
            .field("watching", &self.is_watching())
            .finish_non_exhaustive()
    }
}

impl ScriptHost {
    /// Build a host and perform the initial scan.
    #[must_use]
    pub fn create(
        options: HostOptions,
        engine: Arc<dyn ScriptEngine>,
        confirm: Box<dyn ConfirmPrompt>,
    ) -> Self {
        let HostOptions {
            directory,
            layout,
            extractor,
            scanner,
            bindings,
            debounce,
        } = options;

        let registry = ScriptRegistry::new(directory.clone(), layout, extractor, Arc::clone(&engine));
        let executor = Executor::new(engine, scanner, bindings, confirm);
        let (updates, _) = watch::channel(ReloadSummary::default());

        let host = Self {
            directory,
            debounce,
            shared: Arc::new(HostShared {
                registry: Mutex::new(registry),
                executor,
                watcher: Mutex::new(None),
                updates,
            }),
            watch: None,
        };
        host.shared.reload();
        host
    }

    /// Build a host backed by a new [`LuaEngine`].
    ///
    /// # Errors
    ///
    /// Returns [`HostError::EngineInit`] if the Lua VM cannot be created.
    pub fn with_lua(options: HostOptions, confirm: Box<dyn ConfirmPrompt>) -> HostResult<Self> {
        let engine = Arc::new(LuaEngine::new()?);
        Ok(Self::create(options, engine, confirm))
    }

    /// The scripts directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Name of the scripting engine.
    #[must_use]
    pub fn engine_name(&self) -> String {
        self.shared.executor.engine().name()
    }

    /// API version exposed to scripts.
    #[must_use]
    pub fn api_version(&self) -> &str {
        self.shared.executor.bindings().version()
    }

    /// Write the example script if it does not exist yet, then rescan.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or file cannot be created.
    pub fn seed_example(&self) -> HostResult<Option<PathBuf>> {
        let written = seed_example_script(&self.directory)?;
        if written.is_some() {
            self.shared.reload();
        }
        Ok(written)
    }

    /// Rescan now, bypassing the debouncer.
    pub fn reload(&self) -> RescanSummary {
        self.shared.reload()
    }

    /// The current registry contents.
    #[must_use]
    pub fn scripts(&self) -> Snapshot {
        self.shared.lock_registry().snapshot()
    }

    /// One script by filename.
    #[must_use]
    pub fn get(&self, file_name: &str) -> Option<ScriptEntry> {
        self.shared.lock_registry().get(file_name).cloned()
    }

    /// Receive a [`ReloadSummary`] after every rescan.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ReloadSummary> {
        self.shared.updates.subscribe()
    }

    /// Run a registered script.
    ///
    /// Blocks until the script finishes; a rescan waiting on the registry
    /// lock runs afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ScriptNotFound`] if `file_name` is not in the
    /// registry. Script failures are reported inside the result.
    pub fn run(&self, file_name: &str, options: &RunOptions) -> HostResult<ExecutionResult> {
        let registry = self.shared.lock_registry();
        let path = registry
            .get(file_name)
            .map(|e| e.source_path.clone())
            .ok_or_else(|| HostError::ScriptNotFound(file_name.to_string()))?;

        info!(script = %file_name, "Running script");
        let result = self.shared.executor.run(&path, options);
        drop(registry);
        Ok(result)
    }

    /// Whether hot reload is active.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Start hot reload. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if already watching, if there is no runtime, or if
    /// the platform watcher cannot be created.
    pub fn start_watching(&mut self) -> HostResult<()> {
        if self.watch.is_some() {
            return Err(HostError::AlreadyWatching(self.directory.clone()));
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| HostError::Watch(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = ChangeWatcher::new(self.directory.clone(), tx)?;
        {
            let registry = self.shared.lock_registry();
            watcher.watch_files(&registry.paths());
            *self.shared.lock_watcher() = Some(watcher);
        }

        let cancel = CancellationToken::new();
        let shared = Arc::clone(&self.shared);
        let debouncer = ReloadDebouncer::new(self.debounce);
        let task = runtime.spawn(debouncer.run(rx, cancel.clone(), move |trigger| {
            let shared = Arc::clone(&shared);
            async move {
                match tokio::task::spawn_blocking(move || shared.reload()).await {
                    Ok(summary) => info!(
                        trigger,
                        scripts = summary.loaded,
                        skipped = summary.skipped.len(),
                        "Scripts reloaded"
                    ),
                    Err(e) => warn!(error = %e, "Reload task failed"),
                }
            }
        }));

        info!(
            directory = %self.directory.display(),
            debounce_ms = self.debounce.as_millis(),
            "Hot reload started"
        );
        self.watch = Some(WatchHandle { cancel, task });
        Ok(())
    }

    /// Stop hot reload and release the watcher. A pending trigger is dropped.
    pub async fn stop_watching(&mut self) {
        if let Some(handle) = self.watch.take() {
            handle.cancel.cancel();
            if let Err(e) = handle.task.await {
                warn!(error = %e, "Debouncer task ended abnormally");
            }
        }
        let watcher = self.shared.lock_watcher().take();
        if let Some(watcher) = watcher {
            watcher.dispose();
        }
    }

    /// Stop watching and release every resource the host holds.
    pub async fn dispose(mut self) {
        self.stop_watching().await;
        debug!(directory = %self.directory.display(), "Host disposed");
    }
}

impl Drop for ScriptHost {
    fn drop(&mut self) {
        if let Some(handle) = self.watch.take() {
            handle.cancel.cancel();
        }
        self.shared.lock_watcher().take();
    }
}
