//! Filesystem change notification for the scripts directory.
//!
//! Watches the directory itself (files added, removed, renamed) and each
//! known script file (contents edited). Raw `notify` events are classified
//! on the notify thread and forwarded into an unbounded tokio channel; the
//! [`ReloadDebouncer`](crate::debounce::ReloadDebouncer) is the consumer.
//!
//! ```text
//! notify callback
//!   → classify (drop access / metadata-only events)
//!   → remember removed or renamed paths for re-arming
//!   → mpsc::UnboundedSender<ChangeEvent>
//! ```
//!
//! Editors that save by writing a temp file and renaming it over the
//! original invalidate the per-file watch. Those paths are re-armed on the
//! next [`watch_files`](ChangeWatcher::watch_files) call, which the host
//! makes after every rescan.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::HostResult;

/// What kind of change a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The directory listing changed.
    Directory,
    /// A file's contents changed.
    File,
}

/// A classified filesystem notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The path the notification was about.
    pub path: PathBuf,
    /// The kind of change.
    pub kind: ChangeKind,
}

/// Map a raw `notify` event to a [`ChangeEvent`], or `None` if it cannot
/// affect the registry.
#[must_use]
pub fn classify(event: &Event, directory: &Path) -> Option<ChangeEvent> {
    let kind = match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => {
            ChangeKind::Directory
        },
        EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Access(_) | EventKind::Other => {
            return None;
        },
        EventKind::Modify(_) | EventKind::Any => ChangeKind::File,
    };

    let path = event
        .paths
        .first()
        .cloned()
        .unwrap_or_else(|| directory.to_path_buf());
    Some(ChangeEvent { path, kind })
}

fn invalidates_watch(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    )
}

/// Watches one scripts directory and its script files.
pub struct ChangeWatcher {
    directory: PathBuf,
    /// Dropping this releases every OS watch handle.
    watcher: RecommendedWatcher,
    directory_armed: bool,
    files: BTreeSet<PathBuf>,
    /// Paths whose watch may have been invalidated, filled by the callback.
    stale: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("directory", &self.directory)
            .field("directory_armed", &self.directory_armed)
            .field("files", &self.files.len())
            .finish_non_exhaustive()
    }
}

impl ChangeWatcher {
    /// Create a watcher that forwards classified events into `events`.
    ///
    /// A missing directory is tolerated; it is armed on a later
    /// [`watch_files`](Self::watch_files) call once it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn new(
        directory: impl Into<PathBuf>,
        events: mpsc::UnboundedSender<ChangeEvent>,
    ) -> HostResult<Self> {
        let directory = directory.into();
        let stale = Arc::new(Mutex::new(BTreeSet::new()));

        let callback_dir = directory.clone();
        let callback_stale = Arc::clone(&stale);
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if invalidates_watch(&event.kind) {
                        callback_stale
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend(event.paths.iter().cloned());
                    }
                    if let Some(change) = classify(&event, &callback_dir) {
                        debug!(path = %change.path.display(), kind = ?change.kind, "Change detected");
                        let _ = events.send(change);
                    }
                },
                Err(e) => warn!(error = %e, "Filesystem watcher error"),
            },
            notify::Config::default(),
        )?;

        let mut this = Self {
            directory,
            watcher,
            directory_armed: false,
            files: BTreeSet::new(),
            stale,
        };
        this.arm_directory(false);
        Ok(this)
    }

    /// The watched directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Files currently watched individually.
    pub fn watched_files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    /// Whether the directory watch is active.
    #[must_use]
    pub fn is_directory_armed(&self) -> bool {
        self.directory_armed
    }

    /// Make the per-file watch set equal to `paths`, re-arming any watch
    /// invalidated since the last call.
    pub fn watch_files(&mut self, paths: &[PathBuf]) {
        let stale = std::mem::take(&mut *self.stale.lock().unwrap_or_else(PoisonError::into_inner));
        let wanted: BTreeSet<PathBuf> = paths.iter().cloned().collect();

        self.arm_directory(stale.contains(&self.directory));

        let dropped: Vec<PathBuf> = self.files.difference(&wanted).cloned().collect();
        for path in dropped {
            // The file may already be gone, taking its watch with it.
            let _ = self.watcher.unwatch(&path);
            self.files.remove(&path);
        }

        for path in wanted {
            let rearm = stale.contains(&path);
            if self.files.contains(&path) && !rearm {
                continue;
            }
            if rearm {
                let _ = self.watcher.unwatch(&path);
            }
            match self.watcher.watch(&path, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    self.files.insert(path);
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to watch script");
                    self.files.remove(&path);
                },
            }
        }
    }

    /// Release all OS watch handles.
    pub fn dispose(self) {
        debug!(directory = %self.directory.display(), "Watcher disposed");
        drop(self);
    }

    fn arm_directory(&mut self, force: bool) {
        if !self.directory.is_dir() {
            if self.directory_armed {
                debug!(directory = %self.directory.display(), "Scripts directory disappeared");
            }
            self.directory_armed = false;
            return;
        }
        if self.directory_armed && !force {
            return;
        }
        if self.directory_armed {
            let _ = self.watcher.unwatch(&self.directory);
        }

        match self.watcher.watch(&self.directory, RecursiveMode::NonRecursive) {
            Ok(()) => {
                info!(directory = %self.directory.display(), "Watching scripts directory");
                self.directory_armed = true;
            },
            Err(e) => {
                warn!(
                    directory = %self.directory.display(),
                    error = %e,
                    "Failed to watch scripts directory"
                );
                self.directory_armed = false;
            },
        }
    }
}
