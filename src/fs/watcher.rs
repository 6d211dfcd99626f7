use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use tokio::sync::mpsc;

/// Default patterns to ignore when watching the filesystem.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[".git", "node_modules", "target"];

/// Default flood threshold (events per debounce window).
pub const DEFAULT_FLOOD_THRESHOLD: usize = 100;

/// Change notification forwarded to the tree owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsChange {
    /// Changed paths, or just the root when the batch was too large.
    pub paths: Vec<PathBuf>,
}

/// Watches a root directory and asks for tree refreshes when it changes on disk.
pub struct FsWatcher {
    /// Whether the watcher is currently forwarding events.
    active: Arc<AtomicBool>,
    /// Handle to the debouncer (dropped to stop watching).
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
}

impl FsWatcher {
    /// Create a new FsWatcher that watches `root` recursively.
    ///
    /// Events are debounced by `debounce_duration` and sent via `change_tx`.
    /// Paths matching any of `ignore_patterns` are dropped. More than
    /// `flood_threshold` paths in one window collapse into a single root change.
    pub fn new(
        root: &Path,
        debounce_duration: Duration,
        ignore_patterns: Vec<String>,
        flood_threshold: usize,
        change_tx: mpsc::UnboundedSender<FsChange>,
    ) -> notify::Result<Self> {
        let active = Arc::new(AtomicBool::new(true));
        let active_clone = active.clone();
        let root_path = root.to_path_buf();

        let mut debouncer = new_debouncer(
            debounce_duration,
            move |result: Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
                if !active_clone.load(Ordering::Relaxed) {
                    return;
                }

                match result {
                    Ok(events) => {
                        let paths: Vec<PathBuf> = events
                            .iter()
                            .filter(|e| e.kind == DebouncedEventKind::Any)
                            .map(|e| e.path.clone())
                            .filter(|p| !should_ignore(p, &ignore_patterns))
                            .collect();

                        if let Some(change) = collapse(paths, flood_threshold, &root_path) {
                            let _ = change_tx.send(change);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "filesystem watcher error");
                    }
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(root, notify::RecursiveMode::Recursive)?;

        Ok(Self {
            active,
            _debouncer: debouncer,
        })
    }

    /// Drop change batches until [`FsWatcher::resume`]. Batches arriving while
    /// paused are discarded, not queued.
    pub fn pause(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.active.store(true, Ordering::Relaxed);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}

/// Turn a debounced batch into at most one change event.
fn collapse(paths: Vec<PathBuf>, flood_threshold: usize, root: &Path) -> Option<FsChange> {
    if paths.is_empty() {
        return None;
    }
    let paths = if paths.len() > flood_threshold {
        vec![root.to_path_buf()]
    } else {
        paths
    };
    Some(FsChange { paths })
}

/// A path is ignored if any of its components match any ignore pattern exactly.
pub fn should_ignore(path: &Path, patterns: &[String]) -> bool {
    path.components().any(|component| match component {
        std::path::Component::Normal(name) => {
            let name = name.to_string_lossy();
            patterns.iter().any(|p| name == p.as_str())
        }
        _ => false,
    })
}
