//! The file tree store: owns the root, the tree snapshot and the open file, and
//! runs every mutating operation against the filesystem adapter.
//!
//! All state sits behind one lock that is never held across an `.await`.
//! Operations that read or replace the open file's content (save, auto-save,
//! switching files, deleting the open file) additionally serialize on the
//! file gate, so an outgoing save always completes before new content lands.

pub mod autosave;
pub mod rename;
pub mod search;
#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::boundary::{DialogOptions, Dialogs, DirectoryPicker, TreeView};
use crate::editor::{looks_binary, mode_hint, EditorSurface};
use crate::effects::{EffectQueue, Notifier};
use crate::fs::{AccessMode, EntryKind, FsAdapter, Handle, Permission};
use crate::search::SearchState;
use crate::session::{Session, LAST_FILE_KEY, ROOT_KEY};
use crate::tree::{
    all_files, base_name, build_snapshot, find_node, parent_path, visible_items, RenameState,
    TreeNode, VisibleItem,
};

/// Timing and sizing knobs.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Periodic auto-save. Off in tests that count writes.
    pub autosave_enabled: bool,
    pub autosave_interval: Duration,
    /// Debounce for [`SelectMode::Delay`].
    pub select_delay: Duration,
    /// Bytes scanned for a NUL before a file is opened.
    pub binary_sniff_bytes: usize,
    pub page_size_fallback: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            autosave_enabled: true,
            autosave_interval: Duration::from_secs(5),
            select_delay: Duration::from_millis(750),
            binary_sniff_bytes: 1024,
            page_size_fallback: crate::search::DEFAULT_PAGE_SIZE,
        }
    }
}

/// How a selection should treat a file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    /// Load now, then move focus to the editor.
    Focus,
    /// Load now, keep focus on the tree item.
    Show,
    /// Load after the selection has settled (keyboard navigation).
    Delay,
}

/// Tree navigation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Collaborators injected at construction.
pub struct Services<A: FsAdapter> {
    pub fs: Arc<A>,
    pub dialogs: Arc<dyn Dialogs>,
    pub picker: Arc<dyn DirectoryPicker<A::Handle>>,
    pub view: Arc<dyn TreeView>,
    pub editor: Arc<dyn EditorSurface>,
    pub session: Session,
}

/// The file shown in the editor. `handle` is re-pointed at the matching tree
/// node after every refresh.
struct OpenFile<H> {
    handle: Handle<H>,
    path: String,
}

struct StoreState<H> {
    root: Option<Handle<H>>,
    /// Restored from the session but not yet permitted.
    pending_root: Option<Handle<H>>,
    tree: Vec<TreeNode<H>>,
    /// Bumped on every refresh.
    epoch: u64,
    current: Option<OpenFile<H>>,
    content: String,
    saved_content: String,
    dirty: bool,
    is_loading: bool,
    mode: &'static str,
    collapsed: BTreeSet<String>,
    search: SearchState,
    highlighted: Option<String>,
}

impl<H> Default for StoreState<H> {
    fn default() -> Self {
        Self {
            root: None,
            pending_root: None,
            tree: Vec::new(),
            epoch: 0,
            current: None,
            content: String::new(),
            saved_content: String::new(),
            dirty: false,
            is_loading: false,
            mode: "text",
            collapsed: BTreeSet::new(),
            search: SearchState::default(),
            highlighted: None,
        }
    }
}

struct Inner<A: FsAdapter> {
    services: Services<A>,
    settings: StoreSettings,
    state: Mutex<StoreState<A::Handle>>,
    notifier: Notifier,
    effects: Arc<EffectQueue>,
    file_gate: tokio::sync::Mutex<()>,
    select_generation: AtomicU64,
    pending_select: Mutex<Option<JoinHandle<()>>>,
    autosave: Mutex<Option<JoinHandle<()>>>,
}

/// Shared handle to the tree store. Cloning is cheap.
pub struct TreeStore<A: FsAdapter> {
    inner: Arc<Inner<A>>,
}

impl<A: FsAdapter> Clone for TreeStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: FsAdapter> TreeStore<A> {
    pub fn new(services: Services<A>, settings: StoreSettings) -> Self {
        let notifier = Notifier::new();
        let effects = Arc::new(EffectQueue::new(notifier.clone()));
        Self {
            inner: Arc::new(Inner {
                services,
                settings,
                state: Mutex::new(StoreState::default()),
                notifier,
                effects,
                file_gate: tokio::sync::Mutex::new(()),
                select_generation: AtomicU64::new(0),
                pending_select: Mutex::new(None),
                autosave: Mutex::new(None),
            }),
        }
    }

    // ── Observation ──────────────────────────────────────────────────────────

    /// Receiver that wakes on every observable change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.notifier.subscribe()
    }

    /// Deferred post-render effects.
    pub fn effects(&self) -> Arc<EffectQueue> {
        Arc::clone(&self.inner.effects)
    }

    /// Run pending effects. The rendering layer calls this once per pass.
    pub fn drain_effects(&self) -> usize {
        self.inner.effects.drain()
    }

    fn schedule<F>(&self, effect: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.effects.schedule(effect);
    }

    /// Mutate state and notify observers.
    fn update<R>(&self, f: impl FnOnce(&mut StoreState<A::Handle>) -> R) -> R {
        let result = f(&mut self.inner.state.lock());
        self.inner.notifier.notify();
        result
    }

    fn read<R>(&self, f: impl FnOnce(&StoreState<A::Handle>) -> R) -> R {
        f(&self.inner.state.lock())
    }

    pub fn has_root(&self) -> bool {
        self.read(|s| s.root.is_some())
    }

    /// Adapter handle of the open root.
    pub fn root(&self) -> Option<A::Handle> {
        self.read(|s| s.root.as_ref().map(|h| h.raw().clone()))
    }

    /// Copy of the current tree snapshot.
    pub fn tree(&self) -> Vec<TreeNode<A::Handle>> {
        self.read(|s| s.tree.clone())
    }

    /// Expansion-aware flattened rows.
    pub fn visible_items(&self) -> Vec<VisibleItem> {
        self.read(|s| visible_items(&s.tree, &s.collapsed))
    }

    pub fn node_kind(&self, path: &str) -> Option<EntryKind> {
        self.read(|s| find_node(&s.tree, path).map(|n| n.kind))
    }

    pub fn rename_state(&self, path: &str) -> Option<RenameState> {
        self.read(|s| find_node(&s.tree, path).map(|n| n.rename.clone()))
    }

    /// Path of the open file, if it is still in the tree.
    pub fn current_path(&self) -> Option<String> {
        self.read(|s| s.current.as_ref().map(|c| c.path.clone()))
    }

    pub fn content(&self) -> String {
        self.read(|s| s.content.clone())
    }

    pub fn is_dirty(&self) -> bool {
        self.read(|s| s.dirty)
    }

    pub fn is_loading(&self) -> bool {
        self.read(|s| s.is_loading)
    }

    /// Syntax mode of the open file.
    pub fn mode(&self) -> &'static str {
        self.read(|s| s.mode)
    }

    pub fn collapsed_paths(&self) -> BTreeSet<String> {
        self.read(|s| s.collapsed.clone())
    }

    pub fn highlighted_path(&self) -> Option<String> {
        self.read(|s| s.highlighted.clone())
    }

    pub fn search_state(&self) -> SearchState {
        self.read(|s| s.search.clone())
    }

    /// Whether a restored root is waiting for a permission grant.
    pub fn awaiting_permission(&self) -> bool {
        self.read(|s| s.pending_root.is_some())
    }

    // ── Handles and identity ─────────────────────────────────────────────────

    fn root_handle(&self) -> Option<Handle<A::Handle>> {
        self.read(|s| s.root.clone())
    }

    /// Handle of a directory by path; `""` is the root.
    fn dir_handle(&self, path: &str) -> Option<Handle<A::Handle>> {
        self.read(|s| {
            if path.is_empty() {
                return s.root.clone();
            }
            find_node(&s.tree, path)
                .filter(|n| n.is_dir())
                .map(|n| n.handle.clone())
        })
    }

    fn file_handle(&self, path: &str) -> Option<Handle<A::Handle>> {
        self.read(|s| {
            find_node(&s.tree, path)
                .filter(|n| !n.is_dir())
                .map(|n| n.handle.clone())
        })
    }

    /// Whether `handle` refers to the open file.
    ///
    /// Pointer identity answers without touching the adapter; anything else
    /// falls back to the adapter's same-entry predicate.
    pub async fn is_open_file(&self, handle: &Handle<A::Handle>) -> bool {
        let Some(current) = self.read(|s| s.current.as_ref().map(|c| c.handle.clone())) else {
            return false;
        };
        if current.same_object(handle) {
            return true;
        }
        self.inner
            .services
            .fs
            .is_same_entry(current.raw(), handle.raw())
            .await
    }

    async fn ensure_permission(&self, handle: &Handle<A::Handle>) -> bool {
        let fs = &self.inner.services.fs;
        match fs.query_permission(handle.raw(), AccessMode::Read).await {
            Permission::Granted => true,
            _ => fs.request_permission(handle.raw(), AccessMode::Read).await == Permission::Granted,
        }
    }

    // ── Root and refresh ─────────────────────────────────────────────────────

    /// Ask the user for a new root. A dismissed picker changes nothing.
    pub async fn open_directory(&self) -> bool {
        let Some(raw) = self.inner.services.picker.pick_directory().await else {
            debug!("directory picker dismissed");
            return false;
        };
        self.set_root(raw).await
    }

    /// Make `raw` the root, persist it, and load its tree.
    pub async fn set_root(&self, raw: A::Handle) -> bool {
        if !self.close_current_file().await {
            return false;
        }
        let session = &self.inner.services.session;
        session.save(ROOT_KEY, &raw).await;
        session.clear(LAST_FILE_KEY).await;
        let collapsed = BTreeSet::new();
        session.save_collapsed(&collapsed).await;

        self.update(|s| {
            s.root = Some(Handle::new(raw));
            s.pending_root = None;
            s.tree.clear();
            s.collapsed = collapsed;
            s.highlighted = None;
            s.search.close();
        });
        info!("opened directory");
        self.refresh_tree(None).await
    }

    /// Save (if dirty) and detach the open file.
    async fn close_current_file(&self) -> bool {
        let _gate = self.inner.file_gate.lock().await;
        if self.is_dirty() && !self.save_locked().await {
            self.alert_save_failed().await;
            return false;
        }
        self.detach_current();
        true
    }

    fn detach_current(&self) {
        self.update(|s| {
            s.current = None;
            s.content.clear();
            s.saved_content.clear();
            s.dirty = false;
            s.mode = "text";
        });
        self.stop_autosave();
        self.inner.services.editor.clear();
    }

    /// Rebuild the snapshot from disk.
    ///
    /// Without read permission (and no grant on request) the tree is left as
    /// is. When `focus_path` names a node of the new snapshot it is
    /// highlighted and focused after the next render.
    pub async fn refresh_tree(&self, focus_path: Option<&str>) -> bool {
        let Some(root) = self.root_handle() else {
            return false;
        };
        if !self.ensure_permission(&root).await {
            debug!("read permission not granted; tree left unchanged");
            return false;
        }
        let tree = match build_snapshot(self.inner.services.fs.as_ref(), root.raw()).await {
            Ok(tree) => tree,
            Err(e) if e.is_permission() => {
                debug!(error = %e, "listing not permitted; tree left unchanged");
                return false;
            }
            Err(e) => {
                error!(error = %e, "failed to list directory");
                self.alert(&format!("Could not read the folder: {}", e)).await;
                return false;
            }
        };

        let epoch = self.update(|s| {
            s.tree = tree;
            s.epoch += 1;
            s.epoch
        });
        debug!(epoch, "tree refreshed");
        self.reconcile_current(epoch).await;

        if let Some(path) = focus_path {
            if self.read(|s| find_node(&s.tree, path).is_some()) {
                self.update(|s| s.highlighted = Some(path.to_string()));
                let view = Arc::clone(&self.inner.services.view);
                let path = path.to_string();
                self.schedule(move || view.focus_item(&path));
            }
        }
        true
    }

    /// Re-find the open file in a fresh snapshot by same-entry comparison.
    async fn reconcile_current(&self, epoch: u64) {
        let Some((current, old_path, candidates)) = self.read(|s| {
            s.current.as_ref().map(|c| {
                let mut files: Vec<(String, Handle<A::Handle>)> = all_files(&s.tree)
                    .into_iter()
                    .map(|n| (n.path.clone(), n.handle.clone()))
                    .collect();
                // Most files keep their path; try that one first.
                files.sort_by_key(|(path, _)| *path != c.path);
                (c.handle.clone(), c.path.clone(), files)
            })
        }) else {
            return;
        };

        let fs = &self.inner.services.fs;
        let mut found = None;
        for (path, handle) in candidates {
            if fs.is_same_entry(current.raw(), handle.raw()).await {
                found = Some((path, handle));
                break;
            }
        }

        let Some((path, handle)) = found else {
            warn!(path = %old_path, "open file is no longer in the tree");
            return;
        };
        let moved = path != old_path;
        let applied = self.update(|s| {
            if s.epoch != epoch {
                return false;
            }
            if let Some(open) = s.current.as_mut() {
                if open.handle.same_object(&current) {
                    open.handle = handle.clone();
                    open.path = path.clone();
                    return true;
                }
            }
            false
        });
        if applied && moved {
            info!(from = %old_path, to = %path, "open file moved");
            self.inner
                .services
                .session
                .save(LAST_FILE_KEY, handle.raw())
                .await;
        }
    }

    // ── Selection and loading ────────────────────────────────────────────────

    /// Select a node. Directories are only highlighted.
    pub async fn select_node(&self, path: &str, mode: SelectMode) {
        self.cancel_pending_select();
        let Some(kind) = self.node_kind(path) else {
            return;
        };
        self.update(|s| s.highlighted = Some(path.to_string()));
        if kind == EntryKind::Directory {
            return;
        }
        match mode {
            SelectMode::Focus => {
                if self.load_file_content(path).await {
                    self.inner.services.editor.focus();
                }
            }
            SelectMode::Show => {
                self.load_file_content(path).await;
                let view = Arc::clone(&self.inner.services.view);
                let path = path.to_string();
                self.schedule(move || view.focus_item(&path));
            }
            SelectMode::Delay => self.schedule_delayed_load(path),
        }
    }

    fn schedule_delayed_load(&self, path: &str) {
        let generation = self.inner.select_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.settings.select_delay;
        let path = path.to_string();
        // The task cannot look at `pending_select` before its handle is stored.
        let mut pending = self.inner.pending_select.lock();
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            {
                let mut pending = inner.pending_select.lock();
                if inner.select_generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                // Fired: from here on the load runs to completion.
                pending.take();
            }
            TreeStore { inner }.load_file_content(&path).await;
        }));
    }

    /// Cancel a delayed load that has not fired yet. A load already in
    /// progress is left to finish.
    fn cancel_pending_select(&self) {
        let mut pending = self.inner.pending_select.lock();
        self.inner.select_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = pending.take() {
            task.abort();
        }
    }

    /// Open the file at `path` in the editor.
    ///
    /// A dirty open file is saved first; if that save fails the switch is
    /// abandoned. Files with a NUL in their first bytes need confirmation.
    pub async fn load_file_content(&self, path: &str) -> bool {
        let Some(handle) = self.file_handle(path) else {
            return false;
        };
        let _gate = self.inner.file_gate.lock().await;
        if self.is_dirty() && !self.save_locked().await {
            self.alert_save_failed().await;
            return false;
        }

        let fs = &self.inner.services.fs;
        match fs
            .read_head(handle.raw(), self.inner.settings.binary_sniff_bytes)
            .await
        {
            Ok(head) if looks_binary(&head) => {
                let message = format!(
                    "\"{}\" looks like a binary file. Open it anyway?",
                    base_name(path)
                );
                if !self
                    .inner
                    .services
                    .dialogs
                    .confirm(&message, DialogOptions::titled("Binary file"))
                    .await
                {
                    debug!(path, "binary file open declined");
                    return false;
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!(path, error = %e, "failed to read file");
                self.alert(&format!("Could not open \"{}\": {}", path, e)).await;
                return false;
            }
        }

        self.inner
            .services
            .session
            .save(LAST_FILE_KEY, handle.raw())
            .await;

        self.update(|s| s.is_loading = true);
        let bytes = match fs.read_all(handle.raw()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.update(|s| s.is_loading = false);
                error!(path, error = %e, "failed to read file");
                self.alert(&format!("Could not open \"{}\": {}", path, e)).await;
                return false;
            }
        };
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let mode = mode_hint(base_name(path));
        self.update(|s| {
            s.current = Some(OpenFile {
                handle,
                path: path.to_string(),
            });
            s.content = text.clone();
            s.saved_content = text.clone();
            s.dirty = false;
            s.is_loading = false;
            s.mode = mode;
        });
        self.inner.services.editor.show_document(&text, mode);
        self.restart_autosave();
        info!(path, "opened file");
        true
    }

    // ── Editing and saving ───────────────────────────────────────────────────

    /// Editor reports new text. Dirty tracks divergence from the saved text.
    pub fn set_content(&self, text: &str) {
        self.update(|s| {
            s.content = text.to_string();
            s.dirty = s.current.is_some() && s.content != s.saved_content;
        });
    }

    /// Select and scroll to a byte range in the editor.
    pub fn reveal_range(&self, range: Range<usize>) {
        self.inner.services.editor.reveal_range(range);
    }

    /// Write the editor content to the open file.
    ///
    /// Failures are logged and leave the file dirty so a later save retries.
    pub async fn save_file(&self) -> bool {
        let _gate = self.inner.file_gate.lock().await;
        self.save_locked().await
    }

    /// Save with the file gate already held.
    async fn save_locked(&self) -> bool {
        let Some((handle, path, snapshot)) = self.read(|s| {
            s.current
                .as_ref()
                .map(|c| (c.handle.clone(), c.path.clone(), s.content.clone()))
        }) else {
            return true;
        };
        match self
            .inner
            .services
            .fs
            .write_all(handle.raw(), snapshot.as_bytes())
            .await
        {
            Ok(()) => {
                self.update(|s| {
                    let still_open = s
                        .current
                        .as_ref()
                        .is_some_and(|c| c.handle.same_object(&handle));
                    if still_open {
                        s.saved_content = snapshot;
                        s.dirty = s.content != s.saved_content;
                    }
                });
                debug!(path = %path, "saved");
                true
            }
            Err(e) => {
                error!(path = %path, error = %e, "save failed");
                false
            }
        }
    }

    async fn alert_save_failed(&self) {
        let path = self.current_path().unwrap_or_default();
        self.alert(&format!(
            "Could not save \"{}\". Your changes are still in the editor.",
            path
        ))
        .await;
    }

    async fn alert(&self, message: &str) {
        self.inner
            .services
            .dialogs
            .alert(message, DialogOptions::default())
            .await;
    }

    // ── Navigation and collapse state ────────────────────────────────────────

    /// Move the highlight through the visible rows.
    pub async fn navigate(&self, direction: Direction) {
        let (items, index) = self.read(|s| {
            let items = visible_items(&s.tree, &s.collapsed);
            let index = s
                .highlighted
                .as_ref()
                .and_then(|h| items.iter().position(|i| &i.path == h));
            (items, index)
        });
        if items.is_empty() {
            return;
        }
        let last = items.len() - 1;

        let target = match direction {
            Direction::Up => Some(index.map_or(0, |i| i.saturating_sub(1))),
            Direction::Down => Some(index.map_or(0, |i| (i + 1).min(last))),
            Direction::Left => {
                let Some(i) = index else { return };
                let item = &items[i];
                if item.kind == EntryKind::Directory && item.is_expanded {
                    self.set_collapsed(&item.path, true).await;
                    None
                } else {
                    parent_path(&item.path)
                        .and_then(|p| items.iter().position(|row| row.path == p))
                }
            }
            Direction::Right => {
                let Some(i) = index else { return };
                let item = &items[i];
                match (item.kind, item.is_expanded) {
                    (EntryKind::Directory, false) => {
                        self.set_collapsed(&item.path, false).await;
                        None
                    }
                    (EntryKind::Directory, true) => (i < last).then_some(i + 1),
                    _ => None,
                }
            }
        };

        let Some(target) = target else { return };
        if Some(target) == index {
            return;
        }
        let path = items[target].path.clone();
        self.select_node(&path, SelectMode::Delay).await;
        let view = Arc::clone(&self.inner.services.view);
        self.schedule(move || view.reveal_item(&path));
    }

    /// Flip a directory between collapsed and expanded.
    pub async fn toggle_collapsed(&self, path: &str) {
        let collapsed = self.read(|s| s.collapsed.contains(path));
        self.set_collapsed(path, !collapsed).await;
    }

    /// Set a directory's collapse state and persist the whole set.
    pub async fn set_collapsed(&self, path: &str, collapsed: bool) {
        let set = self.update(|s| {
            if collapsed {
                s.collapsed.insert(path.to_string());
            } else {
                s.collapsed.remove(path);
            }
            s.collapsed.clone()
        });
        self.inner.services.session.save_collapsed(&set).await;
    }

    /// Expand every ancestor of `path` so it is visible.
    async fn expand_ancestors(&self, path: &str) {
        let mut changed = false;
        let set = self.update(|s| {
            let mut cursor = parent_path(path);
            while let Some(dir) = cursor {
                changed |= s.collapsed.remove(dir);
                cursor = parent_path(dir);
            }
            s.collapsed.clone()
        });
        if changed {
            self.inner.services.session.save_collapsed(&set).await;
        }
    }

    // ── Create and delete ────────────────────────────────────────────────────

    /// Directory a new entry goes into: the given one, else the open file's
    /// directory, else the root.
    fn target_dir(&self, parent_dir: Option<&str>) -> String {
        if let Some(dir) = parent_dir {
            return dir.to_string();
        }
        self.current_path()
            .and_then(|p| parent_path(&p).map(str::to_string))
            .unwrap_or_default()
    }

    /// Create `new-N` and open it in rename mode. Returns its path.
    pub async fn create_new_file(&self, parent_dir: Option<&str>) -> Option<String> {
        let path = self.create_entry(parent_dir, EntryKind::File).await?;
        self.update(|s| s.highlighted = Some(path.clone()));
        self.load_file_content(&path).await;
        self.begin_rename(&path);
        Some(path)
    }

    /// Create `new-folder-N` in rename mode. Returns its path.
    pub async fn create_new_directory(&self, parent_dir: Option<&str>) -> Option<String> {
        let path = self.create_entry(parent_dir, EntryKind::Directory).await?;
        self.update(|s| s.highlighted = Some(path.clone()));
        self.begin_rename(&path);
        Some(path)
    }

    async fn create_entry(&self, parent_dir: Option<&str>, kind: EntryKind) -> Option<String> {
        let dir_path = self.target_dir(parent_dir);
        let Some(dir) = self.dir_handle(&dir_path) else {
            warn!(dir = %dir_path, "create target is not a directory");
            return None;
        };

        {
            let _gate = self.inner.file_gate.lock().await;
            if self.is_dirty() && !self.save_locked().await {
                self.alert_save_failed().await;
                return None;
            }
        }

        let fs = &self.inner.services.fs;
        let existing: Vec<String> = match fs.list_children(dir.raw()).await {
            Ok(entries) => entries.into_iter().map(|e| e.name).collect(),
            Err(e) => {
                error!(dir = %dir_path, error = %e, "failed to list directory");
                self.alert(&format!("Could not read \"{}\": {}", dir_path, e))
                    .await;
                return None;
            }
        };
        let stem = match kind {
            EntryKind::File => "new",
            EntryKind::Directory => "new-folder",
        };
        let name = crate::rename::first_available_name(stem, &existing);
        let created = match kind {
            EntryKind::File => fs.create_file(dir.raw(), &name).await,
            EntryKind::Directory => fs.create_directory(dir.raw(), &name).await,
        };
        if let Err(e) = created {
            error!(name = %name, error = %e, "failed to create entry");
            self.alert(&format!("Could not create \"{}\": {}", name, e))
                .await;
            return None;
        }

        let path = crate::tree::join_path(&dir_path, &name);
        info!(path = %path, "created");
        self.expand_ancestors(&path).await;
        self.refresh_tree(Some(&path)).await;
        self.read(|s| find_node(&s.tree, &path).is_some())
            .then_some(path)
    }

    /// Remove the entry at `path`. Confirmation is the caller's job.
    ///
    /// Deleting the open file (or a directory containing it) closes it
    /// without saving.
    pub async fn delete_entry(&self, path: &str) -> bool {
        let Some((name, kind, handle)) = self.read(|s| {
            find_node(&s.tree, path).map(|n| (n.name.clone(), n.kind, n.handle.clone()))
        }) else {
            return false;
        };
        let parent = parent_path(path).unwrap_or("");
        let Some(parent_handle) = self.dir_handle(parent) else {
            return false;
        };

        let gate = self.inner.file_gate.lock().await;
        let affects_open = match kind {
            EntryKind::File => self.is_open_file(&handle).await,
            EntryKind::Directory => self
                .current_path()
                .is_some_and(|p| p.starts_with(&format!("{}/", path))),
        };

        if let Err(e) = self
            .inner
            .services
            .fs
            .remove(parent_handle.raw(), &name)
            .await
        {
            error!(path, error = %e, "delete failed");
            self.alert(&format!("Could not delete \"{}\": {}", path, e))
                .await;
            return false;
        }
        info!(path, "deleted");

        if affects_open {
            self.detach_current();
            self.inner.services.session.clear(LAST_FILE_KEY).await;
        }
        drop(gate);

        let prefix = format!("{}/", path);
        let set = self.update(|s| {
            if s
                .highlighted
                .as_ref()
                .is_some_and(|h| h == path || h.starts_with(&prefix))
            {
                s.highlighted = None;
            }
            let before = s.collapsed.len();
            s.collapsed.retain(|c| c != path && !c.starts_with(&prefix));
            (s.collapsed.len() != before).then(|| s.collapsed.clone())
        });
        if let Some(set) = set {
            self.inner.services.session.save_collapsed(&set).await;
        }
        self.refresh_tree(None).await;
        true
    }

    // ── Session ──────────────────────────────────────────────────────────────

    /// Rehydrate the last root and open file.
    ///
    /// The collapsed set is restored first so the tree never renders fully
    /// expanded. Without a `granted` permission the root is kept aside until
    /// [`TreeStore::regrant_permission`] succeeds.
    pub async fn restore_session(&self) -> bool {
        let session = &self.inner.services.session;
        let Some(raw) = session.load::<A::Handle>(ROOT_KEY).await else {
            return false;
        };
        let collapsed = session.load_collapsed().await;
        let root = Handle::new(raw);
        self.update(|s| s.collapsed = collapsed);

        let permission = self
            .inner
            .services
            .fs
            .query_permission(root.raw(), AccessMode::Read)
            .await;
        if permission != Permission::Granted {
            info!(?permission, "stored root needs a permission grant");
            self.update(|s| s.pending_root = Some(root));
            return false;
        }
        self.finish_restore(root).await
    }

    /// Ask again for permission on a stored root (needs a user gesture).
    pub async fn regrant_permission(&self) -> bool {
        let Some(root) = self.read(|s| s.pending_root.clone()) else {
            return false;
        };
        let permission = self
            .inner
            .services
            .fs
            .request_permission(root.raw(), AccessMode::Read)
            .await;
        if permission != Permission::Granted {
            debug!(?permission, "permission still not granted");
            return false;
        }
        self.finish_restore(root).await
    }

    /// Restore the last session, opening `fallback` only when no root was
    /// stored. A stored root waiting for permission is asked for once and is
    /// never replaced by the fallback.
    pub async fn restore_or_open(&self, fallback: A::Handle) -> bool {
        if self.restore_session().await {
            return true;
        }
        if self.awaiting_permission() {
            return self.regrant_permission().await;
        }
        self.set_root(fallback).await
    }

    async fn finish_restore(&self, root: Handle<A::Handle>) -> bool {
        self.update(|s| {
            s.root = Some(root);
            s.pending_root = None;
        });
        if !self.refresh_tree(None).await {
            return false;
        }
        let Some(last) = self
            .inner
            .services
            .session
            .load::<A::Handle>(LAST_FILE_KEY)
            .await
        else {
            return true;
        };

        let candidates: Vec<(String, Handle<A::Handle>)> = self.read(|s| {
            all_files(&s.tree)
                .into_iter()
                .map(|n| (n.path.clone(), n.handle.clone()))
                .collect()
        });
        for (path, handle) in candidates {
            if self.inner.services.fs.is_same_entry(&last, handle.raw()).await {
                self.update(|s| s.highlighted = Some(path.clone()));
                self.load_file_content(&path).await;
                break;
            }
        }
        true
    }

    /// Best-effort flush before the host goes away.
    ///
    /// The host may not wait for this to finish, so a dirty file is not
    /// guaranteed to reach disk.
    pub async fn shutdown(&self) {
        self.cancel_pending_select();
        self.stop_autosave();
        if self.is_dirty() && !self.save_file().await {
            warn!("unsaved changes could not be written on shutdown");
        }
    }
}
