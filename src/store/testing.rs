//! Recording doubles for the store's collaborators.

use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::{Services, StoreSettings, TreeStore};
use crate::boundary::{DialogOptions, Dialogs, DirectoryPicker, TreeView};
use crate::console;
use crate::editor::EditorSurface;
use crate::error::Result;
use crate::fs::{AccessMode, DirEntry, FsAdapter, Permission};
pub use crate::fs::memory::{MemHandle, MemoryFs};
use crate::search::ListMetrics;
use crate::session::{MemoryKv, Session};

/// Records alerts and confirms; confirms answer from a queue (default yes).
#[derive(Default)]
pub struct RecordingDialogs {
    alerts: Mutex<Vec<String>>,
    confirms: Mutex<Vec<String>>,
    answers: Mutex<VecDeque<bool>>,
    held: Mutex<Option<oneshot::Receiver<bool>>>,
}

impl RecordingDialogs {
    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().clone()
    }

    pub fn confirms(&self) -> Vec<String> {
        self.confirms.lock().clone()
    }

    pub fn answer(&self, yes: bool) {
        self.answers.lock().push_back(yes);
    }

    /// Make the next confirm wait for the returned sender.
    pub fn hold_next_confirm(&self) -> oneshot::Sender<bool> {
        let (tx, rx) = oneshot::channel();
        *self.held.lock() = Some(rx);
        tx
    }
}

#[async_trait]
impl Dialogs for RecordingDialogs {
    async fn alert(&self, message: &str, _options: DialogOptions) {
        self.alerts.lock().push(message.to_string());
    }

    async fn confirm(&self, message: &str, _options: DialogOptions) -> bool {
        self.confirms.lock().push(message.to_string());
        let held = self.held.lock().take();
        if let Some(rx) = held {
            return rx.await.unwrap_or(false);
        }
        self.answers.lock().pop_front().unwrap_or(true)
    }
}

pub struct FixedPicker(Option<MemHandle>);

#[async_trait]
impl DirectoryPicker<MemHandle> for FixedPicker {
    async fn pick_directory(&self) -> Option<MemHandle> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Focus(String),
    Reveal(String),
    RenameInput(String, Range<usize>),
    SearchInput,
}

#[derive(Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
    metrics: Mutex<Option<ListMetrics>>,
}

impl RecordingView {
    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().clone()
    }

    pub fn set_metrics(&self, metrics: Option<ListMetrics>) {
        *self.metrics.lock() = metrics;
    }
}

impl TreeView for RecordingView {
    fn focus_item(&self, path: &str) {
        self.events.lock().push(ViewEvent::Focus(path.to_string()));
    }

    fn reveal_item(&self, path: &str) {
        self.events.lock().push(ViewEvent::Reveal(path.to_string()));
    }

    fn focus_rename_input(&self, path: &str, selection: Range<usize>) {
        self.events
            .lock()
            .push(ViewEvent::RenameInput(path.to_string(), selection));
    }

    fn focus_search_input(&self) {
        self.events.lock().push(ViewEvent::SearchInput);
    }

    fn search_list_metrics(&self) -> Option<ListMetrics> {
        *self.metrics.lock()
    }
}

#[derive(Default)]
pub struct RecordingEditor {
    documents: Mutex<Vec<(String, String)>>,
    focused: Mutex<usize>,
    cleared: Mutex<usize>,
    ranges: Mutex<Vec<Range<usize>>>,
}

impl RecordingEditor {
    /// `(text, mode)` for every document shown.
    pub fn documents(&self) -> Vec<(String, String)> {
        self.documents.lock().clone()
    }

    pub fn focus_count(&self) -> usize {
        *self.focused.lock()
    }

    pub fn clear_count(&self) -> usize {
        *self.cleared.lock()
    }

    pub fn ranges(&self) -> Vec<Range<usize>> {
        self.ranges.lock().clone()
    }
}

impl EditorSurface for RecordingEditor {
    fn show_document(&self, text: &str, mode: &str) {
        self.documents
            .lock()
            .push((text.to_string(), mode.to_string()));
    }

    fn clear(&self) {
        *self.cleared.lock() += 1;
    }

    fn focus(&self) {
        *self.focused.lock() += 1;
    }

    fn reveal_range(&self, range: Range<usize>) {
        self.ranges.lock().push(range);
    }
}

/// A store over [`MemoryFs`] with every collaborator recorded.
pub struct Harness {
    pub store: TreeStore<MemoryFs>,
    pub fs: Arc<MemoryFs>,
    pub dialogs: Arc<RecordingDialogs>,
    pub view: Arc<RecordingView>,
    pub editor: Arc<RecordingEditor>,
    pub kv: Arc<MemoryKv>,
}

/// Auto-save off so write counts stay deterministic.
fn quiet_settings() -> StoreSettings {
    StoreSettings {
        autosave_enabled: false,
        ..StoreSettings::default()
    }
}

impl Harness {
    pub fn new(fs: MemoryFs) -> Self {
        let root = fs.root();
        Self::build(fs, Some(root), Arc::new(MemoryKv::new()), quiet_settings())
    }

    pub fn with_picker(fs: MemoryFs, picked: Option<MemHandle>) -> Self {
        Self::build(fs, picked, Arc::new(MemoryKv::new()), quiet_settings())
    }

    pub fn with_kv(fs: MemoryFs, kv: Arc<MemoryKv>) -> Self {
        let root = fs.root();
        Self::build(fs, Some(root), kv, quiet_settings())
    }

    /// Harness with the root already opened.
    pub async fn opened(fs: MemoryFs) -> Self {
        Self::opened_with(fs, quiet_settings()).await
    }

    pub async fn opened_with(fs: MemoryFs, settings: StoreSettings) -> Self {
        let root = fs.root();
        let harness = Self::build(fs, Some(root), Arc::new(MemoryKv::new()), settings);
        assert!(harness.store.open_directory().await);
        harness
    }

    fn build(
        fs: MemoryFs,
        picked: Option<MemHandle>,
        kv: Arc<MemoryKv>,
        settings: StoreSettings,
    ) -> Self {
        let fs = Arc::new(fs);
        let dialogs = Arc::new(RecordingDialogs::default());
        let view = Arc::new(RecordingView::default());
        let editor = Arc::new(RecordingEditor::default());
        let services = Services {
            fs: Arc::clone(&fs),
            dialogs: dialogs.clone(),
            picker: Arc::new(FixedPicker(picked)),
            view: view.clone(),
            editor: editor.clone(),
            session: Session::new(kv.clone()),
        };
        Self {
            store: TreeStore::new(services, settings),
            fs,
            dialogs,
            view,
            editor,
            kv,
        }
    }
}

/// Adapter wrapper that stalls some calls, to widen race windows.
pub struct Slowed<A> {
    pub inner: A,
    pub permission_delay: Duration,
    pub read_delay: Duration,
}

impl<A> Slowed<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            permission_delay: Duration::ZERO,
            read_delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl<A: FsAdapter> FsAdapter for Slowed<A> {
    type Handle = A::Handle;

    async fn list_children(&self, dir: &A::Handle) -> Result<Vec<DirEntry<A::Handle>>> {
        self.inner.list_children(dir).await
    }

    async fn read_all(&self, file: &A::Handle) -> Result<Vec<u8>> {
        tokio::time::sleep(self.read_delay).await;
        self.inner.read_all(file).await
    }

    async fn read_head(&self, file: &A::Handle, limit: usize) -> Result<Vec<u8>> {
        self.inner.read_head(file, limit).await
    }

    async fn write_all(&self, file: &A::Handle, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(file, bytes).await
    }

    fn supports_rename(&self) -> bool {
        self.inner.supports_rename()
    }

    async fn rename(
        &self,
        entry: &A::Handle,
        new_parent: &A::Handle,
        new_name: &str,
    ) -> Result<()> {
        self.inner.rename(entry, new_parent, new_name).await
    }

    async fn create_file(&self, dir: &A::Handle, name: &str) -> Result<A::Handle> {
        self.inner.create_file(dir, name).await
    }

    async fn create_directory(&self, dir: &A::Handle, name: &str) -> Result<A::Handle> {
        self.inner.create_directory(dir, name).await
    }

    async fn remove(&self, parent: &A::Handle, name: &str) -> Result<()> {
        self.inner.remove(parent, name).await
    }

    async fn is_same_entry(&self, a: &A::Handle, b: &A::Handle) -> bool {
        self.inner.is_same_entry(a, b).await
    }

    async fn query_permission(&self, handle: &A::Handle, mode: AccessMode) -> Permission {
        tokio::time::sleep(self.permission_delay).await;
        self.inner.query_permission(handle, mode).await
    }

    async fn request_permission(&self, handle: &A::Handle, mode: AccessMode) -> Permission {
        self.inner.request_permission(handle, mode).await
    }
}

/// A store over any adapter with recording collaborators, opened at `root`.
pub async fn opened_store<A: FsAdapter>(
    fs: A,
    root: A::Handle,
    settings: StoreSettings,
) -> (TreeStore<A>, Arc<RecordingDialogs>) {
    let dialogs = Arc::new(RecordingDialogs::default());
    let services = Services {
        fs: Arc::new(fs),
        dialogs: dialogs.clone(),
        picker: Arc::new(console::FixedPicker::new(Some(root))),
        view: Arc::new(RecordingView::default()),
        editor: Arc::new(RecordingEditor::default()),
        session: Session::new(Arc::new(MemoryKv::new())),
    };
    let store = TreeStore::new(services, settings);
    assert!(store.open_directory().await);
    (store, dialogs)
}
