use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{AccessMode, DirEntry, EntryKind, FsAdapter, Permission};
use crate::error::{AppError, Result};

/// Handle into a [`MemoryFs`]. Identity is the entry id, not the value's address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemHandle {
    pub id: u64,
    pub kind: EntryKind,
}

/// Adapter operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOp {
    List,
    Read,
    Write,
    Rename,
    Create,
    Remove,
}

#[derive(Debug)]
struct MemNode {
    name: String,
    kind: EntryKind,
    parent: Option<u64>,
    content: Vec<u8>,
}

#[derive(Debug)]
struct MemState {
    nodes: HashMap<u64, MemNode>,
    next_id: u64,
    permission: Permission,
    granted_on_request: bool,
    rename_supported: bool,
    failing: HashSet<FailOp>,
    writes: usize,
}

const ROOT_ID: u64 = 0;

/// In-memory filesystem adapter.
///
/// Every listing returns fresh handle values, like a browser handing out new
/// handle objects for the same entry.
#[derive(Debug)]
pub struct MemoryFs {
    state: Mutex<MemState>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create an empty filesystem with a granted root directory.
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_ID,
            MemNode {
                name: String::new(),
                kind: EntryKind::Directory,
                parent: None,
                content: Vec::new(),
            },
        );
        Self {
            state: Mutex::new(MemState {
                nodes,
                next_id: ROOT_ID + 1,
                permission: Permission::Granted,
                granted_on_request: true,
                rename_supported: true,
                failing: HashSet::new(),
                writes: 0,
            }),
        }
    }

    pub fn root(&self) -> MemHandle {
        MemHandle {
            id: ROOT_ID,
            kind: EntryKind::Directory,
        }
    }

    /// Add a file at a slash-separated path, creating parent directories.
    pub fn add_file(&self, path: &str, content: impl Into<Vec<u8>>) -> MemHandle {
        let mut state = self.state.lock();
        let (dirs, name) = split_path(path);
        let parent = ensure_dirs(&mut state, &dirs);
        let id = insert_node(&mut state, parent, name, EntryKind::File);
        if let Some(node) = state.nodes.get_mut(&id) {
            node.content = content.into();
        }
        MemHandle {
            id,
            kind: EntryKind::File,
        }
    }

    /// Add a directory (and its parents) at a slash-separated path.
    pub fn add_dir(&self, path: &str) -> MemHandle {
        let mut state = self.state.lock();
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let id = ensure_dirs(&mut state, &parts);
        MemHandle {
            id,
            kind: EntryKind::Directory,
        }
    }

    /// Content of the file at `path`, as UTF-8.
    pub fn read_string(&self, path: &str) -> Option<String> {
        let state = self.state.lock();
        let id = resolve(&state, path)?;
        let node = state.nodes.get(&id)?;
        (node.kind == EntryKind::File).then(|| String::from_utf8_lossy(&node.content).to_string())
    }

    pub fn exists(&self, path: &str) -> bool {
        resolve(&self.state.lock(), path).is_some()
    }

    /// Handle for an existing path.
    pub fn handle(&self, path: &str) -> Option<MemHandle> {
        let state = self.state.lock();
        let id = resolve(&state, path)?;
        let kind = state.nodes.get(&id)?.kind;
        Some(MemHandle { id, kind })
    }

    /// Answer given to permission queries.
    pub fn set_permission(&self, permission: Permission) {
        self.state.lock().permission = permission;
    }

    /// Whether a permission request flips the state to granted.
    pub fn set_granted_on_request(&self, granted: bool) {
        self.state.lock().granted_on_request = granted;
    }

    pub fn set_rename_supported(&self, supported: bool) {
        self.state.lock().rename_supported = supported;
    }

    pub fn fail_on(&self, op: FailOp) {
        self.state.lock().failing.insert(op);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failing.clear();
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }

    fn check(&self, op: FailOp) -> Result<()> {
        if self.state.lock().failing.contains(&op) {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("injected {:?} failure", op),
            )));
        }
        Ok(())
    }
}

fn split_path(path: &str) -> (Vec<&str>, &str) {
    let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let name = parts.pop().unwrap_or("");
    (parts, name)
}

fn child_named(state: &MemState, parent: u64, name: &str) -> Option<u64> {
    state
        .nodes
        .iter()
        .find(|(_, n)| n.parent == Some(parent) && n.name == name)
        .map(|(id, _)| *id)
}

fn ensure_dirs(state: &mut MemState, parts: &[&str]) -> u64 {
    let mut current = ROOT_ID;
    for part in parts {
        current = match child_named(state, current, part) {
            Some(id) => id,
            None => insert_node(state, current, part, EntryKind::Directory),
        };
    }
    current
}

fn insert_node(state: &mut MemState, parent: u64, name: &str, kind: EntryKind) -> u64 {
    let id = state.next_id;
    state.next_id += 1;
    state.nodes.insert(
        id,
        MemNode {
            name: name.to_string(),
            kind,
            parent: Some(parent),
            content: Vec::new(),
        },
    );
    id
}

fn resolve(state: &MemState, path: &str) -> Option<u64> {
    let mut current = ROOT_ID;
    for part in path.split('/').filter(|p| !p.is_empty()) {
        current = child_named(state, current, part)?;
    }
    Some(current)
}

fn remove_subtree(state: &mut MemState, id: u64) {
    let children: Vec<u64> = state
        .nodes
        .iter()
        .filter(|(_, n)| n.parent == Some(id))
        .map(|(child, _)| *child)
        .collect();
    for child in children {
        remove_subtree(state, child);
    }
    state.nodes.remove(&id);
}

fn not_found(what: &str) -> AppError {
    AppError::NotFound(what.to_string())
}

#[async_trait]
impl FsAdapter for MemoryFs {
    type Handle = MemHandle;

    async fn list_children(&self, dir: &MemHandle) -> Result<Vec<DirEntry<MemHandle>>> {
        self.check(FailOp::List)?;
        let state = self.state.lock();
        if state.permission != Permission::Granted {
            return Err(AppError::PermissionDenied("directory".into()));
        }
        match state.nodes.get(&dir.id) {
            Some(node) if node.kind == EntryKind::Directory => {}
            _ => return Err(not_found("directory")),
        }
        Ok(state
            .nodes
            .iter()
            .filter(|(_, n)| n.parent == Some(dir.id))
            .map(|(id, n)| DirEntry {
                name: n.name.clone(),
                kind: n.kind,
                handle: MemHandle {
                    id: *id,
                    kind: n.kind,
                },
            })
            .collect())
    }

    async fn read_all(&self, file: &MemHandle) -> Result<Vec<u8>> {
        self.check(FailOp::Read)?;
        let state = self.state.lock();
        match state.nodes.get(&file.id) {
            Some(node) if node.kind == EntryKind::File => Ok(node.content.clone()),
            _ => Err(not_found("file")),
        }
    }

    async fn write_all(&self, file: &MemHandle, bytes: &[u8]) -> Result<()> {
        self.check(FailOp::Write)?;
        let mut state = self.state.lock();
        match state.nodes.get_mut(&file.id) {
            Some(node) if node.kind == EntryKind::File => node.content = bytes.to_vec(),
            _ => return Err(not_found("file")),
        }
        state.writes += 1;
        Ok(())
    }

    fn supports_rename(&self) -> bool {
        self.state.lock().rename_supported
    }

    async fn rename(&self, entry: &MemHandle, new_parent: &MemHandle, new_name: &str) -> Result<()> {
        if !self.supports_rename() {
            return Err(AppError::Unsupported("move".into()));
        }
        self.check(FailOp::Rename)?;
        let mut state = self.state.lock();
        if !state.nodes.contains_key(&entry.id) || !state.nodes.contains_key(&new_parent.id) {
            return Err(not_found("entry"));
        }
        if let Some(existing) = child_named(&state, new_parent.id, new_name) {
            if existing != entry.id {
                remove_subtree(&mut state, existing);
            }
        }
        if let Some(node) = state.nodes.get_mut(&entry.id) {
            node.parent = Some(new_parent.id);
            node.name = new_name.to_string();
        }
        Ok(())
    }

    async fn create_file(&self, dir: &MemHandle, name: &str) -> Result<MemHandle> {
        self.create(dir, name, EntryKind::File)
    }

    async fn create_directory(&self, dir: &MemHandle, name: &str) -> Result<MemHandle> {
        self.create(dir, name, EntryKind::Directory)
    }

    async fn remove(&self, parent: &MemHandle, name: &str) -> Result<()> {
        self.check(FailOp::Remove)?;
        let mut state = self.state.lock();
        let id = child_named(&state, parent.id, name).ok_or_else(|| not_found(name))?;
        remove_subtree(&mut state, id);
        Ok(())
    }

    async fn is_same_entry(&self, a: &MemHandle, b: &MemHandle) -> bool {
        a.id == b.id
    }

    async fn query_permission(&self, _handle: &MemHandle, _mode: AccessMode) -> Permission {
        self.state.lock().permission
    }

    async fn request_permission(&self, _handle: &MemHandle, _mode: AccessMode) -> Permission {
        let mut state = self.state.lock();
        if state.granted_on_request {
            state.permission = Permission::Granted;
        }
        state.permission
    }
}

impl MemoryFs {
    fn create(&self, dir: &MemHandle, name: &str, kind: EntryKind) -> Result<MemHandle> {
        self.check(FailOp::Create)?;
        let mut state = self.state.lock();
        if child_named(&state, dir.id, name).is_some() {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", name),
            )));
        }
        let id = insert_node(&mut state, dir.id, name, kind);
        Ok(MemHandle { id, kind })
    }
}
