//! Tree snapshot: nodes, sorting, traversal and the per-node rename state.

use std::collections::BTreeSet;
use std::future::Future;
use std::ops::Range;
use std::pin::Pin;

use crate::error::Result;
use crate::fs::{EntryKind, FsAdapter, Handle};
use crate::rename;

/// UI-transient rename state layered on a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameState {
    pub is_renaming: bool,
    pub buffer: String,
    pub is_committing: bool,
}

/// A node in the file tree.
///
/// Nodes are rebuilt wholesale on every refresh; transient state does not
/// survive unless the store carries it over.
#[derive(Debug, Clone)]
pub struct TreeNode<H> {
    pub name: String,
    /// Slash-joined path relative to the root.
    pub path: String,
    pub kind: EntryKind,
    pub handle: Handle<H>,
    /// `None` for files, `Some` (possibly empty) for directories.
    pub children: Option<Vec<TreeNode<H>>>,
    pub rename: RenameState,
}

impl<H> TreeNode<H> {
    pub fn new(name: String, path: String, kind: EntryKind, handle: Handle<H>) -> Self {
        let children = (kind == EntryKind::Directory).then(Vec::new);
        Self {
            name,
            path,
            kind,
            handle,
            children,
            rename: RenameState::default(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Enter rename mode. Returns the character range of the name to pre-select.
    pub fn begin_rename(&mut self) -> Range<usize> {
        self.rename = RenameState {
            is_renaming: true,
            buffer: self.name.clone(),
            is_committing: false,
        };
        rename::selection_range(&self.name)
    }

    /// Replace the rename buffer with what the user typed.
    pub fn set_rename_buffer(&mut self, text: &str) {
        if self.rename.is_renaming {
            self.rename.buffer = text.to_string();
        }
    }

    /// Drop the buffer and return to idle.
    pub fn cancel_rename(&mut self) {
        self.rename = RenameState::default();
    }

    /// Claim the commit slot. Returns the buffer, or `None` if not renaming or
    /// a commit is already in flight.
    pub fn start_commit(&mut self) -> Option<String> {
        if !self.rename.is_renaming || self.rename.is_committing {
            return None;
        }
        self.rename.is_committing = true;
        Some(self.rename.buffer.clone())
    }

    /// Release the commit slot, staying in rename mode with the buffer intact.
    pub fn resume_renaming(&mut self) {
        self.rename.is_committing = false;
    }
}

/// Join a parent path and a child name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Parent path of `path`; `None` means the root.
pub fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

/// Last component of `path`.
pub fn base_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

/// Directories first, then case-insensitive by name.
pub fn sort_nodes<H>(nodes: &mut [TreeNode<H>]) {
    nodes.sort_by(|a, b| {
        b.is_dir()
            .cmp(&a.is_dir())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

type LevelFuture<'a, H> = Pin<Box<dyn Future<Output = Result<Vec<TreeNode<H>>>> + Send + 'a>>;

/// Recursively list `root` into a sorted snapshot.
///
/// Directories whose name starts with `.` are excluded entirely; dotfiles are kept.
pub async fn build_snapshot<A: FsAdapter>(
    fs: &A,
    root: &A::Handle,
) -> Result<Vec<TreeNode<A::Handle>>> {
    list_level(fs, root.clone(), String::new()).await
}

fn list_level<A: FsAdapter>(fs: &A, dir: A::Handle, prefix: String) -> LevelFuture<'_, A::Handle> {
    Box::pin(async move {
        let mut nodes = Vec::new();
        for entry in fs.list_children(&dir).await? {
            if entry.kind == EntryKind::Directory && entry.name.starts_with('.') {
                continue;
            }
            let path = join_path(&prefix, &entry.name);
            let mut node = TreeNode::new(
                entry.name,
                path.clone(),
                entry.kind,
                Handle::new(entry.handle.clone()),
            );
            if entry.kind == EntryKind::Directory {
                node.children = Some(list_level(fs, entry.handle, path).await?);
            }
            nodes.push(node);
        }
        sort_nodes(&mut nodes);
        Ok(nodes)
    })
}

/// Find a node by path.
pub fn find_node<'a, H>(nodes: &'a [TreeNode<H>], target: &str) -> Option<&'a TreeNode<H>> {
    for node in nodes {
        if node.path == target {
            return Some(node);
        }
        if let Some(children) = &node.children {
            if target.starts_with(&node.path) {
                if let Some(found) = find_node(children, target) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Find a mutable reference to a node by path.
pub fn find_node_mut<'a, H>(
    nodes: &'a mut [TreeNode<H>],
    target: &str,
) -> Option<&'a mut TreeNode<H>> {
    for node in nodes.iter_mut() {
        if node.path == target {
            return Some(node);
        }
        if target.starts_with(&node.path) {
            if let Some(children) = &mut node.children {
                if let Some(found) = find_node_mut(children, target) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Every file in the tree, depth-first, regardless of collapse state.
pub fn all_files<H>(nodes: &[TreeNode<H>]) -> Vec<&TreeNode<H>> {
    let mut out = Vec::new();
    collect_files(nodes, &mut out);
    out
}

fn collect_files<'a, H>(nodes: &'a [TreeNode<H>], out: &mut Vec<&'a TreeNode<H>>) {
    for node in nodes {
        match &node.children {
            Some(children) => collect_files(children, out),
            None => out.push(node),
        }
    }
}

/// A flattened, expansion-aware row of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleItem {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub depth: usize,
    pub is_expanded: bool,
}

/// Flatten the tree, skipping children of collapsed directories.
pub fn visible_items<H>(nodes: &[TreeNode<H>], collapsed: &BTreeSet<String>) -> Vec<VisibleItem> {
    let mut items = Vec::new();
    flatten_node(nodes, collapsed, 0, &mut items);
    items
}

fn flatten_node<H>(
    nodes: &[TreeNode<H>],
    collapsed: &BTreeSet<String>,
    depth: usize,
    items: &mut Vec<VisibleItem>,
) {
    for node in nodes {
        let is_expanded = node.is_dir() && !collapsed.contains(&node.path);
        items.push(VisibleItem {
            name: node.name.clone(),
            path: node.path.clone(),
            kind: node.kind,
            depth,
            is_expanded,
        });
        if is_expanded {
            if let Some(children) = &node.children {
                flatten_node(children, collapsed, depth + 1, items);
            }
        }
    }
}
