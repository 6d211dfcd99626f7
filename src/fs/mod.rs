//! Filesystem adapter boundary.
//!
//! The store never touches a concrete filesystem. Everything goes through an
//! [`FsAdapter`], whose handles are opaque capabilities for one entry.

pub mod local;
pub mod memory;
pub mod watcher;

use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Kind of filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// Result of a permission query or request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Not decided yet; a user gesture is needed to ask.
    Prompt,
}

/// Access mode a permission applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

/// One entry returned by [`FsAdapter::list_children`].
#[derive(Debug, Clone)]
pub struct DirEntry<H> {
    pub name: String,
    pub kind: EntryKind,
    pub handle: H,
}

/// Filesystem capability surface consumed by the tree store.
#[async_trait]
pub trait FsAdapter: Send + Sync + 'static {
    /// Opaque handle for one entry. Must be serializable so sessions can persist it.
    type Handle: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static;

    /// List the immediate children of a directory.
    async fn list_children(&self, dir: &Self::Handle) -> Result<Vec<DirEntry<Self::Handle>>>;

    /// Read the full content of a file.
    async fn read_all(&self, file: &Self::Handle) -> Result<Vec<u8>>;

    /// Read at most `limit` bytes from the start of a file.
    async fn read_head(&self, file: &Self::Handle, limit: usize) -> Result<Vec<u8>> {
        let mut bytes = self.read_all(file).await?;
        bytes.truncate(limit);
        Ok(bytes)
    }

    /// Replace a file's content (open, write, close).
    async fn write_all(&self, file: &Self::Handle, bytes: &[u8]) -> Result<()>;

    /// Whether [`FsAdapter::rename`] is available.
    fn supports_rename(&self) -> bool {
        true
    }

    /// Move `entry` into `new_parent` under `new_name`, replacing any existing entry.
    async fn rename(
        &self,
        entry: &Self::Handle,
        new_parent: &Self::Handle,
        new_name: &str,
    ) -> Result<()>;

    /// Create an empty file in `dir`.
    async fn create_file(&self, dir: &Self::Handle, name: &str) -> Result<Self::Handle>;

    /// Create an empty directory in `dir`.
    async fn create_directory(&self, dir: &Self::Handle, name: &str) -> Result<Self::Handle>;

    /// Remove the entry called `name` from `parent` (recursively for directories).
    async fn remove(&self, parent: &Self::Handle, name: &str) -> Result<()>;

    /// Whether two handles reference the same underlying entry.
    async fn is_same_entry(&self, a: &Self::Handle, b: &Self::Handle) -> bool;

    async fn query_permission(&self, handle: &Self::Handle, mode: AccessMode) -> Permission;

    async fn request_permission(&self, handle: &Self::Handle, mode: AccessMode) -> Permission;
}

/// Shared reference to an adapter handle.
///
/// Two `Handle`s that are the same object compare equal via [`Handle::same_object`];
/// that is only a fast path. Whether two handles reference the same entry is
/// decided by [`FsAdapter::is_same_entry`].
#[derive(Debug)]
pub struct Handle<H>(Arc<H>);

impl<H> Handle<H> {
    pub fn new(raw: H) -> Self {
        Self(Arc::new(raw))
    }

    /// Pointer identity with another handle.
    pub fn same_object(&self, other: &Handle<H>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn raw(&self) -> &H {
        &self.0
    }
}

impl<H> Clone for Handle<H> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<H> Deref for Handle<H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.0
    }
}
