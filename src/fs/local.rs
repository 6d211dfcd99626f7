use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::{AccessMode, DirEntry, EntryKind, FsAdapter, Permission};
use crate::error::{AppError, Result};

/// Handle to an entry on the local filesystem.
///
/// `file_id` is the (device, inode) pair captured when the handle was made, so
/// a handle taken before a rename still matches the entry afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalHandle {
    pub path: PathBuf,
    pub kind: EntryKind,
    #[serde(default)]
    pub file_id: Option<(u64, u64)>,
}

/// Adapter over `tokio::fs`.
#[derive(Debug, Default, Clone)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }

    /// Build a handle for an existing path.
    pub async fn handle_for(path: &Path) -> Result<LocalHandle> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(handle_from_metadata(path.to_path_buf(), &metadata))
    }
}

fn handle_from_metadata(path: PathBuf, metadata: &std::fs::Metadata) -> LocalHandle {
    let kind = if metadata.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    };
    LocalHandle {
        path,
        kind,
        file_id: file_id(metadata),
    }
}

#[cfg(unix)]
fn file_id(metadata: &std::fs::Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn file_id(_metadata: &std::fs::Metadata) -> Option<(u64, u64)> {
    None
}

#[async_trait]
impl FsAdapter for LocalFs {
    type Handle = LocalHandle;

    async fn list_children(&self, dir: &LocalHandle) -> Result<Vec<DirEntry<LocalHandle>>> {
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&dir.path).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            // Permission-denied entries and broken symlinks are skipped.
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(m) => m,
                Err(_) => continue,
            };
            let name = entry.file_name().to_string_lossy().to_string();
            let handle = handle_from_metadata(path, &metadata);
            entries.push(DirEntry {
                name,
                kind: handle.kind,
                handle,
            });
        }
        Ok(entries)
    }

    async fn read_all(&self, file: &LocalHandle) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&file.path).await?)
    }

    async fn read_head(&self, file: &LocalHandle, limit: usize) -> Result<Vec<u8>> {
        let handle = tokio::fs::File::open(&file.path).await?;
        let mut bytes = Vec::with_capacity(limit);
        handle.take(limit as u64).read_to_end(&mut bytes).await?;
        Ok(bytes)
    }

    async fn write_all(&self, file: &LocalHandle, bytes: &[u8]) -> Result<()> {
        let mut handle = tokio::fs::File::create(&file.path).await?;
        handle.write_all(bytes).await?;
        handle.flush().await?;
        Ok(())
    }

    async fn rename(
        &self,
        entry: &LocalHandle,
        new_parent: &LocalHandle,
        new_name: &str,
    ) -> Result<()> {
        tokio::fs::rename(&entry.path, new_parent.path.join(new_name)).await?;
        Ok(())
    }

    async fn create_file(&self, dir: &LocalHandle, name: &str) -> Result<LocalHandle> {
        let path = dir.path.join(name);
        tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        Self::handle_for(&path).await
    }

    async fn create_directory(&self, dir: &LocalHandle, name: &str) -> Result<LocalHandle> {
        let path = dir.path.join(name);
        tokio::fs::create_dir(&path).await?;
        Self::handle_for(&path).await
    }

    async fn remove(&self, parent: &LocalHandle, name: &str) -> Result<()> {
        let path = parent.path.join(name);
        let metadata = tokio::fs::symlink_metadata(&path).await?;
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn is_same_entry(&self, a: &LocalHandle, b: &LocalHandle) -> bool {
        if let (Some(x), Some(y)) = (a.file_id, b.file_id) {
            return x == y;
        }
        if a.path == b.path {
            return true;
        }
        match (
            tokio::fs::canonicalize(&a.path).await,
            tokio::fs::canonicalize(&b.path).await,
        ) {
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        }
    }

    async fn query_permission(&self, handle: &LocalHandle, mode: AccessMode) -> Permission {
        match tokio::fs::metadata(&handle.path).await {
            Ok(metadata) => {
                if mode == AccessMode::ReadWrite && metadata.permissions().readonly() {
                    Permission::Denied
                } else {
                    Permission::Granted
                }
            }
            Err(_) => Permission::Denied,
        }
    }

    async fn request_permission(&self, handle: &LocalHandle, mode: AccessMode) -> Permission {
        // The OS has no prompt; asking again yields the same answer.
        self.query_permission(handle, mode).await
    }
}

/// Resolve a user-supplied root directory into a handle.
pub async fn open_root(path: &Path) -> Result<LocalHandle> {
    let canonical = tokio::fs::canonicalize(path)
        .await
        .map_err(|_| AppError::InvalidPath(format!("{} does not exist", path.display())))?;
    let handle = LocalFs::handle_for(&canonical).await?;
    if handle.kind != EntryKind::Directory {
        return Err(AppError::InvalidPath(format!(
            "{} is not a directory",
            path.display()
        )));
    }
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    async fn root(tmp: &TempDir) -> LocalHandle {
        open_root(tmp.path()).await.unwrap()
    }

    #[tokio::test]
    async fn list_children_reports_kinds() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("docs")).unwrap();
        fs::write(tmp.path().join("a.adoc"), "A").unwrap();

        let fs_adapter = LocalFs::new();
        let mut entries = fs_adapter.list_children(&root(&tmp).await).await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.adoc");
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[1].name, "docs");
        assert_eq!(entries[1].kind, EntryKind::Directory);
    }

    #[tokio::test]
    async fn create_write_and_read_back() {
        let tmp = TempDir::new().unwrap();
        let fs_adapter = LocalFs::new();
        let dir = root(&tmp).await;

        let file = fs_adapter.create_file(&dir, "new-1").await.unwrap();
        fs_adapter.write_all(&file, b"hello").await.unwrap();

        assert_eq!(fs_adapter.read_all(&file).await.unwrap(), b"hello");
        assert_eq!(fs_adapter.read_head(&file, 2).await.unwrap(), b"he");
    }

    #[tokio::test]
    async fn create_file_refuses_existing_name() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("taken"), "").unwrap();
        let fs_adapter = LocalFs::new();
        assert!(fs_adapter
            .create_file(&root(&tmp).await, "taken")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn rename_moves_entry() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("old.adoc"), "X").unwrap();
        let fs_adapter = LocalFs::new();
        let dir = root(&tmp).await;
        let old = LocalFs::handle_for(&tmp.path().join("old.adoc")).await.unwrap();

        fs_adapter.rename(&old, &dir, "new.adoc").await.unwrap();

        assert!(!tmp.path().join("old.adoc").exists());
        assert_eq!(fs::read_to_string(tmp.path().join("new.adoc")).unwrap(), "X");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn same_entry_survives_rename() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.adoc"), "X").unwrap();
        let fs_adapter = LocalFs::new();
        let dir = root(&tmp).await;
        let before = LocalFs::handle_for(&tmp.path().join("a.adoc")).await.unwrap();

        fs_adapter.rename(&before, &dir, "b.adoc").await.unwrap();
        let after = LocalFs::handle_for(&tmp.path().join("b.adoc")).await.unwrap();

        assert!(fs_adapter.is_same_entry(&before, &after).await);
    }

    #[tokio::test]
    async fn remove_handles_files_and_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("dir").join("nested")).unwrap();
        fs::write(tmp.path().join("dir").join("nested").join("x"), "").unwrap();
        fs::write(tmp.path().join("f.adoc"), "").unwrap();
        let fs_adapter = LocalFs::new();
        let dir = root(&tmp).await;

        fs_adapter.remove(&dir, "dir").await.unwrap();
        fs_adapter.remove(&dir, "f.adoc").await.unwrap();

        assert!(!tmp.path().join("dir").exists());
        assert!(!tmp.path().join("f.adoc").exists());
    }

    #[tokio::test]
    async fn remove_nonexistent_fails() {
        let tmp = TempDir::new().unwrap();
        let fs_adapter = LocalFs::new();
        assert!(fs_adapter.remove(&root(&tmp).await, "nope").await.is_err());
    }

    #[tokio::test]
    async fn permission_granted_for_existing_dir() {
        let tmp = TempDir::new().unwrap();
        let fs_adapter = LocalFs::new();
        let dir = root(&tmp).await;
        assert_eq!(
            fs_adapter.query_permission(&dir, AccessMode::Read).await,
            Permission::Granted
        );
    }

    #[tokio::test]
    async fn open_root_rejects_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("f"), "").unwrap();
        let err = open_root(&tmp.path().join("f")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidPath(_)));
    }
}
