//! Inline rename: the per-node state machine and the commit pipeline.

use std::sync::Arc;

use tracing::{debug, error, info};

use super::TreeStore;
use crate::boundary::{DialogOptions, FocusTarget};
use crate::error::AppError;
use crate::fs::{FsAdapter, Handle};
use crate::rename::{self, Verdict};
use crate::tree::{find_node_mut, join_path, parent_path};

/// How a commit attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// Renamed; the entry now lives at this path.
    Renamed(String),
    /// Nothing to do; the node is idle again.
    Cancelled,
    /// Name rejected; still renaming.
    Invalid,
    /// User kept the existing entry; still renaming.
    Declined,
    /// Adapter cannot rename; the node is idle again.
    Unsupported,
    /// Adapter error; still renaming.
    Failed,
    /// Not renaming, or a commit is already running.
    Ignored,
}

impl<A: FsAdapter> TreeStore<A> {
    /// Put a node into rename mode with its name as the buffer.
    pub fn begin_rename(&self, path: &str) -> bool {
        let selection = self.update(|s| find_node_mut(&mut s.tree, path).map(|n| n.begin_rename()));
        let Some(selection) = selection else {
            return false;
        };
        let view = Arc::clone(&self.inner.services.view);
        let path = path.to_string();
        self.schedule(move || view.focus_rename_input(&path, selection));
        true
    }

    pub fn set_rename_buffer(&self, path: &str, text: &str) {
        self.update(|s| {
            if let Some(node) = find_node_mut(&mut s.tree, path) {
                node.set_rename_buffer(text);
            }
        });
    }

    /// Leave rename mode without touching the filesystem.
    pub fn cancel_rename(&self, path: &str) {
        let was_renaming = self.update(|s| {
            find_node_mut(&mut s.tree, path).is_some_and(|n| {
                let renaming = n.rename.is_renaming;
                n.cancel_rename();
                renaming
            })
        });
        if was_renaming {
            let view = Arc::clone(&self.inner.services.view);
            let path = path.to_string();
            self.schedule(move || view.focus_item(&path));
        }
    }

    /// Rename input lost focus. Focus moving into a rename dialog is ignored;
    /// anywhere else commits.
    pub async fn rename_focus_lost(&self, path: &str, target: FocusTarget) -> RenameOutcome {
        if target == FocusTarget::RenameDialog {
            return RenameOutcome::Ignored;
        }
        self.commit_rename(path).await
    }

    /// Validate the buffer and rename the entry on disk.
    ///
    /// Only one commit per node runs at a time; overlapping calls return
    /// [`RenameOutcome::Ignored`].
    pub async fn commit_rename(&self, path: &str) -> RenameOutcome {
        let claimed = self.update(|s| {
            find_node_mut(&mut s.tree, path).and_then(|n| {
                n.start_commit()
                    .map(|buffer| (buffer, n.name.clone(), n.handle.clone()))
            })
        });
        let Some((buffer, original, handle)) = claimed else {
            return RenameOutcome::Ignored;
        };

        let new_name = match rename::check(&buffer, &original) {
            Verdict::Cancel => {
                debug!(path, "rename cancelled");
                self.cancel_rename(path);
                return RenameOutcome::Cancelled;
            }
            Verdict::Invalid(ch) => {
                self.alert(&AppError::InvalidName { ch }.to_string()).await;
                self.keep_renaming(path);
                return RenameOutcome::Invalid;
            }
            Verdict::Proceed(name) => name,
        };

        let parent = parent_path(path).unwrap_or("");
        let Some(parent_handle) = self.dir_handle(parent) else {
            self.keep_renaming(path);
            return RenameOutcome::Failed;
        };
        let fs = &self.inner.services.fs;

        let siblings: Vec<String> = match fs.list_children(parent_handle.raw()).await {
            Ok(entries) => entries.into_iter().map(|e| e.name).collect(),
            Err(e) => {
                error!(path, error = %e, "failed to list siblings");
                self.alert(&format!("Could not rename \"{}\": {}", original, e))
                    .await;
                self.keep_renaming(path);
                return RenameOutcome::Failed;
            }
        };
        if rename::collides(&new_name, &original, &siblings) {
            let message = format!("\"{}\" already exists. Replace it?", new_name);
            let options = DialogOptions {
                title: Some("Replace file".into()),
                confirm_label: Some("Replace".into()),
                danger: true,
            };
            if !self.inner.services.dialogs.confirm(&message, options).await {
                self.keep_renaming(path);
                return RenameOutcome::Declined;
            }
        }

        if !fs.supports_rename() {
            return self.rename_unsupported(path).await;
        }
        // Saves through the open file's old handle must not land between the
        // rename and the refresh that re-points it.
        let _gate = if self.rename_moves_open_file(path, &handle).await {
            Some(self.inner.file_gate.lock().await)
        } else {
            None
        };
        match fs.rename(handle.raw(), parent_handle.raw(), &new_name).await {
            Ok(()) => {}
            Err(AppError::Unsupported(_)) => return self.rename_unsupported(path).await,
            Err(e) => {
                error!(path, error = %e, "rename failed");
                self.alert(&format!("Could not rename \"{}\": {}", original, e))
                    .await;
                self.keep_renaming(path);
                return RenameOutcome::Failed;
            }
        }

        let new_path = join_path(parent, &new_name);
        info!(from = path, to = %new_path, "renamed");
        self.carry_over_paths(path, &new_path).await;
        self.refresh_tree(Some(&new_path)).await;
        RenameOutcome::Renamed(new_path)
    }

    /// Whether renaming `path` moves the open file: it is the open file or
    /// one of its ancestors.
    async fn rename_moves_open_file(&self, path: &str, handle: &Handle<A::Handle>) -> bool {
        let prefix = format!("{}/", path);
        if self
            .current_path()
            .is_some_and(|p| p == path || p.starts_with(&prefix))
        {
            return true;
        }
        self.is_open_file(handle).await
    }

    async fn rename_unsupported(&self, path: &str) -> RenameOutcome {
        self.alert("Renaming is not supported by this filesystem.").await;
        self.cancel_rename(path);
        RenameOutcome::Unsupported
    }

    /// Release the commit slot and put focus back in the rename input.
    fn keep_renaming(&self, path: &str) {
        let selection = self.update(|s| {
            find_node_mut(&mut s.tree, path).map(|n| {
                n.resume_renaming();
                0..n.rename.buffer.chars().count()
            })
        });
        if let Some(selection) = selection {
            let view = Arc::clone(&self.inner.services.view);
            let path = path.to_string();
            self.schedule(move || view.focus_rename_input(&path, selection));
        }
    }

    /// Move highlight and collapse state from `from` (and below) to `to`.
    async fn carry_over_paths(&self, from: &str, to: &str) {
        let prefix = format!("{}/", from);
        let remap = |p: &str| -> Option<String> {
            if p == from {
                Some(to.to_string())
            } else {
                p.strip_prefix(&prefix).map(|rest| join_path(to, rest))
            }
        };
        let collapsed = self.update(|s| {
            if let Some(moved) = s.highlighted.as_deref().and_then(remap) {
                s.highlighted = Some(moved);
            }
            let before = s.collapsed.clone();
            s.collapsed = before
                .iter()
                .map(|p| remap(p.as_str()).unwrap_or_else(|| p.clone()))
                .collect();
            (s.collapsed != before).then(|| s.collapsed.clone())
        });
        if let Some(set) = collapsed {
            self.inner.services.session.save_collapsed(&set).await;
        }
    }
}
