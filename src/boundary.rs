//! Collaborators the store talks to but does not own: dialogs, the directory
//! picker and the tree view.

use std::ops::Range;

use async_trait::async_trait;

use crate::search::ListMetrics;

/// Presentation hints for a dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialogOptions {
    pub title: Option<String>,
    pub confirm_label: Option<String>,
    /// Style the confirm button as destructive.
    pub danger: bool,
}

impl DialogOptions {
    pub fn titled(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Self::default()
        }
    }
}

/// Alert / confirm boundary. Both calls suspend until the user answers.
#[async_trait]
pub trait Dialogs: Send + Sync {
    async fn alert(&self, message: &str, options: DialogOptions);

    async fn confirm(&self, message: &str, options: DialogOptions) -> bool;
}

/// Asks the user for a new root directory. `None` means the picker was dismissed.
#[async_trait]
pub trait DirectoryPicker<H>: Send + Sync {
    async fn pick_directory(&self) -> Option<H>;
}

/// Where keyboard focus went when a rename input lost it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusTarget {
    /// The rename confirmation dialog itself.
    RenameDialog,
    TreeItem(String),
    Editor,
    SearchInput,
    Elsewhere,
}

/// Rendering layer for the tree and search overlay.
///
/// These calls run from drained effects, after the target element exists.
pub trait TreeView: Send + Sync {
    fn focus_item(&self, path: &str);

    /// Scroll a row into view without moving focus.
    fn reveal_item(&self, path: &str);

    /// Focus the inline rename input and select `selection` (character range).
    fn focus_rename_input(&self, path: &str, selection: Range<usize>);

    fn focus_search_input(&self);

    /// Geometry of the search result list, if it has been laid out.
    fn search_list_metrics(&self) -> Option<ListMetrics> {
        None
    }
}
