use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::fs::{EntryKind, FsAdapter};
use crate::search::SearchKey;
use crate::store::{Direction, SelectMode, TreeStore};

/// What a key press asks the store to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ToggleSearch,
    Search(SearchKey),
    Navigate(Direction),
    OpenHighlighted,
    ToggleCollapsed,
    BeginRename,
    CommitRename,
    CancelRename,
    NewFile,
    NewDirectory,
    Save,
}

/// Keyboard context the mapping depends on.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyContext {
    pub search_visible: bool,
    pub renaming: bool,
}

/// Map a key press to an action.
pub fn map_key(key: KeyEvent, ctx: KeyContext) -> Option<Action> {
    let command = key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER);

    if command && key.code == KeyCode::Char('`') {
        return Some(Action::ToggleSearch);
    }

    if ctx.search_visible {
        let search = match key.code {
            KeyCode::Down => SearchKey::Down,
            KeyCode::Up => SearchKey::Up,
            KeyCode::PageDown => SearchKey::PageDown,
            KeyCode::PageUp => SearchKey::PageUp,
            KeyCode::Enter => SearchKey::Enter,
            KeyCode::Esc => SearchKey::Escape,
            _ => return None,
        };
        return Some(Action::Search(search));
    }

    if ctx.renaming {
        return match key.code {
            KeyCode::Enter => Some(Action::CommitRename),
            KeyCode::Esc => Some(Action::CancelRename),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Up => Some(Action::Navigate(Direction::Up)),
        KeyCode::Down => Some(Action::Navigate(Direction::Down)),
        KeyCode::Left => Some(Action::Navigate(Direction::Left)),
        KeyCode::Right => Some(Action::Navigate(Direction::Right)),
        KeyCode::Enter => Some(Action::OpenHighlighted),
        KeyCode::Char(' ') => Some(Action::ToggleCollapsed),
        KeyCode::F(2) => Some(Action::BeginRename),
        KeyCode::Char('s') if command => Some(Action::Save),
        KeyCode::Char('n') if command && key.modifiers.contains(KeyModifiers::SHIFT) => {
            Some(Action::NewDirectory)
        }
        KeyCode::Char('N') if command => Some(Action::NewDirectory),
        KeyCode::Char('n') if command => Some(Action::NewFile),
        _ => None,
    }
}

/// Handle a key event against the store.
pub async fn handle_key_event<A: FsAdapter>(store: &TreeStore<A>, key: KeyEvent) -> Option<Action> {
    let highlighted = store.highlighted_path();
    let ctx = KeyContext {
        search_visible: store.search_state().visible,
        renaming: highlighted
            .as_deref()
            .and_then(|p| store.rename_state(p))
            .is_some_and(|r| r.is_renaming),
    };
    let action = map_key(key, ctx)?;

    match action {
        Action::ToggleSearch => store.toggle_search(),
        Action::Search(search_key) => {
            store.search_key(search_key).await;
        }
        Action::Navigate(direction) => store.navigate(direction).await,
        Action::OpenHighlighted => {
            if let Some(path) = &highlighted {
                store.select_node(path, SelectMode::Focus).await;
            }
        }
        Action::ToggleCollapsed => {
            if let Some(path) = &highlighted {
                if store.node_kind(path) == Some(EntryKind::Directory) {
                    store.toggle_collapsed(path).await;
                }
            }
        }
        Action::BeginRename => {
            if let Some(path) = &highlighted {
                store.begin_rename(path);
            }
        }
        Action::CommitRename => {
            if let Some(path) = &highlighted {
                store.commit_rename(path).await;
            }
        }
        Action::CancelRename => {
            if let Some(path) = &highlighted {
                store.cancel_rename(path);
            }
        }
        Action::NewFile => {
            store.create_new_file(None).await;
        }
        Action::NewDirectory => {
            store.create_new_directory(None).await;
        }
        Action::Save => {
            store.save_file().await;
        }
    }
    Some(action)
}
