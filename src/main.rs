use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use adoc_tree::boundary::{DialogOptions, Dialogs};
use adoc_tree::config::{AppConfig, WatcherConfig};
use adoc_tree::console::{ConsoleDialogs, FixedPicker, HeadlessEditor, LogView};
use adoc_tree::error::{AppError, Result};
use adoc_tree::fs::local::{open_root, LocalFs};
use adoc_tree::fs::watcher::{FsWatcher, DEFAULT_FLOOD_THRESHOLD, DEFAULT_IGNORE_PATTERNS};
use adoc_tree::fs::EntryKind;
use adoc_tree::logging;
use adoc_tree::session::{JsonFileStore, KeyValueStore, MemoryKv, Session};
use adoc_tree::store::rename::RenameOutcome;
use adoc_tree::store::{SelectMode, Services, TreeStore};

/// File tree manager for AsciiDoc projects.
#[derive(Parser, Debug)]
#[command(name = "adt", version, about)]
struct Cli {
    /// Root directory (defaults to the last session's root, then ".")
    path: Option<PathBuf>,

    /// Config file to load on top of the usual locations
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable filesystem watcher (auto-refresh)
    #[arg(long)]
    no_watcher: bool,

    /// Answer yes to every confirmation
    #[arg(short, long)]
    yes: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tree
    Tree,
    /// Fuzzy-search file paths
    Search { query: String },
    /// Print a file's content
    Open { path: String },
    /// Create `new-N` (or `new-folder-N`), optionally renaming it right away
    New {
        #[arg(long)]
        dir: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        folder: bool,
    },
    /// Rename an entry
    Rename { path: String, name: String },
    /// Delete an entry
    Rm { path: String },
    /// Print the tree whenever it changes on disk
    Watch,
}

type Store = TreeStore<LocalFs>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = cli.no_watcher.then(|| AppConfig {
        watcher: WatcherConfig {
            enabled: Some(false),
            ..WatcherConfig::default()
        },
        ..AppConfig::default()
    });
    let config = AppConfig::load(cli.config.as_deref(), overrides.as_ref());
    let _log = logging::init(config.log_dir().as_deref(), config.log_level());

    let root = match &cli.path {
        Some(path) => Some(open_root(path).await?),
        None => None,
    };

    let kv: Arc<dyn KeyValueStore> = match config.state_file() {
        Some(path) => Arc::new(JsonFileStore::new(path)),
        None => Arc::new(MemoryKv::new()),
    };
    let dialogs = Arc::new(ConsoleDialogs::new(cli.yes));
    let editor = Arc::new(HeadlessEditor::default());
    let services = Services {
        fs: Arc::new(LocalFs::new()),
        dialogs: dialogs.clone(),
        picker: Arc::new(FixedPicker::new(root.clone())),
        view: Arc::new(LogView),
        editor: editor.clone(),
        session: Session::new(kv),
    };
    let store = TreeStore::new(services, config.store_settings());

    let opened = if root.is_some() {
        store.open_directory().await
    } else {
        let fallback = open_root(&PathBuf::from(".")).await?;
        if config.restore_session() {
            store.restore_or_open(fallback).await
        } else {
            store.set_root(fallback).await
        }
    };
    if !opened {
        if store.awaiting_permission() {
            return Err(AppError::PermissionDenied(
                "the last session's folder is not readable".into(),
            ));
        }
        return Err(AppError::InvalidPath("could not open the root directory".into()));
    }
    store.drain_effects();

    match cli.command.unwrap_or(Command::Tree) {
        Command::Tree => print_tree(&store),
        Command::Search { query } => {
            store.toggle_search();
            store.set_search_query(&query);
            for result in store.search_state().results {
                println!("{}", result.path);
            }
        }
        Command::Open { path } => {
            store.select_node(&path, SelectMode::Show).await;
            match editor.shown() {
                Some((text, _)) => print!("{}", text),
                None => eprintln!("{} was not opened", path),
            }
        }
        Command::New { dir, name, folder } => {
            let created = if folder {
                store.create_new_directory(dir.as_deref()).await
            } else {
                store.create_new_file(dir.as_deref()).await
            };
            if let Some(path) = created {
                match name {
                    Some(name) => report(rename_entry(&store, &path, &name).await, &path),
                    None => {
                        store.cancel_rename(&path);
                        println!("{}", path);
                    }
                }
            }
        }
        Command::Rename { path, name } => {
            if store.begin_rename(&path) {
                report(rename_entry(&store, &path, &name).await, &path);
            } else {
                eprintln!("{} is not in the tree", path);
            }
        }
        Command::Rm { path } => {
            let what = match store.node_kind(&path) {
                Some(EntryKind::Directory) => "folder",
                Some(EntryKind::File) => "file",
                None => {
                    eprintln!("{} is not in the tree", path);
                    return Ok(());
                }
            };
            let options = DialogOptions {
                title: Some("Delete".into()),
                confirm_label: Some("Delete".into()),
                danger: true,
            };
            let message = format!("Delete the {} \"{}\"?", what, path);
            if dialogs.confirm(&message, options).await && store.delete_entry(&path).await {
                println!("deleted {}", path);
            }
        }
        Command::Watch => watch(&store, &config).await?,
    }

    store.drain_effects();
    store.shutdown().await;
    Ok(())
}

async fn rename_entry(store: &Store, path: &str, name: &str) -> RenameOutcome {
    store.set_rename_buffer(path, name);
    let outcome = store.commit_rename(path).await;
    if !matches!(outcome, RenameOutcome::Renamed(_)) {
        store.cancel_rename(path);
    }
    outcome
}

fn report(outcome: RenameOutcome, path: &str) {
    match outcome {
        RenameOutcome::Renamed(new_path) => println!("{}", new_path),
        RenameOutcome::Cancelled => println!("{}", path),
        other => eprintln!("{} not renamed ({:?})", path, other),
    }
}

fn print_tree(store: &Store) {
    for item in store.visible_items() {
        let marker = match (item.kind, item.is_expanded) {
            (EntryKind::Directory, true) => "▾ ",
            (EntryKind::Directory, false) => "▸ ",
            (EntryKind::File, _) => "  ",
        };
        println!("{}{}{}", "  ".repeat(item.depth), marker, item.name);
    }
}

async fn watch(store: &Store, config: &AppConfig) -> Result<()> {
    if !config.watcher_enabled() {
        return Err(AppError::Config("the watcher is disabled".into()));
    }
    let Some(root) = store.root().map(|handle| handle.path) else {
        return Err(AppError::InvalidPath("no root directory is open".into()));
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let ignore_patterns: Vec<String> = DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect();
    let _watcher = FsWatcher::new(
        &root,
        Duration::from_millis(config.debounce_ms()),
        ignore_patterns,
        DEFAULT_FLOOD_THRESHOLD,
        tx,
    )
    .map_err(|e| AppError::Config(format!("watcher unavailable: {}", e)))?;

    print_tree(store);
    loop {
        tokio::select! {
            change = rx.recv() => {
                let Some(change) = change else { break };
                tracing::debug!(paths = change.paths.len(), "filesystem changed");
                if store.refresh_tree(None).await {
                    store.drain_effects();
                    println!();
                    print_tree(store);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
