//! Terminal stand-ins for the store's UI collaborators, used by the `adt` CLI.

use std::ops::Range;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Stdin};
use tracing::debug;

use crate::boundary::{DialogOptions, Dialogs, DirectoryPicker, TreeView};
use crate::editor::EditorSurface;

/// Alerts on stderr; confirms read `y`/`n` from stdin.
pub struct ConsoleDialogs<R = Stdin> {
    assume_yes: bool,
    // One reader for every prompt, so piped answers read ahead stay buffered.
    input: tokio::sync::Mutex<BufReader<R>>,
}

impl ConsoleDialogs {
    /// With `assume_yes` every confirm is accepted without prompting.
    pub fn new(assume_yes: bool) -> Self {
        Self::with_input(assume_yes, tokio::io::stdin())
    }
}

impl<R: AsyncRead + Unpin + Send> ConsoleDialogs<R> {
    /// Read answers from `input` instead of stdin.
    pub fn with_input(assume_yes: bool, input: R) -> Self {
        Self {
            assume_yes,
            input: tokio::sync::Mutex::new(BufReader::new(input)),
        }
    }
}

fn prefixed(message: &str, options: &DialogOptions) -> String {
    match &options.title {
        Some(title) => format!("{}: {}", title, message),
        None => message.to_string(),
    }
}

/// `y`/`yes` (any case) is a yes; anything else is a no.
pub fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> Dialogs for ConsoleDialogs<R> {
    async fn alert(&self, message: &str, options: DialogOptions) {
        eprintln!("{}", prefixed(message, &options));
    }

    async fn confirm(&self, message: &str, options: DialogOptions) -> bool {
        let label = options.confirm_label.clone().unwrap_or_else(|| "OK".into());
        if self.assume_yes {
            eprintln!("{} [{}: yes]", prefixed(message, &options), label);
            return true;
        }
        eprint!("{} [{}? y/N] ", prefixed(message, &options), label);
        let mut line = String::new();
        let mut input = self.input.lock().await;
        match input.read_line(&mut line).await {
            Ok(_) => parse_answer(&line),
            Err(_) => false,
        }
    }
}

/// Picker that always answers with the directory given on the command line.
pub struct FixedPicker<H> {
    root: Option<H>,
}

impl<H> FixedPicker<H> {
    pub fn new(root: Option<H>) -> Self {
        Self { root }
    }
}

#[async_trait]
impl<H: Clone + Send + Sync> DirectoryPicker<H> for FixedPicker<H> {
    async fn pick_directory(&self) -> Option<H> {
        self.root.clone()
    }
}

/// A view with nothing to focus; requests are logged.
pub struct LogView;

impl TreeView for LogView {
    fn focus_item(&self, path: &str) {
        debug!(path, "focus item");
    }

    fn reveal_item(&self, path: &str) {
        debug!(path, "reveal item");
    }

    fn focus_rename_input(&self, path: &str, selection: Range<usize>) {
        debug!(path, ?selection, "focus rename input");
    }

    fn focus_search_input(&self) {
        debug!("focus search input");
    }
}

/// Editor that keeps the last shown document so the CLI can print it.
#[derive(Default)]
pub struct HeadlessEditor {
    shown: Mutex<Option<(String, String)>>,
}

impl HeadlessEditor {
    /// `(text, mode)` of the document on screen.
    pub fn shown(&self) -> Option<(String, String)> {
        self.shown.lock().clone()
    }
}

impl EditorSurface for HeadlessEditor {
    fn show_document(&self, text: &str, mode: &str) {
        *self.shown.lock() = Some((text.to_string(), mode.to_string()));
    }

    fn clear(&self) {
        *self.shown.lock() = None;
    }

    fn focus(&self) {}

    fn reveal_range(&self, range: Range<usize>) {
        debug!(?range, "reveal range");
    }
}
