//! Editor widget boundary and the content helpers the store needs.

use std::ops::Range;

/// The text editor widget, as seen by the store.
pub trait EditorSurface: Send + Sync {
    /// Replace the document shown with `text`, highlighted as `mode`.
    fn show_document(&self, text: &str, mode: &str);

    /// Show an empty, detached editor.
    fn clear(&self);

    /// Move keyboard focus into the editor.
    fn focus(&self);

    /// Select and scroll to a byte range of the document.
    fn reveal_range(&self, range: Range<usize>);
}

/// Syntax mode hint for a file name.
pub fn mode_hint(name: &str) -> &'static str {
    let ext = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return "text",
    };
    match ext.as_str() {
        "adoc" | "asciidoc" | "asc" | "ad" => "asciidoc",
        "md" | "markdown" => "markdown",
        "toml" => "toml",
        "json" => "json",
        "yml" | "yaml" => "yaml",
        "rs" => "rust",
        "js" | "mjs" => "javascript",
        "ts" => "typescript",
        "css" => "css",
        "html" | "htm" => "html",
        "xml" | "svg" => "xml",
        "sh" | "bash" => "shell",
        "py" => "python",
        _ => "text",
    }
}

/// Whether the first bytes of a file contain a NUL, the binary-content heuristic.
pub fn looks_binary(head: &[u8]) -> bool {
    head.contains(&0)
}
