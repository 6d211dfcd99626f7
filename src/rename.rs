//! File-name rules for rename commits and generated names.

use std::ops::Range;

/// Characters never allowed in a new name unless the original already had them.
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// What a commit attempt should do with the typed name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Empty, unchanged, or reduced to nothing by normalization.
    Cancel,
    /// First character that is not allowed.
    Invalid(char),
    /// Normalized name to rename to.
    Proceed(String),
}

/// Character range to pre-select when rename mode opens: the name without its
/// last extension, or the whole name when there is no extension.
///
/// A single leading dot (`.gitignore`) is not treated as an extension separator.
pub fn selection_range(name: &str) -> Range<usize> {
    match name.rfind('.') {
        Some(idx) if idx > 0 => 0..name[..idx].chars().count(),
        _ => 0..name.chars().count(),
    }
}

/// Collapse empty and padded dot segments, keeping one leading dot.
///
/// `"my . file . adoc"` becomes `"my.file.adoc"`; `"..."` becomes `""`.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let (leading_dot, rest) = match trimmed.strip_prefix('.') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let joined = rest
        .split('.')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".");
    if leading_dot && !joined.is_empty() {
        format!(".{}", joined)
    } else {
        joined
    }
}

/// Check a single character of a proposed name.
fn char_allowed(ch: char, original: &str) -> bool {
    if original.contains(ch) {
        return true;
    }
    if ch.is_ascii() {
        return (' '..='~').contains(&ch) && !FORBIDDEN.contains(&ch);
    }
    ch.is_alphabetic() || ch.is_numeric()
}

/// First disallowed character of `name`, if any.
pub fn find_invalid_char(name: &str, original: &str) -> Option<char> {
    name.chars().find(|&ch| !char_allowed(ch, original))
}

/// Run the name pipeline: trim, cancel-on-unchanged, normalize, validate.
pub fn check(raw: &str, original: &str) -> Verdict {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == original {
        return Verdict::Cancel;
    }
    let normalized = normalize(trimmed);
    if normalized.is_empty() || normalized == "." {
        return Verdict::Cancel;
    }
    match find_invalid_char(&normalized, original) {
        Some(ch) => Verdict::Invalid(ch),
        None => Verdict::Proceed(normalized),
    }
}

/// Whether `new_name` clashes (case-insensitively) with a sibling other than
/// the entry being renamed.
pub fn collides<S: AsRef<str>>(new_name: &str, original: &str, siblings: &[S]) -> bool {
    let wanted = new_name.to_lowercase();
    siblings
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| *name != original)
        .any(|name| name.to_lowercase() == wanted)
}

/// First `{stem}-N` (N from 1) not taken by `existing`, compared case-insensitively.
pub fn first_available_name<S: AsRef<str>>(stem: &str, existing: &[S]) -> String {
    let taken: Vec<String> = existing.iter().map(|s| s.as_ref().to_lowercase()).collect();
    let mut n = 1usize;
    loop {
        let candidate = format!("{}-{}", stem, n);
        if !taken.contains(&candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_excludes_last_extension() {
        assert_eq!(selection_range("notes.adoc"), 0..5);
        assert_eq!(selection_range("archive.tar.gz"), 0..11);
    }

    #[test]
    fn selection_without_extension_is_whole_name() {
        assert_eq!(selection_range("README"), 0..6);
        assert_eq!(selection_range(".gitignore"), 0..10);
    }

    #[test]
    fn selection_counts_characters_not_bytes() {
        assert_eq!(selection_range("résumé.adoc"), 0..6);
    }

    #[test]
    fn normalize_collapses_dot_segments() {
        assert_eq!(normalize(".a..b . c."), ".a.b.c");
        assert_eq!(normalize("my . file . adoc"), "my.file.adoc");
        assert_eq!(normalize("  plain.adoc "), "plain.adoc");
    }

    #[test]
    fn normalize_dot_only_is_empty() {
        assert_eq!(normalize("..."), "");
        assert_eq!(normalize("."), "");
    }

    #[test]
    fn check_cancels_on_empty_or_unchanged() {
        assert_eq!(check("   ", "a.adoc"), Verdict::Cancel);
        assert_eq!(check(" a.adoc ", "a.adoc"), Verdict::Cancel);
        assert_eq!(check("...", "a.adoc"), Verdict::Cancel);
    }

    #[test]
    fn check_rejects_forbidden_characters() {
        assert_eq!(check("bad/name.adoc", "file1.adoc"), Verdict::Invalid('/'));
        assert_eq!(check("what?.adoc", "file1.adoc"), Verdict::Invalid('?'));
        assert_eq!(check("tab\there", "file1.adoc"), Verdict::Invalid('\t'));
    }

    #[test]
    fn check_allows_characters_from_original() {
        assert_eq!(
            check("b a.adoc", "a b.adoc"),
            Verdict::Proceed("b a.adoc".into())
        );
        assert_eq!(check("x:y", "a:b"), Verdict::Proceed("x:y".into()));
    }

    #[test]
    fn check_allows_unicode_letters_and_numbers() {
        assert_eq!(
            check("日本語.adoc", "a.adoc"),
            Verdict::Proceed("日本語.adoc".into())
        );
        assert_eq!(check("a→b", "a.adoc"), Verdict::Invalid('→'));
    }

    #[test]
    fn check_normalizes_before_validating() {
        assert_eq!(
            check("my . file . adoc", "x"),
            Verdict::Proceed("my.file.adoc".into())
        );
    }

    #[test]
    fn collision_is_case_insensitive_and_skips_self() {
        let siblings = ["file1.adoc", "Conflict.adoc"];
        assert!(collides("conflict.adoc", "file1.adoc", &siblings));
        assert!(!collides("FILE1.adoc", "file1.adoc", &siblings));
        assert!(!collides("fresh.adoc", "file1.adoc", &siblings));
    }

    #[test]
    fn first_available_skips_taken_names() {
        assert_eq!(first_available_name::<&str>("new", &[]), "new-1");
        assert_eq!(first_available_name("new", &["new-1", "New-2"]), "new-3");
        assert_eq!(first_available_name("new", &["new-2"]), "new-1");
    }
}
