//! Fuzzy file search: ranking and the result-list keyboard model.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

/// Rows per page when the result list cannot be measured.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// A single fuzzy-search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Root-relative path of the file.
    pub path: String,
    /// Match score (higher is better).
    pub score: i64,
    /// Character indices in `path` that matched the query.
    pub match_indices: Vec<usize>,
    /// Whether this row carries the keyboard highlight.
    pub highlighted: bool,
}

/// State for the search overlay.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub query: String,
    pub visible: bool,
    pub results: Vec<SearchResult>,
    highlighted: Option<usize>,
}

/// Keys the result list reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKey {
    Down,
    Up,
    PageDown,
    PageUp,
    Enter,
    Escape,
}

/// What the owner must do after a key was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Highlight moved (or nothing happened).
    Moved,
    /// Highlight cleared; keyboard context returns to the query input.
    FocusInput,
    /// Open this path and close search.
    Open(String),
    /// Query was cleared.
    QueryCleared,
    /// Search should close.
    Close,
}

/// Measured geometry of the result list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListMetrics {
    pub container_height: f32,
    pub row_height: f32,
}

/// Rows that fit in the visible list, or `fallback` if it cannot be measured.
pub fn page_size(metrics: Option<ListMetrics>, fallback: usize) -> usize {
    match metrics {
        Some(m) if m.row_height > 0.0 && m.container_height > 0.0 => {
            ((m.container_height / m.row_height).floor() as usize).max(1)
        }
        _ => fallback,
    }
}

/// Rank `items` against `query`, best match first. Non-matches are dropped.
///
/// An empty query ranks nothing.
pub fn rank<'a, T, F>(items: &'a [T], selector: F, query: &str) -> Vec<(&'a T, i64, Vec<usize>)>
where
    F: Fn(&T) -> &str,
{
    if query.is_empty() {
        return Vec::new();
    }
    let matcher = SkimMatcherV2::default();
    let mut ranked: Vec<(&T, i64, Vec<usize>)> = items
        .iter()
        .filter_map(|item| {
            matcher
                .fuzzy_indices(selector(item), query)
                .map(|(score, indices)| (item, score, indices))
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

impl SearchState {
    /// Index of the highlighted result.
    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    fn set_highlight(&mut self, index: Option<usize>) {
        self.highlighted = index.filter(|&i| i < self.results.len());
        for (i, result) in self.results.iter_mut().enumerate() {
            result.highlighted = Some(i) == self.highlighted;
        }
    }

    /// Replace the query and its ranked results. The highlight resets.
    pub fn set_results(&mut self, query: &str, paths: &[String]) {
        self.query = query.to_string();
        self.results = rank(paths, |p| p.as_str(), query)
            .into_iter()
            .map(|(path, score, match_indices)| SearchResult {
                path: path.clone(),
                score,
                match_indices,
                highlighted: false,
            })
            .collect();
        self.highlighted = None;
    }

    /// Hide the overlay and forget the query.
    pub fn close(&mut self) {
        self.visible = false;
        self.clear_query();
    }

    fn clear_query(&mut self) {
        self.query.clear();
        self.results.clear();
        self.highlighted = None;
    }

    /// Apply a key press to the result list.
    pub fn apply_key(&mut self, key: SearchKey, page: usize) -> SearchOutcome {
        let len = self.results.len();
        let page = page.max(1);
        match key {
            SearchKey::Down => {
                if len > 0 {
                    let next = self.highlighted.map_or(0, |i| (i + 1).min(len - 1));
                    self.set_highlight(Some(next));
                }
                SearchOutcome::Moved
            }
            SearchKey::PageDown => {
                if len > 0 {
                    let next = self.highlighted.map_or(page - 1, |i| i + page).min(len - 1);
                    self.set_highlight(Some(next));
                }
                SearchOutcome::Moved
            }
            SearchKey::Up => match self.highlighted {
                Some(0) => {
                    self.set_highlight(None);
                    SearchOutcome::FocusInput
                }
                Some(i) => {
                    self.set_highlight(Some(i - 1));
                    SearchOutcome::Moved
                }
                None => SearchOutcome::Moved,
            },
            SearchKey::PageUp => match self.highlighted {
                Some(0) => {
                    self.set_highlight(None);
                    SearchOutcome::FocusInput
                }
                Some(i) => {
                    self.set_highlight(Some(i.saturating_sub(page)));
                    SearchOutcome::Moved
                }
                None => SearchOutcome::Moved,
            },
            SearchKey::Enter => {
                let target = self.highlighted.or(if len > 0 { Some(0) } else { None });
                match target.and_then(|i| self.results.get(i)) {
                    Some(result) => SearchOutcome::Open(result.path.clone()),
                    None => SearchOutcome::Moved,
                }
            }
            SearchKey::Escape => {
                if self.query.is_empty() {
                    SearchOutcome::Close
                } else {
                    self.clear_query();
                    SearchOutcome::QueryCleared
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> Vec<String> {
        (0..25).map(|i| format!("docs/chapter-{:02}.adoc", i)).collect()
    }

    fn state_with_results() -> SearchState {
        let mut state = SearchState {
            visible: true,
            ..SearchState::default()
        };
        state.set_results("chapter", &paths());
        state
    }

    #[test]
    fn rank_orders_best_first_and_drops_misses() {
        let items = vec![
            "guide/install.adoc".to_string(),
            "index.adoc".to_string(),
            "notes.txt".to_string(),
        ];
        let ranked = rank(&items, |s| s.as_str(), "index");
        assert_eq!(ranked[0].0, "index.adoc");
        assert!(!ranked.iter().any(|(p, _, _)| p.as_str() == "notes.txt"));
    }

    #[test]
    fn rank_matches_subsequence_of_full_path() {
        let items = vec!["guide/install.adoc".to_string()];
        let ranked = rank(&items, |s| s.as_str(), "gdinst");
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn empty_query_ranks_nothing() {
        assert!(rank(&paths(), |s| s.as_str(), "").is_empty());
    }

    #[test]
    fn down_clamps_at_last_result() {
        let mut state = state_with_results();
        for _ in 0..40 {
            state.apply_key(SearchKey::Down, 10);
        }
        assert_eq!(state.highlighted(), Some(24));
    }

    #[test]
    fn up_from_first_clears_highlight() {
        let mut state = state_with_results();
        state.apply_key(SearchKey::Down, 10);
        assert_eq!(state.highlighted(), Some(0));
        assert_eq!(state.apply_key(SearchKey::Up, 10), SearchOutcome::FocusInput);
        assert_eq!(state.highlighted(), None);
        assert!(state.results.iter().all(|r| !r.highlighted));
    }

    #[test]
    fn only_one_result_flag_is_set() {
        let mut state = state_with_results();
        state.apply_key(SearchKey::Down, 10);
        state.apply_key(SearchKey::Down, 10);
        let flagged: Vec<usize> = state
            .results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.highlighted)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(flagged, vec![1]);
    }

    #[test]
    fn page_keys_move_by_page_and_clamp() {
        let mut state = state_with_results();
        state.apply_key(SearchKey::PageDown, 10);
        assert_eq!(state.highlighted(), Some(9));
        state.apply_key(SearchKey::PageDown, 10);
        assert_eq!(state.highlighted(), Some(19));
        state.apply_key(SearchKey::PageDown, 10);
        assert_eq!(state.highlighted(), Some(24));
        state.apply_key(SearchKey::PageUp, 10);
        assert_eq!(state.highlighted(), Some(14));
        state.apply_key(SearchKey::PageUp, 20);
        assert_eq!(state.highlighted(), Some(0));
        assert_eq!(state.apply_key(SearchKey::PageUp, 10), SearchOutcome::FocusInput);
    }

    #[test]
    fn enter_opens_highlighted_or_first() {
        let mut state = state_with_results();
        let first = state.results[0].path.clone();
        assert_eq!(state.apply_key(SearchKey::Enter, 10), SearchOutcome::Open(first));
        state.apply_key(SearchKey::Down, 10);
        state.apply_key(SearchKey::Down, 10);
        let second = state.results[1].path.clone();
        assert_eq!(state.apply_key(SearchKey::Enter, 10), SearchOutcome::Open(second));
    }

    #[test]
    fn escape_clears_query_then_closes() {
        let mut state = state_with_results();
        assert_eq!(state.apply_key(SearchKey::Escape, 10), SearchOutcome::QueryCleared);
        assert!(state.query.is_empty());
        assert!(state.results.is_empty());
        assert_eq!(state.apply_key(SearchKey::Escape, 10), SearchOutcome::Close);
    }

    #[test]
    fn page_size_uses_measurement_or_fallback() {
        let m = ListMetrics {
            container_height: 300.0,
            row_height: 24.0,
        };
        assert_eq!(page_size(Some(m), DEFAULT_PAGE_SIZE), 12);
        assert_eq!(page_size(None, DEFAULT_PAGE_SIZE), 10);
        let unmeasured = ListMetrics {
            container_height: 300.0,
            row_height: 0.0,
        };
        assert_eq!(page_size(Some(unmeasured), DEFAULT_PAGE_SIZE), 10);
    }
}
