use std::sync::Arc;

use super::{SelectMode, TreeStore};
use crate::fs::FsAdapter;
use crate::search::{page_size, SearchKey, SearchOutcome};
use crate::tree::all_files;

impl<A: FsAdapter> TreeStore<A> {
    /// Show or hide the search overlay. Hiding forgets the query.
    pub fn toggle_search(&self) {
        let opened = self.update(|s| {
            if s.search.visible {
                s.search.close();
                false
            } else {
                s.search.visible = true;
                true
            }
        });
        if opened {
            self.focus_search_input();
        }
    }

    fn focus_search_input(&self) {
        let view = Arc::clone(&self.inner.services.view);
        self.schedule(move || view.focus_search_input());
    }

    /// Re-rank every file in the tree against `query`.
    pub fn set_search_query(&self, query: &str) {
        self.update(|s| {
            let paths: Vec<String> = all_files(&s.tree).into_iter().map(|n| n.path.clone()).collect();
            s.search.set_results(query, &paths);
        });
    }

    /// Apply a key to the result list and carry out what it asks for.
    pub async fn search_key(&self, key: SearchKey) -> SearchOutcome {
        let page = page_size(
            self.inner.services.view.search_list_metrics(),
            self.inner.settings.page_size_fallback,
        );
        let outcome = self.update(|s| s.search.apply_key(key, page));
        match &outcome {
            SearchOutcome::Open(path) => self.open_search_result(path).await,
            SearchOutcome::FocusInput | SearchOutcome::QueryCleared => self.focus_search_input(),
            SearchOutcome::Close => self.update(|s| s.search.close()),
            SearchOutcome::Moved => {}
        }
        outcome
    }

    /// Open a file picked from the results and close search.
    pub async fn open_search_result(&self, path: &str) {
        self.update(|s| s.search.close());
        self.expand_ancestors(path).await;
        self.select_node(path, SelectMode::Focus).await;
        let view = Arc::clone(&self.inner.services.view);
        let path = path.to_string();
        self.schedule(move || view.reveal_item(&path));
    }
}
