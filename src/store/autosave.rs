//! Periodic auto-save of the open file.
//!
//! The timer task holds only a weak reference to the store, so dropping the
//! last store handle ends it at the next tick.

use std::sync::Arc;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::TreeStore;
use crate::fs::FsAdapter;

impl<A: FsAdapter> TreeStore<A> {
    /// (Re)start the timer for a freshly opened file.
    pub(crate) fn restart_autosave(&self) {
        self.stop_autosave();
        if !self.inner.settings.autosave_enabled {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.settings.autosave_interval;
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                TreeStore { inner }.autosave_tick().await;
            }
        });
        *self.inner.autosave.lock() = Some(task);
    }

    pub(crate) fn stop_autosave(&self) {
        if let Some(task) = self.inner.autosave.lock().take() {
            task.abort();
        }
    }

    pub fn autosave_running(&self) -> bool {
        self.inner.autosave.lock().is_some()
    }

    /// One auto-save pass: save only when there is something to save.
    pub async fn autosave_tick(&self) -> bool {
        if !self.is_dirty() {
            return false;
        }
        debug!("auto-saving");
        self.save_file().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::testing::*;
    use crate::store::{SelectMode, StoreSettings};

    fn fs() -> MemoryFs {
        let fs = MemoryFs::new();
        fs.add_file("a.adoc", "X");
        fs.add_file("b.adoc", "B");
        fs
    }

    fn autosaving() -> StoreSettings {
        StoreSettings {
            autosave_enabled: true,
            ..StoreSettings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dirty_file_is_saved_on_the_interval() {
        let h = Harness::opened_with(fs(), autosaving()).await;
        h.store.select_node("a.adoc", SelectMode::Focus).await;
        assert!(h.store.autosave_running());
        h.store.set_content("typed");

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(h.fs.write_count(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.fs.write_count(), 1);
        assert_eq!(h.fs.read_string("a.adoc").as_deref(), Some("typed"));
        assert!(!h.store.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn clean_file_is_not_rewritten() {
        let h = Harness::opened_with(fs(), autosaving()).await;
        h.store.select_node("a.adoc", SelectMode::Focus).await;

        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(h.fs.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_autosave_never_writes() {
        let h = Harness::opened(fs()).await;
        h.store.select_node("a.adoc", SelectMode::Focus).await;
        assert!(!h.store.autosave_running());
        h.store.set_content("typed");

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.fs.write_count(), 0);
        assert!(h.store.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_open_file_stops_timer() {
        let h = Harness::opened_with(fs(), autosaving()).await;
        h.store.select_node("a.adoc", SelectMode::Focus).await;
        h.store.set_content("typed");
        h.store.delete_entry("a.adoc").await;

        assert!(!h.store.autosave_running());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.fs.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_files_restarts_timer() {
        let h = Harness::opened_with(fs(), autosaving()).await;
        h.store.select_node("a.adoc", SelectMode::Focus).await;
        tokio::time::sleep(Duration::from_secs(4)).await;
        h.store.select_node("b.adoc", SelectMode::Focus).await;
        h.store.set_content("B2");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.fs.write_count(), 0);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(h.fs.read_string("b.adoc").as_deref(), Some("B2"));
    }
}
