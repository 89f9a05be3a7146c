//! Discovered content store
//!
//! Holds the current search results. Each search bumps a generation
//! counter; a response is applied only if it carries the current
//! generation, so a slow, superseded response can never overwrite newer
//! results.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::remote::{DiscoveredContentEntry, SearchPage};

/// Search lifecycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SearchPhase {
    #[default]
    Idle,
    Searching,
    Results,
    Failed(String),
}

/// Copy of the search state for presentation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    pub generation: u64,
    pub query: String,
    pub page: u32,
    pub total_pages: u32,
    pub phase: SearchPhase,
    pub entries: Vec<DiscoveredContentEntry>,
}

/// Lock-protected search results
#[derive(Default)]
pub struct DiscoveredContentStore {
    state: Mutex<SearchState>,
}

impl DiscoveredContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SearchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new search, invalidating every earlier generation
    ///
    /// Previous results stay visible until the new response arrives.
    pub fn begin_search(&self, query: &str, page: u32) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.query = query.to_string();
        state.page = page;
        state.phase = SearchPhase::Searching;
        state.generation
    }

    pub fn current_generation(&self) -> u64 {
        self.lock().generation
    }

    /// Replace the results if `generation` is still current
    pub fn apply_results(&self, generation: u64, page: SearchPage) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.entries = page.entries;
        state.page = page.page;
        state.total_pages = page.total_pages;
        state.phase = SearchPhase::Results;
        true
    }

    /// Record a failure if `generation` is still current
    pub fn apply_failure(&self, generation: u64, message: String) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.phase = SearchPhase::Failed(message);
        true
    }

    /// Copy of the full state
    pub fn snapshot(&self) -> SearchState {
        self.lock().clone()
    }

    /// Copy of the current result list
    pub fn entries(&self) -> Vec<DiscoveredContentEntry> {
        self.lock().entries.clone()
    }

    pub fn find(&self, remote_id: &str) -> Option<DiscoveredContentEntry> {
        self.lock()
            .entries
            .iter()
            .find(|e| e.remote_id == remote_id)
            .cloned()
    }

    /// Attach a cached preview to an entry still in the results
    pub fn set_preview(&self, remote_id: &str, path: PathBuf) -> bool {
        let mut state = self.lock();
        match state.entries.iter_mut().find(|e| e.remote_id == remote_id) {
            Some(entry) => {
                entry.preview_image = Some(path);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_of(titles: &[&str]) -> SearchPage {
        SearchPage {
            entries: titles
                .iter()
                .enumerate()
                .map(|(i, t)| DiscoveredContentEntry {
                    remote_id: i.to_string(),
                    title: t.to_string(),
                    author: String::new(),
                    description: String::new(),
                    preview_url: None,
                    preview_image: None,
                    releases: Vec::new(),
                })
                .collect(),
            page: 1,
            total_pages: 1,
        }
    }

    #[test]
    fn test_stale_generation_is_discarded() {
        let store = DiscoveredContentStore::new();
        let a = store.begin_search("a", 1);
        let b = store.begin_search("b", 1);

        assert!(store.apply_results(b, page_of(&["b result"])));
        assert!(!store.apply_results(a, page_of(&["a result"])));
        assert!(!store.apply_failure(a, "late".into()));

        let state = store.snapshot();
        assert_eq!(state.query, "b");
        assert_eq!(state.phase, SearchPhase::Results);
        assert_eq!(state.entries[0].title, "b result");
    }

    #[test]
    fn test_results_replace_not_merge() {
        let store = DiscoveredContentStore::new();
        let g = store.begin_search("x", 1);
        store.apply_results(g, page_of(&["one", "two"]));
        let g = store.begin_search("y", 1);
        store.apply_results(g, page_of(&["three"]));
        assert_eq!(store.entries().len(), 1);
    }

    #[test]
    fn test_set_preview() {
        let store = DiscoveredContentStore::new();
        let g = store.begin_search("x", 1);
        store.apply_results(g, page_of(&["one"]));
        assert!(store.set_preview("0", PathBuf::from("/cache/0.jpg")));
        assert!(!store.set_preview("9", PathBuf::from("/cache/9.jpg")));
        assert_eq!(
            store.find("0").unwrap().preview_image,
            Some(PathBuf::from("/cache/0.jpg"))
        );
    }
}
