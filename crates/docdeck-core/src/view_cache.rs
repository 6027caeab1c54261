//! Registry of live engine instances, keyed by document path.
//!
//! ## Learning: Explicit Ownership Instead of a Global
//!
//! The cache is a plain struct owned by the workbench and lent out by
//! `&mut`. There is no hidden process-wide map; whoever holds the cache
//! decides who may touch it, and the borrow checker enforces it.
//!
//! The cache stores instances but never creates them. Teardown is always
//! explicit: `destroy_one` or `destroy_all`, never `Drop` of a stray entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use docdeck_engine::{EditorEngine, InstanceId};
use tokio::task::AbortHandle;

/// One cached engine instance plus its in-flight syntax load, if any.
#[derive(Debug)]
pub struct ViewEntry {
    instance: EditorEngine,
    pending_syntax: Option<AbortHandle>,
    /// Set by the instance's observer when its text changed and cleared
    /// when the tab store has caught up.
    content_changed: Arc<AtomicBool>,
}

impl ViewEntry {
    pub fn new(instance: EditorEngine) -> Self {
        Self {
            instance,
            pending_syntax: None,
            content_changed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag shared with the instance's observer.
    pub(crate) fn content_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.content_changed)
    }

    /// Clears the content-changed flag, returning whether it was set.
    pub fn take_content_change(&self) -> bool {
        self.content_changed.swap(false, Ordering::AcqRel)
    }

    pub fn id(&self) -> InstanceId {
        self.instance.id()
    }

    pub fn instance(&self) -> &EditorEngine {
        &self.instance
    }

    pub fn instance_mut(&mut self) -> &mut EditorEngine {
        &mut self.instance
    }

    /// Remembers the task loading this entry's syntax module so teardown
    /// can cancel it.
    pub fn set_pending_syntax(&mut self, handle: AbortHandle) {
        if let Some(previous) = self.pending_syntax.replace(handle) {
            previous.abort();
        }
    }

    /// Forgets the load task once its result has been applied.
    pub fn clear_pending_syntax(&mut self) {
        self.pending_syntax = None;
    }

    pub fn has_pending_syntax(&self) -> bool {
        self.pending_syntax.is_some()
    }

    fn teardown(&mut self) {
        if let Some(handle) = self.pending_syntax.take() {
            handle.abort();
        }
        self.instance.destroy();
    }
}

/// Path-keyed storage for engine instances. At most one live instance
/// exists per path.
#[derive(Debug, Default)]
pub struct ViewCache {
    entries: HashMap<String, ViewEntry>,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&ViewEntry> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut ViewEntry> {
        self.entries.get_mut(path)
    }

    /// Stores an entry. An entry already cached for the path is torn down
    /// first.
    pub fn set(&mut self, path: &str, entry: ViewEntry) {
        if let Some(mut previous) = self.entries.insert(path.to_string(), entry) {
            tracing::debug!("Replacing cached instance {} for {}", previous.id(), path);
            previous.teardown();
        }
    }

    pub fn has(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Returns true if the path holds the given instance.
    pub fn holds(&self, path: &str, id: InstanceId) -> bool {
        self.entries.get(path).is_some_and(|e| e.id() == id)
    }

    /// Tears down and removes one entry. Missing paths are a no-op
    /// returning false.
    pub fn destroy_one(&mut self, path: &str) -> bool {
        match self.entries.remove(path) {
            Some(mut entry) => {
                tracing::debug!("Destroying cached instance for {}", path);
                entry.teardown();
                true
            }
            None => false,
        }
    }

    /// Tears down every entry and empties the cache. Returns how many were
    /// destroyed.
    pub fn destroy_all(&mut self) -> usize {
        let count = self.entries.len();
        for (_, mut entry) in self.entries.drain() {
            entry.teardown();
        }
        if count > 0 {
            tracing::debug!("Destroyed {} cached instances", count);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached paths, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdeck_engine::DisplayOptions;
    use std::future::pending;

    fn entry(doc: &str) -> ViewEntry {
        ViewEntry::new(EditorEngine::new(doc, DisplayOptions::default()))
    }

    #[test]
    fn test_get_set_has() {
        let mut cache = ViewCache::new();
        assert!(!cache.has("/a.rs"));
        assert!(cache.get("/a.rs").is_none());

        let e = entry("fn a() {}");
        let id = e.id();
        cache.set("/a.rs", e);

        assert!(cache.has("/a.rs"));
        assert!(cache.holds("/a.rs", id));
        assert_eq!(cache.get("/a.rs").unwrap().instance().text(), "fn a() {}");
    }

    #[test]
    fn test_instance_survives_between_borrows() {
        let mut cache = ViewCache::new();
        cache.set("/a.rs", entry(""));

        cache
            .get_mut("/a.rs")
            .unwrap()
            .instance_mut()
            .replace_selection("typed")
            .unwrap();

        let instance = cache.get("/a.rs").unwrap().instance();
        assert_eq!(instance.text(), "typed");
        assert!(instance.can_undo());
    }

    #[test]
    fn test_destroy_one_missing_is_noop() {
        let mut cache = ViewCache::new();
        cache.set("/a.rs", entry(""));

        assert!(!cache.destroy_one("/b.rs"));
        assert_eq!(cache.len(), 1);

        assert!(cache.destroy_one("/a.rs"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_destroy_all() {
        let mut cache = ViewCache::new();
        cache.set("/b.rs", entry(""));
        cache.set("/a.rs", entry(""));
        assert_eq!(cache.paths(), ["/a.rs", "/b.rs"]);

        assert_eq!(cache.destroy_all(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.destroy_all(), 0);
    }

    #[tokio::test]
    async fn test_destroy_aborts_pending_syntax_load() {
        let mut cache = ViewCache::new();
        let task = tokio::spawn(pending::<()>());

        let mut e = entry("");
        e.set_pending_syntax(task.abort_handle());
        cache.set("/a.rs", e);
        assert!(cache.get("/a.rs").unwrap().has_pending_syntax());

        cache.destroy_one("/a.rs");

        let err = task.await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_set_replaces_and_tears_down_previous() {
        let mut cache = ViewCache::new();
        let task = tokio::spawn(pending::<()>());

        let mut first = entry("old");
        first.set_pending_syntax(task.abort_handle());
        cache.set("/a.rs", first);

        let second = entry("new");
        let second_id = second.id();
        cache.set("/a.rs", second);

        assert!(task.await.unwrap_err().is_cancelled());
        assert_eq!(cache.len(), 1);
        assert!(cache.holds("/a.rs", second_id));
    }
}
