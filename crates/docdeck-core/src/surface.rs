//! The mount adapter between open tabs and cached engine instances.
//!
//! ## Learning: Channels Instead of Shared Mutable State
//!
//! An engine observer cannot hold `&mut DocumentTabStore`: the store is
//! owned elsewhere and borrowed mutably by other code. Instead the observer
//! owns an `mpsc::UnboundedSender` and pushes `SurfaceEvent`s. The owner of
//! the store drains the receiver and applies events in order.
//!
//! Background syntax loads report back through the same channel, so edits
//! and load completions are applied on one logical thread.
//!
//! Content events are markers, not copies. A burst of keystrokes queues a
//! single `ContentChanged`; the text is read from the instance once, when
//! the marker is applied.
//!
//! ## Stale Results
//!
//! Every event carries the `InstanceId` that produced it. Before applying
//! one, the surface checks that the cache still holds that exact instance
//! for the path. A document that was closed (or closed and reopened) while
//! a load was in flight simply drops the late result.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use docdeck_engine::{
    ContainerId, CursorInfo, DisplayOptions, EditorEngine, EngineUpdate, InstanceId,
};
use docdeck_syntax::{SyntaxLoader, SyntaxModule};
use tokio::sync::mpsc;

use crate::tabs::DocumentTabStore;
use crate::view_cache::{ViewCache, ViewEntry};
use crate::{CoreError, CoreResult};

/// A change reported by a cached instance or a finished syntax load.
#[derive(Debug, Clone)]
pub enum SurfaceEvent {
    /// The instance's text changed since the tab store last read it.
    ContentChanged { path: String, instance: InstanceId },
    /// The instance's cursor or selection moved.
    CursorMoved {
        path: String,
        instance: InstanceId,
        cursor: CursorInfo,
    },
    /// A syntax load finished; `None` means plain text.
    SyntaxLoaded {
        path: String,
        instance: InstanceId,
        module: Option<Arc<SyntaxModule>>,
    },
}

impl SurfaceEvent {
    pub fn path(&self) -> &str {
        match self {
            Self::ContentChanged { path, .. }
            | Self::CursorMoved { path, .. }
            | Self::SyntaxLoaded { path, .. } => path,
        }
    }

    pub fn instance(&self) -> InstanceId {
        match self {
            Self::ContentChanged { instance, .. }
            | Self::CursorMoved { instance, .. }
            | Self::SyntaxLoaded { instance, .. } => *instance,
        }
    }
}

/// What applying one queued event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Tab content was updated.
    Content,
    /// The cursor projection changed.
    Cursor(CursorInfo),
    /// A syntax load was applied; false when it resolved to plain text.
    Syntax(bool),
    /// Settings changed; true when the display options changed with them.
    Settings(bool),
    /// The producing instance no longer owns the path; nothing changed.
    Stale,
}

/// Mounts one document at a time into a visible container.
#[derive(Debug)]
pub struct EditingSurface {
    container: ContainerId,
    loader: SyntaxLoader,
    events_tx: mpsc::UnboundedSender<SurfaceEvent>,
    events_rx: mpsc::UnboundedReceiver<SurfaceEvent>,
    mounted: Option<String>,
}

impl EditingSurface {
    pub fn new(container: ContainerId, loader: SyntaxLoader) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            container,
            loader,
            events_tx,
            events_rx,
            mounted: None,
        }
    }

    pub fn container(&self) -> ContainerId {
        self.container
    }

    pub fn loader(&self) -> &SyntaxLoader {
        &self.loader
    }

    pub fn mounted_path(&self) -> Option<&str> {
        self.mounted.as_deref()
    }

    // ==================== Mount / Unmount ====================

    /// Shows the document at `path`.
    ///
    /// Reuses the cached instance when there is one, otherwise creates it
    /// from the tab's current content and starts loading its syntax. Any
    /// other mounted document is unmounted first.
    pub fn mount(
        &mut self,
        path: &str,
        tabs: &mut DocumentTabStore,
        cache: &mut ViewCache,
        display: DisplayOptions,
    ) -> CoreResult<InstanceId> {
        if self.mounted.as_deref() == Some(path) {
            if let Some(entry) = cache.get(path) {
                return Ok(entry.id());
            }
        }
        self.unmount(tabs, cache);

        let tab = tabs
            .tab(path)
            .ok_or_else(|| CoreError::DocumentNotFound(path.to_string()))?;
        let scroll = tab.scroll_position;

        if !cache.has(path) {
            let entry = self.create_entry(path, &tab.content, &tab.file_type_token, display)?;
            cache.set(path, entry);
        }

        let entry = cache
            .get_mut(path)
            .ok_or_else(|| CoreError::DocumentNotFound(path.to_string()))?;
        let instance = entry.instance_mut();

        // Settings may have changed while this instance was hidden.
        if *instance.display_slot().get() != display {
            instance.reconfigure_display(display)?;
        }

        instance.attach(self.container)?;
        if let Some(pos) = scroll {
            instance.scroll_to(pos);
        }

        tracing::debug!("Mounted {} ({})", path, instance.id());
        self.mounted = Some(path.to_string());
        Ok(instance.id())
    }

    /// Hides the mounted document: saves its scroll offset into the tab
    /// and detaches the instance, keeping it alive in the cache.
    pub fn unmount(&mut self, tabs: &mut DocumentTabStore, cache: &mut ViewCache) -> Option<String> {
        let path = self.mounted.take()?;

        if let Some(entry) = cache.get_mut(&path) {
            let instance = entry.instance_mut();
            tabs.update_scroll_position(&path, instance.scroll_position());
            instance.detach();
        }

        tracing::debug!("Unmounted {}", path);
        Some(path)
    }

    // ==================== Events ====================

    /// Returns the next queued event without waiting.
    pub fn try_next_event(&mut self) -> Option<SurfaceEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Waits for the next event.
    pub async fn next_event(&mut self) -> Option<SurfaceEvent> {
        self.events_rx.recv().await
    }

    /// Applies one event to the tab store or cache, unless the instance
    /// that produced it no longer owns its path.
    pub fn dispatch(
        &self,
        event: SurfaceEvent,
        tabs: &mut DocumentTabStore,
        cache: &mut ViewCache,
    ) -> Dispatched {
        if !cache.holds(event.path(), event.instance()) {
            tracing::debug!(
                "Dropping event from retired instance {} for {}",
                event.instance(),
                event.path()
            );
            return Dispatched::Stale;
        }

        match event {
            SurfaceEvent::ContentChanged { path, .. } => {
                let Some(entry) = cache.get(&path) else {
                    return Dispatched::Stale;
                };
                entry.take_content_change();
                tabs.update_content(&path, &entry.instance().text());
                Dispatched::Content
            }
            SurfaceEvent::CursorMoved { cursor, .. } => Dispatched::Cursor(cursor),
            SurfaceEvent::SyntaxLoaded { path, module, .. } => {
                let Some(entry) = cache.get_mut(&path) else {
                    return Dispatched::Stale;
                };
                entry.clear_pending_syntax();

                let applied = module.is_some();
                if let Err(err) = entry.instance_mut().reconfigure_syntax(module) {
                    tracing::warn!("Could not apply syntax to {}: {}", path, err);
                    return Dispatched::Stale;
                }
                Dispatched::Syntax(applied)
            }
        }
    }

    // ==================== Internals ====================

    fn create_entry(
        &self,
        path: &str,
        content: &str,
        token: &str,
        display: DisplayOptions,
    ) -> CoreResult<ViewEntry> {
        let mut entry = ViewEntry::new(EditorEngine::new(content, display));
        let id = entry.id();

        let tx = self.events_tx.clone();
        let observed_path = path.to_string();
        let content_changed = entry.content_signal();
        entry
            .instance_mut()
            .observe(Box::new(move |update: &EngineUpdate| {
                // Only the first change after a read queues a marker.
                if update.doc_changed() && !content_changed.swap(true, Ordering::AcqRel) {
                    let _ = tx.send(SurfaceEvent::ContentChanged {
                        path: observed_path.clone(),
                        instance: id,
                    });
                }
                let _ = tx.send(SurfaceEvent::CursorMoved {
                    path: observed_path.clone(),
                    instance: id,
                    cursor: update.cursor,
                });
            }));

        tracing::debug!("Created instance {} for {}", id, path);

        // Already loaded for another document of this type.
        if let Some(module) = self.loader.cached(token) {
            entry.instance_mut().reconfigure_syntax(Some(module))?;
            return Ok(entry);
        }

        if !self.loader.has_support(token) {
            return Ok(entry);
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let loader = self.loader.clone();
                let tx = self.events_tx.clone();
                let token = token.to_string();
                let path = path.to_string();

                let task = runtime.spawn(async move {
                    let module = loader.load(&token).await;
                    let _ = tx.send(SurfaceEvent::SyntaxLoaded {
                        path,
                        instance: id,
                        module,
                    });
                });
                entry.set_pending_syntax(task.abort_handle());
            }
            Err(_) => {
                tracing::debug!("No async runtime; {} stays plain text", path);
            }
        }

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdeck_engine::ScrollPosition;
    use docdeck_syntax::SyntaxResult;
    use std::time::Duration;
    use tokio::sync::Notify;

    const CONTAINER: ContainerId = ContainerId(7);

    fn setup(loader: SyntaxLoader) -> (EditingSurface, DocumentTabStore, ViewCache) {
        (EditingSurface::new(CONTAINER, loader), DocumentTabStore::new(), ViewCache::new())
    }

    fn drain(surface: &mut EditingSurface, tabs: &mut DocumentTabStore, cache: &mut ViewCache) {
        while let Some(event) = surface.try_next_event() {
            surface.dispatch(event, tabs, cache);
        }
    }

    fn rust_module() -> SyntaxResult<SyntaxModule> {
        SyntaxModule::compile("rust", tree_sitter_rust::LANGUAGE.into())
    }

    #[test]
    fn test_mount_creates_and_attaches() {
        let (mut surface, mut tabs, mut cache) = setup(SyntaxLoader::empty());
        tabs.open_document("/notes.txt", "hello");

        let id = surface
            .mount("/notes.txt", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();

        let entry = cache.get("/notes.txt").unwrap();
        assert_eq!(entry.id(), id);
        assert_eq!(entry.instance().text(), "hello");
        assert_eq!(entry.instance().host(), Some(CONTAINER));
        assert_eq!(surface.mounted_path(), Some("/notes.txt"));
    }

    #[test]
    fn test_mount_unknown_path_fails() {
        let (mut surface, mut tabs, mut cache) = setup(SyntaxLoader::empty());
        let result = surface.mount("/ghost", &mut tabs, &mut cache, DisplayOptions::default());
        assert!(matches!(result, Err(CoreError::DocumentNotFound(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remount_reuses_instance_and_history() {
        let (mut surface, mut tabs, mut cache) = setup(SyntaxLoader::empty());
        tabs.open_document("/a.txt", "");
        let first = surface
            .mount("/a.txt", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();
        cache
            .get_mut("/a.txt")
            .unwrap()
            .instance_mut()
            .replace_selection("typed")
            .unwrap();

        surface.unmount(&mut tabs, &mut cache);
        assert!(!cache.get("/a.txt").unwrap().instance().is_attached());

        let second = surface
            .mount("/a.txt", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();
        assert_eq!(first, second);

        let instance = cache.get_mut("/a.txt").unwrap().instance_mut();
        instance.undo().unwrap();
        assert_eq!(instance.text(), "");
    }

    #[test]
    fn test_edits_flow_into_tab_store() {
        let (mut surface, mut tabs, mut cache) = setup(SyntaxLoader::empty());
        tabs.open_document("/a.txt", "abc");
        surface
            .mount("/a.txt", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();

        let instance = cache.get_mut("/a.txt").unwrap().instance_mut();
        instance.set_selection(3, 3).unwrap();
        instance.replace_selection("d").unwrap();
        instance.replace_selection("e").unwrap();

        let mut last_cursor = None;
        while let Some(event) = surface.try_next_event() {
            if let Dispatched::Cursor(info) = surface.dispatch(event, &mut tabs, &mut cache) {
                last_cursor = Some(info);
            }
        }

        assert_eq!(tabs.tab("/a.txt").unwrap().content, "abcde");
        assert!(tabs.is_dirty("/a.txt"));
        assert_eq!(last_cursor.unwrap().column, 6);
    }

    #[test]
    fn test_burst_of_edits_queues_one_content_marker() {
        let (mut surface, mut tabs, mut cache) = setup(SyntaxLoader::empty());
        tabs.open_document("/a.txt", "");
        surface
            .mount("/a.txt", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();

        let instance = cache.get_mut("/a.txt").unwrap().instance_mut();
        for ch in ["a", "b", "c", "d"] {
            instance.replace_selection(ch).unwrap();
        }

        let events: Vec<SurfaceEvent> = std::iter::from_fn(|| surface.try_next_event()).collect();
        let markers = events
            .iter()
            .filter(|e| matches!(e, SurfaceEvent::ContentChanged { .. }))
            .count();
        assert_eq!(markers, 1);

        for event in events {
            surface.dispatch(event, &mut tabs, &mut cache);
        }
        assert_eq!(tabs.tab("/a.txt").unwrap().content, "abcd");

        // The next edit after the read queues a fresh marker.
        cache
            .get_mut("/a.txt")
            .unwrap()
            .instance_mut()
            .replace_selection("e")
            .unwrap();
        drain(&mut surface, &mut tabs, &mut cache);
        assert_eq!(tabs.tab("/a.txt").unwrap().content, "abcde");
    }

    #[test]
    fn test_scroll_saved_on_unmount_and_restored() {
        let (mut surface, mut tabs, mut cache) = setup(SyntaxLoader::empty());
        tabs.open_document("/a.txt", "x");
        tabs.open_document("/b.txt", "y");
        surface
            .mount("/a.txt", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();
        cache
            .get_mut("/a.txt")
            .unwrap()
            .instance_mut()
            .scroll_to(ScrollPosition::new(48.0, 3.0));

        // Mounting another document unmounts the first.
        surface
            .mount("/b.txt", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();
        assert_eq!(
            tabs.tab("/a.txt").unwrap().scroll_position,
            Some(ScrollPosition::new(48.0, 3.0))
        );
        assert!(!cache.get("/a.txt").unwrap().instance().is_attached());

        // A rebuilt instance picks the stored offset up again.
        cache.destroy_one("/a.txt");
        surface
            .mount("/a.txt", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();
        assert_eq!(
            cache.get("/a.txt").unwrap().instance().scroll_position(),
            ScrollPosition::new(48.0, 3.0)
        );
    }

    #[test]
    fn test_new_instance_starts_top_left() {
        let (mut surface, mut tabs, mut cache) = setup(SyntaxLoader::empty());
        tabs.open_document("/a.txt", "x");
        surface
            .mount("/a.txt", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();
        assert_eq!(
            cache.get("/a.txt").unwrap().instance().scroll_position(),
            ScrollPosition::default()
        );
    }

    #[test]
    fn test_remount_applies_changed_display_options() {
        let (mut surface, mut tabs, mut cache) = setup(SyntaxLoader::empty());
        tabs.open_document("/a.txt", "");
        surface
            .mount("/a.txt", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();
        surface.unmount(&mut tabs, &mut cache);

        let wrapped = DisplayOptions {
            word_wrap: true,
            ..DisplayOptions::default()
        };
        surface.mount("/a.txt", &mut tabs, &mut cache, wrapped).unwrap();

        let slot = cache.get("/a.txt").unwrap().instance().display_slot();
        assert_eq!(*slot.get(), wrapped);
        assert_eq!(slot.revision(), 1);
    }

    #[test]
    fn test_without_runtime_document_stays_plain() {
        let (mut surface, mut tabs, mut cache) = setup(SyntaxLoader::with_builtin());
        tabs.open_document("/main.rs", "fn main() {}");
        surface
            .mount("/main.rs", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();

        let entry = cache.get("/main.rs").unwrap();
        assert!(!entry.has_pending_syntax());
        assert!(entry.instance().syntax_name().is_none());
    }

    #[tokio::test]
    async fn test_syntax_loads_in_background() {
        let (mut surface, mut tabs, mut cache) = setup(SyntaxLoader::with_builtin());
        tabs.open_document("/main.rs", "fn main() {}");
        surface
            .mount("/main.rs", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();
        assert!(cache.get("/main.rs").unwrap().has_pending_syntax());

        let event = surface.next_event().await.unwrap();
        assert!(matches!(event, SurfaceEvent::SyntaxLoaded { .. }));
        assert_eq!(
            surface.dispatch(event, &mut tabs, &mut cache),
            Dispatched::Syntax(true)
        );

        let entry = cache.get("/main.rs").unwrap();
        assert!(!entry.has_pending_syntax());
        assert_eq!(entry.instance().syntax_name(), Some("rust"));
    }

    #[tokio::test]
    async fn test_cached_syntax_applies_at_mount() {
        let loader = SyntaxLoader::with_builtin();
        loader.load("rs").await.unwrap();
        let (mut surface, mut tabs, mut cache) = setup(loader);
        tabs.open_document("/lib.rs", "");

        surface
            .mount("/lib.rs", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();

        let entry = cache.get("/lib.rs").unwrap();
        assert_eq!(entry.instance().syntax_name(), Some("rust"));
        assert!(!entry.has_pending_syntax());
    }

    #[tokio::test]
    async fn test_unsupported_type_is_plain_text() {
        let (mut surface, mut tabs, mut cache) = setup(SyntaxLoader::with_builtin());
        tabs.open_document("/README", "plain");
        surface
            .mount("/README", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();

        assert!(!cache.get("/README").unwrap().has_pending_syntax());
        assert!(surface.try_next_event().is_none());
    }

    #[tokio::test]
    async fn test_close_during_load_cancels_it() {
        let gate = Arc::new(Notify::new());
        let mut loader = SyntaxLoader::empty();
        let wait = gate.clone();
        loader.register("rs", move || {
            let wait = wait.clone();
            async move {
                wait.notified().await;
                rust_module()
            }
        });

        let (mut surface, mut tabs, mut cache) = setup(loader);
        tabs.open_document("/slow.rs", "");
        surface
            .mount("/slow.rs", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();

        surface.unmount(&mut tabs, &mut cache);
        tabs.force_close_document("/slow.rs");
        cache.destroy_one("/slow.rs");
        gate.notify_waiters();

        let late = tokio::time::timeout(Duration::from_millis(50), surface.next_event()).await;
        assert!(late.is_err());
    }

    #[tokio::test]
    async fn test_late_result_for_reopened_document_is_dropped() {
        let (mut surface, mut tabs, mut cache) = setup(SyntaxLoader::empty());
        tabs.open_document("/a.rs", "");
        let old = surface
            .mount("/a.rs", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();

        surface.unmount(&mut tabs, &mut cache);
        cache.destroy_one("/a.rs");
        let new = surface
            .mount("/a.rs", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();
        assert_ne!(old, new);

        let late = SurfaceEvent::SyntaxLoaded {
            path: "/a.rs".to_string(),
            instance: old,
            module: Some(Arc::new(rust_module().unwrap())),
        };
        assert_eq!(surface.dispatch(late, &mut tabs, &mut cache), Dispatched::Stale);
        assert!(cache.get("/a.rs").unwrap().instance().syntax_name().is_none());
    }

    #[test]
    fn test_queued_edits_from_destroyed_instance_are_dropped() {
        let (mut surface, mut tabs, mut cache) = setup(SyntaxLoader::empty());
        tabs.open_document("/a.txt", "keep");
        surface
            .mount("/a.txt", &mut tabs, &mut cache, DisplayOptions::default())
            .unwrap();
        cache
            .get_mut("/a.txt")
            .unwrap()
            .instance_mut()
            .replace_selection("lost ")
            .unwrap();

        surface.unmount(&mut tabs, &mut cache);
        cache.destroy_one("/a.txt");
        drain(&mut surface, &mut tabs, &mut cache);

        assert_eq!(tabs.tab("/a.txt").unwrap().content, "keep");
    }
}
