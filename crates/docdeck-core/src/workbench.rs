//! The host application's entry point into document editing.
//!
//! ## Learning: The Facade Pattern
//!
//! `Workbench` owns every component (tab store, instance cache, editing
//! surface, close resolver, settings reconciler) and exposes one method per
//! user action. Components never reach into each other; the workbench
//! lends each the pieces it needs for one call, which keeps every
//! `&mut` borrow short and visible.
//!
//! ## Threading
//!
//! A workbench is owned by one task. Engine edits and background syntax
//! loads come back through the surface's channel and are applied by
//! `process_pending` or `next_event`, in the order they were produced.
//! `next_event` also wakes on settings changes, so a host that only awaits
//! it still sees new display options reach the mounted instance.

use docdeck_engine::{ContainerId, CursorInfo, EditorEngine};
use docdeck_syntax::SyntaxLoader;
use tokio::sync::broadcast;

use crate::close::{CloseDecision, CloseOutcome, CloseResolver, CloseState};
use crate::config::{Config, EditorSettings};
use crate::display::{DisplayOptionsReconciler, SettingsStore};
use crate::event::{EventBus, WorkbenchEvent};
use crate::fs::{FileSystem, LocalFileSystem};
use crate::notify::{LogNotifier, Notifier};
use crate::surface::{Dispatched, EditingSurface, SurfaceEvent};
use crate::tabs::{DocumentTabStore, display_name};
use crate::view_cache::ViewCache;
use crate::{CoreError, CoreResult};

/// Container the editing surface renders into when none is given.
pub const MAIN_CONTAINER: ContainerId = ContainerId(0);

/// Multi-document editing state for one window.
pub struct Workbench<F = LocalFileSystem, N = LogNotifier> {
    tabs: DocumentTabStore,
    cache: ViewCache,
    surface: EditingSurface,
    resolver: CloseResolver,
    settings: SettingsStore,
    reconciler: DisplayOptionsReconciler,
    fs: F,
    notifier: N,
    events: EventBus,
    cursor: CursorInfo,
}

impl Workbench {
    /// A workbench on the local disk, reporting through the log.
    pub fn local(config: &Config) -> Self {
        Self::new(
            config.editor,
            SyntaxLoader::with_builtin(),
            LocalFileSystem,
            LogNotifier,
        )
    }
}

impl<F: FileSystem, N: Notifier> Workbench<F, N> {
    pub fn new(settings: EditorSettings, loader: SyntaxLoader, fs: F, notifier: N) -> Self {
        let settings = SettingsStore::new(settings);
        let reconciler = DisplayOptionsReconciler::new(settings.subscribe());

        Self {
            tabs: DocumentTabStore::new(),
            cache: ViewCache::new(),
            surface: EditingSurface::new(MAIN_CONTAINER, loader),
            resolver: CloseResolver::new(),
            settings,
            reconciler,
            fs,
            notifier,
            events: EventBus::new(),
            cursor: CursorInfo::default(),
        }
    }

    // ==================== Projections ====================

    pub fn tabs(&self) -> &DocumentTabStore {
        &self.tabs
    }

    pub fn cache(&self) -> &ViewCache {
        &self.cache
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn loader(&self) -> &SyntaxLoader {
        self.surface.loader()
    }

    /// Cursor of the mounted document, for a status bar.
    pub fn cursor_info(&self) -> CursorInfo {
        self.cursor
    }

    pub fn close_state(&self) -> &CloseState {
        self.resolver.state()
    }

    pub fn mounted_path(&self) -> Option<&str> {
        self.surface.mounted_path()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkbenchEvent> {
        self.events.subscribe()
    }

    /// The mounted instance.
    pub fn active_engine(&self) -> Option<&EditorEngine> {
        let path = self.surface.mounted_path()?;
        self.cache.get(path).map(|e| e.instance())
    }

    /// The mounted instance, for the UI to drive edits.
    pub fn active_engine_mut(&mut self) -> CoreResult<&mut EditorEngine> {
        let path = self
            .surface
            .mounted_path()
            .ok_or(CoreError::NoActiveDocument)?;
        self.cache
            .get_mut(path)
            .map(|e| e.instance_mut())
            .ok_or_else(|| CoreError::DocumentNotFound(path.to_string()))
    }

    // ==================== Opening ====================

    /// Opens (or focuses) a document with known content and mounts it.
    pub fn open_document(&mut self, path: &str, content: &str) -> CoreResult<()> {
        let is_new = !self.tabs.contains(path);
        self.tabs.open_document(path, content);
        if is_new {
            self.emit(WorkbenchEvent::DocumentOpened(path.to_string()));
        }
        self.mount_active()
    }

    /// Opens a document from the filesystem.
    ///
    /// An already open path is focused without reading, so unsaved edits
    /// survive. Read failures are reported through the notifier and
    /// return `Ok(false)`.
    pub async fn open_file(&mut self, path: &str) -> CoreResult<bool> {
        if self.tabs.contains(path) {
            self.set_active_document(path)?;
            return Ok(true);
        }

        match self.fs.read_file(path).await {
            Ok(content) => {
                self.open_document(path, &content)?;
                Ok(true)
            }
            Err(err) => {
                tracing::warn!("Could not open {}: {}", path, err);
                self.notifier
                    .error(&format!("Could not open {}: {}", display_name(path), err));
                Ok(false)
            }
        }
    }

    // ==================== Tab Bar ====================

    /// Focuses an open document. Unknown paths are ignored and return
    /// false.
    pub fn set_active_document(&mut self, path: &str) -> CoreResult<bool> {
        if !self.tabs.set_active_document(path) {
            return Ok(false);
        }
        self.mount_active()?;
        Ok(true)
    }

    /// Moves a tab within the tab bar.
    pub fn reorder_documents(&mut self, from: usize, to: usize) -> bool {
        let moved = self.tabs.reorder_documents(from, to);
        if moved {
            self.emit(WorkbenchEvent::DocumentsReordered { from, to });
        }
        moved
    }

    // ==================== Closing ====================

    /// Asks to close a document. Dirty documents wait for
    /// `resolve_close`.
    pub fn close_document(&mut self, path: &str) -> CoreResult<CloseOutcome> {
        self.process_pending();

        let outcome = self
            .resolver
            .request_close(path, &mut self.tabs, &mut self.cache)?;
        self.after_close_step(&outcome)?;
        Ok(outcome)
    }

    /// Applies the user's answer to a pending close.
    pub async fn resolve_close(&mut self, decision: CloseDecision) -> CoreResult<CloseOutcome> {
        self.process_pending();

        let outcome = self
            .resolver
            .resolve(
                decision,
                &mut self.tabs,
                &mut self.cache,
                &self.fs,
                &self.notifier,
            )
            .await;

        if decision == CloseDecision::SaveAndClose {
            if let CloseOutcome::Closed(path) = &outcome {
                self.emit(WorkbenchEvent::DocumentSaved(path.clone()));
            }
        }
        self.after_close_step(&outcome)?;
        Ok(outcome)
    }

    /// Closes a document without asking, dropping unsaved edits.
    pub fn force_close_document(&mut self, path: &str) -> CoreResult<()> {
        if self.resolver.pending_path() == Some(path) {
            self.resolver.reset();
        }
        if !self.tabs.contains(path) {
            return Ok(());
        }

        self.tabs.force_close_document(path);
        self.cache.destroy_one(path);
        self.after_close_step(&CloseOutcome::Closed(path.to_string()))
    }

    /// Escape key: dismisses a pending close dialog, otherwise closes the
    /// active document if it is clean. Never opens a dialog. Returns true
    /// if a document was closed.
    pub fn escape_close(&mut self) -> CoreResult<bool> {
        if self.resolver.is_pending() {
            self.resolver.cancel();
            return Ok(false);
        }

        self.process_pending();
        let Some(path) = self.tabs.active_path().map(str::to_string) else {
            return Ok(false);
        };
        if !self.tabs.close_document(&path) {
            return Ok(false);
        }

        self.cache.destroy_one(&path);
        self.after_close_step(&CloseOutcome::Closed(path))?;
        Ok(true)
    }

    /// Drops every tab and instance, e.g. when switching projects.
    pub fn close_project(&mut self) -> usize {
        self.surface.unmount(&mut self.tabs, &mut self.cache);
        self.resolver.reset();
        self.tabs.close_all_documents();
        let destroyed = self.cache.destroy_all();
        self.cursor = CursorInfo::default();

        tracing::info!("Closed project ({} instances destroyed)", destroyed);
        self.emit(WorkbenchEvent::ProjectClosed);
        destroyed
    }

    // ==================== Saving ====================

    /// Writes the active document if it has unsaved edits. Failures are
    /// reported through the notifier. Returns true if something was
    /// written.
    pub async fn save_active(&mut self) -> CoreResult<bool> {
        self.process_pending();

        let Some(tab) = self.tabs.active_tab() else {
            return Ok(false);
        };
        if !tab.is_dirty() {
            return Ok(false);
        }
        let path = tab.path.clone();
        let content = tab.content.clone();

        match self.fs.write_file(&path, &content).await {
            Ok(()) => {
                self.tabs.mark_saved(&path, &content);
                self.notifier.success(&format!("Saved {}", display_name(&path)));
                self.emit(WorkbenchEvent::DocumentSaved(path));
                Ok(true)
            }
            Err(err) => {
                tracing::warn!("Save failed for {}: {}", path, err);
                self.notifier
                    .error(&format!("Failed to save {}: {}", display_name(&path), err));
                Ok(false)
            }
        }
    }

    // ==================== Event Pump ====================

    /// Applies every queued surface event in order, then any settings
    /// change. Returns how many events took effect.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.surface.try_next_event() {
            if self.dispatch(event) != Dispatched::Stale {
                applied += 1;
            }
        }
        self.reconcile_settings();
        applied
    }

    /// Waits for one surface event or settings change and applies it.
    pub async fn next_event(&mut self) -> Option<Dispatched> {
        tokio::select! {
            event = self.surface.next_event() => {
                let event = event?;
                Some(self.dispatch(event))
            }
            true = self.reconciler.changed() => {
                Some(Dispatched::Settings(self.reconcile_settings()))
            }
        }
    }

    /// Pushes a settings change to the mounted instance, if there is one.
    pub fn reconcile_settings(&mut self) -> bool {
        let changed = self
            .reconciler
            .reconcile(self.surface.mounted_path(), &mut self.cache);
        if changed {
            self.emit(WorkbenchEvent::DisplayOptionsApplied(self.reconciler.current()));
        }
        changed
    }

    // ==================== Internals ====================

    fn dispatch(&mut self, event: SurfaceEvent) -> Dispatched {
        let from_mounted = self.surface.mounted_path() == Some(event.path());
        let result = self.surface.dispatch(event, &mut self.tabs, &mut self.cache);

        if let Dispatched::Cursor(info) = result {
            if from_mounted {
                self.cursor = info;
            }
        }
        result
    }

    /// Mounts the active tab, or unmounts when there is none.
    fn mount_active(&mut self) -> CoreResult<()> {
        self.reconcile_settings();

        let Some(path) = self.tabs.active_path().map(str::to_string) else {
            self.surface.unmount(&mut self.tabs, &mut self.cache);
            self.cursor = CursorInfo::default();
            return Ok(());
        };

        let previous = self.surface.mounted_path().map(str::to_string);
        self.surface
            .mount(&path, &mut self.tabs, &mut self.cache, self.reconciler.current())?;

        if previous.as_deref() != Some(path.as_str()) {
            if let Some(entry) = self.cache.get(&path) {
                self.cursor = entry.instance().cursor_info();
            }
            self.emit(WorkbenchEvent::DocumentFocused(path));
        }
        Ok(())
    }

    fn after_close_step(&mut self, outcome: &CloseOutcome) -> CoreResult<()> {
        match outcome {
            CloseOutcome::Closed(path) => {
                if self.surface.mounted_path() == Some(path.as_str()) {
                    self.surface.unmount(&mut self.tabs, &mut self.cache);
                }
                self.emit(WorkbenchEvent::DocumentClosed(path.clone()));
                self.mount_active()
            }
            CloseOutcome::AwaitingDecision(path) => {
                self.emit(WorkbenchEvent::ClosePending(path.clone()));
                Ok(())
            }
            CloseOutcome::NotOpen(path) => {
                // The tab went away by another route; drop a dangling mount.
                if self.surface.mounted_path() == Some(path.as_str()) {
                    self.surface.unmount(&mut self.tabs, &mut self.cache);
                    return self.mount_active();
                }
                Ok(())
            }
            CloseOutcome::SaveFailed { .. }
            | CloseOutcome::Cancelled(_)
            | CloseOutcome::NothingPending => Ok(()),
        }
    }

    fn emit(&self, event: WorkbenchEvent) {
        self.events.emit(event);
    }
}

impl<F, N> std::fmt::Debug for Workbench<F, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbench")
            .field("tabs", &self.tabs.len())
            .field("active", &self.tabs.active_path())
            .field("cached", &self.cache.len())
            .field("mounted", &self.surface.mounted_path())
            .field("close_state", self.resolver.state())
            .finish_non_exhaustive()
    }
}
