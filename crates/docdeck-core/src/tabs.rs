//! The ordered list of open documents.
//!
//! ## Learning: Derived State
//!
//! A tab never stores a `dirty` flag. Dirtiness is computed from
//! `content != saved_content` every time it is asked for, so the two can
//! never disagree.
//!
//! All mutation goes through `DocumentTabStore` methods; callers only get
//! shared references to tabs.

use docdeck_engine::ScrollPosition;
use docdeck_syntax::file_type_token;

/// One open file.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTab {
    /// Unique identity, also the key into the view cache.
    pub path: String,
    /// Label for the tab bar.
    pub display_name: String,
    /// Selects the syntax module.
    pub file_type_token: String,
    /// Current in-memory text.
    pub content: String,
    /// Text as last persisted.
    pub saved_content: String,
    /// Restored on remount.
    pub scroll_position: Option<ScrollPosition>,
}

impl DocumentTab {
    fn new(path: &str, content: &str) -> Self {
        Self {
            path: path.to_string(),
            display_name: display_name(path).to_string(),
            file_type_token: file_type_token(path),
            content: content.to_string(),
            saved_content: content.to_string(),
            scroll_position: None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.content != self.saved_content
    }
}

/// Returns the last `/`-separated segment of a path.
pub fn display_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Authoritative state of which documents are open, in what order, and
/// which one is focused.
#[derive(Debug, Default)]
pub struct DocumentTabStore {
    tabs: Vec<DocumentTab>,
    active: Option<String>,

    // Single-file view of the active tab, kept for hosts that predate tabs.
    open_file_path: Option<String>,
    open_file_content: Option<String>,
}

impl DocumentTabStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Projections ====================

    pub fn tabs(&self) -> &[DocumentTab] {
        &self.tabs
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn tab(&self, path: &str) -> Option<&DocumentTab> {
        self.tabs.iter().find(|t| t.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.tab(path).is_some()
    }

    pub fn active_path(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_tab(&self) -> Option<&DocumentTab> {
        self.active.as_deref().and_then(|p| self.tab(p))
    }

    /// Returns true if the tab exists and has unsaved edits.
    pub fn is_dirty(&self, path: &str) -> bool {
        self.tab(path).is_some_and(DocumentTab::is_dirty)
    }

    /// Returns true if any open tab has unsaved edits.
    pub fn has_unsaved_changes(&self) -> bool {
        self.tabs.iter().any(DocumentTab::is_dirty)
    }

    pub fn open_file_path(&self) -> Option<&str> {
        self.open_file_path.as_deref()
    }

    pub fn open_file_content(&self) -> Option<&str> {
        self.open_file_content.as_deref()
    }

    // ==================== Operations ====================

    /// Opens a document, or focuses it if already open.
    ///
    /// For an existing path `content` is ignored: in-memory edits win over
    /// a possibly stale re-read.
    pub fn open_document(&mut self, path: &str, content: &str) {
        if !self.contains(path) {
            tracing::debug!("Opening tab {}", path);
            self.tabs.push(DocumentTab::new(path, content));
        }
        self.active = Some(path.to_string());
        self.sync_open_file();
    }

    /// Replaces a tab's current content. Unknown paths are ignored.
    pub fn update_content(&mut self, path: &str, content: &str) {
        let Some(tab) = self.tab_mut(path) else {
            return;
        };
        tab.content = content.to_string();

        if self.active.as_deref() == Some(path) {
            self.open_file_content = Some(content.to_string());
        }
    }

    /// Remembers a tab's scroll offset. Unknown paths are ignored.
    pub fn update_scroll_position(&mut self, path: &str, pos: ScrollPosition) {
        if let Some(tab) = self.tab_mut(path) {
            tab.scroll_position = Some(pos);
        }
    }

    /// Records the content that was just persisted.
    pub fn mark_saved(&mut self, path: &str, persisted: &str) {
        if let Some(tab) = self.tab_mut(path) {
            tab.saved_content = persisted.to_string();
        }
    }

    /// Closes a clean tab.
    ///
    /// Returns `false` and changes nothing if the tab is dirty; the caller
    /// must ask the user. Unknown paths count as closed.
    pub fn close_document(&mut self, path: &str) -> bool {
        match self.tab(path) {
            None => true,
            Some(tab) if tab.is_dirty() => false,
            Some(_) => {
                self.force_close_document(path);
                true
            }
        }
    }

    /// Removes a tab regardless of unsaved edits.
    ///
    /// If it was active, focus moves to the tab that slides into its
    /// position (the right neighbor), or to the new last tab when the
    /// closed one was last.
    pub fn force_close_document(&mut self, path: &str) {
        let Some(idx) = self.tabs.iter().position(|t| t.path == path) else {
            return;
        };

        self.tabs.remove(idx);
        tracing::debug!("Closed tab {}", path);

        if self.active.as_deref() == Some(path) {
            self.active = self
                .tabs
                .get(idx)
                .or_else(|| self.tabs.last())
                .map(|t| t.path.clone());
        }
        self.sync_open_file();
    }

    /// Drops every tab and the active pointer.
    pub fn close_all_documents(&mut self) {
        self.tabs.clear();
        self.active = None;
        self.sync_open_file();
    }

    /// Moves the tab at `from` to `to`. Returns false when nothing moved
    /// (equal or out-of-range indices).
    pub fn reorder_documents(&mut self, from: usize, to: usize) -> bool {
        if from == to || from >= self.tabs.len() || to >= self.tabs.len() {
            return false;
        }

        let tab = self.tabs.remove(from);
        self.tabs.insert(to, tab);
        true
    }

    /// Focuses an open tab. Unknown paths are ignored and return false.
    pub fn set_active_document(&mut self, path: &str) -> bool {
        if !self.contains(path) {
            tracing::debug!("Ignoring focus request for unknown tab {}", path);
            return false;
        }

        self.active = Some(path.to_string());
        self.sync_open_file();
        true
    }

    /// Single-file entry point kept for older hosts. Opens only when both
    /// a path and content are given; anything else leaves tabs alone.
    pub fn set_open_file(&mut self, path: Option<&str>, content: Option<&str>) {
        if let (Some(path), Some(content)) = (path, content) {
            self.open_document(path, content);
        }
    }

    // ==================== Internals ====================

    fn tab_mut(&mut self, path: &str) -> Option<&mut DocumentTab> {
        self.tabs.iter_mut().find(|t| t.path == path)
    }

    fn sync_open_file(&mut self) {
        let active = self.active_tab().map(|t| (t.path.clone(), t.content.clone()));
        (self.open_file_path, self.open_file_content) = match active {
            Some((path, content)) => (Some(path), Some(content)),
            None => (None, None),
        };
    }
}
