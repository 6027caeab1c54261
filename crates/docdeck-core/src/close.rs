//! Closing documents that may have unsaved edits.
//!
//! ## Learning: State Machines as Enums
//!
//! `CloseState` is either `Idle` or waiting on one path. Because the path
//! lives inside the variant, there is no way to be "pending" without
//! knowing what for, and no stale path left behind once idle.
//!
//! ```text
//!   Idle ──close dirty──▶ PendingDecision(path)
//!    ▲                        │
//!    └── save ok / discard / cancel
//! ```
//!
//! A failed save leaves the machine in `PendingDecision` so the user can
//! retry, discard, or cancel.

use crate::fs::{FileSystem, FsError};
use crate::notify::Notifier;
use crate::tabs::{DocumentTabStore, display_name};
use crate::view_cache::ViewCache;
use crate::{CoreError, CoreResult};

/// Where the resolver is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CloseState {
    #[default]
    Idle,
    PendingDecision(String),
}

/// The user's answer to "save changes before closing?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    SaveAndClose,
    DiscardAndClose,
    Cancel,
}

/// Result of a close request or decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The tab is gone and its instance destroyed.
    Closed(String),
    /// The tab is dirty; a decision is needed.
    AwaitingDecision(String),
    /// Persisting failed; the tab stays open and the decision stays pending.
    SaveFailed { path: String, error: FsError },
    /// The dialog was dismissed; nothing changed.
    Cancelled(String),
    /// The path has no open tab; nothing was written or closed.
    NotOpen(String),
    /// A decision arrived while nothing was pending.
    NothingPending,
}

/// Drives the close flow for one document at a time.
#[derive(Debug, Default)]
pub struct CloseResolver {
    state: CloseState,
}

impl CloseResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CloseState {
        &self.state
    }

    pub fn pending_path(&self) -> Option<&str> {
        match &self.state {
            CloseState::PendingDecision(path) => Some(path),
            CloseState::Idle => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending_path().is_some()
    }

    /// Closes a clean document right away, or parks a dirty one until a
    /// decision arrives.
    pub fn request_close(
        &mut self,
        path: &str,
        tabs: &mut DocumentTabStore,
        cache: &mut ViewCache,
    ) -> CoreResult<CloseOutcome> {
        if let Some(pending) = self.pending_path() {
            return Err(CoreError::CloseAlreadyPending(pending.to_string()));
        }

        if !tabs.contains(path) {
            return Ok(CloseOutcome::NotOpen(path.to_string()));
        }

        if tabs.close_document(path) {
            cache.destroy_one(path);
            return Ok(CloseOutcome::Closed(path.to_string()));
        }

        tracing::debug!("{} has unsaved changes; awaiting decision", path);
        self.state = CloseState::PendingDecision(path.to_string());
        Ok(CloseOutcome::AwaitingDecision(path.to_string()))
    }

    /// Applies a decision to the pending close.
    pub async fn resolve<F, N>(
        &mut self,
        decision: CloseDecision,
        tabs: &mut DocumentTabStore,
        cache: &mut ViewCache,
        fs: &F,
        notifier: &N,
    ) -> CloseOutcome
    where
        F: FileSystem,
        N: Notifier,
    {
        match decision {
            CloseDecision::SaveAndClose => self.save_and_close(tabs, cache, fs, notifier).await,
            CloseDecision::DiscardAndClose => self.discard_and_close(tabs, cache),
            CloseDecision::Cancel => self.cancel(),
        }
    }

    /// Persists the pending document, then closes it.
    pub async fn save_and_close<F, N>(
        &mut self,
        tabs: &mut DocumentTabStore,
        cache: &mut ViewCache,
        fs: &F,
        notifier: &N,
    ) -> CloseOutcome
    where
        F: FileSystem,
        N: Notifier,
    {
        let Some(path) = self.pending_path().map(str::to_string) else {
            return CloseOutcome::NothingPending;
        };

        let Some(content) = tabs.tab(&path).map(|t| t.content.clone()) else {
            // Closed by some other route while the dialog was up.
            self.state = CloseState::Idle;
            cache.destroy_one(&path);
            return CloseOutcome::NotOpen(path);
        };

        if let Err(error) = fs.write_file(&path, &content).await {
            tracing::warn!("Save before close failed for {}: {}", path, error);
            notifier.error(&format!("Failed to save {}: {}", display_name(&path), error));
            return CloseOutcome::SaveFailed { path, error };
        }

        tabs.mark_saved(&path, &content);
        tabs.force_close_document(&path);
        cache.destroy_one(&path);
        notifier.success(&format!("Saved {}", display_name(&path)));

        self.state = CloseState::Idle;
        CloseOutcome::Closed(path)
    }

    /// Closes the pending document, dropping its unsaved edits.
    pub fn discard_and_close(
        &mut self,
        tabs: &mut DocumentTabStore,
        cache: &mut ViewCache,
    ) -> CloseOutcome {
        let CloseState::PendingDecision(path) = std::mem::take(&mut self.state) else {
            return CloseOutcome::NothingPending;
        };

        cache.destroy_one(&path);
        if !tabs.contains(&path) {
            return CloseOutcome::NotOpen(path);
        }
        tabs.force_close_document(&path);
        CloseOutcome::Closed(path)
    }

    /// Dismisses the pending decision; the document stays open.
    pub fn cancel(&mut self) -> CloseOutcome {
        match std::mem::take(&mut self.state) {
            CloseState::PendingDecision(path) => CloseOutcome::Cancelled(path),
            CloseState::Idle => CloseOutcome::NothingPending,
        }
    }

    /// Returns to `Idle` without touching any document.
    pub fn reset(&mut self) {
        self.state = CloseState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryFileSystem, RecordingNotifier};
    use crate::view_cache::ViewEntry;
    use docdeck_engine::{DisplayOptions, EditorEngine};

    struct Fixture {
        resolver: CloseResolver,
        tabs: DocumentTabStore,
        cache: ViewCache,
        fs: MemoryFileSystem,
        notifier: RecordingNotifier,
    }

    /// One clean tab `/clean.rs` and one dirty tab `/dirty.rs`, both cached.
    fn fixture() -> Fixture {
        let mut tabs = DocumentTabStore::new();
        let mut cache = ViewCache::new();
        for path in ["/clean.rs", "/dirty.rs"] {
            tabs.open_document(path, "orig");
            let instance = EditorEngine::new("orig", DisplayOptions::default());
            cache.set(path, ViewEntry::new(instance));
        }
        tabs.update_content("/dirty.rs", "edited");

        Fixture {
            resolver: CloseResolver::new(),
            tabs,
            cache,
            fs: MemoryFileSystem::default(),
            notifier: RecordingNotifier::default(),
        }
    }

    #[test]
    fn test_clean_close_is_immediate() {
        let mut f = fixture();
        let outcome = f
            .resolver
            .request_close("/clean.rs", &mut f.tabs, &mut f.cache)
            .unwrap();

        assert_eq!(outcome, CloseOutcome::Closed("/clean.rs".to_string()));
        assert!(!f.tabs.contains("/clean.rs"));
        assert!(!f.cache.has("/clean.rs"));
        assert_eq!(f.resolver.state(), &CloseState::Idle);
    }

    #[test]
    fn test_dirty_close_waits_for_decision() {
        let mut f = fixture();
        let outcome = f
            .resolver
            .request_close("/dirty.rs", &mut f.tabs, &mut f.cache)
            .unwrap();

        assert_eq!(outcome, CloseOutcome::AwaitingDecision("/dirty.rs".to_string()));
        assert_eq!(f.resolver.pending_path(), Some("/dirty.rs"));
        assert!(f.tabs.contains("/dirty.rs"));
        assert!(f.cache.has("/dirty.rs"));
    }

    #[test]
    fn test_second_request_while_pending_is_rejected() {
        let mut f = fixture();
        f.resolver
            .request_close("/dirty.rs", &mut f.tabs, &mut f.cache)
            .unwrap();

        let err = f
            .resolver
            .request_close("/clean.rs", &mut f.tabs, &mut f.cache)
            .unwrap_err();
        assert!(matches!(err, CoreError::CloseAlreadyPending(p) if p == "/dirty.rs"));
        assert!(f.tabs.contains("/clean.rs"));
    }

    #[tokio::test]
    async fn test_save_and_close() {
        let mut f = fixture();
        f.resolver
            .request_close("/dirty.rs", &mut f.tabs, &mut f.cache)
            .unwrap();

        let outcome = f
            .resolver
            .resolve(
                CloseDecision::SaveAndClose,
                &mut f.tabs,
                &mut f.cache,
                &f.fs,
                &f.notifier,
            )
            .await;

        assert_eq!(outcome, CloseOutcome::Closed("/dirty.rs".to_string()));
        assert_eq!(f.fs.contents("/dirty.rs").as_deref(), Some("edited"));
        assert!(!f.tabs.contains("/dirty.rs"));
        assert!(!f.cache.has("/dirty.rs"));
        assert_eq!(f.notifier.successes(), ["Saved dirty.rs"]);
        assert!(!f.resolver.is_pending());
    }

    #[tokio::test]
    async fn test_failed_save_stays_pending() {
        let mut f = fixture();
        f.fs.fail_writes(true);
        f.resolver
            .request_close("/dirty.rs", &mut f.tabs, &mut f.cache)
            .unwrap();

        let outcome = f
            .resolver
            .save_and_close(&mut f.tabs, &mut f.cache, &f.fs, &f.notifier)
            .await;

        assert!(matches!(
            outcome,
            CloseOutcome::SaveFailed { ref path, error: FsError::PermissionDenied(_) } if path == "/dirty.rs"
        ));
        assert_eq!(f.resolver.pending_path(), Some("/dirty.rs"));
        assert!(f.tabs.is_dirty("/dirty.rs"));
        assert!(f.cache.has("/dirty.rs"));
        assert_eq!(f.notifier.errors().len(), 1);

        // Retry succeeds once the disk cooperates.
        f.fs.fail_writes(false);
        let outcome = f
            .resolver
            .save_and_close(&mut f.tabs, &mut f.cache, &f.fs, &f.notifier)
            .await;
        assert_eq!(outcome, CloseOutcome::Closed("/dirty.rs".to_string()));
    }

    #[test]
    fn test_discard_and_close() {
        let mut f = fixture();
        f.resolver
            .request_close("/dirty.rs", &mut f.tabs, &mut f.cache)
            .unwrap();

        let outcome = f.resolver.discard_and_close(&mut f.tabs, &mut f.cache);

        assert_eq!(outcome, CloseOutcome::Closed("/dirty.rs".to_string()));
        assert!(!f.tabs.contains("/dirty.rs"));
        assert!(!f.cache.has("/dirty.rs"));
        assert!(f.fs.contents("/dirty.rs").is_none());
    }

    #[test]
    fn test_cancel_keeps_document() {
        let mut f = fixture();
        f.resolver
            .request_close("/dirty.rs", &mut f.tabs, &mut f.cache)
            .unwrap();

        assert_eq!(
            f.resolver.cancel(),
            CloseOutcome::Cancelled("/dirty.rs".to_string())
        );
        assert!(f.tabs.is_dirty("/dirty.rs"));
        assert!(f.cache.has("/dirty.rs"));
        assert_eq!(f.resolver.state(), &CloseState::Idle);
    }

    #[tokio::test]
    async fn test_decisions_while_idle_do_nothing() {
        let mut f = fixture();
        assert_eq!(f.resolver.cancel(), CloseOutcome::NothingPending);
        assert_eq!(
            f.resolver.discard_and_close(&mut f.tabs, &mut f.cache),
            CloseOutcome::NothingPending
        );
        let outcome = f
            .resolver
            .save_and_close(&mut f.tabs, &mut f.cache, &f.fs, &f.notifier)
            .await;
        assert_eq!(outcome, CloseOutcome::NothingPending);
        assert_eq!(f.tabs.len(), 2);
    }

    #[tokio::test]
    async fn test_tab_closed_elsewhere_while_pending() {
        let mut f = fixture();
        f.resolver
            .request_close("/dirty.rs", &mut f.tabs, &mut f.cache)
            .unwrap();
        f.tabs.force_close_document("/dirty.rs");

        let outcome = f
            .resolver
            .save_and_close(&mut f.tabs, &mut f.cache, &f.fs, &f.notifier)
            .await;

        assert_eq!(outcome, CloseOutcome::NotOpen("/dirty.rs".to_string()));
        assert!(!f.cache.has("/dirty.rs"));
        assert!(f.fs.contents("/dirty.rs").is_none());
        assert!(f.notifier.successes().is_empty());
        assert!(!f.resolver.is_pending());
    }

    #[test]
    fn test_discard_after_tab_closed_elsewhere() {
        let mut f = fixture();
        f.resolver
            .request_close("/dirty.rs", &mut f.tabs, &mut f.cache)
            .unwrap();
        f.tabs.force_close_document("/dirty.rs");

        let outcome = f.resolver.discard_and_close(&mut f.tabs, &mut f.cache);

        assert_eq!(outcome, CloseOutcome::NotOpen("/dirty.rs".to_string()));
        assert!(!f.cache.has("/dirty.rs"));
        assert_eq!(f.tabs.len(), 1);
    }

    #[test]
    fn test_request_close_unknown_path() {
        let mut f = fixture();
        let outcome = f
            .resolver
            .request_close("/nowhere.rs", &mut f.tabs, &mut f.cache)
            .unwrap();

        assert_eq!(outcome, CloseOutcome::NotOpen("/nowhere.rs".to_string()));
        assert_eq!(f.tabs.len(), 2);
        assert_eq!(f.resolver.state(), &CloseState::Idle);
    }
}
