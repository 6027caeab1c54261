//! Global display settings and their propagation to engine instances.
//!
//! ## Learning: `tokio::sync::watch`
//!
//! A watch channel holds exactly one value. Senders overwrite it,
//! receivers see the latest value and a "changed since I last looked"
//! flag. That matches settings: intermediate values do not matter, only
//! the current one.

use docdeck_engine::DisplayOptions;
use tokio::sync::watch;

use crate::config::EditorSettings;
use crate::view_cache::ViewCache;

/// Reactive source of `EditorSettings`.
#[derive(Debug)]
pub struct SettingsStore {
    sender: watch::Sender<EditorSettings>,
}

impl SettingsStore {
    pub fn new(initial: EditorSettings) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn get(&self) -> EditorSettings {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<EditorSettings> {
        self.sender.subscribe()
    }

    /// Edits the settings in place. Subscribers are only woken when a
    /// value actually changed; returns whether it did.
    pub fn update(&self, edit: impl FnOnce(&mut EditorSettings)) -> bool {
        self.sender.send_if_modified(|settings| {
            let before = *settings;
            edit(settings);
            *settings != before
        })
    }

    pub fn set(&self, settings: EditorSettings) -> bool {
        self.update(|current| *current = settings)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

/// Applies settings changes to the mounted instance's display slot.
///
/// Hidden instances are not touched here; the editing surface compares
/// their slot with `current()` when they are mounted again.
#[derive(Debug)]
pub struct DisplayOptionsReconciler {
    receiver: watch::Receiver<EditorSettings>,
    current: DisplayOptions,
}

impl DisplayOptionsReconciler {
    pub fn new(mut receiver: watch::Receiver<EditorSettings>) -> Self {
        let current = receiver.borrow_and_update().display_options();
        Self { receiver, current }
    }

    /// Display options derived from the latest settings seen.
    pub fn current(&self) -> DisplayOptions {
        self.current
    }

    /// Picks up a pending settings change and reconfigures the mounted
    /// instance. Returns true if the display options changed.
    pub fn reconcile(&mut self, mounted: Option<&str>, cache: &mut ViewCache) -> bool {
        // Compare values rather than versions: `changed()` may already
        // have marked the latest version as seen.
        let next = self.receiver.borrow_and_update().display_options();
        if next == self.current {
            return false;
        }
        self.current = next;
        tracing::debug!("Display options changed: {:?}", next);

        let Some(entry) = mounted.and_then(|path| cache.get_mut(path)) else {
            return true;
        };
        let instance = entry.instance_mut();
        if *instance.display_slot().get() != next {
            if let Err(err) = instance.reconfigure_display(next) {
                tracing::warn!("Could not apply display options: {}", err);
            }
        }
        true
    }

    /// Waits until the settings change. Returns false once the store is
    /// gone. Follow with `reconcile` to apply the change.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }
}
