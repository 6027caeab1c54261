//! Application-level notifications from the workbench.
//!
//! ## Learning: Broadcast Channels
//!
//! `tokio::sync::broadcast` delivers every event to every subscriber.
//! Events are values (`Clone`), so a tab bar, a status bar and a window
//! title can each hold their own receiver without sharing references
//! into the workbench.
//!
//! A slow subscriber does not block the sender; it skips ahead and is
//! told how many events it missed.

use docdeck_engine::DisplayOptions;
use tokio::sync::broadcast;

/// Events emitted by the workbench.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkbenchEvent {
    /// A new tab was created
    DocumentOpened(String),
    /// A tab was mounted and focused
    DocumentFocused(String),
    /// A tab was removed
    DocumentClosed(String),
    /// A tab was written to disk
    DocumentSaved(String),
    /// A tab moved within the tab bar
    DocumentsReordered { from: usize, to: usize },
    /// A dirty tab is waiting on a save/discard/cancel decision
    ClosePending(String),
    /// New display options reached the mounted instance
    DisplayOptionsApplied(DisplayOptions),
    /// Every tab and instance was dropped
    ProjectClosed,
}

/// Event bus for broadcasting workbench events.
pub struct EventBus {
    sender: broadcast::Sender<WorkbenchEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    pub fn new() -> Self {
        // Capacity of 256 events in the buffer
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Emits an event to all subscribers.
    pub fn emit(&self, event: WorkbenchEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkbenchEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

/// Helper for consuming events asynchronously.
///
/// ## Example
///
/// ```ignore
/// let mut handler = EventHandler::new(workbench.subscribe());
///
/// tokio::spawn(async move {
///     while let Some(event) = handler.next().await {
///         if let WorkbenchEvent::DocumentSaved(path) = event {
///             // refresh the tab label
///         }
///     }
/// });
/// ```
pub struct EventHandler {
    receiver: broadcast::Receiver<WorkbenchEvent>,
}

impl EventHandler {
    pub fn new(receiver: broadcast::Receiver<WorkbenchEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event. Returns `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<WorkbenchEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns an already queued event without waiting.
    pub fn try_next(&mut self) -> Option<WorkbenchEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                    continue;
                }
                Err(_) => return None,
            }
        }
    }
}
