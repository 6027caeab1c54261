//! # Docdeck Core
//!
//! Open-document state and the lifecycle of the engine instances that
//! edit it.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Workbench                          │
//! │                                                           │
//! │  DocumentTabStore ◀──events── EditingSurface ──▶ ViewCache│
//! │   (what is open)               (mount adapter)  (how it is│
//! │         ▲                            │           edited)  │
//! │         │                      SyntaxLoader               │
//! │   CloseResolver ──destroy_one──────────────────▶          │
//! │   DisplayOptionsReconciler ──reconfigure───────▶          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The tab store is the source of truth for which documents are open.
//! The view cache owns one live engine per open document. Only the
//! editing surface reads both and bridges them.
//!
//! ## Learning: Module Organization
//!
//! Each component lives in its own module and is re-exported here, so
//! callers write `docdeck_core::Workbench` rather than the full path.

pub mod close;
pub mod config;
pub mod display;
pub mod event;
pub mod fs;
pub mod notify;
pub mod surface;
pub mod tabs;
pub mod view_cache;
pub mod workbench;

#[cfg(test)]
mod testing;

pub use close::{CloseDecision, CloseOutcome, CloseResolver, CloseState};
pub use config::{Config, ConfigError, EditorSettings};
pub use display::{DisplayOptionsReconciler, SettingsStore};
pub use event::{EventBus, EventHandler, WorkbenchEvent};
pub use fs::{FileSystem, FsError, LocalFileSystem};
pub use notify::{LogNotifier, Notifier};
pub use surface::{Dispatched, EditingSurface, SurfaceEvent};
pub use tabs::{DocumentTab, DocumentTabStore};
pub use view_cache::{ViewCache, ViewEntry};
pub use workbench::Workbench;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("No active document")]
    NoActiveDocument,

    #[error("A close decision is already pending for {0}")]
    CloseAlreadyPending(String),

    #[error("Engine error: {0}")]
    Engine(#[from] docdeck_engine::EngineError),
}
