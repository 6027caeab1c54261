//! # Docdeck Engine
//!
//! The live editing object behind every open document.
//!
//! ## Key Concepts
//!
//! - `EditorEngine` owns the text (a rope), the undo history, the
//!   selection, and the scroll offset.
//! - Two extension slots (`syntax_slot`, `display_slot`) can be swapped
//!   at runtime without rebuilding the instance.
//! - Observers receive every edit and selection change in order.
//! - An instance is attached to at most one container at a time and is
//!   destroyed explicitly, never implicitly.

mod display;
mod engine;
mod history;
mod selection;
mod slot;

pub use display::{DisplayOptions, ScrollPosition};
pub use engine::{ContainerId, EditorEngine, EngineUpdate, InstanceId, Observer};
pub use history::{Edit, EditKind, History};
pub use selection::{CursorInfo, Selection};
pub use slot::Slot;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid character index: {0}")]
    InvalidCharIndex(usize),

    #[error("Invalid range {start}..{end}")]
    InvalidRange { start: usize, end: usize },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Engine {0} has been destroyed")]
    Destroyed(InstanceId),

    #[error("Engine is already attached to {0}")]
    AlreadyAttached(ContainerId),
}
