//! # Docdeck Syntax
//!
//! Per-file-type syntax modules, loaded on demand and shared by every
//! document of that type.
//!
//! ## Why Lazy?
//!
//! Most sessions only touch a handful of file types. Loading a grammar is
//! deferred until the first document of that type is shown, and the
//! result is memoized for the rest of the process.
//!
//! A missing grammar is never an error for the editor: `load` returns
//! `None` and the document renders as plain text.

mod loader;
mod module;

pub use loader::{LoadFuture, LoaderFn, SyntaxLoader};
pub use module::{HighlightKind, HighlightSpan, SyntaxModule};

/// Result type for syntax operations
pub type SyntaxResult<T> = Result<T, SyntaxError>;

/// Errors that can occur while loading or running a syntax module.
#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error("Grammar {name} is incompatible: {reason}")]
    Incompatible { name: String, reason: String },

    #[error("Parser error")]
    ParseError,

    #[error("Load failed: {0}")]
    LoadFailed(String),
}

/// Derives the file-type token from a path: the lowercased text after the
/// last `.` of the file name, or an empty string when there is none.
pub fn file_type_token(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(dot) => name[dot + 1..].to_lowercase(),
        None => String::new(),
    }
}
