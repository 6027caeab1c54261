//! Selection state and the cursor projection shown in status bars.

use serde::{Deserialize, Serialize};

/// A selection in character offsets. `anchor == head` is a bare cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// A collapsed selection at `pos`.
    pub fn cursor(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Number of selected characters.
    pub fn len(&self) -> usize {
        self.to() - self.from()
    }

    /// Shifts the selection through an insertion of `len` chars at `at`.
    pub(crate) fn map_insert(self, at: usize, len: usize) -> Self {
        let map = |p: usize| if p >= at { p + len } else { p };
        Self::new(map(self.anchor), map(self.head))
    }

    /// Shifts the selection through a deletion of `start..end`.
    pub(crate) fn map_delete(self, start: usize, end: usize) -> Self {
        let map = |p: usize| {
            if p >= end {
                p - (end - start)
            } else if p > start {
                start
            } else {
                p
            }
        };
        Self::new(map(self.anchor), map(self.head))
    }
}

/// Cursor location for a status bar. Line and column are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorInfo {
    pub line: usize,
    pub column: usize,
    pub selected_chars: usize,
}

impl Default for CursorInfo {
    fn default() -> Self {
        Self {
            line: 1,
            column: 1,
            selected_chars: 0,
        }
    }
}

impl std::fmt::Display for CursorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ln {}, Col {}", self.line, self.column)?;
        if self.selected_chars > 0 {
            write!(f, " ({} selected)", self.selected_chars)?;
        }
        Ok(())
    }
}
