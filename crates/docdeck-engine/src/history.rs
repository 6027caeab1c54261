//! Undo/redo history.
//!
//! ## Learning: The Command Pattern
//!
//! Every edit is recorded as a value that can be applied again (redo) or
//! inverted (undo). Consecutive keystrokes are merged into one step so a
//! single undo removes a typed word rather than one character.
//!
//! A step stays open for merging until it is sealed. The engine seals on
//! selection changes, newlines, and undo/redo, so merging depends only on
//! the edit sequence and never on wall-clock time.

use std::collections::VecDeque;

/// The type of edit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Insert,
    Delete,
}

/// A single recorded change, in character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub kind: EditKind,
    pub position: usize,
    pub content: String,
}

impl Edit {
    pub fn insert(position: usize, content: impl Into<String>) -> Self {
        Self {
            kind: EditKind::Insert,
            position,
            content: content.into(),
        }
    }

    pub fn delete(position: usize, content: impl Into<String>) -> Self {
        Self {
            kind: EditKind::Delete,
            position,
            content: content.into(),
        }
    }

    /// Number of characters this edit covers.
    pub fn len_chars(&self) -> usize {
        self.content.chars().count()
    }

    /// Returns the edit that reverses this one.
    pub fn inverse(&self) -> Self {
        Self {
            kind: match self.kind {
                EditKind::Insert => EditKind::Delete,
                EditKind::Delete => EditKind::Insert,
            },
            position: self.position,
            content: self.content.clone(),
        }
    }

    /// Returns true if `next` continues this edit: typing right after an
    /// insert, or backspacing/forward-deleting next to a delete.
    fn continues_with(&self, next: &Edit) -> bool {
        if self.kind != next.kind || self.content.contains('\n') || next.content.contains('\n') {
            return false;
        }

        match self.kind {
            EditKind::Insert => self.position + self.len_chars() == next.position,
            EditKind::Delete => {
                next.position + next.len_chars() == self.position || next.position == self.position
            }
        }
    }

    fn absorb(&mut self, next: Edit) {
        match self.kind {
            EditKind::Insert => self.content.push_str(&next.content),
            EditKind::Delete if next.position < self.position => {
                self.content = next.content + &self.content;
                self.position = next.position;
            }
            EditKind::Delete => self.content.push_str(&next.content),
        }
    }
}

/// Bounded undo/redo stacks of edit steps.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<Vec<Edit>>,
    redo_stack: Vec<Vec<Edit>>,
    limit: usize,
    sealed: bool,
}

impl History {
    /// Creates a history keeping at most `limit` undo steps.
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
            sealed: true,
        }
    }

    /// Records an edit, merging it into the open step when it continues
    /// the previous edit. Any redo steps are discarded.
    pub fn record(&mut self, edit: Edit) {
        self.redo_stack.clear();

        if !self.sealed {
            if let Some(last) = self.undo_stack.back_mut().and_then(|step| step.last_mut()) {
                if last.continues_with(&edit) {
                    last.absorb(edit);
                    return;
                }
            }
        }

        let breaks_step = edit.content.contains('\n');
        self.undo_stack.push_back(vec![edit]);
        while self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
        self.sealed = breaks_step;
    }

    /// Records several edits as one sealed step, e.g. a replacement made
    /// of a delete followed by an insert.
    pub fn record_step(&mut self, edits: Vec<Edit>) {
        if edits.is_empty() {
            return;
        }
        self.redo_stack.clear();
        self.undo_stack.push_back(edits);
        while self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
        self.sealed = true;
    }

    /// Closes the open step; the next edit starts a new one.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Pops the latest step. The returned edits are in application order;
    /// the caller reverts them back to front.
    pub fn undo(&mut self) -> Option<Vec<Edit>> {
        let step = self.undo_stack.pop_back()?;
        self.redo_stack.push(step.clone());
        self.sealed = true;
        Some(step)
    }

    /// Pops the latest undone step for re-application.
    pub fn redo(&mut self) -> Option<Vec<Edit>> {
        let step = self.redo_stack.pop()?;
        self.undo_stack.push_back(step.clone());
        self.sealed = true;
        Some(step)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of undo steps available.
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.sealed = true;
    }
}
