//! The editing engine instance.
//!
//! ## Why Keep Instances Alive?
//!
//! An `EditorEngine` owns state that cannot be reconstructed from the
//! document text alone: the undo history, the selection, and the scroll
//! offset. Hosts detach an instance from its container when it is hidden
//! and reattach the same instance later, instead of rebuilding it.
//!
//! ## Learning: Callbacks with `FnMut`
//!
//! Observers are boxed `FnMut` closures. `FnMut` lets an observer keep its
//! own mutable state (a channel sender, a counter) between calls, and the
//! `Send` bound lets the engine move between tasks.

use std::borrow::Cow;
use std::ops::Range;
use std::sync::Arc;

use docdeck_syntax::{HighlightSpan, SyntaxModule};
use ropey::Rope;
use uuid::Uuid;

use crate::display::{DisplayOptions, ScrollPosition};
use crate::history::{Edit, EditKind, History};
use crate::selection::{CursorInfo, Selection};
use crate::slot::Slot;
use crate::{EngineError, EngineResult};

/// Maximum number of undo steps an instance keeps.
const HISTORY_LIMIT: usize = 1000;

/// Identity of one engine instance.
///
/// Two instances created for the same document path never share an id,
/// which lets late-arriving results be matched to the instance that asked
/// for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(Uuid);

impl InstanceId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A visible container a rendering surface can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(pub u64);

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "container#{}", self.0)
    }
}

/// Notification delivered to observers after every change.
#[derive(Debug, Clone)]
pub struct EngineUpdate {
    /// Full document text, present when the document changed.
    pub text: Option<String>,
    /// True when the selection was set explicitly.
    pub selection_set: bool,
    /// Cursor projection after the change.
    pub cursor: CursorInfo,
}

impl EngineUpdate {
    pub fn doc_changed(&self) -> bool {
        self.text.is_some()
    }
}

/// Callback invoked for each engine update, in emission order.
pub type Observer = Box<dyn FnMut(&EngineUpdate) + Send>;

/// A live, stateful text-editing object.
pub struct EditorEngine {
    id: InstanceId,
    rope: Rope,
    history: History,
    selection: Selection,
    scroll: ScrollPosition,
    host: Option<ContainerId>,
    syntax_slot: Slot<Option<Arc<SyntaxModule>>>,
    display_slot: Slot<DisplayOptions>,
    observers: Vec<Observer>,
    destroyed: bool,
}

impl EditorEngine {
    /// Creates an instance seeded with `doc`, cursor at the start, no
    /// syntax module, and the given display options.
    pub fn new(doc: &str, display: DisplayOptions) -> Self {
        Self {
            id: InstanceId::new(),
            rope: Rope::from_str(doc),
            history: History::new(HISTORY_LIMIT),
            selection: Selection::default(),
            scroll: ScrollPosition::default(),
            host: None,
            syntax_slot: Slot::new(None),
            display_slot: Slot::new(display),
            observers: Vec::new(),
            destroyed: false,
        }
    }

    // ==================== Getters ====================

    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Returns the full document text.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Projects the primary selection to 1-based line/column plus the
    /// number of selected characters.
    pub fn cursor_info(&self) -> CursorInfo {
        let head = self.selection.head.min(self.rope.len_chars());
        let line = self.rope.char_to_line(head);
        let line_start = self.rope.line_to_char(line);

        CursorInfo {
            line: line + 1,
            column: head - line_start + 1,
            selected_chars: self.selection.len(),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ==================== Editing ====================

    /// Inserts text at a character index.
    pub fn insert(&mut self, char_idx: usize, text: &str) -> EngineResult<()> {
        self.ensure_live()?;
        if char_idx > self.rope.len_chars() {
            return Err(EngineError::InvalidCharIndex(char_idx));
        }
        if text.is_empty() {
            return Ok(());
        }

        self.apply_insert(char_idx, text);
        self.history.record(Edit::insert(char_idx, text));
        self.emit(true, false);
        Ok(())
    }

    /// Deletes a character range and returns the removed text.
    pub fn delete(&mut self, range: Range<usize>) -> EngineResult<String> {
        self.ensure_live()?;
        if range.start > range.end || range.end > self.rope.len_chars() {
            return Err(EngineError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        if range.is_empty() {
            return Ok(String::new());
        }

        let deleted = self.apply_delete(range.start, range.end);
        self.history.record(Edit::delete(range.start, deleted.clone()));
        self.emit(true, false);
        Ok(deleted)
    }

    /// Replaces the selection with `text` (typing), leaving a collapsed
    /// cursor after the inserted text.
    pub fn replace_selection(&mut self, text: &str) -> EngineResult<()> {
        self.ensure_live()?;
        let from = self.selection.from();
        let to = self.selection.to();
        if from == to && text.is_empty() {
            return Ok(());
        }

        if from < to {
            let deleted = self.apply_delete(from, to);
            let mut step = vec![Edit::delete(from, deleted)];
            if !text.is_empty() {
                self.apply_insert(from, text);
                step.push(Edit::insert(from, text));
            }
            self.history.record_step(step);
        } else {
            self.apply_insert(from, text);
            self.history.record(Edit::insert(from, text));
        }

        self.selection = Selection::cursor(from + text.chars().count());
        self.emit(true, false);
        Ok(())
    }

    /// Inserts one indent unit as configured in the display slot.
    pub fn insert_tab(&mut self) -> EngineResult<()> {
        let unit = self.display_slot.get().indent_unit();
        self.replace_selection(&unit)
    }

    /// Sets the selection. Closes the current undo step.
    pub fn set_selection(&mut self, anchor: usize, head: usize) -> EngineResult<()> {
        self.ensure_live()?;
        let len = self.rope.len_chars();
        if anchor > len || head > len {
            return Err(EngineError::InvalidRange {
                start: anchor.min(head),
                end: anchor.max(head),
            });
        }

        let selection = Selection::new(anchor, head);
        if selection == self.selection {
            return Ok(());
        }

        self.selection = selection;
        self.history.seal();
        self.emit(false, true);
        Ok(())
    }

    // ==================== Undo/Redo ====================

    /// Reverts the latest undo step.
    pub fn undo(&mut self) -> EngineResult<()> {
        self.ensure_live()?;
        let step = self.history.undo().ok_or(EngineError::NothingToUndo)?;

        let mut cursor = self.selection.head;
        for edit in step.iter().rev() {
            cursor = self.apply_edit(&edit.inverse());
        }

        self.selection = Selection::cursor(cursor);
        self.emit(true, false);
        Ok(())
    }

    /// Re-applies the latest undone step.
    pub fn redo(&mut self) -> EngineResult<()> {
        self.ensure_live()?;
        let step = self.history.redo().ok_or(EngineError::NothingToRedo)?;

        let mut cursor = self.selection.head;
        for edit in &step {
            cursor = self.apply_edit(edit);
        }

        self.selection = Selection::cursor(cursor);
        self.emit(true, false);
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    // ==================== Rendering Host ====================

    /// Attaches the rendering surface to a container. Re-attaching to the
    /// same container is a no-op.
    pub fn attach(&mut self, container: ContainerId) -> EngineResult<()> {
        self.ensure_live()?;
        match self.host {
            Some(current) if current == container => Ok(()),
            Some(current) => Err(EngineError::AlreadyAttached(current)),
            None => {
                self.host = Some(container);
                Ok(())
            }
        }
    }

    /// Detaches from the current container, keeping all state.
    pub fn detach(&mut self) -> Option<ContainerId> {
        self.host.take()
    }

    pub fn host(&self) -> Option<ContainerId> {
        self.host
    }

    pub fn is_attached(&self) -> bool {
        self.host.is_some()
    }

    pub fn scroll_position(&self) -> ScrollPosition {
        self.scroll
    }

    pub fn scroll_to(&mut self, pos: ScrollPosition) {
        self.scroll = pos.clamped();
    }

    // ==================== Extension Slots ====================

    pub fn syntax_slot(&self) -> &Slot<Option<Arc<SyntaxModule>>> {
        &self.syntax_slot
    }

    pub fn display_slot(&self) -> &Slot<DisplayOptions> {
        &self.display_slot
    }

    /// Swaps the syntax module without touching text or history.
    pub fn reconfigure_syntax(&mut self, module: Option<Arc<SyntaxModule>>) -> EngineResult<()> {
        self.ensure_live()?;
        self.syntax_slot.reconfigure(module);
        Ok(())
    }

    /// Swaps display options without touching text or history.
    pub fn reconfigure_display(&mut self, options: DisplayOptions) -> EngineResult<()> {
        self.ensure_live()?;
        self.display_slot.reconfigure(options);
        Ok(())
    }

    /// Name of the active syntax module, if any.
    pub fn syntax_name(&self) -> Option<&str> {
        self.syntax_slot.get().as_deref().map(SyntaxModule::name)
    }

    /// Highlight spans for the current text; empty for plain text.
    pub fn highlights(&self) -> Vec<HighlightSpan> {
        let Some(module) = self.syntax_slot.get() else {
            return Vec::new();
        };

        module.highlight(&self.text()).unwrap_or_else(|err| {
            tracing::warn!("Highlighting with {} failed: {}", module.name(), err);
            Vec::new()
        })
    }

    /// Width of the line-number gutter in columns; zero when hidden.
    pub fn gutter_width(&self) -> usize {
        if !self.display_slot.get().show_line_numbers {
            return 0;
        }
        let digits = self.rope.len_lines().max(1).ilog10() as usize + 1;
        digits + 1
    }

    /// Number of visual rows the document occupies in a viewport
    /// `viewport_cols` wide.
    pub fn visual_rows(&self, viewport_cols: usize) -> usize {
        let options = self.display_slot.get();
        if !options.word_wrap || viewport_cols == 0 {
            return self.rope.len_lines();
        }

        self.rope
            .lines()
            .map(|line| {
                let line: Cow<'_, str> = line.into();
                options.line_width(&line).div_ceil(viewport_cols).max(1)
            })
            .sum()
    }

    // ==================== Observers ====================

    /// Registers an observer for edit and selection updates.
    pub fn observe(&mut self, observer: Observer) {
        if self.destroyed {
            tracing::debug!("Ignoring observer for destroyed engine {}", self.id);
            return;
        }
        self.observers.push(observer);
    }

    // ==================== Lifecycle ====================

    /// Tears the instance down. Later mutations fail with
    /// `EngineError::Destroyed`; calling this twice is harmless.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        tracing::debug!("Destroying engine {}", self.id);

        self.destroyed = true;
        self.host = None;
        self.observers.clear();
        self.history.clear();
        self.syntax_slot.reconfigure(None);
    }

    // ==================== Internals ====================

    fn ensure_live(&self) -> EngineResult<()> {
        if self.destroyed {
            Err(EngineError::Destroyed(self.id))
        } else {
            Ok(())
        }
    }

    fn apply_insert(&mut self, at: usize, text: &str) {
        self.rope.insert(at, text);
        self.selection = self.selection.map_insert(at, text.chars().count());
    }

    fn apply_delete(&mut self, start: usize, end: usize) -> String {
        let deleted = self.rope.slice(start..end).to_string();
        self.rope.remove(start..end);
        self.selection = self.selection.map_delete(start, end);
        deleted
    }

    /// Applies a recorded edit and returns where the cursor lands.
    fn apply_edit(&mut self, edit: &Edit) -> usize {
        match edit.kind {
            EditKind::Insert => {
                self.apply_insert(edit.position, &edit.content);
                edit.position + edit.len_chars()
            }
            EditKind::Delete => {
                self.apply_delete(edit.position, edit.position + edit.len_chars());
                edit.position
            }
        }
    }

    fn emit(&mut self, doc_changed: bool, selection_set: bool) {
        if self.observers.is_empty() {
            return;
        }

        let update = EngineUpdate {
            text: doc_changed.then(|| self.text()),
            selection_set,
            cursor: self.cursor_info(),
        };
        for observer in &mut self.observers {
            observer(&update);
        }
    }
}

impl std::fmt::Debug for EditorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorEngine")
            .field("id", &self.id)
            .field("len_chars", &self.rope.len_chars())
            .field("selection", &self.selection)
            .field("host", &self.host)
            .field("syntax", &self.syntax_name())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
