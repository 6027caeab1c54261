//! Display options and scroll offsets.

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

/// Rendering options held in an engine's display slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOptions {
    pub show_line_numbers: bool,
    pub word_wrap: bool,
    pub tab_size: usize,
}

impl DisplayOptions {
    /// Indentation inserted for one tab press.
    pub fn indent_unit(&self) -> String {
        " ".repeat(self.tab_size.max(1))
    }

    /// Display width of a line in columns, expanding tabs to the next tab
    /// stop. A trailing line break is not counted.
    pub fn line_width(&self, line: &str) -> usize {
        let tab = self.tab_size.max(1);
        line.trim_end_matches(['\n', '\r'])
            .chars()
            .fold(0, |col, ch| match ch {
                '\t' => col + tab - col % tab,
                _ => col + ch.width().unwrap_or(0),
            })
    }
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            show_line_numbers: true,
            word_wrap: false,
            tab_size: 2,
        }
    }
}

/// Scroll offset of a rendering surface, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub top: f64,
    pub left: f64,
}

impl ScrollPosition {
    pub fn new(top: f64, left: f64) -> Self {
        Self { top, left }
    }

    /// Replaces negative or non-finite components with zero.
    pub fn clamped(self) -> Self {
        let clamp = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        Self::new(clamp(self.top), clamp(self.left))
    }
}
