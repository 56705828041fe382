//! Cursor state management
//!
//! The cursor tracks position and visibility. Every movement clamps the
//! position to the grid; nothing here wraps or scrolls.

use serde::{Deserialize, Serialize};

/// Cursor state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Column position (0-indexed)
    pub col: usize,
    /// Row position (0-indexed)
    pub row: usize,
    /// Whether the cursor is visible (DECTCEM)
    pub visible: bool,
    /// A character was written into the last column; further writes are
    /// dropped until the column is repositioned
    pub overflow: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            col: 0,
            row: 0,
            visible: true,
            overflow: false,
        }
    }
}

impl Cursor {
    /// Create a new cursor at the home position
    pub fn new() -> Self {
        Self::default()
    }

    /// Column the next write would land on if it were not clamped.
    /// One past the last column while `overflow` is set.
    fn logical_col(&self) -> usize {
        self.col + usize::from(self.overflow)
    }

    /// Move cursor to absolute position, clamping to bounds
    pub fn move_to(&mut self, col: usize, row: usize, cols: usize, rows: usize) {
        self.col = col.min(cols.saturating_sub(1));
        self.row = row.min(rows.saturating_sub(1));
        self.overflow = false;
    }

    /// Move cursor up by n rows, stopping at row 0
    pub fn move_up(&mut self, n: usize) {
        self.row = self.row.saturating_sub(n);
    }

    /// Move cursor down by n rows, stopping at the last row
    pub fn move_down(&mut self, n: usize, rows: usize) {
        self.row = self.row.saturating_add(n).min(rows.saturating_sub(1));
    }

    /// Move cursor left by n columns, stopping at column 0
    pub fn move_left(&mut self, n: usize) {
        self.col = self.logical_col().saturating_sub(n);
        self.overflow = false;
    }

    /// Move cursor right by n columns, stopping at the last column
    pub fn move_right(&mut self, n: usize, cols: usize) {
        self.col = self
            .logical_col()
            .saturating_add(n)
            .min(cols.saturating_sub(1));
        self.overflow = false;
    }

    /// Move cursor to column (0-indexed)
    pub fn set_col(&mut self, col: usize, cols: usize) {
        self.col = col.min(cols.saturating_sub(1));
        self.overflow = false;
    }

    /// Carriage return - move to column 0
    pub fn carriage_return(&mut self) {
        self.col = 0;
        self.overflow = false;
    }

    /// Advance to the next multiple-of-`width` tab stop
    pub fn tab(&mut self, width: usize, cols: usize) {
        let width = width.max(1);
        let next = (self.logical_col() / width + 1) * width;
        self.set_col(next, cols);
    }

    /// Clamp position into a grid of the given size
    pub fn clamp(&mut self, cols: usize, rows: usize) {
        self.col = self.col.min(cols.saturating_sub(1));
        self.row = self.row.min(rows.saturating_sub(1));
    }

    /// Reset cursor to default state
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
