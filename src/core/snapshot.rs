//! Frame snapshots
//!
//! A snapshot is an owned copy of the active grid and cursor, taken in one
//! step so a renderer never sees a half-applied update. Given the same byte
//! stream, the terminal produces identical snapshots.

use serde::{Deserialize, Serialize};

use super::cell::Cell;
use super::cursor::Cursor;
use super::screen::Screen;

/// A read-only view of the visible terminal state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Screen dimensions
    pub cols: usize,
    pub rows: usize,
    /// Active grid content (row-major)
    pub grid: Vec<Vec<Cell>>,
    /// Cursor state
    pub cursor: CursorSnapshot,
    /// Whether on alternate screen
    pub alternate_screen: bool,
    #[serde(default)]
    pub bracketed_paste: bool,
}

/// Snapshot of cursor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorSnapshot {
    pub col: usize,
    pub row: usize,
    pub visible: bool,
}

impl From<&Cursor> for CursorSnapshot {
    fn from(cursor: &Cursor) -> Self {
        CursorSnapshot {
            col: cursor.col,
            row: cursor.row,
            visible: cursor.visible,
        }
    }
}

impl Snapshot {
    /// Create a snapshot from the current screen state
    pub fn from_screen(screen: &Screen) -> Self {
        let grid = screen
            .grid()
            .iter_rows()
            .map(|row| row.cells.clone())
            .collect();

        Snapshot {
            cols: screen.cols(),
            rows: screen.rows(),
            grid,
            cursor: CursorSnapshot::from(screen.cursor()),
            alternate_screen: screen.is_alternate(),
            bracketed_paste: screen.modes.bracketed_paste,
        }
    }

    /// Get a cell; `None` outside the grid
    pub fn cell(&self, col: usize, row: usize) -> Option<&Cell> {
        self.grid.get(row).and_then(|r| r.get(col))
    }

    /// Text of one row with trailing blanks trimmed
    pub fn row_text(&self, row: usize) -> Option<String> {
        let cells = self.grid.get(row)?;
        let text: String = cells.iter().map(Cell::display_char).collect();
        Some(text.trim_end_matches(' ').to_string())
    }

    /// Convert snapshot to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse snapshot from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get a simple text representation of the screen (for debugging)
    pub fn to_text(&self) -> String {
        let mut result = String::new();

        for row in 0..self.grid.len() {
            if let Some(line) = self.row_text(row) {
                result.push_str(&line);
            }
            result.push('\n');
        }

        // Remove trailing empty lines
        while result.ends_with("\n\n") {
            result.pop();
        }

        result
    }

    /// Compare grid contents and dimensions, ignoring cursor and modes
    pub fn content_equals(&self, other: &Snapshot) -> bool {
        self.cols == other.cols && self.rows == other.rows && self.grid == other.grid
    }
}
