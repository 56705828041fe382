//! Terminal Grid
//!
//! A fixed-size 2D grid of cells representing one screen. Dimensions are
//! set at construction and never change; a resize builds a new grid.

use serde::{Deserialize, Serialize};

use super::cell::{Cell, Colors};

/// A row of cells in the terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// The cells in this row
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cols: usize, colors: Colors) -> Self {
        Self {
            cells: vec![Cell::blank(colors); cols],
        }
    }

    pub fn erase(&mut self, colors: Colors) {
        for cell in &mut self.cells {
            cell.erase(colors);
        }
    }

    /// Erase cells from `start` to the end of the row
    pub fn erase_from(&mut self, start: usize, colors: Colors) {
        for cell in self.cells.iter_mut().skip(start) {
            cell.erase(colors);
        }
    }

    /// Get the length of content (excluding trailing empty cells)
    pub fn content_len(&self) -> usize {
        self.cells
            .iter()
            .rposition(|c| !c.is_empty())
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    /// Row content as text, trailing empty cells trimmed
    pub fn to_text(&self) -> String {
        self.cells[..self.content_len()]
            .iter()
            .map(Cell::display_char)
            .collect()
    }
}

/// The terminal grid - a 2D array of cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    rows: Vec<Row>,
    cols: usize,
}

impl Grid {
    /// Create a grid of blank cells painted with `colors`
    pub fn new(cols: usize, rows: usize, colors: Colors) -> Self {
        Self {
            rows: (0..rows).map(|_| Row::new(cols, colors)).collect(),
            cols,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// Get a reference to a cell
    pub fn cell(&self, col: usize, row: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.cells.get(col))
    }

    /// Get a mutable reference to a cell
    pub fn cell_mut(&mut self, col: usize, row: usize) -> Option<&mut Cell> {
        self.rows.get_mut(row).and_then(|r| r.cells.get_mut(col))
    }

    /// Get a reference to a row
    pub fn row(&self, row: usize) -> Option<&Row> {
        self.rows.get(row)
    }

    /// Iterate over the rows top to bottom
    pub fn iter_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    /// Drop the top row and append a blank one at the bottom
    pub fn scroll_up_one(&mut self, colors: Colors) {
        if self.rows.is_empty() {
            return;
        }
        self.rows.remove(0);
        self.rows.push(Row::new(self.cols, colors));
    }

    /// Erase the whole grid
    pub fn erase(&mut self, colors: Colors) {
        for row in &mut self.rows {
            row.erase(colors);
        }
    }

    /// Erase a single row; out-of-range rows are ignored
    pub fn erase_row(&mut self, row: usize, colors: Colors) {
        if let Some(r) = self.rows.get_mut(row) {
            r.erase(colors);
        }
    }

    /// Erase from (col, row) to the end of that row
    pub fn erase_row_from(&mut self, col: usize, row: usize, colors: Colors) {
        if let Some(r) = self.rows.get_mut(row) {
            r.erase_from(col, colors);
        }
    }

    /// Erase from (col, row) to the end of the grid in row-major order
    pub fn erase_from(&mut self, col: usize, row: usize, colors: Colors) {
        for (i, r) in self.rows.iter_mut().enumerate().skip(row) {
            let start = if i == row { col } else { 0 };
            r.erase_from(start, colors);
        }
    }
}
