//! Terminal Cell
//!
//! A single position in the terminal grid: an optional character plus
//! foreground and background palette indices. Every cell is exactly one
//! display column wide.

use serde::{Deserialize, Serialize};

/// Default foreground palette index
pub const DEFAULT_FG: u8 = 10;

/// Default background palette index
pub const DEFAULT_BG: u8 = 12;

/// Foreground/background palette indices applied to a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Colors {
    pub fg: u8,
    pub bg: u8,
}

impl Colors {
    pub fn new(fg: u8, bg: u8) -> Self {
        Self { fg, bg }
    }
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            fg: DEFAULT_FG,
            bg: DEFAULT_BG,
        }
    }
}

/// A single cell in the terminal grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// The character in this cell, `None` for an empty cell
    pub ch: Option<char>,
    /// Foreground palette index
    pub fg: u8,
    /// Background palette index
    pub bg: u8,
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank(Colors::default())
    }
}

impl Cell {
    /// Create a cell holding `c` with the default colors
    pub fn new(c: char) -> Self {
        Self {
            ch: Some(c),
            ..Default::default()
        }
    }

    /// An empty cell painted with the given colors
    pub fn blank(colors: Colors) -> Self {
        Self {
            ch: None,
            fg: colors.fg,
            bg: colors.bg,
        }
    }

    /// Check if this cell is empty (no content)
    pub fn is_empty(&self) -> bool {
        self.ch.is_none()
    }

    /// The character to draw; empty cells render as a space over the background
    pub fn display_char(&self) -> char {
        self.ch.unwrap_or(' ')
    }

    /// Store `c` with the given colors
    pub fn write(&mut self, c: char, colors: Colors) {
        self.ch = Some(c);
        self.fg = colors.fg;
        self.bg = colors.bg;
    }

    /// Reset the cell to an empty cell with the given colors
    pub fn erase(&mut self, colors: Colors) {
        *self = Self::blank(colors);
    }
}
