//! Screen Model
//!
//! Holds the primary and alternate grids, the cursor and the mode flags.
//! Every grid operation targets whichever grid is active.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cell::{Cell, Colors};
use super::cursor::Cursor;
use super::grid::{Grid, Row};
use crate::parser::EraseMode;

/// Distance between tab stops
pub const TAB_WIDTH: usize = 8;

/// Terminal mode flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modes {
    /// Bracketed paste mode (DECSET 2004). Recorded only.
    pub bracketed_paste: bool,
    /// `CSI K` / `CSI 0K` erase to the end of the display rather than the
    /// end of the line
    pub legacy_erase_in_line: bool,
}

/// The main screen structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screen {
    /// Primary screen grid
    primary_grid: Grid,
    /// Alternate screen grid
    alternate_grid: Grid,
    /// Whether we're on the alternate screen
    on_alternate: bool,
    /// Shared by both grids
    cursor: Cursor,
    /// Colors for written and erased cells
    colors: Colors,
    /// Terminal modes
    pub modes: Modes,
}

impl Screen {
    /// Create a new screen with the given dimensions
    pub fn new(cols: usize, rows: usize, colors: Colors) -> Self {
        Self {
            primary_grid: Grid::new(cols, rows, colors),
            alternate_grid: Grid::new(cols, rows, colors),
            on_alternate: false,
            cursor: Cursor::new(),
            colors,
            modes: Modes::default(),
        }
    }

    /// Get the number of columns
    pub fn cols(&self) -> usize {
        self.primary_grid.cols()
    }

    /// Get the number of rows
    pub fn rows(&self) -> usize {
        self.primary_grid.rows()
    }

    /// The grid currently receiving output
    pub fn grid(&self) -> &Grid {
        if self.on_alternate {
            &self.alternate_grid
        } else {
            &self.primary_grid
        }
    }

    fn grid_mut(&mut self) -> &mut Grid {
        if self.on_alternate {
            &mut self.alternate_grid
        } else {
            &mut self.primary_grid
        }
    }

    pub fn primary_grid(&self) -> &Grid {
        &self.primary_grid
    }

    pub fn alternate_grid(&self) -> &Grid {
        &self.alternate_grid
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn colors(&self) -> Colors {
        self.colors
    }

    /// Whether the alternate grid is active
    pub fn is_alternate(&self) -> bool {
        self.on_alternate
    }

    /// Get a cell of the active grid
    pub fn get_cell(&self, col: usize, row: usize) -> Option<&Cell> {
        self.grid().cell(col, row)
    }

    /// Get a row of the active grid
    pub fn get_row(&self, row: usize) -> Option<&Row> {
        self.grid().row(row)
    }

    /// Print a character at the current cursor position.
    ///
    /// Writing the last column sets the overflow flag instead of advancing;
    /// while it is set characters are dropped. Lines never wrap.
    pub fn print_char(&mut self, c: char) {
        if self.cursor.overflow {
            return;
        }

        let (col, row) = (self.cursor.col, self.cursor.row);
        let colors = self.colors;
        match self.grid_mut().cell_mut(col, row) {
            Some(cell) => cell.write(c, colors),
            None => return,
        }

        if col + 1 >= self.cols() {
            self.cursor.overflow = true;
        } else {
            self.cursor.col += 1;
        }
    }

    /// Handle linefeed (LF); scrolls the active grid at the bottom row
    pub fn linefeed(&mut self) {
        if self.cursor.row + 1 >= self.rows() {
            let colors = self.colors;
            self.grid_mut().scroll_up_one(colors);
        } else {
            self.cursor.row += 1;
        }
    }

    /// Handle carriage return (CR)
    pub fn carriage_return(&mut self) {
        self.cursor.carriage_return();
    }

    /// Handle backspace (BS)
    pub fn backspace(&mut self) {
        self.cursor.move_left(1);
    }

    /// Handle horizontal tab (HT)
    pub fn tab(&mut self) {
        let cols = self.cols();
        self.cursor.tab(TAB_WIDTH, cols);
    }

    pub fn bell(&mut self) {
        debug!("bell");
    }

    /// Move cursor to absolute position (0-indexed)
    pub fn move_cursor_to(&mut self, row: usize, col: usize) {
        let (cols, rows) = (self.cols(), self.rows());
        self.cursor.move_to(col, row, cols, rows);
    }

    pub fn move_cursor_up(&mut self, n: usize) {
        self.cursor.move_up(n);
    }

    pub fn move_cursor_down(&mut self, n: usize) {
        let rows = self.rows();
        self.cursor.move_down(n, rows);
    }

    pub fn move_cursor_forward(&mut self, n: usize) {
        let cols = self.cols();
        self.cursor.move_right(n, cols);
    }

    pub fn move_cursor_backward(&mut self, n: usize) {
        self.cursor.move_left(n);
    }

    /// Move cursor to column (0-indexed)
    pub fn move_cursor_to_col(&mut self, col: usize) {
        let cols = self.cols();
        self.cursor.set_col(col, cols);
    }

    /// Erase in display (ED)
    pub fn erase_in_display(&mut self, mode: EraseMode) {
        let (col, row) = (self.cursor.col, self.cursor.row);
        let colors = self.colors;
        match mode {
            EraseMode::ToEnd => self.grid_mut().erase_from(col, row, colors),
            EraseMode::All => self.grid_mut().erase(colors),
        }
    }

    /// Erase in line (EL)
    pub fn erase_in_line(&mut self, mode: EraseMode) {
        let (col, row) = (self.cursor.col, self.cursor.row);
        let colors = self.colors;
        match mode {
            EraseMode::ToEnd if self.modes.legacy_erase_in_line => {
                self.grid_mut().erase_from(col, row, colors)
            }
            EraseMode::ToEnd => self.grid_mut().erase_row_from(col, row, colors),
            EraseMode::All => self.grid_mut().erase_row(row, colors),
        }
    }

    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor.visible = visible;
    }

    /// Switch the active grid. Neither grid is copied or cleared.
    pub fn set_alternate_screen(&mut self, enable: bool) {
        if self.on_alternate != enable {
            debug!(alternate = enable, "switching screen buffer");
        }
        self.on_alternate = enable;
    }

    pub fn set_bracketed_paste(&mut self, enable: bool) {
        self.modes.bracketed_paste = enable;
    }

    /// Resize the screen. Both grids are replaced with blank grids of the
    /// new size and the cursor is clamped into them.
    pub fn resize(&mut self, new_cols: usize, new_rows: usize) {
        if new_cols == self.cols() && new_rows == self.rows() {
            return;
        }

        self.primary_grid = Grid::new(new_cols, new_rows, self.colors);
        self.alternate_grid = Grid::new(new_cols, new_rows, self.colors);
        self.cursor.clamp(new_cols, new_rows);
        self.cursor.overflow = false;
    }

    /// Reset to the initial state, keeping dimensions and mode switches
    /// that come from configuration
    pub fn reset(&mut self) {
        let (cols, rows) = (self.cols(), self.rows());
        let legacy_erase_in_line = self.modes.legacy_erase_in_line;
        *self = Self::new(cols, rows, self.colors);
        self.modes.legacy_erase_in_line = legacy_erase_in_line;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(screen: &Screen, row: usize) -> String {
        screen.get_row(row).unwrap().to_text()
    }

    fn print_str(screen: &mut Screen, s: &str) {
        for c in s.chars() {
            screen.print_char(c);
        }
    }

    #[test]
    fn test_screen_new() {
        let screen = Screen::new(80, 24, Colors::default());
        assert_eq!(screen.cols(), 80);
        assert_eq!(screen.rows(), 24);
        assert_eq!(screen.cursor().col, 0);
        assert_eq!(screen.cursor().row, 0);
        assert!(!screen.is_alternate());
    }

    #[test]
    fn test_print_char() {
        let mut screen = Screen::new(80, 24, Colors::default());
        screen.print_char('H');
        screen.print_char('i');

        assert_eq!(screen.get_cell(0, 0).unwrap().display_char(), 'H');
        assert_eq!(screen.get_cell(1, 0).unwrap().display_char(), 'i');
        assert_eq!(screen.cursor().col, 2);
    }

    #[test]
    fn test_print_uses_screen_colors() {
        let mut screen = Screen::new(4, 1, Colors::new(3, 4));
        screen.print_char('x');

        let cell = screen.get_cell(0, 0).unwrap();
        assert_eq!((cell.fg, cell.bg), (3, 4));
    }

    #[test]
    fn test_no_wrap_at_right_margin() {
        let mut screen = Screen::new(5, 3, Colors::default());
        print_str(&mut screen, "Hello World");

        assert_eq!(line(&screen, 0), "Hello");
        assert_eq!(line(&screen, 1), "");
        assert_eq!(screen.cursor().col, 4);
        assert!(screen.cursor().overflow);
    }

    #[test]
    fn test_overflow_survives_linefeed() {
        let mut screen = Screen::new(3, 2, Colors::default());
        print_str(&mut screen, "abc");
        screen.linefeed();
        screen.print_char('d');

        assert_eq!(line(&screen, 1), "");

        screen.carriage_return();
        screen.print_char('d');
        assert_eq!(line(&screen, 1), "d");
    }

    #[test]
    fn test_vertical_moves_keep_overflow() {
        let mut screen = Screen::new(4, 3, Colors::default());
        print_str(&mut screen, "abcd");

        screen.move_cursor_down(1);
        screen.print_char('X');
        assert_eq!(line(&screen, 1), "");
        assert_eq!((screen.cursor().col, screen.cursor().row), (3, 1));
        assert!(screen.cursor().overflow);

        screen.move_cursor_up(1);
        screen.print_char('Y');
        assert_eq!(line(&screen, 0), "abcd");
        assert!(screen.cursor().overflow);

        screen.move_cursor_to_col(1);
        screen.print_char('Z');
        assert_eq!(line(&screen, 0), "aZcd");
    }

    #[test]
    fn test_backspace_from_overflow() {
        let mut screen = Screen::new(3, 1, Colors::default());
        print_str(&mut screen, "abc");
        screen.backspace();
        screen.print_char('Z');

        assert_eq!(line(&screen, 0), "abZ");
    }

    #[test]
    fn test_linefeed_and_scroll() {
        let mut screen = Screen::new(80, 3, Colors::default());

        screen.print_char('1');
        screen.linefeed();
        screen.carriage_return();
        screen.print_char('2');
        screen.linefeed();
        screen.carriage_return();
        screen.print_char('3');

        // Now at bottom, linefeed should scroll
        screen.linefeed();
        screen.carriage_return();
        screen.print_char('4');

        assert_eq!(line(&screen, 0), "2");
        assert_eq!(line(&screen, 1), "3");
        assert_eq!(line(&screen, 2), "4");
        assert_eq!(screen.cursor().row, 2);
    }

    #[test]
    fn test_tab() {
        let mut screen = Screen::new(20, 1, Colors::default());
        screen.print_char('a');
        screen.tab();
        assert_eq!(screen.cursor().col, 8);
        screen.tab();
        assert_eq!(screen.cursor().col, 16);
        screen.tab();
        assert_eq!(screen.cursor().col, 19);
    }

    #[test]
    fn test_cursor_moves_clamp() {
        let mut screen = Screen::new(10, 5, Colors::default());
        screen.move_cursor_up(3);
        screen.move_cursor_backward(3);
        assert_eq!((screen.cursor().col, screen.cursor().row), (0, 0));

        screen.move_cursor_down(100);
        screen.move_cursor_forward(100);
        assert_eq!((screen.cursor().col, screen.cursor().row), (9, 4));

        screen.move_cursor_to(2, 3);
        assert_eq!((screen.cursor().col, screen.cursor().row), (3, 2));

        screen.move_cursor_to_col(50);
        assert_eq!(screen.cursor().col, 9);
    }

    #[test]
    fn test_erase_in_display() {
        let mut screen = Screen::new(10, 3, Colors::default());
        for row in 0..3 {
            screen.move_cursor_to(row, 0);
            print_str(&mut screen, "XXXXXXXXXX");
        }

        screen.move_cursor_to(1, 5);
        screen.erase_in_display(EraseMode::ToEnd);

        assert_eq!(line(&screen, 0), "XXXXXXXXXX");
        assert_eq!(line(&screen, 1), "XXXXX");
        assert_eq!(line(&screen, 2), "");

        screen.erase_in_display(EraseMode::All);
        assert!(screen
            .grid()
            .iter_rows()
            .all(|r| r.cells.iter().all(|c| *c == Cell::default())));
    }

    #[test]
    fn test_erase_in_line() {
        let mut screen = Screen::new(10, 2, Colors::default());
        print_str(&mut screen, "ABCDEFGHIJ");
        screen.move_cursor_to(1, 0);
        print_str(&mut screen, "KLMNOPQRST");

        screen.move_cursor_to(0, 5);
        screen.erase_in_line(EraseMode::ToEnd);

        assert_eq!(line(&screen, 0), "ABCDE");
        assert_eq!(line(&screen, 1), "KLMNOPQRST");

        screen.erase_in_line(EraseMode::All);
        assert_eq!(line(&screen, 0), "");
        assert_eq!(line(&screen, 1), "KLMNOPQRST");
    }

    #[test]
    fn test_legacy_erase_in_line_reaches_end_of_display() {
        let mut screen = Screen::new(10, 2, Colors::default());
        screen.modes.legacy_erase_in_line = true;
        print_str(&mut screen, "ABCDEFGHIJ");
        screen.move_cursor_to(1, 0);
        print_str(&mut screen, "KLMNOPQRST");

        screen.move_cursor_to(0, 5);
        screen.erase_in_line(EraseMode::ToEnd);

        assert_eq!(line(&screen, 0), "ABCDE");
        assert_eq!(line(&screen, 1), "");
    }

    #[test]
    fn test_alternate_screen_keeps_both_grids() {
        let mut screen = Screen::new(10, 2, Colors::default());
        print_str(&mut screen, "main");

        screen.set_alternate_screen(true);
        assert!(screen.is_alternate());
        assert_eq!(line(&screen, 0), "");

        screen.carriage_return();
        print_str(&mut screen, "alt");
        assert_eq!(screen.alternate_grid().row(0).unwrap().to_text(), "alt");
        assert_eq!(screen.primary_grid().row(0).unwrap().to_text(), "main");

        screen.set_alternate_screen(false);
        assert_eq!(line(&screen, 0), "main");

        screen.set_alternate_screen(true);
        assert_eq!(line(&screen, 0), "alt");
    }

    #[test]
    fn test_scroll_targets_active_grid() {
        let mut screen = Screen::new(4, 1, Colors::default());
        print_str(&mut screen, "p");
        screen.set_alternate_screen(true);
        screen.carriage_return();
        print_str(&mut screen, "a");
        screen.linefeed();

        assert_eq!(screen.alternate_grid().row(0).unwrap().to_text(), "");
        assert_eq!(screen.primary_grid().row(0).unwrap().to_text(), "p");
    }

    #[test]
    fn test_resize_replaces_grids() {
        let mut screen = Screen::new(10, 5, Colors::default());
        print_str(&mut screen, "hello");
        screen.move_cursor_to(4, 9);

        screen.resize(4, 2);

        assert_eq!(screen.cols(), 4);
        assert_eq!(screen.rows(), 2);
        assert_eq!(screen.alternate_grid().rows(), 2);
        assert_eq!(line(&screen, 0), "");
        assert_eq!((screen.cursor().col, screen.cursor().row), (3, 1));
    }

    #[test]
    fn test_resize_same_size_keeps_content() {
        let mut screen = Screen::new(10, 5, Colors::default());
        print_str(&mut screen, "hello");
        screen.resize(10, 5);
        assert_eq!(line(&screen, 0), "hello");
    }

    #[test]
    fn test_reset_keeps_legacy_switch() {
        let mut screen = Screen::new(10, 5, Colors::default());
        screen.modes.legacy_erase_in_line = true;
        screen.set_bracketed_paste(true);
        print_str(&mut screen, "hello");

        screen.reset();

        assert_eq!(line(&screen, 0), "");
        assert!(screen.modes.legacy_erase_in_line);
        assert!(!screen.modes.bracketed_paste);
    }
}
