//! Terminal Executor
//!
//! Ties together the scanner and the screen model and applies scanned
//! tokens to update the terminal state. [`Terminal::ingest`] is the only
//! way output from the child changes the screen.

use tracing::trace;

use crate::app::Config;
use crate::core::{Colors, Screen, Snapshot};
use crate::parser::{Control, Scanner, Token};

/// Terminal executor that processes scanned tokens and updates the screen
#[derive(Debug)]
pub struct Terminal {
    /// The terminal screen
    screen: Screen,
    /// The escape sequence scanner
    scanner: Scanner,
}

impl Terminal {
    /// Create a new terminal with the given dimensions and default colors
    pub fn new(cols: usize, rows: usize) -> Self {
        Self::with_colors(cols, rows, Colors::default())
    }

    pub fn with_colors(cols: usize, rows: usize, colors: Colors) -> Self {
        Self {
            screen: Screen::new(cols, rows, colors),
            scanner: Scanner::new(),
        }
    }

    /// Create a terminal sized and configured from `config`
    pub fn from_config(config: &Config) -> Self {
        let mut terminal = Self::with_colors(
            usize::from(config.window.columns),
            usize::from(config.window.rows),
            config.terminal.colors(),
        );
        terminal.screen.modes.legacy_erase_in_line = config.terminal.legacy_erase_in_line;
        terminal
    }

    /// Get a reference to the screen
    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    /// Get a mutable reference to the screen
    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn cols(&self) -> usize {
        self.screen.cols()
    }

    pub fn rows(&self) -> usize {
        self.screen.rows()
    }

    /// Process output bytes from the child.
    ///
    /// Partial sequences at the end of `data` are kept and completed by
    /// the next call. Never fails: unknown and malformed sequences are
    /// logged by the scanner and skipped.
    pub fn ingest(&mut self, data: &[u8]) {
        for token in self.scanner.feed(data) {
            self.apply(token);
        }
    }

    /// Apply a single scanned token to the screen
    pub fn apply(&mut self, token: Token) {
        match token {
            Token::Text(c) => self.screen.print_char(c),
            Token::Control(control) => self.apply_control(control),
            // Already logged by the scanner
            Token::Unknown(raw) => trace!(len = raw.len(), "unknown token ignored"),
        }
    }

    fn apply_control(&mut self, control: Control) {
        match control {
            Control::LineFeed => self.screen.linefeed(),
            Control::CarriageReturn => self.screen.carriage_return(),
            Control::Tab => self.screen.tab(),
            Control::Bell => self.screen.bell(),
            Control::Backspace => self.screen.backspace(),
            Control::CursorUp(n) => self.screen.move_cursor_up(usize::from(n)),
            Control::CursorDown(n) => self.screen.move_cursor_down(usize::from(n)),
            Control::CursorForward(n) => self.screen.move_cursor_forward(usize::from(n)),
            Control::CursorBackward(n) => self.screen.move_cursor_backward(usize::from(n)),
            Control::CursorPosition { row, col } => {
                self.screen.move_cursor_to(usize::from(row), usize::from(col))
            }
            Control::CursorColumn(col) => self.screen.move_cursor_to_col(usize::from(col)),
            Control::EraseInDisplay(mode) => self.screen.erase_in_display(mode),
            Control::EraseInLine(mode) => self.screen.erase_in_line(mode),
            Control::CursorVisible(visible) => self.screen.set_cursor_visible(visible),
            Control::AlternateScreen(enable) => self.screen.set_alternate_screen(enable),
            Control::BracketedPaste(enable) => self.screen.set_bracketed_paste(enable),
        }
    }

    /// Resize the terminal. Both grids are replaced and the cursor clamped.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.screen.resize(cols, rows);
    }

    /// Copy of the visible state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_screen(&self.screen)
    }

    /// Return to the initial state, dropping any partial sequence
    pub fn reset(&mut self) {
        self.scanner.reset();
        self.screen.reset();
    }
}
