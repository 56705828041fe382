//! Tokens produced by the scanner
//!
//! These represent the semantic meaning of the byte stream: printable
//! text, recognized control actions, and everything else.

use serde::{Deserialize, Serialize};

/// A single unit of scanned output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Token {
    /// Place one printable character at the cursor
    Text(char),
    /// A recognized control byte or escape sequence
    Control(Control),
    /// Raw bytes of a control byte or sequence that is not acted on.
    /// Never mutates terminal state.
    Unknown(Vec<u8>),
}

/// Recognized control actions
///
/// Counts are already defaulted (a missing or zero count is 1) and
/// absolute positions are 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    /// LF (0x0A)
    LineFeed,
    /// CR (0x0D)
    CarriageReturn,
    /// HT (0x09)
    Tab,
    /// BEL (0x07)
    Bell,
    /// BS (0x08)
    Backspace,
    /// CUU - `CSI n A`
    CursorUp(u16),
    /// CUD - `CSI n B`
    CursorDown(u16),
    /// CUF - `CSI n C`
    CursorForward(u16),
    /// CUB - `CSI n D`
    CursorBackward(u16),
    /// CUP - `CSI row ; col H`
    CursorPosition { row: u16, col: u16 },
    /// CHA - `CSI n G`
    CursorColumn(u16),
    /// ED - `CSI [0|2|3] J`
    EraseInDisplay(EraseMode),
    /// EL - `CSI [0|2] K`
    EraseInLine(EraseMode),
    /// DECTCEM - `CSI ? 25 h/l`
    CursorVisible(bool),
    /// `CSI ? 1049 h/l`
    AlternateScreen(bool),
    /// `CSI ? 2004 h/l`
    BracketedPaste(bool),
}

/// Extent of an erase operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EraseMode {
    /// From the cursor to the end (of the line or display)
    ToEnd,
    /// The whole line or display
    All,
}

impl Token {
    /// Check if this is a text token
    pub fn is_text(&self) -> bool {
        matches!(self, Token::Text(_))
    }

    /// Check if this is a recognized control
    pub fn is_control(&self) -> bool {
        matches!(self, Token::Control(_))
    }

    /// Check if this is an unknown sequence
    pub fn is_unknown(&self) -> bool {
        matches!(self, Token::Unknown(_))
    }
}

impl Control {
    /// Map a bare C0 byte to its control, if it has one
    pub fn from_c0(byte: u8) -> Option<Self> {
        match byte {
            0x07 => Some(Control::Bell),
            0x08 => Some(Control::Backspace),
            0x09 => Some(Control::Tab),
            0x0A => Some(Control::LineFeed),
            0x0D => Some(Control::CarriageReturn),
            _ => None,
        }
    }
}
