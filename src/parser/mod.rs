//! Escape sequence scanner
//!
//! A stateful scanner that converts bytes into tokens. State survives
//! between calls, so sequences split across reads are still recognized.
//! Based on the VT500-series parser model from <https://vt100.net/emu/dec_ansi_parser>

mod actions;
mod state;

pub use actions::{Control, EraseMode, Token};
pub use state::{Scanner, MAX_SEQUENCE_LEN};

/// Why a sequence was turned into [`Token::Unknown`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("malformed argument in {sequence}: {reason}")]
    Malformed {
        sequence: String,
        reason: &'static str,
    },

    #[error("sequence exceeds {limit} bytes: {sequence}")]
    Overlong { sequence: String, limit: usize },

    #[error("unsupported sequence {sequence}")]
    Unsupported { sequence: String },
}

/// Render raw sequence bytes for logs, spelling ESC out
pub fn printable(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    for &b in raw {
        if b == 0x1B {
            out.push_str("ESC");
        } else {
            out.extend(std::ascii::escape_default(b).map(char::from));
        }
    }
    out
}
