//! Scanner State Machine
//!
//! Implements a VT500-style scanner. The scanner handles arbitrary chunk
//! boundaries: everything needed to finish a sequence or a UTF-8 character
//! is kept between calls to [`Scanner::feed`].
//!
//! States:
//! - Ground: Normal text processing
//! - Escape: After ESC, waiting for next byte
//! - EscapeIntermediate: ESC followed by intermediate bytes
//! - Csi: After CSI (ESC [), collecting parameter and intermediate bytes
//! - String: Collecting an OSC, DCS, SOS, PM or APC payload
//! - StringEscape: ESC seen inside a string, expecting `\`

use tracing::{debug, warn};

use super::actions::{Control, EraseMode, Token};
use super::{printable, ScanError};

/// Longest escape sequence kept in full. Longer sequences are consumed
/// up to their terminator and reported as [`Token::Unknown`].
pub const MAX_SEQUENCE_LEN: usize = 4096;

const BEL: u8 = 0x07;
const CAN: u8 = 0x18;
const SUB: u8 = 0x1A;
const ESC: u8 = 0x1B;
const DEL: u8 = 0x7F;
const REPLACEMENT: char = '\u{FFFD}';

/// Scanner state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    Csi,
    /// `bel` is set for OSC, which xterm also lets BEL terminate
    String { bel: bool },
    StringEscape,
}

/// The byte stream scanner
#[derive(Debug, Default)]
pub struct Scanner {
    state: State,
    /// Raw bytes of the sequence in progress, starting with ESC
    seq: Vec<u8>,
    /// The sequence outgrew `MAX_SEQUENCE_LEN`
    truncated: bool,
    /// UTF-8 decoder state
    utf8: [u8; 4],
    utf8_len: usize,
    utf8_remaining: usize,
}

impl Scanner {
    /// Create a new scanner in the ground state
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the scanner, discarding any partial sequence or character
    pub fn reset(&mut self) {
        self.state = State::Ground;
        self.seq.clear();
        self.truncated = false;
        self.utf8_len = 0;
        self.utf8_remaining = 0;
    }

    /// True when no sequence or UTF-8 character is in progress
    pub fn is_ground(&self) -> bool {
        self.state == State::Ground && self.utf8_remaining == 0
    }

    /// Process a chunk of bytes, returning tokens
    pub fn feed(&mut self, data: &[u8]) -> Vec<Token> {
        let mut tokens = Vec::new();
        for &byte in data {
            self.process_byte(byte, &mut tokens);
        }
        tokens
    }

    /// Process a single byte
    fn process_byte(&mut self, byte: u8, out: &mut Vec<Token>) {
        if self.utf8_remaining > 0 {
            self.process_utf8_continuation(byte, out);
            return;
        }

        match self.state {
            State::Ground => self.process_ground(byte, out),
            State::String { bel } => self.process_string(byte, bel, out),
            State::StringEscape => self.process_string_escape(byte, out),
            State::Escape | State::EscapeIntermediate | State::Csi => {
                self.process_sequence(byte, out)
            }
        }
    }

    /// Bytes in ground state (normal text)
    fn process_ground(&mut self, byte: u8, out: &mut Vec<Token>) {
        match byte {
            ESC => self.begin_escape(),
            0x00..=0x1F | DEL => self.execute(byte, out),
            0x20..=0x7E => out.push(Token::Text(byte as char)),
            0xC2..=0xDF => self.start_utf8(byte, 1),
            0xE0..=0xEF => self.start_utf8(byte, 2),
            0xF0..=0xF4 => self.start_utf8(byte, 3),
            // Stray continuation bytes and bytes that never start a character
            _ => out.push(Token::Text(REPLACEMENT)),
        }
    }

    /// Emit a bare C0 control or DEL
    fn execute(&mut self, byte: u8, out: &mut Vec<Token>) {
        match Control::from_c0(byte) {
            Some(control) => out.push(Token::Control(control)),
            None => self.reject(vec![byte], unsupported(&[byte]), out),
        }
    }

    fn start_utf8(&mut self, byte: u8, remaining: usize) {
        self.utf8[0] = byte;
        self.utf8_len = 1;
        self.utf8_remaining = remaining;
    }

    fn process_utf8_continuation(&mut self, byte: u8, out: &mut Vec<Token>) {
        if !(0x80..=0xBF).contains(&byte) {
            // Incomplete character; the byte itself starts something new
            self.utf8_len = 0;
            self.utf8_remaining = 0;
            out.push(Token::Text(REPLACEMENT));
            self.process_byte(byte, out);
            return;
        }

        self.utf8[self.utf8_len] = byte;
        self.utf8_len += 1;
        self.utf8_remaining -= 1;

        if self.utf8_remaining == 0 {
            // Overlong forms and surrogates fail here
            let c = std::str::from_utf8(&self.utf8[..self.utf8_len])
                .ok()
                .and_then(|s| s.chars().next())
                .unwrap_or(REPLACEMENT);
            self.utf8_len = 0;
            out.push(Token::Text(c));
        }
    }

    /// Bytes in the Escape, EscapeIntermediate and Csi states
    fn process_sequence(&mut self, byte: u8, out: &mut Vec<Token>) {
        match byte {
            ESC => {
                let raw = self.finish();
                self.reject(raw, unsupported_interrupted(), out);
                self.begin_escape();
                return;
            }
            CAN | SUB => {
                let mut raw = self.finish();
                raw.push(byte);
                self.reject(raw, unsupported_cancelled(), out);
                return;
            }
            // C0 controls execute without disturbing the sequence
            0x00..=0x1F => {
                self.execute(byte, out);
                return;
            }
            DEL => return,
            _ => {}
        }

        self.push(byte);
        match (self.state, byte) {
            (State::Escape, b'[') => self.state = State::Csi,
            (State::Escape, b']') => self.state = State::String { bel: true },
            (State::Escape, b'P' | b'X' | b'^' | b'_') => {
                self.state = State::String { bel: false }
            }
            (State::Escape | State::EscapeIntermediate, 0x20..=0x2F) => {
                self.state = State::EscapeIntermediate
            }
            // Parameter and intermediate bytes
            (State::Csi, 0x20..=0x3F) => {}
            (State::Csi, 0x40..=0x7E) => self.dispatch_csi(out),
            // ESC dispatch (save cursor, keypad modes, charsets, ...)
            (_, 0x30..=0x7E) => {
                let raw = self.finish();
                let err = unsupported(&raw);
                self.reject(raw, err, out);
            }
            // 8-bit bytes never belong to a sequence
            _ => {
                let raw = self.finish();
                let err = ScanError::Malformed {
                    sequence: printable(&raw),
                    reason: "unexpected 8-bit byte",
                };
                self.reject(raw, err, out);
            }
        }
    }

    fn dispatch_csi(&mut self, out: &mut Vec<Token>) {
        let truncated = self.truncated;
        let raw = self.finish();
        if truncated {
            let err = overlong(&raw);
            self.reject(raw, err, out);
            return;
        }
        match classify_csi(&raw) {
            Ok(control) => out.push(Token::Control(control)),
            Err(err) => self.reject(raw, err, out),
        }
    }

    /// Bytes inside an OSC/DCS/SOS/PM/APC payload
    fn process_string(&mut self, byte: u8, bel: bool, out: &mut Vec<Token>) {
        match byte {
            BEL if bel => {
                self.push(byte);
                self.terminate_string(out);
            }
            ESC => self.state = State::StringEscape,
            CAN | SUB => {
                let mut raw = self.finish();
                raw.push(byte);
                self.reject(raw, unsupported_cancelled(), out);
            }
            // Other C0 controls are ignored in strings
            0x00..=0x1F => {}
            _ => self.push(byte),
        }
    }

    fn process_string_escape(&mut self, byte: u8, out: &mut Vec<Token>) {
        if byte == b'\\' {
            self.push(ESC);
            self.push(byte);
            self.terminate_string(out);
            return;
        }

        // Not ST: the string is abandoned and a new escape begins
        let raw = self.finish();
        self.reject(raw, unsupported_interrupted(), out);
        self.begin_escape();
        self.process_byte(byte, out);
    }

    fn terminate_string(&mut self, out: &mut Vec<Token>) {
        let truncated = self.truncated;
        let raw = self.finish();
        let err = if truncated {
            overlong(&raw)
        } else {
            unsupported(&raw)
        };
        self.reject(raw, err, out);
    }

    fn begin_escape(&mut self) {
        self.seq.clear();
        self.truncated = false;
        self.seq.push(ESC);
        self.state = State::Escape;
    }

    fn push(&mut self, byte: u8) {
        if self.seq.len() < MAX_SEQUENCE_LEN {
            self.seq.push(byte);
        } else {
            self.truncated = true;
        }
    }

    /// Return to ground, handing back the raw sequence bytes
    fn finish(&mut self) -> Vec<u8> {
        self.state = State::Ground;
        self.truncated = false;
        std::mem::take(&mut self.seq)
    }

    /// Log why a sequence is skipped and emit it as `Unknown`
    fn reject(&self, raw: Vec<u8>, err: ScanError, out: &mut Vec<Token>) {
        match err {
            ScanError::Unsupported { .. } => debug!(%err, "ignoring sequence"),
            ScanError::Malformed { .. } | ScanError::Overlong { .. } => {
                warn!(%err, "skipping sequence")
            }
        }
        out.push(Token::Unknown(raw));
    }
}

fn unsupported(raw: &[u8]) -> ScanError {
    ScanError::Unsupported {
        sequence: printable(raw),
    }
}

fn unsupported_interrupted() -> ScanError {
    ScanError::Unsupported {
        sequence: "interrupted by ESC".to_string(),
    }
}

fn unsupported_cancelled() -> ScanError {
    ScanError::Unsupported {
        sequence: "cancelled by CAN/SUB".to_string(),
    }
}

fn overlong(raw: &[u8]) -> ScanError {
    let shown = &raw[..raw.len().min(32)];
    ScanError::Overlong {
        sequence: format!("{}...", printable(shown)),
        limit: MAX_SEQUENCE_LEN,
    }
}

/// Classify a complete CSI sequence (`ESC [ ... final`)
pub(crate) fn classify_csi(raw: &[u8]) -> Result<Control, ScanError> {
    let (final_byte, body) = match raw {
        [ESC, b'[', body @ .., last] => (*last, body),
        _ => return Err(unsupported(raw)),
    };
    let malformed = |reason| ScanError::Malformed {
        sequence: printable(raw),
        reason,
    };

    let (marker, rest) = match body.split_first() {
        Some((&(m @ (b'?' | b'<' | b'=' | b'>')), rest)) => (Some(m), rest),
        _ => (None, body),
    };
    let param_end = rest
        .iter()
        .position(|b| (0x20..=0x2F).contains(b))
        .unwrap_or(rest.len());
    let (param_bytes, intermediates) = rest.split_at(param_end);

    let private = match final_byte {
        b'A'..=b'D' | b'G' | b'H' | b'J' | b'K' => false,
        b'h' | b'l' => true,
        _ => return Err(unsupported(raw)),
    };
    if !intermediates.is_empty() {
        return Err(unsupported(raw));
    }
    match (private, marker) {
        (false, None) | (true, Some(b'?')) => {}
        (false, Some(_)) => return Err(malformed("unexpected private marker")),
        (true, None) => return Err(malformed("missing private marker")),
        (true, Some(_)) => return Err(unsupported(raw)),
    }

    let params = parse_params(param_bytes).map_err(malformed)?;
    let max = match final_byte {
        b'H' => 2,
        _ => 1,
    };
    if params.len() > max {
        return Err(malformed("too many parameters"));
    }
    let first = params.first().copied().flatten();

    let control = match final_byte {
        b'A' => Control::CursorUp(count(first)),
        b'B' => Control::CursorDown(count(first)),
        b'C' => Control::CursorForward(count(first)),
        b'D' => Control::CursorBackward(count(first)),
        b'H' => Control::CursorPosition {
            row: position(first),
            col: position(params.get(1).copied().flatten()),
        },
        b'G' => Control::CursorColumn(position(first)),
        b'J' => match first.unwrap_or(0) {
            0 => Control::EraseInDisplay(EraseMode::ToEnd),
            2 | 3 => Control::EraseInDisplay(EraseMode::All),
            _ => return Err(unsupported(raw)),
        },
        b'K' => match first.unwrap_or(0) {
            0 => Control::EraseInLine(EraseMode::ToEnd),
            2 => Control::EraseInLine(EraseMode::All),
            _ => return Err(unsupported(raw)),
        },
        _ => {
            let on = final_byte == b'h';
            match first {
                Some(25) => Control::CursorVisible(on),
                Some(1049) => Control::AlternateScreen(on),
                Some(2004) => Control::BracketedPaste(on),
                Some(_) => return Err(unsupported(raw)),
                None => return Err(malformed("missing mode number")),
            }
        }
    };
    Ok(control)
}

/// Split `;`-separated decimal parameters; empty fields are `None`
fn parse_params(bytes: &[u8]) -> Result<Vec<Option<u16>>, &'static str> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    bytes
        .split(|&b| b == b';')
        .map(|field| {
            if field.is_empty() {
                return Ok(None);
            }
            if !field.iter().all(u8::is_ascii_digit) {
                return Err("non-numeric parameter");
            }
            field
                .iter()
                .try_fold(0u16, |acc, &d| {
                    acc.checked_mul(10)?.checked_add(u16::from(d - b'0'))
                })
                .map(Some)
                .ok_or("parameter out of range")
        })
        .collect()
}

/// Repeat count: missing or zero means one
fn count(param: Option<u16>) -> u16 {
    param.unwrap_or(1).max(1)
}

/// 1-based position to 0-based; missing or zero means the first
fn position(param: Option<u16>) -> u16 {
    param.unwrap_or(1).max(1) - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls(tokens: &[Token]) -> Vec<Control> {
        tokens
            .iter()
            .filter_map(|t| match t {
                Token::Control(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_scanner_print() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"Hello");

        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0], Token::Text('H'));
        assert_eq!(tokens[4], Token::Text('o'));
    }

    #[test]
    fn test_scanner_c0_controls() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"\r\n\t\x07\x08");

        assert_eq!(
            controls(&tokens),
            vec![
                Control::CarriageReturn,
                Control::LineFeed,
                Control::Tab,
                Control::Bell,
                Control::Backspace,
            ]
        );
    }

    #[test]
    fn test_other_c0_and_del_are_unknown() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"\x00\x0b\x7f");

        assert_eq!(
            tokens,
            vec![
                Token::Unknown(vec![0x00]),
                Token::Unknown(vec![0x0b]),
                Token::Unknown(vec![0x7f]),
            ]
        );
    }

    #[test]
    fn test_cursor_moves() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"\x1b[A\x1b[5B\x1b[0C\x1b[12D");

        assert_eq!(
            controls(&tokens),
            vec![
                Control::CursorUp(1),
                Control::CursorDown(5),
                Control::CursorForward(1),
                Control::CursorBackward(12),
            ]
        );
    }

    #[test]
    fn test_cursor_position_is_one_based() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"\x1b[H\x1b[5;10H\x1b[;7H\x1b[0;0H\x1b[3G");

        assert_eq!(
            controls(&tokens),
            vec![
                Control::CursorPosition { row: 0, col: 0 },
                Control::CursorPosition { row: 4, col: 9 },
                Control::CursorPosition { row: 0, col: 6 },
                Control::CursorPosition { row: 0, col: 0 },
                Control::CursorColumn(2),
            ]
        );
    }

    #[test]
    fn test_erase_sequences() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"\x1b[J\x1b[0J\x1b[2J\x1b[3J\x1b[K\x1b[0K\x1b[2K");

        assert_eq!(
            controls(&tokens),
            vec![
                Control::EraseInDisplay(EraseMode::ToEnd),
                Control::EraseInDisplay(EraseMode::ToEnd),
                Control::EraseInDisplay(EraseMode::All),
                Control::EraseInDisplay(EraseMode::All),
                Control::EraseInLine(EraseMode::ToEnd),
                Control::EraseInLine(EraseMode::ToEnd),
                Control::EraseInLine(EraseMode::All),
            ]
        );
    }

    #[test]
    fn test_private_modes() {
        let mut scanner = Scanner::new();
        let tokens =
            scanner.feed(b"\x1b[?25l\x1b[?25h\x1b[?1049h\x1b[?1049l\x1b[?2004h\x1b[?2004l");

        assert_eq!(
            controls(&tokens),
            vec![
                Control::CursorVisible(false),
                Control::CursorVisible(true),
                Control::AlternateScreen(true),
                Control::AlternateScreen(false),
                Control::BracketedPaste(true),
                Control::BracketedPaste(false),
            ]
        );
    }

    #[test]
    fn test_unsupported_sequences_are_unknown() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"\x1b[99z\x1b[1m\x1b[?1h\x1b7\x1b(B\x1b[1K");

        assert_eq!(
            tokens,
            vec![
                Token::Unknown(b"\x1b[99z".to_vec()),
                Token::Unknown(b"\x1b[1m".to_vec()),
                Token::Unknown(b"\x1b[?1h".to_vec()),
                Token::Unknown(b"\x1b7".to_vec()),
                Token::Unknown(b"\x1b(B".to_vec()),
                Token::Unknown(b"\x1b[1K".to_vec()),
            ]
        );
    }

    #[test]
    fn test_malformed_arguments() {
        let cases: &[&[u8]] = &[
            b"\x1b[1:2A",
            b"\x1b[99999A",
            b"\x1b[1;2;3H",
            b"\x1b[?5A",
            b"\x1b[25h",
            b"\x1b[?25;1049h",
        ];
        for &raw in cases {
            assert!(
                matches!(classify_csi(raw), Err(ScanError::Malformed { .. })),
                "{}",
                printable(raw)
            );
            let mut scanner = Scanner::new();
            assert_eq!(scanner.feed(raw), vec![Token::Unknown(raw.to_vec())]);
        }
    }

    #[test]
    fn test_unsupported_classification() {
        assert!(matches!(
            classify_csi(b"\x1b[99z"),
            Err(ScanError::Unsupported { .. })
        ));
        assert!(matches!(
            classify_csi(b"\x1b[5J"),
            Err(ScanError::Unsupported { .. })
        ));
        assert!(matches!(
            classify_csi(b"\x1b[1 q"),
            Err(ScanError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_osc_terminators() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"\x1b]0;title\x07a\x1b]2;other\x1b\\b");

        assert_eq!(
            tokens,
            vec![
                Token::Unknown(b"\x1b]0;title\x07".to_vec()),
                Token::Text('a'),
                Token::Unknown(b"\x1b]2;other\x1b\\".to_vec()),
                Token::Text('b'),
            ]
        );
        assert!(scanner.is_ground());
    }

    #[test]
    fn test_dcs_ignores_bel() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"\x1bPq\x07x\x1b\\");

        assert_eq!(tokens, vec![Token::Unknown(b"\x1bPqx\x1b\\".to_vec())]);
    }

    #[test]
    fn test_chunk_boundary() {
        let mut scanner = Scanner::new();

        let tokens1 = scanner.feed(b"\x1b[");
        let tokens2 = scanner.feed(b"5");
        assert!(!scanner.is_ground());
        let tokens3 = scanner.feed(b"A");

        assert!(tokens1.is_empty());
        assert!(tokens2.is_empty());
        assert_eq!(tokens3, vec![Token::Control(Control::CursorUp(5))]);
        assert!(scanner.is_ground());
    }

    #[test]
    fn test_utf8() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed("héllo 世界".as_bytes());

        let text: String = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Text(c) => Some(*c),
                _ => None,
            })
            .collect();
        assert_eq!(text, "héllo 世界");
    }

    #[test]
    fn test_utf8_chunk_boundary() {
        let mut scanner = Scanner::new();

        // UTF-8 for '世' is E4 B8 96
        assert!(scanner.feed(&[0xE4]).is_empty());
        assert!(scanner.feed(&[0xB8]).is_empty());
        assert_eq!(scanner.feed(&[0x96]), vec![Token::Text('世')]);
    }

    #[test]
    fn test_invalid_utf8() {
        let mut scanner = Scanner::new();

        // Truncated sequence followed by ASCII keeps the ASCII
        assert_eq!(
            scanner.feed(&[0xE4, b'a']),
            vec![Token::Text(REPLACEMENT), Token::Text('a')]
        );
        // Stray continuation byte and invalid lead byte
        assert_eq!(
            scanner.feed(&[0x80, 0xFF]),
            vec![Token::Text(REPLACEMENT), Token::Text(REPLACEMENT)]
        );
        // Surrogate encoding
        assert_eq!(
            scanner.feed(&[0xED, 0xA0, 0x80]),
            vec![Token::Text(REPLACEMENT)]
        );
    }

    #[test]
    fn test_cancel_sequence() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"\x1b[5\x18A");

        // CAN cancels the sequence, 'A' is printed
        assert_eq!(
            tokens,
            vec![Token::Unknown(b"\x1b[5\x18".to_vec()), Token::Text('A')]
        );
    }

    #[test]
    fn test_esc_restarts_sequence() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"\x1b[12\x1b[3C");

        assert_eq!(
            tokens,
            vec![
                Token::Unknown(b"\x1b[12".to_vec()),
                Token::Control(Control::CursorForward(3)),
            ]
        );
    }

    #[test]
    fn test_esc_inside_osc_restarts() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"\x1b]0;abc\x1b[2J");

        assert_eq!(
            tokens,
            vec![
                Token::Unknown(b"\x1b]0;abc".to_vec()),
                Token::Control(Control::EraseInDisplay(EraseMode::All)),
            ]
        );
    }

    #[test]
    fn test_c0_inside_csi_executes() {
        let mut scanner = Scanner::new();
        let tokens = scanner.feed(b"\x1b[1\n0C");

        assert_eq!(
            controls(&tokens),
            vec![Control::LineFeed, Control::CursorForward(10)]
        );
    }

    #[test]
    fn test_overlong_sequence() {
        let mut scanner = Scanner::new();
        let mut input = b"\x1b[".to_vec();
        input.extend(std::iter::repeat(b'1').take(MAX_SEQUENCE_LEN * 2));
        input.extend_from_slice(b"Ax");

        let tokens = scanner.feed(&input);

        assert_eq!(tokens.len(), 2);
        match &tokens[0] {
            Token::Unknown(raw) => assert_eq!(raw.len(), MAX_SEQUENCE_LEN),
            other => panic!("expected Unknown, got {other:?}"),
        }
        assert_eq!(tokens[1], Token::Text('x'));
    }

    #[test]
    fn test_reset() {
        let mut scanner = Scanner::new();
        scanner.feed(b"\x1b[12");
        assert!(!scanner.is_ground());

        scanner.reset();
        assert!(scanner.is_ground());
        assert_eq!(scanner.feed(b"C"), vec![Token::Text('C')]);
    }
}
