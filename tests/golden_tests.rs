//! Golden tests for the terminal scanner and screen model
//!
//! Each test feeds a byte stream into a fresh terminal and compares the
//! resulting snapshot against the expected grid and cursor.

use glowterm::core::{Cell, Snapshot};
use glowterm::{Config, Terminal};

fn run(cols: usize, rows: usize, input: &[u8]) -> Snapshot {
    let mut term = Terminal::new(cols, rows);
    term.ingest(input);
    term.snapshot()
}

fn chars(snapshot: &Snapshot, row: usize) -> Vec<Option<char>> {
    snapshot.grid[row].iter().map(|c| c.ch).collect()
}

fn cursor(snapshot: &Snapshot) -> (usize, usize) {
    (snapshot.cursor.col, snapshot.cursor.row)
}

#[test]
fn golden_two_lines() {
    let mut term = Terminal::new(4, 2);

    term.ingest(b"ab\r\n");
    let snap = term.snapshot();
    assert_eq!(chars(&snap, 0), vec![Some('a'), Some('b'), None, None]);
    assert_eq!(cursor(&snap), (0, 1));

    term.ingest(b"cd");
    let snap = term.snapshot();
    assert_eq!(chars(&snap, 0), vec![Some('a'), Some('b'), None, None]);
    assert_eq!(chars(&snap, 1), vec![Some('c'), Some('d'), None, None]);
    assert_eq!(cursor(&snap), (2, 1));
    assert_eq!(snap.to_text(), "ab\ncd\n");
}

#[test]
fn golden_cursor_up_at_origin() {
    let snap = run(10, 5, b"\x1b[2A");
    assert_eq!(cursor(&snap), (0, 0));

    let snap = run(10, 5, b"\x1b[65535A\x1b[65535D");
    assert_eq!(cursor(&snap), (0, 0));
}

#[test]
fn golden_unknown_sequence_between_text() {
    let plain = run(10, 2, b"hi");
    let mixed = run(10, 2, b"h\x1b[99zi\x1b[99z");

    assert_eq!(mixed.row_text(0).as_deref(), Some("hi"));
    assert_eq!(mixed, plain);
}

#[test]
fn golden_clear_screen_leaves_default_cells() {
    let snap = run(6, 3, b"abc\r\ndef\r\nghi\x1b[2J");

    assert!(snap
        .grid
        .iter()
        .flatten()
        .all(|cell| *cell == Cell::default()));
    // ED does not move the cursor
    assert_eq!(cursor(&snap), (3, 2));
}

#[test]
fn golden_linefeed_at_bottom_scrolls_one_row() {
    let snap = run(3, 3, b"a\r\nb\r\nc\n");

    assert_eq!(snap.row_text(0).as_deref(), Some("b"));
    assert_eq!(snap.row_text(1).as_deref(), Some("c"));
    assert_eq!(snap.row_text(2).as_deref(), Some(""));
    assert_eq!(cursor(&snap), (1, 2));
}

#[test]
fn golden_last_column_never_wraps() {
    let snap = run(4, 2, b"abcdefgh");

    assert_eq!(snap.row_text(0).as_deref(), Some("abcd"));
    assert_eq!(snap.row_text(1).as_deref(), Some(""));
    assert_eq!(cursor(&snap), (3, 0));

    let snap = run(4, 2, b"abcdefgh\rX");
    assert_eq!(snap.row_text(0).as_deref(), Some("Xbcd"));
}

#[test]
fn golden_erase_in_line_stays_on_line() {
    let snap = run(5, 3, b"aaaaa\r\nbbbbb\r\nccccc\x1b[2;3H\x1b[K");

    assert_eq!(snap.to_text(), "aaaaa\nbb\nccccc\n");
}

#[test]
fn golden_legacy_erase_in_line_clears_rest_of_screen() {
    let mut config = Config::default();
    config.window.columns = 5;
    config.window.rows = 3;
    config.terminal.legacy_erase_in_line = true;

    let mut term = Terminal::from_config(&config);
    term.ingest(b"aaaaa\r\nbbbbb\r\nccccc\x1b[2;3H\x1b[K");

    assert_eq!(term.snapshot().to_text(), "aaaaa\nbb\n");
}

#[test]
fn golden_erase_whole_line_keeps_cursor() {
    let snap = run(5, 2, b"hello\r\nworld\x1b[1;3H\x1b[2K");

    assert_eq!(snap.to_text(), "\nworld\n");
    assert_eq!(cursor(&snap), (2, 0));
}

#[test]
fn golden_alternate_screen_round_trip() {
    let mut term = Terminal::new(10, 2);
    term.ingest(b"shell$ ");

    term.ingest(b"\x1b[?1049h\x1b[H\x1b[2Jeditor");
    let snap = term.snapshot();
    assert!(snap.alternate_screen);
    assert_eq!(snap.row_text(0).as_deref(), Some("editor"));

    term.ingest(b"\x1b[?1049l");
    let snap = term.snapshot();
    assert!(!snap.alternate_screen);
    assert_eq!(snap.row_text(0).as_deref(), Some("shell$"));
}

#[test]
fn golden_absolute_positioning() {
    let snap = run(10, 5, b"\x1b[3;4HX\x1b[HY\x1b[5G\x1b[1BZ");

    assert_eq!(snap.cell(3, 2).map(|c| c.ch), Some(Some('X')));
    assert_eq!(snap.cell(0, 0).map(|c| c.ch), Some(Some('Y')));
    assert_eq!(snap.cell(4, 1).map(|c| c.ch), Some(Some('Z')));
}

#[test]
fn golden_tab_stops() {
    let snap = run(20, 1, b"a\tb\tc\t\t\td");

    assert_eq!(snap.row_text(0).as_deref(), Some("a       b       c  d"));
}

#[test]
fn golden_osc_title_is_skipped() {
    let snap = run(20, 1, b"\x1b]0;my title\x07prompt\x1b]2;other\x1b\\!");

    assert_eq!(snap.row_text(0).as_deref(), Some("prompt!"));
}

#[test]
fn golden_utf8_text() {
    let snap = run(10, 1, "héllo→".as_bytes());

    assert_eq!(snap.row_text(0).as_deref(), Some("héllo→"));
    assert_eq!(cursor(&snap), (6, 0));
}

#[test]
fn golden_snapshot_json_round_trip() {
    let snap = run(8, 2, b"json\x1b[?25l\x1b[?2004h");

    let json = snap.to_json().unwrap();
    let parsed = Snapshot::from_json(&json).unwrap();
    assert_eq!(parsed, snap);
    assert!(!parsed.cursor.visible);
    assert!(parsed.bracketed_paste);
}
