//! Terminal Core Module
//!
//! Platform-independent terminal state management. This module contains:
//! - Screen model (primary and alternate grids)
//! - Cell representation with palette colors
//! - Cursor state and positioning
//! - Deterministic snapshot generation
//!
//! The core is deterministic: given the same sequence of tokens it always
//! produces the same state.

mod cell;
mod cursor;
mod grid;
mod screen;
mod snapshot;

pub use cell::{Cell, Colors, DEFAULT_BG, DEFAULT_FG};
pub use cursor::Cursor;
pub use grid::{Grid, Row};
pub use screen::{Modes, Screen, TAB_WIDTH};
pub use snapshot::{CursorSnapshot, Snapshot};
