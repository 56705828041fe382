//! Glowterm Terminal Emulator Core
//!
//! Turns the byte stream of a child process into a grid of colored cells
//! that any renderer can paint. This crate provides:
//!
//! - `parser`: incremental escape sequence scanner
//! - `core`: screen model with primary and alternate grids, cursor, snapshots
//! - `terminal`: applies scanned tokens to the screen
//! - `pty`: PTY creation and child process management
//! - `session`: reader and resize threads around a shared terminal
//! - `app`: configuration and logging setup

pub mod app;
pub mod core;
pub mod parser;
pub mod pty;
pub mod session;
pub mod terminal;

pub use app::Config;
pub use core::{Cell, Snapshot};
pub use session::{ResizeHandle, Session, SessionError, SessionEvent, SharedTerminal};
pub use terminal::Terminal;
