//! PTY session
//!
//! Connects a child process on a PTY to a shared [`Terminal`]. A reader
//! thread feeds everything the child prints into the terminal, a resize
//! thread applies window size changes, and the host takes snapshots from
//! its own thread.
//!
//! A single mutex guards the terminal. `ingest` holds it for a whole batch
//! and `snapshot` holds it only while copying the active grid, so a
//! snapshot never shows a half-applied batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nix::sys::signal::Signal;
use tracing::{debug, error, info, warn};

use crate::app::{Config, ConfigError};
use crate::core::Snapshot;
use crate::pty::{Pty, PtyError, WindowSize};
use crate::terminal::Terminal;

/// Bytes requested per read from the PTY
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// How long the reader waits for output before checking for shutdown
const POLL_INTERVAL_MS: i32 = 100;

/// Terminal state shared between the PTY reader and the renderer
#[derive(Debug, Clone)]
pub struct SharedTerminal {
    inner: Arc<Mutex<Terminal>>,
}

impl SharedTerminal {
    pub fn new(terminal: Terminal) -> Self {
        Self {
            inner: Arc::new(Mutex::new(terminal)),
        }
    }

    /// A panic while the lock was held leaves the terminal usable; every
    /// token is applied as a whole, so recover the guard.
    fn lock(&self) -> MutexGuard<'_, Terminal> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a batch of child output under one lock
    pub fn ingest(&self, data: &[u8]) {
        self.lock().ingest(data);
    }

    /// Copy the visible state, waiting for any batch in progress
    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    /// Copy the visible state, or `None` if a batch is being applied
    pub fn try_snapshot(&self) -> Option<Snapshot> {
        match self.inner.try_lock() {
            Ok(terminal) => Some(terminal.snapshot()),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner().snapshot()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub fn resize(&self, cols: usize, rows: usize) {
        self.lock().resize(cols, rows);
    }

    /// Run `f` with exclusive access to the terminal
    pub fn with<R>(&self, f: impl FnOnce(&mut Terminal) -> R) -> R {
        f(&mut self.lock())
    }
}

/// Error type for session startup and input
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("PTY error: {0}")]
    Pty(#[from] PtyError),

    #[error("Failed to start {name} thread: {source}")]
    Thread {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Session has terminated")]
    Terminated,
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Notifications from the session threads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The PTY reached end of stream or failed. `code` is the child's exit
    /// code when it could be collected (128 + signal for a killed child).
    Exited { code: Option<i32> },
}

enum ResizeRequest {
    Resize(WindowSize),
    Stop,
}

/// Cloneable handle for reporting window size changes
#[derive(Debug, Clone)]
pub struct ResizeHandle {
    tx: Sender<ResizeRequest>,
    char_width: u16,
    char_height: u16,
}

impl ResizeHandle {
    /// Request a new grid size. Pixel dimensions follow from the
    /// configured character cell size.
    pub fn resize(&self, cols: u16, rows: u16) -> SessionResult<()> {
        let size = WindowSize::with_pixels(
            cols,
            rows,
            cols.saturating_mul(self.char_width),
            rows.saturating_mul(self.char_height),
        );
        self.resize_to(size)
    }

    pub fn resize_to(&self, size: WindowSize) -> SessionResult<()> {
        if size.cols == 0 || size.rows == 0 {
            warn!(cols = size.cols, rows = size.rows, "ignoring empty window size");
            return Ok(());
        }
        self.tx
            .send(ResizeRequest::Resize(size))
            .map_err(|_| SessionError::Terminated)
    }
}

/// A running child process attached to a terminal
pub struct Session {
    pty: Arc<Pty>,
    terminal: SharedTerminal,
    terminated: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    events: Receiver<SessionEvent>,
    resize: ResizeHandle,
    reader: Option<JoinHandle<()>>,
    resizer: Option<JoinHandle<()>>,
}

impl Session {
    /// Start the configured shell on a PTY sized from `config`
    pub fn start(config: &Config) -> SessionResult<Self> {
        config.validate()?;
        let size = config.window_size();
        let pty = match &config.shell {
            Some(shell) => Pty::spawn(shell, &[], size)?,
            None => Pty::spawn_shell(size)?,
        };
        Self::attach(pty, config)
    }

    /// Start `program` instead of the shell
    pub fn spawn(config: &Config, program: &str, args: &[&str]) -> SessionResult<Self> {
        config.validate()?;
        let pty = Pty::spawn(program, args, config.window_size())?;
        Self::attach(pty, config)
    }

    fn attach(pty: Pty, config: &Config) -> SessionResult<Self> {
        let pty = Arc::new(pty);
        let terminal = SharedTerminal::new(Terminal::from_config(config));
        let terminated = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let (event_tx, events) = mpsc::channel();
        let (resize_tx, resize_rx) = mpsc::channel();

        let reader = {
            let pty = Arc::clone(&pty);
            let terminal = terminal.clone();
            let terminated = Arc::clone(&terminated);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("glowterm-pty-reader".to_string())
                .spawn(move || reader_loop(&pty, &terminal, &terminated, &stop, &event_tx))
                .map_err(|source| SessionError::Thread {
                    name: "reader",
                    source,
                })?
        };

        let resizer = {
            let pty = Arc::clone(&pty);
            let terminal = terminal.clone();
            thread::Builder::new()
                .name("glowterm-resize".to_string())
                .spawn(move || resize_loop(&pty, &terminal, &resize_rx))
                .map_err(|source| SessionError::Thread {
                    name: "resize",
                    source,
                })?
        };

        info!(pid = pty.child_pid().as_raw(), "session started");

        Ok(Self {
            pty,
            terminal,
            terminated,
            stop,
            events,
            resize: ResizeHandle {
                tx: resize_tx,
                char_width: config.window.char_width,
                char_height: config.window.char_height,
            },
            reader: Some(reader),
            resizer: Some(resizer),
        })
    }

    /// Send input (keystrokes, pastes) to the child.
    ///
    /// A failed write terminates the session.
    pub fn write(&self, data: &[u8]) -> SessionResult<()> {
        if self.is_terminated() {
            return Err(SessionError::Terminated);
        }
        self.pty.write_all(data).map_err(|err| {
            error!(%err, "pty write failed, terminating session");
            self.terminated.store(true, Ordering::Release);
            SessionError::Pty(err)
        })
    }

    /// Whether the child output stream has ended
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Next pending event, without blocking
    pub fn try_event(&self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn wait_event(&self, timeout: Duration) -> Option<SessionEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// The shared terminal state
    pub fn terminal(&self) -> &SharedTerminal {
        &self.terminal
    }

    pub fn snapshot(&self) -> Snapshot {
        self.terminal.snapshot()
    }

    pub fn resize_handle(&self) -> ResizeHandle {
        self.resize.clone()
    }

    pub fn child_pid(&self) -> nix::unistd::Pid {
        self.pty.child_pid()
    }

    /// Hang up the child and join the session threads
    pub fn shutdown(&mut self) {
        if self.reader.is_none() && self.resizer.is_none() {
            return;
        }
        debug!("shutting down session");
        self.stop.store(true, Ordering::Release);
        if let Err(err) = self.pty.signal(Signal::SIGHUP) {
            debug!(%err, "could not hang up child");
        }
        let _ = self.resize.tx.send(ResizeRequest::Stop);

        for handle in [self.reader.take(), self.resizer.take()].into_iter().flatten() {
            if handle.join().is_err() {
                warn!("session thread panicked");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn reader_loop(
    pty: &Pty,
    terminal: &SharedTerminal,
    terminated: &AtomicBool,
    stop: &AtomicBool,
    events: &Sender<SessionEvent>,
) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        if stop.load(Ordering::Acquire) {
            debug!("reader stopping");
            break;
        }
        match pty.poll_read(POLL_INTERVAL_MS) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                error!(%err, "pty poll failed");
                break;
            }
        }
        match pty.read(&mut buf) {
            Ok(0) => {
                info!("pty closed");
                break;
            }
            Ok(n) => terminal.ingest(&buf[..n]),
            Err(err) => {
                error!(%err, "pty read failed");
                break;
            }
        }
    }

    terminated.store(true, Ordering::Release);
    let code = collect_exit_code(pty);
    info!(?code, "session terminated");
    let _ = events.send(SessionEvent::Exited { code });
}

/// The child may still be exiting when its output ends; give it a moment
fn collect_exit_code(pty: &Pty) -> Option<i32> {
    for _ in 0..20 {
        match pty.try_wait() {
            Ok(Some(code)) => return Some(code),
            Ok(None) => thread::sleep(Duration::from_millis(10)),
            Err(PtyError::ChildSignaled(signal)) => return Some(128 + signal),
            Err(err) => {
                debug!(%err, "could not collect exit status");
                return None;
            }
        }
    }
    None
}

fn resize_loop(pty: &Pty, terminal: &SharedTerminal, requests: &Receiver<ResizeRequest>) {
    while let Ok(ResizeRequest::Resize(size)) = requests.recv() {
        // The terminal takes the new size before the child hears about it
        terminal.resize(usize::from(size.cols), usize::from(size.rows));
        if let Err(err) = pty.resize(size) {
            warn!(%err, cols = size.cols, rows = size.rows, "pty resize failed");
        } else {
            debug!(cols = size.cols, rows = size.rows, "resized");
        }
    }
}
