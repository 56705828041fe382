//! Unix PTY implementation
//!
//! Implements PTY creation and child process management using POSIX APIs.
//!
//! # References
//!
//! - posix_openpt(3): https://man7.org/linux/man-pages/man3/posix_openpt.3.html
//! - grantpt(3), unlockpt(3), ptsname(3)
//! - tty_ioctl(4): https://man7.org/linux/man-pages/man4/tty_ioctl.4.html

use std::ffi::{CStr, CString};
use std::os::fd::BorrowedFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::libc::{self, STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::poll::{poll, PollFd, PollFlags};
use nix::pty::{grantpt, posix_openpt, ptsname, unlockpt, PtyMaster};
use nix::sys::signal::{kill, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{close, dup2, fork, read, setsid, write, ForkResult, Pid};
use tracing::{debug, info};

use super::{PtyError, PtyResult, WindowSize};

/// Shell used when `$SHELL` is unset
const FALLBACK_SHELL: &str = "/bin/sh";

/// Value of `TERM` in the child's environment
const TERM: &str = "xterm-256color";

/// How a reaped child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Code(i32),
    Signal(i32),
    /// Reaped by someone else; the status is lost
    Unknown,
}

/// A pseudoterminal with a spawned child process
///
/// All methods take `&self`, so one `Pty` can be shared between a reader
/// thread and a writer.
pub struct Pty {
    /// The PTY master file descriptor (blocking)
    master: PtyMaster,
    /// The child process ID
    child_pid: Pid,
    /// Set once the child has been reaped
    exit: OnceLock<Exit>,
}

impl Pty {
    /// Spawn `program` with `args` attached to a new PTY of the given size.
    ///
    /// The child runs in its own session with the PTY slave as its
    /// controlling terminal and `TERM=xterm-256color`.
    pub fn spawn(program: &str, args: &[&str], size: WindowSize) -> PtyResult<Self> {
        // Everything the child needs is prepared before fork. Between fork
        // and exec the child may not allocate or take locks another thread
        // could be holding, including the one guarding the environment.
        let path = CString::new(resolve_program(program).as_os_str().as_bytes())?;
        let argv = std::iter::once(program)
            .chain(args.iter().copied())
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()?;
        let envp = child_env()?;
        let argv_ptrs = exec_array(&argv);
        let envp_ptrs = exec_array(&envp);

        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(PtyError::OpenMaster)?;
        grantpt(&master).map_err(PtyError::GrantPty)?;
        unlockpt(&master).map_err(PtyError::UnlockPty)?;

        // SAFETY: ptsname is not thread-safe, but it is called immediately
        // after unlockpt and its result is copied into an owned String
        let slave_name = unsafe { ptsname(&master) }.map_err(PtyError::PtsName)?;
        let slave_name = CString::new(slave_name)?;

        set_window_size(master.as_raw_fd(), size)?;

        // SAFETY: the child only calls async-signal-safe functions on
        // memory prepared before fork, then execs or exits
        match unsafe { fork() }.map_err(PtyError::Fork)? {
            ForkResult::Child => {
                drop(master);
                exec_child(&slave_name, &path, &argv_ptrs, &envp_ptrs)
            }
            ForkResult::Parent { child } => {
                info!(pid = child.as_raw(), program, "spawned child on pty");
                Ok(Pty {
                    master,
                    child_pid: child,
                    exit: OnceLock::new(),
                })
            }
        }
    }

    /// Spawn the user's shell (`$SHELL`, else `/bin/sh`)
    pub fn spawn_shell(size: WindowSize) -> PtyResult<Self> {
        let shell = default_shell();
        Self::spawn(&shell, &[], size)
    }

    /// Get the raw file descriptor of the PTY master
    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    /// Get the child process ID
    pub fn child_pid(&self) -> Pid {
        self.child_pid
    }

    /// Check if the child process is still running
    pub fn is_alive(&self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }

    /// Reap the child if it has exited, without blocking.
    ///
    /// Returns `Ok(None)` while the child is running and its exit code
    /// once it has exited. Later calls keep reporting the same status.
    /// A child killed by a signal reports [`PtyError::ChildSignaled`].
    pub fn try_wait(&self) -> PtyResult<Option<i32>> {
        if let Some(&exit) = self.exit.get() {
            return exit_result(exit).map(Some);
        }
        match waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => Ok(None),
            Ok(status) => match self.reaped(status) {
                Some(exit) => exit_result(exit).map(Some),
                None => Ok(None),
            },
            Err(Errno::ECHILD) => exit_result(self.lost()).map(Some),
            Err(e) => Err(PtyError::Wait(e)),
        }
    }

    /// Wait for the child process to exit
    pub fn wait(&self) -> PtyResult<i32> {
        loop {
            if let Some(&exit) = self.exit.get() {
                return exit_result(exit);
            }
            match waitpid(self.child_pid, None) {
                Ok(status) => {
                    if let Some(exit) = self.reaped(status) {
                        return exit_result(exit);
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => return exit_result(self.lost()),
                Err(e) => return Err(PtyError::Wait(e)),
            }
        }
    }

    /// Whether the child has been reaped
    fn is_reaped(&self) -> bool {
        self.exit.get().is_some()
    }

    /// Record an exit status returned by waitpid. `None` while the child
    /// is only stopped or continued.
    fn reaped(&self, status: WaitStatus) -> Option<Exit> {
        let exit = match status {
            WaitStatus::Exited(_, code) => {
                debug!(pid = self.child_pid.as_raw(), code, "child exited");
                Exit::Code(code)
            }
            WaitStatus::Signaled(_, signal, _) => {
                debug!(pid = self.child_pid.as_raw(), %signal, "child killed");
                Exit::Signal(signal as i32)
            }
            _ => return None,
        };
        Some(*self.exit.get_or_init(|| exit))
    }

    /// waitpid found no child. Another thread sharing this `Pty` may have
    /// reaped it and be about to record the status, so give it a moment.
    fn lost(&self) -> Exit {
        for _ in 0..10 {
            if let Some(&exit) = self.exit.get() {
                return exit;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        *self.exit.get_or_init(|| Exit::Unknown)
    }

    /// Read from the PTY master, blocking until data is available.
    ///
    /// Returns 0 at end of stream. Linux reports a hung-up PTY as `EIO`,
    /// which is also end of stream.
    pub fn read(&self, buf: &mut [u8]) -> PtyResult<usize> {
        loop {
            match read(self.master.as_raw_fd(), buf) {
                Ok(n) => return Ok(n),
                Err(Errno::EINTR) => continue,
                Err(Errno::EIO) => return Ok(0),
                Err(e) => return Err(PtyError::Read(e)),
            }
        }
    }

    /// Write to the PTY master
    ///
    /// Returns the number of bytes written.
    pub fn write(&self, data: &[u8]) -> PtyResult<usize> {
        loop {
            match write(self.master.as_raw_fd(), data) {
                Ok(n) => return Ok(n),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(PtyError::Write(e)),
            }
        }
    }

    /// Write all data to the PTY master
    pub fn write_all(&self, mut data: &[u8]) -> PtyResult<()> {
        while !data.is_empty() {
            let n = self.write(data)?;
            if n == 0 {
                return Err(PtyError::WriteZero);
            }
            data = &data[n..];
        }
        Ok(())
    }

    /// Wait up to `timeout_ms` for the master to become readable.
    ///
    /// Hang-up and error conditions also count as readable: the next
    /// [`read`](Self::read) then reports end of stream.
    pub fn poll_read(&self, timeout_ms: i32) -> PtyResult<bool> {
        // SAFETY: The master fd is valid for the lifetime of this Pty
        let borrowed_fd = unsafe { BorrowedFd::borrow_raw(self.master.as_raw_fd()) };
        let mut fds = [PollFd::new(&borrowed_fd, PollFlags::POLLIN)];
        match poll(&mut fds, timeout_ms) {
            Ok(0) => Ok(false),
            Ok(_) => Ok(fds[0].revents().is_some_and(|r| {
                r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
            })),
            Err(Errno::EINTR) => Ok(false),
            Err(e) => Err(PtyError::Poll(e)),
        }
    }

    /// Resize the PTY; the kernel delivers SIGWINCH to the foreground
    /// process group
    pub fn resize(&self, size: WindowSize) -> PtyResult<()> {
        set_window_size(self.master.as_raw_fd(), size)
    }

    /// Current window size of the PTY
    pub fn window_size(&self) -> PtyResult<WindowSize> {
        get_window_size(self.master.as_raw_fd())
    }

    /// Send a signal to the child process. Does nothing once the child
    /// has been reaped, since its pid may belong to another process.
    pub fn signal(&self, signal: Signal) -> PtyResult<()> {
        if self.is_reaped() {
            return Ok(());
        }
        kill(self.child_pid, signal).map_err(PtyError::Signal)
    }
}

impl Drop for Pty {
    fn drop(&mut self) {
        if self.is_reaped() {
            return;
        }
        let _ = kill(self.child_pid, Signal::SIGHUP);

        // Wait briefly for it to exit
        for _ in 0..10 {
            if !self.is_alive() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        debug!(pid = self.child_pid.as_raw(), "child still running after SIGHUP");
    }
}

/// `$SHELL`, else `/bin/sh`
pub(crate) fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_SHELL.to_string())
}

fn exit_result(exit: Exit) -> PtyResult<i32> {
    match exit {
        Exit::Code(code) => Ok(code),
        Exit::Signal(signal) => Err(PtyError::ChildSignaled(signal)),
        Exit::Unknown => Err(PtyError::Wait(Errno::ECHILD)),
    }
}

/// Locate `program` the way `execvp` would. Names containing a slash are
/// used as given; unresolved names are left for exec to reject.
fn resolve_program(program: &str) -> PathBuf {
    if program.contains('/') {
        return PathBuf::from(program);
    }
    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths)
                .map(|dir| dir.join(program))
                .find(|candidate| is_executable(candidate))
        })
        .unwrap_or_else(|| PathBuf::from(program))
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// The parent's environment with `TERM` replaced
fn child_env() -> PtyResult<Vec<CString>> {
    let mut env = Vec::new();
    for (key, value) in std::env::vars_os() {
        if key == "TERM" {
            continue;
        }
        let mut entry = key.as_bytes().to_vec();
        entry.push(b'=');
        entry.extend_from_slice(value.as_bytes());
        env.push(CString::new(entry)?);
    }
    env.push(CString::new(format!("TERM={TERM}"))?);
    Ok(env)
}

/// Null-terminated pointer array for exec. Borrows from `items`.
fn exec_array(items: &[CString]) -> Vec<*const libc::c_char> {
    items
        .iter()
        .map(|item| item.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

/// Runs in the forked child: attach to the slave and exec. Never returns.
///
/// Only async-signal-safe calls on memory prepared before fork.
fn exec_child(
    slave_name: &CStr,
    path: &CStr,
    argv: &[*const libc::c_char],
    envp: &[*const libc::c_char],
) -> ! {
    if setsid().is_err() {
        child_exit(1);
    }

    let slave_fd = match open(slave_name, OFlag::O_RDWR, Mode::empty()) {
        Ok(fd) => fd,
        Err(_) => child_exit(1),
    };

    // SAFETY: TIOCSCTTY is a valid ioctl for setting controlling terminal.
    // Some systems do not need it, so failure is not fatal.
    unsafe {
        libc::ioctl(slave_fd, libc::TIOCSCTTY as _, 0);
    }

    for target in [STDIN_FILENO, STDOUT_FILENO, STDERR_FILENO] {
        if dup2(slave_fd, target).is_err() {
            child_exit(1);
        }
    }
    if slave_fd > STDERR_FILENO {
        let _ = close(slave_fd);
    }

    // SAFETY: both arrays are null-terminated and point into CStrings
    // that outlive this call
    unsafe {
        libc::execve(path.as_ptr(), argv.as_ptr(), envp.as_ptr());
    }
    child_exit(127)
}

fn child_exit(code: i32) -> ! {
    // SAFETY: _exit skips atexit handlers and stdio flushing, which belong
    // to the parent
    unsafe { libc::_exit(code) }
}

/// Set the window size on a PTY file descriptor
fn set_window_size(fd: RawFd, size: WindowSize) -> PtyResult<()> {
    let winsize = libc::winsize {
        ws_row: size.rows,
        ws_col: size.cols,
        ws_xpixel: size.pixel_width,
        ws_ypixel: size.pixel_height,
    };

    // SAFETY: TIOCSWINSZ is a valid ioctl for setting window size
    let result = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &winsize) };

    if result < 0 {
        Err(PtyError::SetWinsize(Errno::last()))
    } else {
        Ok(())
    }
}

/// Get the window size from a PTY file descriptor
fn get_window_size(fd: RawFd) -> PtyResult<WindowSize> {
    let mut winsize = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    // SAFETY: TIOCGWINSZ is a valid ioctl for getting window size
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut winsize) };

    if result < 0 {
        Err(PtyError::GetWinsize(Errno::last()))
    } else {
        Ok(WindowSize {
            rows: winsize.ws_row,
            cols: winsize.ws_col,
            pixel_width: winsize.ws_xpixel,
            pixel_height: winsize.ws_ypixel,
        })
    }
}
