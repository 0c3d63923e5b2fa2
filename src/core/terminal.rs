//! Terminal mode control
//!
//! [`TerminalSession`] owns the terminal's operating mode for the lifetime of
//! a program run: raw input, hidden cursor, alternate screen and mouse
//! reporting. Every mode change registers its undo action; releasing the
//! session (explicitly or on drop) runs those actions in reverse order and
//! restores the saved terminal attributes last.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossterm::cursor::{Hide, Show};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::QueueableCommand;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Enable mouse click tracking + SGR extended reports.
pub const ENABLE_MOUSE: &str = "\x1b[?1000h\x1b[?1006h";
/// Undo [`ENABLE_MOUSE`].
pub const DISABLE_MOUSE: &str = "\x1b[?1006l\x1b[?1000l";
/// Move home and clear the screen.
pub const CLEAR_HOME: &str = "\x1b[H\x1b[2J";

/// Shareable terminal size query, usable from producer threads.
pub type SizeFn = Arc<dyn Fn() -> io::Result<(u16, u16)> + Send + Sync>;

/// The device a [`TerminalSession`] drives.
pub trait Backend: Write {
    /// Saved terminal attributes returned by [`Backend::enable_raw_mode`].
    type Saved;

    /// Whether only one session over this backend may be live per process.
    const PROCESS_WIDE: bool = false;

    /// Switch to raw, unechoed byte input and return the previous state.
    fn enable_raw_mode(&mut self) -> io::Result<Self::Saved>;

    /// Put back the state saved by [`Backend::enable_raw_mode`].
    fn restore_mode(&mut self, saved: Self::Saved) -> io::Result<()>;

    /// A size query that can be moved to another thread.
    fn size_fn(&self) -> SizeFn;
}

/// Undo action registered by an enable call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Teardown {
    ShowCursor,
    LeaveAltScreen,
    DisableMouse,
}

impl Teardown {
    fn run<W: Write + ?Sized>(self, out: &mut W) -> io::Result<()> {
        match self {
            Teardown::ShowCursor => {
                out.queue(Show)?;
            }
            Teardown::LeaveAltScreen => {
                out.queue(LeaveAlternateScreen)?;
            }
            Teardown::DisableMouse => out.write_all(DISABLE_MOUSE.as_bytes())?,
        }
        Ok(())
    }
}

static PROCESS_SESSION_LIVE: AtomicBool = AtomicBool::new(false);

/// Scoped ownership of the terminal's mode.
pub struct TerminalSession<B: Backend> {
    backend: B,
    saved: Option<B::Saved>,
    teardown: Vec<Teardown>,
    released: bool,
}

impl<B: Backend> TerminalSession<B> {
    /// Enter raw mode.
    ///
    /// Nothing is written to the backend if this fails.
    pub fn acquire(mut backend: B) -> Result<Self> {
        if B::PROCESS_WIDE && PROCESS_SESSION_LIVE.swap(true, Ordering::SeqCst) {
            return Err(Error::SessionActive);
        }
        let saved = match backend.enable_raw_mode() {
            Ok(saved) => saved,
            Err(e) => {
                if B::PROCESS_WIDE {
                    PROCESS_SESSION_LIVE.store(false, Ordering::SeqCst);
                }
                return Err(Error::TerminalMode(e));
            }
        };
        info!("Terminal session acquired");
        Ok(Self {
            backend,
            saved: Some(saved),
            teardown: Vec::new(),
            released: false,
        })
    }

    /// Hide the cursor until release.
    pub fn hide_cursor(&mut self) -> io::Result<()> {
        self.backend.queue(Hide)?;
        self.register(Teardown::ShowCursor)
    }

    /// Switch to the alternate screen buffer until release.
    pub fn enter_alt_screen(&mut self) -> io::Result<()> {
        self.backend.queue(EnterAlternateScreen)?;
        self.register(Teardown::LeaveAltScreen)
    }

    /// Turn on mouse click reporting in SGR format until release.
    pub fn enable_mouse_reporting(&mut self) -> io::Result<()> {
        self.backend.write_all(ENABLE_MOUSE.as_bytes())?;
        self.register(Teardown::DisableMouse)
    }

    fn register(&mut self, action: Teardown) -> io::Result<()> {
        self.teardown.push(action);
        self.backend.flush()
    }

    /// Registered teardown actions, oldest first.
    pub fn pending_teardown(&self) -> &[Teardown] {
        &self.teardown
    }

    /// Output side of the terminal.
    pub fn writer(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn size_fn(&self) -> SizeFn {
        self.backend.size_fn()
    }

    /// Undo every registered mode change in reverse order, then restore the
    /// saved attributes. Runs at most once; later calls are no-ops.
    ///
    /// All actions are attempted even if one fails; the first error is
    /// returned.
    pub fn release(&mut self) -> io::Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut first_error = None;
        while let Some(action) = self.teardown.pop() {
            debug!("Teardown: {:?}", action);
            if let Err(e) = action.run(&mut self.backend) {
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.backend.flush() {
            first_error.get_or_insert(e);
        }
        if let Some(saved) = self.saved.take() {
            if let Err(e) = self.backend.restore_mode(saved) {
                first_error.get_or_insert(e);
            }
        }
        if B::PROCESS_WIDE {
            PROCESS_SESSION_LIVE.store(false, Ordering::SeqCst);
        }
        info!("Terminal session released");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<B: Backend> Drop for TerminalSession<B> {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// The process's controlling terminal: termios on stdin, output to stdout.
pub struct StdioBackend {
    stdout: io::Stdout,
    input_fd: std::os::fd::RawFd,
}

impl StdioBackend {
    pub fn new() -> Self {
        use std::os::fd::AsRawFd;
        Self {
            stdout: io::stdout(),
            input_fd: io::stdin().as_raw_fd(),
        }
    }
}

impl Default for StdioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for StdioBackend {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdout.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }
}

impl Backend for StdioBackend {
    type Saved = libc::termios;

    const PROCESS_WIDE: bool = true;

    fn enable_raw_mode(&mut self) -> io::Result<Self::Saved> {
        let saved = super::sys::get_termios(self.input_fd)?;
        super::sys::set_termios(self.input_fd, &super::sys::make_raw(saved))?;
        Ok(saved)
    }

    fn restore_mode(&mut self, saved: Self::Saved) -> io::Result<()> {
        super::sys::set_termios(self.input_fd, &saved)
    }

    fn size_fn(&self) -> SizeFn {
        Arc::new(crossterm::terminal::size)
    }
}

/// In-memory backend recording everything written to it.
#[cfg(test)]
#[derive(Clone)]
pub(crate) struct MemoryBackend {
    pub output: Arc<std::sync::Mutex<Vec<u8>>>,
    pub restored: Arc<std::sync::atomic::AtomicUsize>,
    pub size: (u16, u16),
    pub fail_raw_mode: bool,
}

#[cfg(test)]
impl MemoryBackend {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            output: Arc::default(),
            restored: Arc::default(),
            size: (width, height),
            fail_raw_mode: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_raw_mode: true,
            ..Self::new(80, 24)
        }
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.output.lock().unwrap()).into_owned()
    }

    pub fn restore_count(&self) -> usize {
        self.restored.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Write for MemoryBackend {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl Backend for MemoryBackend {
    type Saved = ();

    fn enable_raw_mode(&mut self) -> io::Result<()> {
        if self.fail_raw_mode {
            return Err(io::Error::from_raw_os_error(libc::ENOTTY));
        }
        Ok(())
    }

    fn restore_mode(&mut self, _saved: ()) -> io::Result<()> {
        self.restored.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn size_fn(&self) -> SizeFn {
        let size = self.size;
        Arc::new(move || Ok(size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_failure_writes_nothing() {
        let backend = MemoryBackend::failing();
        let result = TerminalSession::acquire(backend.clone());
        assert!(matches!(result, Err(Error::TerminalMode(_))));
        assert_eq!(backend.written(), "");
        assert_eq!(backend.restore_count(), 0);
    }

    #[test]
    fn test_enable_calls_emit_sequences() {
        let backend = MemoryBackend::new(80, 24);
        let mut session = TerminalSession::acquire(backend.clone()).unwrap();
        session.hide_cursor().unwrap();
        session.enter_alt_screen().unwrap();
        session.enable_mouse_reporting().unwrap();

        assert_eq!(backend.written(), "\x1b[?25l\x1b[?1049h\x1b[?1000h\x1b[?1006h");
        assert_eq!(
            session.pending_teardown(),
            &[Teardown::ShowCursor, Teardown::LeaveAltScreen, Teardown::DisableMouse]
        );
    }

    #[test]
    fn test_release_runs_in_reverse_order_once() {
        let backend = MemoryBackend::new(80, 24);
        let mut session = TerminalSession::acquire(backend.clone()).unwrap();
        session.hide_cursor().unwrap();
        session.enter_alt_screen().unwrap();
        session.enable_mouse_reporting().unwrap();
        backend.output.lock().unwrap().clear();

        session.release().unwrap();
        session.release().unwrap();
        drop(session);

        assert_eq!(backend.written(), "\x1b[?1006l\x1b[?1000l\x1b[?1049l\x1b[?25h");
        assert_eq!(backend.restore_count(), 1);
    }

    #[test]
    fn test_drop_releases_only_registered_actions() {
        let backend = MemoryBackend::new(80, 24);
        {
            let mut session = TerminalSession::acquire(backend.clone()).unwrap();
            session.enter_alt_screen().unwrap();
        }
        let written = backend.written();
        assert_eq!(written, "\x1b[?1049h\x1b[?1049l");
        assert!(!written.contains("?1000"));
        assert!(!written.contains("?25h"));
        assert_eq!(backend.restore_count(), 1);
    }

    #[test]
    fn test_size_fn_reports_backend_size() {
        let session = TerminalSession::acquire(MemoryBackend::new(120, 40)).unwrap();
        let size = session.size_fn();
        assert_eq!(size().unwrap(), (120, 40));
    }
}
