//! Event producers feeding the program's channel.
//!
//! Three threads run for the lifetime of a program:
//!
//! - the **input reader** waits for bytes on the input descriptor, decodes
//!   each chunk and sends the resulting events;
//! - the **resize watcher** waits for `SIGWINCH` and sends the new size;
//! - the **interrupt watcher** turns `SIGINT`/`SIGTERM`/`SIGHUP` into a
//!   message so the program can restore the terminal before exiting.
//!
//! Both wait with `poll` on their source *and* the shutdown pipe, so firing
//! the [`ShutdownTrigger`] wakes them no matter where they are blocked. A
//! producer stuck in `send` on a full channel is released when the consumer
//! drops the receiver.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use super::event::Event;
use super::input::InputDecoder;
use super::sys::{self, Wake};
use super::terminal::SizeFn;
use crate::error::Error;

/// Size of a single input read.
const READ_CHUNK: usize = 1024;

/// What producers put on the channel.
#[derive(Debug)]
pub enum Message {
    Event(Event),
    /// The input reader stopped because its stream failed or closed.
    InputFailed(io::Error),
    /// A terminating signal arrived.
    Interrupted(libc::c_int),
}

/// Closes the shutdown pipe; consumed by [`ShutdownTrigger::fire`] so it can
/// only happen once. Dropping the trigger fires it as well.
pub struct ShutdownTrigger {
    write_end: OwnedFd,
}

impl ShutdownTrigger {
    pub fn fire(self) {
        debug!("Shutdown fired (fd {})", self.write_end.as_raw_fd());
        drop(self.write_end);
    }
}

/// Read end of the shutdown pipe, readable (hung up) once the trigger fired.
#[derive(Clone)]
pub struct ShutdownSignal {
    read_end: Arc<OwnedFd>,
}

impl AsFd for ShutdownSignal {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.read_end.as_fd()
    }
}

/// Create the shared teardown signal.
pub fn shutdown_channel() -> io::Result<(ShutdownTrigger, ShutdownSignal)> {
    let (read_end, write_end) = sys::pipe()?;
    Ok((
        ShutdownTrigger { write_end },
        ShutdownSignal { read_end: Arc::new(read_end) },
    ))
}

/// Start the input reader thread.
///
/// The reader ends by sending [`Message::InputFailed`] when `input` reports
/// an error or end of file, or silently when shutdown fires or the receiver
/// is gone.
pub fn spawn_input_reader<R>(
    mut input: R,
    tx: SyncSender<Message>,
    shutdown: ShutdownSignal,
) -> io::Result<JoinHandle<()>>
where
    R: Read + AsFd + Send + 'static,
{
    thread::Builder::new()
        .name("hiho-input".to_string())
        .spawn(move || {
            let mut decoder = InputDecoder::new();
            let mut buffer = [0u8; READ_CHUNK];

            loop {
                match sys::wait_readable(input.as_fd(), shutdown.as_fd()) {
                    Ok(Wake::Source) => {}
                    Ok(Wake::Shutdown) => break,
                    Err(e) => {
                        let _ = tx.send(Message::InputFailed(e));
                        break;
                    }
                }

                let n = match input.read(&mut buffer) {
                    Ok(0) => {
                        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "input stream closed");
                        let _ = tx.send(Message::InputFailed(eof));
                        break;
                    }
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.send(Message::InputFailed(e));
                        break;
                    }
                };

                for event in decoder.decode(&buffer[..n]) {
                    if tx.send(Message::Event(event)).is_err() {
                        debug!("Input reader: receiver gone");
                        return;
                    }
                }
            }
            debug!("Input reader stopped");
        })
}

/// Write end of the active `SIGWINCH` pipe, or -1.
static WINCH_PIPE: AtomicI32 = AtomicI32::new(-1);

/// Write end of the active interrupt pipe, or -1.
static INTERRUPT_PIPE: AtomicI32 = AtomicI32::new(-1);

/// Signals that end a program. Raw mode turns off the keyboard-generated
/// ones, so these only arrive from outside (`kill`, a closed terminal).
const INTERRUPT_SIGNALS: [libc::c_int; 3] = [libc::SIGINT, libc::SIGTERM, libc::SIGHUP];

fn forward(slot: &AtomicI32, signal: libc::c_int) {
    let fd = slot.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = signal as u8;
        // SAFETY: write(2) is async-signal-safe; the pipe is non-blocking so
        // a full pipe just drops the wake-up.
        unsafe {
            libc::write(fd, &byte as *const u8 as *const libc::c_void, 1);
        }
    }
}

extern "C" fn on_winch(signal: libc::c_int) {
    forward(&WINCH_PIPE, signal);
}

extern "C" fn on_interrupt(signal: libc::c_int) {
    forward(&INTERRUPT_PIPE, signal);
}

/// Signal handlers forwarding each delivered signal number into a pipe.
///
/// One pipe per slot can be installed at a time; dropping it restores the
/// previous handlers.
struct SignalPipe {
    read_end: File,
    _write_end: OwnedFd,
    slot: &'static AtomicI32,
    previous: Vec<(libc::c_int, libc::sigaction)>,
}

impl SignalPipe {
    fn install(
        slot: &'static AtomicI32,
        handler: extern "C" fn(libc::c_int),
        signals: &[libc::c_int],
    ) -> Result<Self, Error> {
        let (read_end, write_end) = sys::pipe().map_err(Error::SignalWatch)?;
        sys::set_nonblocking(write_end.as_raw_fd()).map_err(Error::SignalWatch)?;

        if slot
            .compare_exchange(-1, write_end.as_raw_fd(), Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::SignalWatch(io::Error::new(
                io::ErrorKind::AddrInUse,
                "signal watcher already installed",
            )));
        }

        let mut pipe = Self {
            read_end: File::from(read_end),
            _write_end: write_end,
            slot,
            previous: Vec::with_capacity(signals.len()),
        };
        for &signal in signals {
            // SAFETY: sigaction structs are plain data; the handler only
            // touches an atomic and write(2). On failure, dropping `pipe`
            // restores whatever was already replaced.
            let previous = unsafe {
                let mut action: libc::sigaction = std::mem::zeroed();
                action.sa_sigaction = handler as libc::sighandler_t;
                action.sa_flags = libc::SA_RESTART;
                libc::sigemptyset(&mut action.sa_mask);

                let mut previous: libc::sigaction = std::mem::zeroed();
                if libc::sigaction(signal, &action, &mut previous) != 0 {
                    return Err(Error::SignalWatch(io::Error::last_os_error()));
                }
                previous
            };
            pipe.previous.push((signal, previous));
        }
        Ok(pipe)
    }

    /// Consume pending wake-ups and return the first signal among them.
    /// Several signals collapse into one.
    fn drain(&mut self) -> io::Result<Option<libc::c_int>> {
        let mut buffer = [0u8; 64];
        match self.read_end.read(&mut buffer) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(libc::c_int::from(buffer[0]))),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for SignalPipe {
    fn drop(&mut self) {
        for (signal, previous) in self.previous.iter().rev() {
            // SAFETY: restoring the action saved at install time.
            unsafe {
                libc::sigaction(*signal, previous, std::ptr::null_mut());
            }
        }
        self.slot.store(-1, Ordering::SeqCst);
    }
}

/// Run `on_signal` for every signal arriving on `pipe` until shutdown fires
/// or `on_signal` returns false.
fn spawn_signal_watcher<F>(
    name: &str,
    mut pipe: SignalPipe,
    shutdown: ShutdownSignal,
    mut on_signal: F,
) -> Option<JoinHandle<()>>
where
    F: FnMut(libc::c_int) -> bool + Send + 'static,
{
    let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
        loop {
            match sys::wait_readable(pipe.read_end.as_fd(), shutdown.as_fd()) {
                Ok(Wake::Source) => {}
                Ok(Wake::Shutdown) => break,
                Err(e) => {
                    warn!("Signal watcher stopped: {}", e);
                    break;
                }
            }
            match pipe.drain() {
                Ok(Some(signal)) => {
                    if !on_signal(signal) {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Signal watcher stopped: {}", e);
                    break;
                }
            }
        }
        debug!("Signal watcher stopped");
    });

    match spawned {
        Ok(handle) => {
            info!("{} started", name);
            Some(handle)
        }
        Err(e) => {
            warn!("Failed to start {}: {}", name, e);
            None
        }
    }
}

/// Start the resize watcher thread.
///
/// Returns `None` when the signal handler cannot be installed; the program
/// then simply never sees resize events.
pub fn spawn_resize_watcher(
    size: SizeFn,
    tx: SyncSender<Message>,
    shutdown: ShutdownSignal,
) -> Option<JoinHandle<()>> {
    let pipe = match SignalPipe::install(&WINCH_PIPE, on_winch, &[libc::SIGWINCH]) {
        Ok(pipe) => pipe,
        Err(e) => {
            warn!("Resize events disabled: {}", e);
            return None;
        }
    };

    spawn_signal_watcher("hiho-resize", pipe, shutdown, move |_| match size() {
        Ok((width, height)) => {
            debug!("Resize: {}x{}", width, height);
            tx.send(Message::Event(Event::resize(width, height))).is_ok()
        }
        Err(e) => {
            warn!("Failed to query terminal size: {}", e);
            true
        }
    })
}

/// Start the interrupt watcher thread.
///
/// `SIGINT`, `SIGTERM` and `SIGHUP` become [`Message::Interrupted`] instead
/// of killing the process, so the program unwinds and restores the terminal.
/// Returns `None` when the handlers cannot be installed.
pub fn spawn_interrupt_watcher(
    tx: SyncSender<Message>,
    shutdown: ShutdownSignal,
) -> Option<JoinHandle<()>> {
    let pipe = match SignalPipe::install(&INTERRUPT_PIPE, on_interrupt, &INTERRUPT_SIGNALS) {
        Ok(pipe) => pipe,
        Err(e) => {
            warn!("Interrupt handling disabled: {}", e);
            return None;
        }
    };

    spawn_signal_watcher("hiho-interrupt", pipe, shutdown, move |signal| {
        info!("Received signal {}", signal);
        tx.send(Message::Interrupted(signal)).is_ok()
    })
}

/// Serializes tests that install process-wide signal handlers.
#[cfg(test)]
pub(crate) fn signal_test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
