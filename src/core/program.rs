//! The event loop
//!
//! A [`Program`] owns an application [`Model`] and drives it:
//!
//! ```text
//! resize watcher    ─┐
//! interrupt watcher ─┼─► bounded channel ─► consumer: update → view → draw
//! input reader      ─┘
//! ```
//!
//! The consumer (the thread that called [`Program::run`]) is the only code
//! that ever touches the model. It blocks only on channel receive.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use super::event::Event;
use super::producer::{self, Message, ShutdownTrigger};
use super::terminal::{Backend, SizeFn, StdioBackend, TerminalSession, CLEAR_HOME};
use crate::error::{Error, Result};

/// Capacity of the producer → consumer channel.
const CHANNEL_CAPACITY: usize = 64;

/// Upper bound on events a chain of commands may feed back into `update`
/// before the loop goes back to waiting for input.
const MAX_FEEDBACK: usize = 64;

/// Size assumed when the terminal can't be queried.
const FALLBACK_SIZE: (u16, u16) = (80, 24);

/// Result of running a [`Cmd`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Stop the program.
    Quit,
    /// Deliver this event to `update` right away.
    Event(Event),
}

/// A deferred action, executed by the event loop after `init`/`update`.
pub struct Cmd(Box<dyn FnOnce() -> Option<Msg> + Send>);

impl Cmd {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> Option<Msg> + Send + 'static,
    {
        Cmd(Box::new(f))
    }

    /// Command yielding the quit sentinel.
    pub fn quit() -> Self {
        Cmd::new(|| Some(Msg::Quit))
    }

    /// Command delivering `event` back to the model.
    pub fn event(event: Event) -> Self {
        Cmd::new(move || Some(Msg::Event(event)))
    }

    /// Run every command in order; the result is the last non-empty message.
    pub fn batch<I>(cmds: I) -> Option<Cmd>
    where
        I: IntoIterator<Item = Option<Cmd>>,
    {
        let cmds: Vec<Cmd> = cmds.into_iter().flatten().collect();
        if cmds.is_empty() {
            return None;
        }
        Some(Cmd::new(move || cmds.into_iter().fold(None, |last, cmd| cmd.run().or(last))))
    }

    pub fn run(self) -> Option<Msg> {
        (self.0)()
    }
}

impl std::fmt::Debug for Cmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Cmd(..)")
    }
}

/// An application driven by a [`Program`].
pub trait Model: Sized {
    /// Called once before the first event.
    fn init(&self) -> Option<Cmd> {
        None
    }

    /// Handle one event, returning the next state.
    fn update(self, event: Event) -> (Self, Option<Cmd>);

    /// Render the current state.
    fn view(&self) -> String;
}

/// Program options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Use the alternate screen buffer for the session.
    pub alt_screen: bool,
    /// Report mouse clicks and motion.
    pub mouse_cell_motion: bool,
}

/// Runs a [`Model`] against the terminal.
pub struct Program<M> {
    model: M,
    options: Options,
}

impl<M: Model> Program<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn with_alt_screen(mut self) -> Self {
        self.options.alt_screen = true;
        self
    }

    pub fn with_mouse_cell_motion(mut self) -> Self {
        self.options.mouse_cell_motion = true;
        self
    }

    /// Run on the process's terminal until the model quits.
    ///
    /// Returns the final model together with the reason the run ended.
    pub fn run(self) -> (M, Result<()>) {
        match io::stdin().as_fd().try_clone_to_owned() {
            Ok(input) => self.run_with(StdioBackend::new(), File::from(input)),
            Err(e) => (self.model, Err(Error::TerminalMode(e))),
        }
    }

    /// Run against an explicit backend and input stream.
    ///
    /// The model is handed back whatever happened. On any error the terminal
    /// has been restored before this returns.
    pub fn run_with<B, R>(self, backend: B, input: R) -> (M, Result<()>)
    where
        B: Backend,
        R: Read + AsFd + Send + 'static,
    {
        let Program { model, options } = self;

        let mut session = match TerminalSession::acquire(backend) {
            Ok(session) => session,
            Err(e) => return (model, Err(e)),
        };
        if let Err(e) = enable_modes(&mut session, options) {
            return (model, Err(Error::Output(e)));
        }

        let size = session.size_fn();
        let (width, height) = size().unwrap_or_else(|e| {
            warn!("Failed to query terminal size: {}", e);
            FALLBACK_SIZE
        });
        info!("Program starting at {}x{}", width, height);

        let (tx, rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
        // The initial size is always the first event the model sees
        let _ = tx.send(Message::Event(Event::resize(width, height)));

        let (trigger, producers) = match start_producers(size, tx, input) {
            Ok(started) => started,
            Err(e) => return (model, Err(Error::Input(e))),
        };

        let (model, result) = event_loop(model, session.writer(), &rx);

        trigger.fire();
        drop(rx);
        for handle in producers {
            if handle.join().is_err() {
                warn!("Producer thread panicked");
            }
        }
        if let Err(e) = session.release() {
            warn!("Failed to restore terminal: {}", e);
        }

        match &result {
            Ok(()) => info!("Program finished"),
            Err(e) => info!("Program stopped: {}", e),
        }
        (model, result)
    }
}

fn enable_modes<B: Backend>(session: &mut TerminalSession<B>, options: Options) -> io::Result<()> {
    session.hide_cursor()?;
    if options.alt_screen {
        session.enter_alt_screen()?;
    }
    if options.mouse_cell_motion {
        session.enable_mouse_reporting()?;
    }
    Ok(())
}

/// Spawn the signal watchers and the input reader. On failure the trigger
/// is dropped, which stops whatever was started.
fn start_producers<R>(
    size: SizeFn,
    tx: SyncSender<Message>,
    input: R,
) -> io::Result<(ShutdownTrigger, Vec<JoinHandle<()>>)>
where
    R: Read + AsFd + Send + 'static,
{
    let (trigger, signal) = producer::shutdown_channel()?;
    let mut producers = Vec::with_capacity(3);
    producers.extend(producer::spawn_resize_watcher(size, tx.clone(), signal.clone()));
    producers.extend(producer::spawn_interrupt_watcher(tx.clone(), signal.clone()));
    producers.push(producer::spawn_input_reader(input, tx, signal)?);
    Ok((trigger, producers))
}

enum Step<M> {
    Continue(M),
    Quit(M),
}

/// Execute `cmd` and any events it feeds back into the model.
fn apply<M: Model>(mut model: M, mut cmd: Option<Cmd>) -> Step<M> {
    let mut budget = MAX_FEEDBACK;
    while let Some(next) = cmd.take() {
        match next.run() {
            Some(Msg::Quit) => return Step::Quit(model),
            Some(Msg::Event(event)) => {
                if budget == 0 {
                    warn!("Dropping fed-back event {:?}: feedback limit reached", event);
                    break;
                }
                budget -= 1;
                let (updated, follow_up) = model.update(event);
                model = updated;
                cmd = follow_up;
            }
            None => {}
        }
    }
    Step::Continue(model)
}

/// Write one frame: clear + home, then the view with raw-mode line endings.
fn draw<W: Write + ?Sized>(out: &mut W, view: &str) -> io::Result<()> {
    let mut frame = String::with_capacity(CLEAR_HOME.len() + view.len() + 32);
    frame.push_str(CLEAR_HOME);
    for (i, line) in view.split('\n').enumerate() {
        if i > 0 {
            frame.push_str("\r\n");
        }
        frame.push_str(line);
    }
    out.write_all(frame.as_bytes())?;
    out.flush()
}

fn event_loop<M, W>(model: M, out: &mut W, rx: &Receiver<Message>) -> (M, Result<()>)
where
    M: Model,
    W: Write + ?Sized,
{
    let init = model.init();
    let mut model = match apply(model, init) {
        Step::Continue(model) => model,
        Step::Quit(model) => return (model, Ok(())),
    };

    loop {
        if let Err(e) = draw(out, &model.view()) {
            return (model, Err(Error::Output(e)));
        }

        let event = match rx.recv() {
            Ok(Message::Event(event)) => event,
            Ok(Message::InputFailed(e)) => return (model, Err(Error::Input(e))),
            Ok(Message::Interrupted(signal)) => return (model, Err(Error::Interrupted(signal))),
            Err(_) => {
                let stopped = io::Error::new(io::ErrorKind::BrokenPipe, "all event producers stopped");
                return (model, Err(Error::Input(stopped)));
            }
        };
        debug!("Event: {:?}", event);

        let (updated, cmd) = model.update(event);
        model = match apply(updated, cmd) {
            Step::Continue(model) => model,
            Step::Quit(model) => return (model, Ok(())),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::producer::signal_test_lock;
    use crate::core::sys;
    use crate::core::terminal::MemoryBackend;

    /// Records every event; quits on "q".
    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        init_cmd: Option<fn() -> Option<Msg>>,
    }

    impl Model for Recorder {
        fn init(&self) -> Option<Cmd> {
            self.init_cmd.map(Cmd::new)
        }

        fn update(mut self, event: Event) -> (Self, Option<Cmd>) {
            let quit = event.key_code() == Some("q");
            let echo = event.key_code() == Some("e");
            self.events.push(event);
            let cmd = if quit {
                Some(Cmd::quit())
            } else if echo {
                Some(Cmd::event(Event::key("echoed")))
            } else {
                None
            };
            (self, cmd)
        }

        fn view(&self) -> String {
            format!("events: {}\nlast line", self.events.len())
        }
    }

    fn pipe_files() -> (File, File) {
        let (read, write) = sys::pipe().unwrap();
        (File::from(read), File::from(write))
    }

    const TEARDOWN: [&str; 4] = ["\x1b[?1006l", "\x1b[?1000l", "\x1b[?1049l", "\x1b[?25h"];

    fn assert_teardown_once(written: &str) {
        for code in TEARDOWN {
            assert_eq!(written.matches(code).count(), 1, "teardown {:?} in {:?}", code, written);
        }
        let tail = TEARDOWN.concat();
        assert!(written.ends_with(&tail), "teardown not last in {:?}", written);
    }

    #[test]
    fn test_quit_event_ends_loop_and_restores_terminal() {
        let _lock = signal_test_lock();
        let backend = MemoryBackend::new(100, 30);
        let (read, mut write) = pipe_files();
        write.write_all(b"eq").unwrap();

        let (model, result) = Program::new(Recorder::default())
            .with_alt_screen()
            .with_mouse_cell_motion()
            .run_with(backend.clone(), read);
        result.unwrap();

        assert_eq!(
            model.events,
            vec![Event::resize(100, 30), Event::key("e"), Event::key("echoed"), Event::key("q")]
        );

        let written = backend.written();
        assert!(written.starts_with("\x1b[?25l\x1b[?1049h\x1b[?1000h\x1b[?1006h"));
        assert!(written.contains("\x1b[H\x1b[2Jevents: 0\r\nlast line"));
        assert_teardown_once(&written);
        assert_eq!(backend.restore_count(), 1);
    }

    #[test]
    fn test_closed_input_returns_error_after_teardown() {
        let _lock = signal_test_lock();
        let backend = MemoryBackend::new(80, 24);
        let (read, write) = pipe_files();
        drop(write);

        let (model, result) = Program::new(Recorder::default())
            .with_alt_screen()
            .with_mouse_cell_motion()
            .run_with(backend.clone(), read);

        match result {
            Err(Error::Input(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected input error, got {:?}", other),
        }
        // The model that saw the initial size comes back with the error
        assert_eq!(model.events, vec![Event::resize(80, 24)]);
        assert_teardown_once(&backend.written());
        assert_eq!(backend.restore_count(), 1);
    }

    #[test]
    fn test_terminal_mode_error_emits_nothing() {
        let backend = MemoryBackend::failing();
        let (read, _write) = pipe_files();

        let (model, result) = Program::new(Recorder::default())
            .with_alt_screen()
            .with_mouse_cell_motion()
            .run_with(backend.clone(), read);

        assert!(matches!(result, Err(Error::TerminalMode(_))));
        assert!(model.events.is_empty());
        assert_eq!(backend.written(), "");
        assert_eq!(backend.restore_count(), 0);
    }

    #[test]
    fn test_only_enabled_modes_are_torn_down() {
        let _lock = signal_test_lock();
        let backend = MemoryBackend::new(80, 24);
        let (read, mut write) = pipe_files();
        write.write_all(b"q").unwrap();

        let (_, result) = Program::new(Recorder::default()).run_with(backend.clone(), read);
        result.unwrap();

        let written = backend.written();
        assert!(written.ends_with("\x1b[?25h"));
        assert!(!written.contains("?1049"));
        assert!(!written.contains("?1000"));
    }

    #[test]
    fn test_init_quit_skips_rendering() {
        let _lock = signal_test_lock();
        let backend = MemoryBackend::new(80, 24);
        let (read, _write) = pipe_files();
        let model = Recorder {
            init_cmd: Some(|| Some(Msg::Quit)),
            ..Recorder::default()
        };

        let (model, result) = Program::new(model).run_with(backend.clone(), read);
        result.unwrap();
        assert!(model.events.is_empty());
        assert!(!backend.written().contains("\x1b[2J"));
    }

    /// Sends itself `SIGTERM` once the loop is running.
    struct SelfTerminating {
        events: usize,
    }

    impl Model for SelfTerminating {
        fn update(self, event: Event) -> (Self, Option<Cmd>) {
            if matches!(event, Event::Resize(_)) {
                // SAFETY: the program has a handler installed for SIGTERM.
                unsafe {
                    libc::raise(libc::SIGTERM);
                }
            }
            (SelfTerminating { events: self.events + 1 }, None)
        }

        fn view(&self) -> String {
            "waiting".to_string()
        }
    }

    #[test]
    fn test_termination_signal_restores_terminal() {
        let _lock = signal_test_lock();
        let backend = MemoryBackend::new(80, 24);
        let (read, _write) = pipe_files();

        let (model, result) = Program::new(SelfTerminating { events: 0 })
            .with_alt_screen()
            .with_mouse_cell_motion()
            .run_with(backend.clone(), read);

        match result {
            Err(Error::Interrupted(signal)) => assert_eq!(signal, libc::SIGTERM),
            other => panic!("expected interruption, got {:?}", other),
        }
        assert_eq!(model.events, 1);
        assert_teardown_once(&backend.written());
        assert_eq!(backend.restore_count(), 1);
    }

    #[test]
    fn test_batch_yields_last_message() {
        let cmd = Cmd::batch(vec![
            Some(Cmd::event(Event::key("a"))),
            None,
            Some(Cmd::new(|| None)),
            Some(Cmd::event(Event::key("b"))),
        ])
        .unwrap();
        assert_eq!(cmd.run(), Some(Msg::Event(Event::key("b"))));
        assert!(Cmd::batch(vec![None, None]).is_none());
    }

    #[test]
    fn test_draw_translates_newlines() {
        let mut out = Vec::new();
        draw(&mut out, "a\nb").unwrap();
        assert_eq!(out, b"\x1b[H\x1b[2Ja\r\nb");
    }
}
