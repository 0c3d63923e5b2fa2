//! Terminal runtime
//!
//! This module contains everything between the raw terminal and an
//! application model:
//!
//! - **event**: key, mouse and resize events delivered to models
//! - **input**: byte-stream decoder turning terminal input into events
//! - **terminal**: scoped terminal mode control with guaranteed teardown
//! - **producer**: input reader, resize and interrupt watcher threads
//! - **program**: the Model/Cmd event loop
//!
//! # Architecture
//!
//! ```text
//! Program
//! ├── TerminalSession (raw mode, cursor, alt screen, mouse)
//! ├── input reader ─────┐
//! ├── resize watcher ───┤
//! ├── interrupt watcher ┴─► channel ─► Model::update → Model::view → draw
//! └── ShutdownTrigger (wakes producers on exit)
//! ```

pub mod event;
pub mod input;
pub mod producer;
pub mod program;
pub mod sys;
pub mod terminal;

pub use event::{Event, KeyEvent, MouseEvent, MouseKind, ResizeEvent};
pub use input::InputDecoder;
pub use program::{Cmd, Model, Msg, Options, Program};
pub use terminal::{Backend, StdioBackend, TerminalSession};
