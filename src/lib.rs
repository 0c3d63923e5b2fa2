//! hiho - terminal UI runtime and tmux session browser
//!
//! The library is split into a small terminal-UI runtime and the
//! application built on top of it:
//!
//! - [`ui`]: pure text styling and layout
//! - [`core`]: input decoding, terminal mode control and the event loop
//! - [`tmux`]: session management behind the [`tmux::SessionManager`] trait
//! - [`app`]: the three-panel session browser model
//! - [`config`]: TOML configuration
//!
//! A program is any [`core::Model`]:
//!
//! ```no_run
//! use hiho::core::{Cmd, Event, Model, Program};
//!
//! struct Counter(usize);
//!
//! impl Model for Counter {
//!     fn update(self, event: Event) -> (Self, Option<Cmd>) {
//!         match event.key_code() {
//!             Some("q") => (self, Some(Cmd::quit())),
//!             Some(_) => (Counter(self.0 + 1), None),
//!             None => (self, None),
//!         }
//!     }
//!
//!     fn view(&self) -> String {
//!         format!("{} keys pressed, q to quit", self.0)
//!     }
//! }
//!
//! let (counter, result) = Program::new(Counter(0)).with_alt_screen().run();
//! result?;
//! println!("{}", counter.0);
//! # Ok::<(), hiho::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod tmux;
pub mod ui;

#[cfg(unix)]
pub mod app;
#[cfg(unix)]
pub mod core;

pub use error::{Error, Result};
