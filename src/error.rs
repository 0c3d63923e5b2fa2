//! Runtime errors

use std::io;

use thiserror::Error;

/// Errors that end a program run.
///
/// Whatever the variant, the terminal has already been restored by the time
/// one of these reaches the caller of [`crate::core::Program::run`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to switch terminal mode: {0}")]
    TerminalMode(#[source] io::Error),

    #[error("A terminal session is already active in this process")]
    SessionActive,

    #[error("Failed to read input: {0}")]
    Input(#[source] io::Error),

    #[error("Failed to write output: {0}")]
    Output(#[source] io::Error),

    #[error("Failed to watch for signals: {0}")]
    SignalWatch(#[source] io::Error),

    #[error("Interrupted by signal {0}")]
    Interrupted(i32),
}

pub type Result<T> = std::result::Result<T, Error>;
