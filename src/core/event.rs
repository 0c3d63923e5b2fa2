//! Input events delivered to the application model.

use std::fmt;

/// A decoded key press.
///
/// `code` is a canonical key name such as `"ctrl+c"`, `"alt+up"`,
/// `"enter"`, or a literal printable character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: String,
}

impl KeyEvent {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }

    /// Returns the key name.
    pub fn as_str(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// Kind of mouse report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseKind {
    Left,
    Right,
    Middle,
    Release,
    Motion,
    WheelUp,
    WheelDown,
}

/// A mouse report with 0-based cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub x: u16,
    pub y: u16,
    pub kind: MouseKind,
}

/// Terminal dimensions in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeEvent {
    pub width: u16,
    pub height: u16,
}

/// Everything the event loop can hand to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(ResizeEvent),
}

impl Event {
    /// Shorthand for a key event.
    pub fn key(code: impl Into<String>) -> Self {
        Event::Key(KeyEvent::new(code))
    }

    /// Shorthand for a resize event.
    pub fn resize(width: u16, height: u16) -> Self {
        Event::Resize(ResizeEvent { width, height })
    }

    /// The key name, if this is a key event.
    pub fn key_code(&self) -> Option<&str> {
        match self {
            Event::Key(key) => Some(key.as_str()),
            _ => None,
        }
    }
}
