//! Terminal input decoder
//!
//! Turns raw bytes read from the terminal into key and mouse events.
//! Understands C0 controls, CSI cursor/navigation keys (plain and with
//! xterm modifier parameters), SS3 keys, SGR mouse reports, printable
//! ASCII and UTF-8 characters.
//!
//! Each call to [`InputDecoder::decode`] is self-contained: a sequence cut
//! off at the end of a chunk is reported as `"unknown"` (or `"esc"` for a
//! lone ESC) and the next chunk starts from the ground state.

use bitflags::bitflags;
use tracing::debug;

use super::event::{Event, MouseEvent, MouseKind};

/// Key name reported for anything the decoder cannot make sense of.
pub const UNKNOWN_KEY: &str = "unknown";

bitflags! {
    /// Modifier bits carried by xterm's `CSI 1 ; <mod> <final>` encoding.
    ///
    /// The parameter is `1 + bits`, so `mod - 1` maps directly onto these.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
    }
}

impl Modifiers {
    /// Decode a modifier parameter in the range 2..=8.
    pub fn from_param(param: u16) -> Option<Self> {
        match param {
            2..=8 => Some(Self::from_bits_truncate((param - 1) as u8)),
            _ => None,
        }
    }

    /// Key-name prefix, e.g. `"shift+alt+"`.
    pub fn prefix(self) -> String {
        let mut prefix = String::new();
        if self.contains(Modifiers::SHIFT) {
            prefix.push_str("shift+");
        }
        if self.contains(Modifiers::ALT) {
            prefix.push_str("alt+");
        }
        if self.contains(Modifiers::CTRL) {
            prefix.push_str("ctrl+");
        }
        prefix
    }
}

bitflags! {
    /// Flag bits of the SGR mouse `Cb` parameter.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    struct ButtonBits: u16 {
        const LOW    = 0b0000_0011;
        const MOTION = 0b0010_0000;
        const WHEEL  = 0b0100_0000;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum DecoderState {
    #[default]
    Ground,
    Escape,
    Csi,
    SgrMouse,
    Ss3,
    Utf8 { remaining: u8 },
}

/// Byte-stream scanner producing [`Event`]s.
pub struct InputDecoder {
    state: DecoderState,
    params: Vec<u16>,
    current_param: Option<u16>,
    /// Set when a CSI carries bytes we don't interpret (private markers,
    /// sub-parameters); the sequence is consumed and reported as unknown.
    malformed: bool,
    utf8: Vec<u8>,
}

impl Default for InputDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Ground,
            params: Vec::with_capacity(4),
            current_param: None,
            malformed: false,
            utf8: Vec::with_capacity(4),
        }
    }

    /// Decode one chunk of input into zero or more events.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        for &byte in chunk {
            self.feed(byte, &mut events);
        }
        self.finish(&mut events);
        events
    }

    /// Feed a single byte
    fn feed(&mut self, byte: u8, out: &mut Vec<Event>) {
        match self.state {
            DecoderState::Ground => self.ground(byte, out),
            DecoderState::Escape => self.escape(byte, out),
            DecoderState::Csi => self.csi(byte, out),
            DecoderState::SgrMouse => self.sgr_mouse(byte, out),
            DecoderState::Ss3 => self.ss3(byte, out),
            DecoderState::Utf8 { remaining } => self.utf8_continuation(byte, remaining, out),
        }
    }

    /// Flush whatever sequence is still open at the end of a chunk.
    fn finish(&mut self, out: &mut Vec<Event>) {
        match self.state {
            DecoderState::Ground => {}
            DecoderState::Escape => out.push(Event::key("esc")),
            _ => self.unknown("sequence cut off at end of read", out),
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.state = DecoderState::Ground;
        self.params.clear();
        self.current_param = None;
        self.malformed = false;
        self.utf8.clear();
    }

    fn unknown(&mut self, reason: &str, out: &mut Vec<Event>) {
        debug!(
            "Unknown input: {} (params={:?}, utf8={:?})",
            reason, self.params, self.utf8
        );
        out.push(Event::key(UNKNOWN_KEY));
        self.reset();
    }

    fn ground(&mut self, byte: u8, out: &mut Vec<Event>) {
        match byte {
            0x1B => self.state = DecoderState::Escape,
            0x00..=0x7F => {
                if let Some(name) = byte_key_name(byte) {
                    out.push(Event::key(name));
                }
            }
            0xC2..=0xDF => self.begin_utf8(byte, 1),
            0xE0..=0xEF => self.begin_utf8(byte, 2),
            0xF0..=0xF4 => self.begin_utf8(byte, 3),
            _ => self.unknown("invalid UTF-8 lead byte", out),
        }
    }

    fn begin_utf8(&mut self, byte: u8, remaining: u8) {
        self.utf8.clear();
        self.utf8.push(byte);
        self.state = DecoderState::Utf8 { remaining };
    }

    fn utf8_continuation(&mut self, byte: u8, remaining: u8, out: &mut Vec<Event>) {
        if byte & 0xC0 != 0x80 {
            // Not a continuation byte: report the broken sequence, then
            // treat this byte as the start of something new.
            self.unknown("truncated UTF-8 sequence", out);
            self.ground(byte, out);
            return;
        }
        self.utf8.push(byte);
        if remaining > 1 {
            self.state = DecoderState::Utf8 { remaining: remaining - 1 };
            return;
        }
        match std::str::from_utf8(&self.utf8).ok().and_then(|s| s.chars().next()) {
            Some(ch) => {
                out.push(Event::key(ch.to_string()));
                self.reset();
            }
            None => self.unknown("invalid UTF-8 sequence", out),
        }
    }

    fn escape(&mut self, byte: u8, out: &mut Vec<Event>) {
        match byte {
            b'[' => {
                self.params.clear();
                self.current_param = None;
                self.malformed = false;
                self.state = DecoderState::Csi;
            }
            b'O' => self.state = DecoderState::Ss3,
            // ESC followed by anything else is read as Alt+key. A real ESC
            // press followed by another key in the same read is
            // indistinguishable from this.
            _ => match alt_key_name(byte) {
                Some(name) => {
                    out.push(Event::key(name));
                    self.reset();
                }
                None => self.unknown("unsupported byte after ESC", out),
            },
        }
    }

    fn push_digit(&mut self, byte: u8) {
        let digit = (byte - b'0') as u16;
        self.current_param = Some(
            self.current_param
                .unwrap_or(0)
                .saturating_mul(10)
                .saturating_add(digit),
        );
    }

    fn push_param(&mut self) {
        self.params.push(self.current_param.take().unwrap_or(0));
    }

    fn csi(&mut self, byte: u8, out: &mut Vec<Event>) {
        match byte {
            b'<' if self.params.is_empty() && self.current_param.is_none() && !self.malformed => {
                self.state = DecoderState::SgrMouse;
            }
            b'0'..=b'9' => self.push_digit(byte),
            b';' => self.push_param(),
            // Parameter and intermediate bytes we don't interpret
            0x20..=0x3F => self.malformed = true,
            0x40..=0x7E => {
                if self.current_param.is_some() {
                    self.push_param();
                }
                self.dispatch_csi(byte, out);
            }
            0x1B => {
                self.unknown("ESC inside CSI", out);
                self.state = DecoderState::Escape;
            }
            _ => self.unknown("unexpected byte inside CSI", out),
        }
    }

    fn dispatch_csi(&mut self, final_byte: u8, out: &mut Vec<Event>) {
        if self.malformed {
            self.unknown("unsupported CSI parameters", out);
            return;
        }

        let name = match (self.params.as_slice(), final_byte) {
            ([], _) => csi_final_name(final_byte).map(str::to_string),
            ([1, modifier], _) if final_byte != b'~' => {
                match (Modifiers::from_param(*modifier), csi_final_name(final_byte)) {
                    (Some(mods), Some(base)) => Some(format!("{}{}", mods.prefix(), base)),
                    _ => None,
                }
            }
            ([code], b'~') => tilde_key_name(*code).map(str::to_string),
            ([code, modifier], b'~') => {
                match (Modifiers::from_param(*modifier), tilde_key_name(*code)) {
                    (Some(mods), Some(base)) => Some(format!("{}{}", mods.prefix(), base)),
                    _ => None,
                }
            }
            _ => None,
        };

        match name {
            Some(name) => {
                out.push(Event::key(name));
                self.reset();
            }
            None => self.unknown("unrecognized CSI sequence", out),
        }
    }

    fn sgr_mouse(&mut self, byte: u8, out: &mut Vec<Event>) {
        match byte {
            b'0'..=b'9' => self.push_digit(byte),
            b';' => self.push_param(),
            b'M' | b'm' => {
                if self.current_param.is_some() {
                    self.push_param();
                }
                match sgr_mouse_event(&self.params, byte == b'm') {
                    Some(event) => {
                        out.push(Event::Mouse(event));
                        self.reset();
                    }
                    None => self.unknown("malformed SGR mouse report", out),
                }
            }
            0x1B => {
                self.unknown("ESC inside SGR mouse report", out);
                self.state = DecoderState::Escape;
            }
            _ => self.unknown("unexpected byte inside SGR mouse report", out),
        }
    }

    fn ss3(&mut self, byte: u8, out: &mut Vec<Event>) {
        let name = match byte {
            b'A' | b'B' | b'C' | b'D' | b'H' | b'F' => csi_final_name(byte),
            b'P' => Some("f1"),
            b'Q' => Some("f2"),
            b'R' => Some("f3"),
            b'S' => Some("f4"),
            _ => None,
        };
        match name {
            Some(name) => {
                out.push(Event::key(name));
                self.reset();
            }
            None => self.unknown("unrecognized SS3 sequence", out),
        }
    }
}

/// Build a mouse event from `Cb;Cx;Cy`.
fn sgr_mouse_event(params: &[u16], release: bool) -> Option<MouseEvent> {
    let [cb, cx, cy] = params else {
        return None;
    };
    let bits = ButtonBits::from_bits_retain(*cb);

    let kind = if release {
        MouseKind::Release
    } else if bits.contains(ButtonBits::WHEEL) {
        if cb & 1 == 0 {
            MouseKind::WheelUp
        } else {
            MouseKind::WheelDown
        }
    } else if bits.contains(ButtonBits::MOTION) {
        MouseKind::Motion
    } else {
        match cb & ButtonBits::LOW.bits() {
            0 => MouseKind::Left,
            1 => MouseKind::Middle,
            2 => MouseKind::Right,
            _ => MouseKind::Release,
        }
    };

    Some(MouseEvent {
        x: cx.saturating_sub(1),
        y: cy.saturating_sub(1),
        kind,
    })
}

/// Final bytes shared by plain and modified CSI keys.
fn csi_final_name(final_byte: u8) -> Option<&'static str> {
    match final_byte {
        b'A' => Some("up"),
        b'B' => Some("down"),
        b'C' => Some("right"),
        b'D' => Some("left"),
        b'H' => Some("home"),
        b'F' => Some("end"),
        b'Z' => Some("shift+tab"),
        _ => None,
    }
}

/// `CSI <n> ~` keys.
fn tilde_key_name(code: u16) -> Option<&'static str> {
    match code {
        1 | 7 => Some("home"),
        2 => Some("insert"),
        3 => Some("delete"),
        4 | 8 => Some("end"),
        5 => Some("pgup"),
        6 => Some("pgdown"),
        15 => Some("f5"),
        17 => Some("f6"),
        18 => Some("f7"),
        19 => Some("f8"),
        20 => Some("f9"),
        21 => Some("f10"),
        23 => Some("f11"),
        24 => Some("f12"),
        _ => None,
    }
}

/// Name of a single byte received in the ground state.
fn byte_key_name(byte: u8) -> Option<String> {
    let name = match byte {
        0x00 => "ctrl+@",
        0x09 => "tab",
        0x0A | 0x0D => "enter",
        0x1B => "esc",
        0x1C => "ctrl+\\",
        0x1D => "ctrl+]",
        0x1E => "ctrl+^",
        0x1F => "ctrl+_",
        0x7F => "backspace",
        0x01..=0x1A => return Some(format!("ctrl+{}", (b'a' + byte - 1) as char)),
        0x20..=0x7E => return Some((byte as char).to_string()),
        _ => return None,
    };
    Some(name.to_string())
}

fn alt_key_name(byte: u8) -> Option<String> {
    byte_key_name(byte).map(|name| format!("alt+{}", name))
}
