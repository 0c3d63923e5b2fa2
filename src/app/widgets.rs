//! Text input line and scrolling viewport used by the main window.

use crate::ui::truncate;

/// Single-line text input.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    pub prompt: String,
    pub placeholder: String,
    value: String,
    focused: bool,
}

impl TextInput {
    pub fn new(prompt: &str, placeholder: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            placeholder: placeholder.to_string(),
            value: String::new(),
            focused: false,
        }
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn reset(&mut self) {
        self.value.clear();
    }

    /// Apply a key. Printable characters are only inserted while focused.
    pub fn handle_key(&mut self, key: &str) {
        if key == "backspace" {
            self.value.pop();
            return;
        }
        let mut chars = key.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if self.focused && !c.is_control() {
                self.value.push(c);
            }
        }
    }

    pub fn view(&self) -> String {
        if self.value.is_empty() {
            format!("{}{}", self.prompt, self.placeholder)
        } else {
            format!("{}{}", self.prompt, self.value)
        }
    }
}

/// Fixed-size window onto a block of text, pinned to its last lines.
///
/// A width of 0 leaves lines uncut.
#[derive(Debug, Clone, Default)]
pub struct Viewport {
    pub width: usize,
    pub height: usize,
    content: String,
}

impl Viewport {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            content: String::new(),
        }
    }

    pub fn set_content(&mut self, content: String) {
        self.content = content;
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// The last `height` lines of the content, cut to `width` columns.
    pub fn view(&self) -> String {
        let lines: Vec<&str> = self.content.split('\n').collect();
        let skip = lines.len().saturating_sub(self.height.max(1));
        if self.width == 0 {
            return lines[skip..].join("\n");
        }
        lines[skip..]
            .iter()
            .map(|line| truncate(line, self.width))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
