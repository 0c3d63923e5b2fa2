//! Declarative block styling
//!
//! A [`Style`] is an immutable description of how a block of text should
//! look. Builder methods take `self` and return a modified copy, and
//! [`Style::render`] is a pure function of the style and its input.

use std::fmt::Write as _;

use crossterm::style::{Attribute, Color as CtColor, SetAttribute, SetBackgroundColor, SetForegroundColor};

use super::layout::{pad_right, truncate, visible_width};

/// Terminal color
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    /// 256-color palette index
    Indexed(u8),
    /// True color
    Rgb(u8, u8, u8),
}

impl Color {
    pub fn to_crossterm(self) -> CtColor {
        match self {
            Color::Indexed(n) => CtColor::AnsiValue(n),
            Color::Rgb(r, g, b) => CtColor::Rgb { r, g, b },
        }
    }
}

/// Border drawing style
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Border {
    #[default]
    Normal,
    Rounded,
    Double,
    Thick,
}

/// Border characters
struct BorderChars {
    top_left: char,
    top_right: char,
    bottom_left: char,
    bottom_right: char,
    horizontal: char,
    vertical: char,
}

impl Border {
    fn chars(self) -> BorderChars {
        let (top_left, top_right, bottom_left, bottom_right, horizontal, vertical) = match self {
            Border::Normal => ('┌', '┐', '└', '┘', '─', '│'),
            Border::Rounded => ('╭', '╮', '╰', '╯', '─', '│'),
            Border::Double => ('╔', '╗', '╚', '╝', '═', '║'),
            Border::Thick => ('┏', '┓', '┗', '┛', '━', '┃'),
        };
        BorderChars {
            top_left,
            top_right,
            bottom_left,
            bottom_right,
            horizontal,
            vertical,
        }
    }
}

/// Space around the content, inside the border.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Padding {
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
    pub left: usize,
}

/// Styling for a block of text.
///
/// `width` and `height` measure the box inside the border, padding
/// included.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[must_use]
pub struct Style {
    foreground: Option<Color>,
    background: Option<Color>,
    bold: bool,
    reverse: bool,
    padding: Padding,
    width: Option<usize>,
    height: Option<usize>,
    border: Option<Border>,
    border_foreground: Option<Color>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn foreground(mut self, color: Color) -> Self {
        self.foreground = Some(color);
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    pub fn bold(mut self, enabled: bool) -> Self {
        self.bold = enabled;
        self
    }

    pub fn reverse(mut self, enabled: bool) -> Self {
        self.reverse = enabled;
        self
    }

    /// Vertical and horizontal padding.
    pub fn padding(mut self, vertical: usize, horizontal: usize) -> Self {
        self.padding = Padding {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        };
        self
    }

    pub fn padding_sides(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: usize) -> Self {
        self.height = Some(height);
        self
    }

    pub fn border(mut self, border: Border) -> Self {
        self.border = Some(border);
        self
    }

    pub fn border_foreground(mut self, color: Color) -> Self {
        self.border_foreground = Some(color);
        self
    }

    /// SGR prefix for the text attributes, empty when there are none.
    fn sgr_prefix(&self) -> String {
        let mut prefix = String::new();
        // Writing to a String cannot fail
        if self.bold {
            let _ = write!(prefix, "{}", SetAttribute(Attribute::Bold));
        }
        if self.reverse {
            let _ = write!(prefix, "{}", SetAttribute(Attribute::Reverse));
        }
        if let Some(fg) = self.foreground {
            let _ = write!(prefix, "{}", SetForegroundColor(fg.to_crossterm()));
        }
        if let Some(bg) = self.background {
            let _ = write!(prefix, "{}", SetBackgroundColor(bg.to_crossterm()));
        }
        prefix
    }

    /// Apply the style to `content`.
    pub fn render(&self, content: &str) -> String {
        let pad = self.padding;
        let lines: Vec<&str> = content.split('\n').collect();

        let text_width = match self.width {
            Some(width) => width.saturating_sub(pad.left + pad.right),
            None => lines.iter().map(|l| visible_width(l)).max().unwrap_or(0),
        };
        let box_width = match self.width {
            Some(width) => width,
            None => text_width + pad.left + pad.right,
        };

        let blank = " ".repeat(box_width);
        let mut rows: Vec<String> = Vec::with_capacity(lines.len() + pad.top + pad.bottom);
        rows.extend(std::iter::repeat(blank.clone()).take(pad.top));
        for line in lines {
            let fitted = if visible_width(line) > text_width {
                truncate(line, text_width)
            } else {
                line.to_string()
            };
            let mut row = " ".repeat(pad.left);
            row.push_str(&pad_right(&fitted, text_width));
            row.extend(std::iter::repeat(' ').take(pad.right));
            // A fixed width narrower than the padding still wins
            if visible_width(&row) > box_width {
                row = truncate(&row, box_width);
            }
            rows.push(row);
        }
        rows.extend(std::iter::repeat(blank.clone()).take(pad.bottom));

        if let Some(height) = self.height {
            rows.resize(height, blank);
        }

        let prefix = self.sgr_prefix();
        if !prefix.is_empty() {
            let reset = SetAttribute(Attribute::Reset).to_string();
            for row in &mut rows {
                *row = format!("{}{}{}", prefix, row, reset);
            }
        }

        match self.border {
            Some(border) => self.draw_border(border, rows, box_width),
            None => rows.join("\n"),
        }
    }

    fn draw_border(&self, border: Border, rows: Vec<String>, inner_width: usize) -> String {
        let chars = border.chars();
        let (start, end) = match self.border_foreground {
            Some(color) => (
                SetForegroundColor(color.to_crossterm()).to_string(),
                SetAttribute(Attribute::Reset).to_string(),
            ),
            None => (String::new(), String::new()),
        };
        let edge = |s: String| format!("{}{}{}", start, s, end);
        let horizontal: String = std::iter::repeat(chars.horizontal).take(inner_width).collect();

        let mut out = Vec::with_capacity(rows.len() + 2);
        out.push(edge(format!("{}{}{}", chars.top_left, horizontal, chars.top_right)));
        for row in rows {
            out.push(format!(
                "{}{}{}",
                edge(chars.vertical.to_string()),
                row,
                edge(chars.vertical.to_string())
            ));
        }
        out.push(edge(format!("{}{}{}", chars.bottom_left, horizontal, chars.bottom_right)));
        out.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::layout::block_width;

    fn line_widths(block: &str) -> Vec<usize> {
        block.split('\n').map(visible_width).collect()
    }

    #[test]
    fn test_plain_render_pads_to_longest_line() {
        assert_eq!(Style::new().render("ab\nabcd"), "ab  \nabcd");
    }

    #[test]
    fn test_fixed_size_block_is_exact() {
        let contents = [
            "",
            "short",
            "a much longer line than six",
            "1\n2\n3\n4\n5",
            "\x1b[1;38;5;62mstyled\x1b[0m text\n\x1b[7mx\x1b[0m",
        ];
        let paddings = [(0, 0), (0, 1), (1, 2), (2, 5)];
        for width in 0..8 {
            for height in 0..6 {
                for (vertical, horizontal) in paddings {
                    let style = Style::new()
                        .bold(true)
                        .padding(vertical, horizontal)
                        .width(width)
                        .height(height);
                    for content in contents {
                        let out = style.render(content);
                        let case = (width, height, vertical, horizontal, content);
                        if height == 0 {
                            assert_eq!(out, "", "case {:?}", case);
                        } else {
                            assert_eq!(line_widths(&out), vec![width; height], "case {:?}", case);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_height_pads_with_blank_lines() {
        assert_eq!(Style::new().width(3).height(3).render("ab"), "ab \n   \n   ");
    }

    #[test]
    fn test_padding() {
        let out = Style::new().padding(0, 1).render("Tab");
        assert_eq!(out, " Tab ");
        let out = Style::new().padding(1, 0).render("x");
        assert_eq!(out, " \nx\n ");
    }

    #[test]
    fn test_width_includes_padding() {
        let out = Style::new().padding(0, 1).width(5).render("abcdef");
        assert_eq!(out, " abc ");
    }

    #[test]
    fn test_attributes_wrap_each_line() {
        let out = Style::new().bold(true).render("a\nb");
        assert_eq!(out, "\x1b[1ma\x1b[0m\n\x1b[1mb\x1b[0m");

        let out = Style::new().foreground(Color::Indexed(240)).render("hi");
        assert_eq!(out, "\x1b[38;5;240mhi\x1b[0m");

        let out = Style::new().reverse(true).background(Color::Indexed(62)).render("x");
        assert_eq!(out, "\x1b[7m\x1b[48;5;62mx\x1b[0m");
        assert_eq!(visible_width(&out), 1);
    }

    #[test]
    fn test_border_wraps_content() {
        let out = Style::new().border(Border::Normal).render("ab\nc");
        assert_eq!(out, "┌──┐\n│ab│\n│c │\n└──┘");

        let out = Style::new().border(Border::Rounded).width(1).render("x");
        assert_eq!(out, "╭─╮\n│x│\n╰─╯");
    }

    #[test]
    fn test_bordered_fixed_block_dimensions() {
        let out = Style::new()
            .border(Border::Double)
            .width(10)
            .height(4)
            .bold(true)
            .render("Sessions\nhiho-1-1 and more");
        assert_eq!(line_widths(&out), vec![12; 6]);
        assert_eq!(block_width(&out), 12);
    }

    #[test]
    fn test_border_foreground() {
        let out = Style::new()
            .border(Border::Thick)
            .border_foreground(Color::Indexed(62))
            .render("x");
        let lines: Vec<&str> = out.split('\n').collect();
        assert_eq!(lines[0], "\x1b[38;5;62m┏━┓\x1b[0m");
        assert_eq!(lines[1], "\x1b[38;5;62m┃\x1b[0mx\x1b[38;5;62m┃\x1b[0m");
        assert_eq!(line_widths(&out), vec![3, 3, 3]);
    }

    #[test]
    fn test_render_is_idempotent() {
        let style = Style::new()
            .foreground(Color::Rgb(1, 2, 3))
            .padding(1, 2)
            .width(12)
            .border(Border::Normal);
        let first = style.render("same\ninput");
        assert_eq!(first, style.render("same\ninput"));
        assert_eq!(style, style.clone());
    }
}
