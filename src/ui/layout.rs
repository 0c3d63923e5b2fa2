//! ANSI-aware text measurement and block composition.
//!
//! An escape run starts at `ESC` and ends at the next `m` (inclusive); it
//! occupies no columns. Everything else counts one column per `char`.

const ESC: char = '\x1b';

/// Number of visible columns in `s`.
pub fn visible_width(s: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;
    for c in s.chars() {
        if in_escape {
            if c == 'm' {
                in_escape = false;
            }
        } else if c == ESC {
            in_escape = true;
        } else {
            width += 1;
        }
    }
    width
}

/// Widest line in a multi-line block.
pub fn block_width(block: &str) -> usize {
    block.split('\n').map(visible_width).max().unwrap_or(0)
}

/// Cut `s` to at most `width` visible columns.
///
/// Escape runs are always copied, so a colour reset following the cut point
/// survives.
pub fn truncate(s: &str, width: usize) -> String {
    let mut out = String::with_capacity(s.len());
    let mut visible = 0;
    let mut in_escape = false;
    for c in s.chars() {
        if in_escape {
            out.push(c);
            if c == 'm' {
                in_escape = false;
            }
        } else if c == ESC {
            out.push(c);
            in_escape = true;
        } else if visible < width {
            out.push(c);
            visible += 1;
        }
    }
    out
}

/// Like [`truncate`], but marks the cut with `…`.
pub fn truncate_with_ellipsis(s: &str, width: usize) -> String {
    if visible_width(s) <= width {
        return s.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = truncate(s, width - 1);
    out.push('…');
    out
}

/// Pad `s` with spaces on the right up to `width` visible columns.
pub fn pad_right(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(visible_width(s));
    let mut out = String::with_capacity(s.len() + fill);
    out.push_str(s);
    out.extend(std::iter::repeat(' ').take(fill));
    out
}

/// Place blocks side by side, aligned at the top, in columns of one width.
///
/// Every row of every block is padded to the widest line across all blocks;
/// a block with fewer lines than the tallest contributes blank rows of that
/// width.
pub fn join_horizontal<S: AsRef<str>>(parts: &[S]) -> String {
    let width = parts.iter().map(|part| block_width(part.as_ref())).max().unwrap_or(0);
    join_rows(parts, |_| width)
}

/// Place blocks side by side, aligned at the top, each keeping its own width.
///
/// Used for panels that are already sized to fit together.
pub fn join_columns<S: AsRef<str>>(parts: &[S]) -> String {
    join_rows(parts, block_width)
}

fn join_rows<S, F>(parts: &[S], column_width: F) -> String
where
    S: AsRef<str>,
    F: Fn(&str) -> usize,
{
    let blocks: Vec<(Vec<&str>, usize)> = parts
        .iter()
        .map(|part| {
            let part = part.as_ref();
            (part.split('\n').collect(), column_width(part))
        })
        .collect();
    let rows = blocks.iter().map(|(lines, _)| lines.len()).max().unwrap_or(0);

    let mut out = Vec::with_capacity(rows);
    for row in 0..rows {
        let mut line = String::new();
        for (lines, width) in &blocks {
            match lines.get(row) {
                Some(text) => line.push_str(&pad_right(text, *width)),
                None => line.extend(std::iter::repeat(' ').take(*width)),
            }
        }
        out.push(line);
    }
    out.join("\n")
}

/// Stack blocks on top of each other.
pub fn join_vertical<S: AsRef<str>>(parts: &[S]) -> String {
    parts.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n")
}
