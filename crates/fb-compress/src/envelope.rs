//! Line-level helpers for reading marker-delimited envelopes.

use fb_core::{CompressionError, Result};

/// Split `text` that opens with the `start` line into the section body and
/// whatever follows the first line equal to `end`. Both markers include
/// their trailing newline.
pub(crate) fn take_section<'a>(text: &'a str, start: &str, end: &str) -> Result<(&'a str, &'a str)> {
    let body = text
        .strip_prefix(start)
        .ok_or_else(|| CompressionError::malformed(format!("missing {:?}", start.trim_end())))?;
    let mut cursor = LineCursor::new(body);
    while let Some(line) = cursor.peek() {
        if line == end.trim_end_matches('\n') {
            let section = &body[..cursor.offset()];
            cursor.next_line();
            return Ok((section, cursor.remainder()));
        }
        cursor.next_line();
    }
    Err(CompressionError::malformed(format!("missing {:?}", end.trim_end())))
}

/// Iterates newline-terminated lines; an unterminated tail is never yielded
/// and stays in `remainder()`.
pub(crate) struct LineCursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> LineCursor<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    pub(crate) fn peek(&self) -> Option<&'a str> {
        let rest = &self.text[self.pos..];
        rest.find('\n').map(|nl| &rest[..nl])
    }

    pub(crate) fn next_line(&mut self) -> Option<&'a str> {
        let line = self.peek()?;
        self.pos += line.len() + 1;
        Some(line)
    }

    /// Next line, or a malformed-envelope error naming what was expected.
    pub(crate) fn expect_line(&mut self, what: &str) -> Result<&'a str> {
        self.next_line()
            .ok_or_else(|| CompressionError::malformed(format!("unexpected end of input, expected {what}")))
    }

    pub(crate) fn offset(&self) -> usize {
        self.pos
    }

    pub(crate) fn remainder(&self) -> &'a str {
        &self.text[self.pos..]
    }
}
