//! Structural markers of the bundle text and the scanner that locates
//! per-file content blocks inside it.

pub const FILE_HEADER_PREFIX: &str = "## File: ";
pub const CONTENT_BEGIN: &str = "--- FILE CONTENT BEGIN ---";
pub const CONTENT_SENTINEL: &str = "@CONTENT-END@";
pub const CONTENT_END: &str = "--- FILE CONTENT END ---";

/// Fragments that compression must never fold into a substitution, so that
/// later layers still see the bundle frame.
pub const RESERVED_FRAGMENTS: &[&str] = &["===", "---", FILE_HEADER_PREFIX, CONTENT_SENTINEL];

/// A content block: lines `start..end` of the scanned line array belong to `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSpan {
    pub path: String,
    pub start: usize,
    pub end: usize,
}

impl ContentSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// True for header and marker lines of the bundle frame.
pub fn is_frame_line(line: &str) -> bool {
    line.starts_with(FILE_HEADER_PREFIX)
        || line == CONTENT_BEGIN
        || line == CONTENT_SENTINEL
        || line == CONTENT_END
}

/// Locate every closed content block, in order.
///
/// A header line names the current file; the next begin marker opens its
/// block, which runs until the first sentinel or end marker. Inside an open
/// block every other line is content, whatever it looks like. A block that is
/// still open at the end of input is ignored.
pub fn content_spans(lines: &[&str]) -> Vec<ContentSpan> {
    let mut spans = Vec::new();
    let mut current: Option<&str> = None;
    let mut open: Option<(&str, usize)> = None;

    for (i, line) in lines.iter().enumerate() {
        if let Some((path, start)) = open {
            if *line == CONTENT_SENTINEL || *line == CONTENT_END {
                spans.push(ContentSpan { path: path.to_string(), start, end: i });
                open = None;
            }
            continue;
        }
        if let Some(path) = line.strip_prefix(FILE_HEADER_PREFIX) {
            current = Some(path);
        } else if *line == CONTENT_BEGIN {
            if let Some(path) = current.take() {
                open = Some((path, i + 1));
            }
        }
    }
    spans
}
