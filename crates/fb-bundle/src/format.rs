//! Rendering and parsing of the per-file bundle layout.

use serde::{Deserialize, Serialize};

use fb_core::markers::{content_spans, CONTENT_BEGIN, CONTENT_END, CONTENT_SENTINEL, FILE_HEADER_PREFIX};

/// One collected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub path: String,
    pub content: String,
}

impl BundleEntry {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Lay entries out one after another:
///
/// ```text
/// ## File: <path>
///
/// Size: <n> bytes
///
/// --- FILE CONTENT BEGIN ---
/// <content>
/// @CONTENT-END@
/// --- FILE CONTENT END ---
///
/// ```
pub fn render_bundle(entries: &[BundleEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        out.push_str(FILE_HEADER_PREFIX);
        out.push_str(&e.path);
        out.push_str(&format!("\n\nSize: {} bytes\n\n", e.content.len()));
        out.push_str(CONTENT_BEGIN);
        out.push('\n');
        out.push_str(&e.content);
        out.push('\n');
        out.push_str(CONTENT_SENTINEL);
        out.push('\n');
        out.push_str(CONTENT_END);
        out.push_str("\n\n");
    }
    out
}

/// Recover entries from bundle text. A content line equal to the sentinel or
/// end marker cuts that entry short.
pub fn parse_bundle(text: &str) -> Vec<BundleEntry> {
    let lines: Vec<&str> = text.split('\n').collect();
    content_spans(&lines)
        .into_iter()
        .map(|span| BundleEntry {
            content: lines[span.start..span.end].join("\n"),
            path: span.path,
        })
        .collect()
}
