//! Header that prefixes a compressed bundle part.
//!
//! ```text
//! # Compression: <metadata>
//! # Original Size: <n> bytes
//! # Compressed Size: <m> bytes
//! # Ratio: <x.xx>%
//!
//! <payload>
//! ```

use serde::{Deserialize, Serialize};

use fb_compress::CompressionResult;

pub const COMPRESSION_PREFIX: &str = "# Compression: ";
pub const ORIGINAL_SIZE_PREFIX: &str = "# Original Size: ";
pub const COMPRESSED_SIZE_PREFIX: &str = "# Compressed Size: ";
pub const RATIO_PREFIX: &str = "# Ratio: ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartHeader {
    /// Metadata string the payload decompresses with.
    pub metadata: String,
    pub original_size: Option<usize>,
    pub compressed_size: Option<usize>,
    pub ratio_pct: Option<f64>,
}

impl PartHeader {
    pub fn from_result(result: &CompressionResult) -> Self {
        Self {
            metadata: result.metadata.clone(),
            original_size: Some(result.original_len),
            compressed_size: Some(result.compressed_len()),
            ratio_pct: Some(result.ratio * 100.0),
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!("{COMPRESSION_PREFIX}{}\n", self.metadata);
        if let Some(n) = self.original_size {
            out.push_str(&format!("{ORIGINAL_SIZE_PREFIX}{n} bytes\n"));
        }
        if let Some(n) = self.compressed_size {
            out.push_str(&format!("{COMPRESSED_SIZE_PREFIX}{n} bytes\n"));
        }
        if let Some(r) = self.ratio_pct {
            out.push_str(&format!("{RATIO_PREFIX}{r:.2}%\n"));
        }
        out.push('\n');
        out
    }
}

/// Header (unless the part is stored uncompressed) followed by the payload.
///
/// A leading `# Compression: ` line is reserved: an uncompressed part whose
/// content starts with it is read back by [`read_part`] as a header.
pub fn write_part(result: &CompressionResult) -> Vec<u8> {
    let mut out = Vec::with_capacity(result.compressed.len() + 128);
    if result.strategy != fb_compress::none::NAME {
        out.extend_from_slice(PartHeader::from_result(result).render().as_bytes());
    }
    out.extend_from_slice(&result.compressed);
    out
}

fn parse_size(value: &str) -> Option<usize> {
    value.strip_suffix(" bytes").unwrap_or(value).trim().parse().ok()
}

/// Split an optional header from the payload.
///
/// The first line must start with `# Compression: `. Header lines run until a
/// blank line (skipped) or the first line that is not a header line (kept as
/// payload). Input that is all header lines, or has no metadata, is treated as
/// having no header. Uncompressed parts must not begin with the reserved
/// `# Compression: ` prefix.
pub fn read_part(bytes: &[u8]) -> (Option<PartHeader>, &[u8]) {
    if !bytes.starts_with(COMPRESSION_PREFIX.as_bytes()) {
        return (None, bytes);
    }

    let mut header = PartHeader {
        metadata: String::new(),
        original_size: None,
        compressed_size: None,
        ratio_pct: None,
    };
    let mut pos = 0;
    let payload_at = loop {
        let rest = &bytes[pos..];
        let (len, terminated) = match rest.iter().position(|&b| b == b'\n') {
            Some(n) => (n, true),
            None => (rest.len(), false),
        };
        let Ok(line) = std::str::from_utf8(&rest[..len]) else {
            break pos;
        };
        if let Some(v) = line.strip_prefix(COMPRESSION_PREFIX) {
            header.metadata = v.to_string();
        } else if let Some(v) = line.strip_prefix(ORIGINAL_SIZE_PREFIX) {
            header.original_size = parse_size(v);
        } else if let Some(v) = line.strip_prefix(COMPRESSED_SIZE_PREFIX) {
            header.compressed_size = parse_size(v);
        } else if let Some(v) = line.strip_prefix(RATIO_PREFIX) {
            header.ratio_pct = v.trim_end_matches('%').trim().parse().ok();
        } else if line.is_empty() {
            break if terminated { pos + 1 } else { pos };
        } else {
            break pos;
        }
        if !terminated {
            // Nothing but header lines.
            return (None, bytes);
        }
        pos += len + 1;
    };

    if header.metadata.is_empty() {
        return (None, bytes);
    }
    (Some(header), &bytes[payload_at..])
}
