//! The contract every compression strategy implements.

use fb_core::{CompressionError, Result};

/// Output of a single `compress` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    /// `"<name>:<detail>"`, or `"none"` for the passthrough strategy.
    pub metadata: String,
}

impl Compressed {
    pub fn new(bytes: Vec<u8>, metadata: String) -> Self {
        Self { bytes, metadata }
    }

    /// The content unchanged, tagged `<name>:0`.
    pub fn passthrough(name: &str, content: &[u8]) -> Self {
        Self::new(content.to_vec(), metadata(name, 0))
    }

    pub fn detail(&self) -> Option<usize> {
        detail(&self.metadata)
    }
}

/// A named, stateless compress/decompress algorithm.
///
/// `decompress(compress(c)) == c` must hold byte-for-byte whenever
/// `can_compress(c)` holds. Implementations keep no state between calls, so a
/// single instance may serve many threads.
pub trait Strategy: Send + Sync {
    /// Registry key and metadata prefix.
    fn name(&self) -> &str;

    /// Cheap admissibility check.
    fn can_compress(&self, content: &[u8]) -> bool;

    /// Estimated compressed/original ratio, `1.0` when no benefit is expected.
    /// Only used for selection.
    fn estimate_ratio(&self, content: &[u8]) -> f64;

    fn compress(&self, content: &[u8]) -> Result<Compressed>;

    fn can_decompress(&self, metadata: &str) -> bool {
        metadata
            .strip_prefix(self.name())
            .is_some_and(|rest| rest.starts_with(':'))
    }

    fn decompress(&self, compressed: &[u8], metadata: &str) -> Result<Vec<u8>>;
}

pub fn metadata(name: &str, detail: usize) -> String {
    format!("{name}:{detail}")
}

/// The numeric detail after the last `:`, if any.
pub fn detail(metadata: &str) -> Option<usize> {
    metadata.rsplit_once(':').and_then(|(_, d)| d.parse().ok())
}

/// Detail of a metadata string this strategy is about to decode.
pub(crate) fn require_detail(metadata: &str) -> Result<usize> {
    detail(metadata).ok_or_else(|| CompressionError::malformed(format!("bad metadata: {metadata:?}")))
}

/// Text strategies only operate on UTF-8 without NUL bytes.
pub(crate) fn as_text(content: &[u8]) -> Option<&str> {
    if content.contains(&0) {
        return None;
    }
    std::str::from_utf8(content).ok()
}

pub(crate) fn clamped_ratio(compressed_len: usize, original_len: usize) -> f64 {
    if original_len == 0 {
        return 1.0;
    }
    (compressed_len as f64 / original_len as f64).clamp(0.0, 1.0)
}
