//! Bundle framing: the marker-delimited text that holds collected files, and
//! the header that prefixes a compressed bundle part.

pub mod format;
pub mod part;

pub use format::{parse_bundle, render_bundle, BundleEntry};
pub use part::{read_part, write_part, PartHeader};

use anyhow::{bail, Context, Result};
use fb_compress::{CompressionResult, Selector};
use tracing::info;

/// Compress one bundle part and frame it for writing.
pub fn pack_part(selector: &Selector, content: &[u8], strategy: &str) -> Result<(Vec<u8>, CompressionResult)> {
    let result = selector
        .compress_with(content, strategy)
        .with_context(|| format!("compressing bundle part with {strategy}"))?;
    info!(
        strategy = %result.strategy,
        original = result.original_len,
        compressed = result.compressed_len(),
        "packed bundle part"
    );
    Ok((write_part(&result), result))
}

/// Undo [`pack_part`]. Parts without a compression header are returned as-is.
pub fn unpack_part(selector: &Selector, bytes: &[u8]) -> Result<Vec<u8>> {
    let (header, payload) = read_part(bytes);
    let Some(header) = header else {
        return Ok(bytes.to_vec());
    };
    let out = selector
        .decompress(payload, &header.metadata)
        .with_context(|| format!("decompressing bundle part ({})", header.metadata))?;
    if let Some(expected) = header.original_size {
        if out.len() != expected {
            bail!(
                "decompressed size {} does not match header original size {expected}",
                out.len()
            );
        }
    }
    info!(metadata = %header.metadata, restored = out.len(), "unpacked bundle part");
    Ok(out)
}

#[cfg(test)]
mod tests;
