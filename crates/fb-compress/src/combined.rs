//! Combined strategy — several strategies applied in sequence as layers.
//!
//! ```text
//! ===COMBINED_COMPRESSION_START===
//! LAYERS:<n>
//! L1:<strategy>:<metadata>
//! ...
//! ===COMBINED_CONTENT_START===
//! <payload>
//! ===COMBINED_CONTENT_END===
//! ```

use tracing::debug;

use crate::envelope::LineCursor;
use crate::strategy::{metadata, require_detail, Compressed, Strategy};
use crate::{delta, dictionary, none, template};
use crate::{DeltaStrategy, DictionaryStrategy, NoneStrategy, TemplateStrategy};
use fb_core::{CompressionConfig, CompressionError, Result};

pub const NAME: &str = "combined";
pub const COMBINED_START: &str = "===COMBINED_COMPRESSION_START===\n";
pub const CONTENT_START: &str = "===COMBINED_CONTENT_START===";
pub const CONTENT_END_SUFFIX: &str = "\n===COMBINED_CONTENT_END===\n";

pub struct CombinedStrategy {
    name: String,
    layers: Vec<Box<dyn Strategy>>,
}

impl CombinedStrategy {
    /// Registry name is the layer names joined with `+`.
    pub fn new(layers: Vec<Box<dyn Strategy>>) -> Self {
        let name = layers.iter().map(|l| l.name()).collect::<Vec<_>>().join("+");
        Self { name, layers }
    }

    /// `template+delta`.
    pub fn template_delta(config: &CompressionConfig) -> Self {
        Self::new(vec![
            Box::new(TemplateStrategy::with_config(config.template.clone())),
            Box::new(DeltaStrategy::with_config(config.delta.clone())),
        ])
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }
}

/// Decoder for a layer recorded in an envelope. Decoding needs no tuning, so
/// default-configured instances are used.
pub fn layer_decoder(name: &str) -> Result<Box<dyn Strategy>> {
    match name {
        none::NAME => Ok(Box::new(NoneStrategy::new())),
        dictionary::NAME => Ok(Box::new(DictionaryStrategy::new())),
        template::NAME => Ok(Box::new(TemplateStrategy::new())),
        delta::NAME => Ok(Box::new(DeltaStrategy::new())),
        other => Err(CompressionError::malformed(format!("unknown layer strategy: {other}"))),
    }
}

fn parse_layer(line: &str) -> Result<(&str, &str)> {
    let mut parts = line.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(tag), Some(name), Some(meta)) if tag.starts_with('L') => Ok((name, meta)),
        _ => Err(CompressionError::malformed(format!("invalid layer line: {line:?}"))),
    }
}

impl Strategy for CombinedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_compress(&self, content: &[u8]) -> bool {
        self.layers.iter().any(|l| l.can_compress(content))
    }

    /// Product of the admissible layers' estimates plus envelope overhead.
    fn estimate_ratio(&self, content: &[u8]) -> f64 {
        if self.layers.is_empty() || content.is_empty() {
            return 1.0;
        }
        let ratio: f64 = self
            .layers
            .iter()
            .filter(|l| l.can_compress(content))
            .map(|l| l.estimate_ratio(content))
            .product();
        let overhead = (100 + 50 * self.layers.len()) as f64 / content.len() as f64;
        ratio + overhead
    }

    fn compress(&self, content: &[u8]) -> Result<Compressed> {
        let mut accepted: Vec<(&str, String)> = Vec::new();
        let mut current = content.to_vec();

        for (index, layer) in self.layers.iter().enumerate() {
            let out = layer.compress(&current).map_err(|e| CompressionError::Layer {
                index,
                strategy: layer.name().to_string(),
                source: Box::new(e),
            })?;
            if out.bytes.len() < current.len() {
                debug!(layer = layer.name(), before = current.len(), after = out.bytes.len(), "combined: layer accepted");
                accepted.push((layer.name(), out.metadata));
                current = out.bytes;
            } else {
                debug!(layer = layer.name(), "combined: layer skipped");
            }
        }

        if accepted.is_empty() {
            return Ok(Compressed::passthrough(NAME, content));
        }

        let mut out = Vec::with_capacity(current.len() + 128);
        out.extend_from_slice(COMBINED_START.as_bytes());
        out.extend_from_slice(format!("LAYERS:{}\n", accepted.len()).as_bytes());
        for (k, (name, meta)) in accepted.iter().enumerate() {
            out.extend_from_slice(format!("L{}:{name}:{meta}\n", k + 1).as_bytes());
        }
        out.extend_from_slice(CONTENT_START.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(&current);
        out.extend_from_slice(CONTENT_END_SUFFIX.as_bytes());
        Ok(Compressed::new(out, metadata(NAME, accepted.len())))
    }

    fn can_decompress(&self, metadata: &str) -> bool {
        metadata.strip_prefix(NAME).is_some_and(|rest| rest.starts_with(':'))
    }

    fn decompress(&self, compressed: &[u8], metadata: &str) -> Result<Vec<u8>> {
        let expected = require_detail(metadata)?;
        if expected == 0 {
            return Ok(compressed.to_vec());
        }
        let rest = compressed
            .strip_prefix(COMBINED_START.as_bytes())
            .ok_or_else(|| CompressionError::malformed("missing combined envelope start"))?;
        let payload_at = rest
            .windows(CONTENT_START.len() + 1)
            .position(|w| w.ends_with(b"\n") && &w[..CONTENT_START.len()] == CONTENT_START.as_bytes())
            .ok_or_else(|| CompressionError::malformed("missing combined content start"))?;
        let header = std::str::from_utf8(&rest[..payload_at])
            .map_err(|_| CompressionError::malformed("combined layer table is not UTF-8"))?;
        let payload = rest[payload_at + CONTENT_START.len() + 1..]
            .strip_suffix(CONTENT_END_SUFFIX.as_bytes())
            .ok_or_else(|| CompressionError::malformed("missing combined content end"))?;

        let mut cursor = LineCursor::new(header);
        let count_line = cursor.expect_line("LAYERS line")?;
        let count: usize = count_line
            .strip_prefix("LAYERS:")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| CompressionError::malformed(format!("invalid layer count line: {count_line:?}")))?;
        let mut layers = Vec::with_capacity(count);
        while let Some(line) = cursor.next_line() {
            layers.push(parse_layer(line)?);
        }
        if layers.len() != count || count != expected {
            return Err(CompressionError::malformed(format!(
                "combined envelope lists {} layers, LAYERS says {count}, metadata says {expected}",
                layers.len()
            )));
        }

        let mut data = payload.to_vec();
        for (index, (name, meta)) in layers.iter().enumerate().rev() {
            let decoder = layer_decoder(name)?;
            data = decoder.decompress(&data, meta).map_err(|e| CompressionError::Layer {
                index,
                strategy: name.to_string(),
                source: Box::new(e),
            })?;
        }
        Ok(data)
    }
}
