//! Passthrough strategy.

use crate::strategy::{Compressed, Strategy};
use fb_core::Result;

pub const NAME: &str = "none";

#[derive(Debug, Clone, Copy, Default)]
pub struct NoneStrategy;

impl NoneStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for NoneStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn can_compress(&self, _content: &[u8]) -> bool {
        true
    }

    fn estimate_ratio(&self, _content: &[u8]) -> f64 {
        1.0
    }

    fn compress(&self, content: &[u8]) -> Result<Compressed> {
        Ok(Compressed::new(content.to_vec(), NAME.to_string()))
    }

    fn can_decompress(&self, metadata: &str) -> bool {
        metadata.is_empty() || metadata == NAME || metadata.starts_with("none:")
    }

    fn decompress(&self, compressed: &[u8], _metadata: &str) -> Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}
