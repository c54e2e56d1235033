//! One compress/decompress call per bundle part, by name or auto-selected.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::none::{self, NoneStrategy};
use crate::strategy::Strategy;
use crate::registry::Registry;
use fb_core::{CompressionConfig, Result};

/// Strategy name that triggers auto-selection.
pub const AUTO: &str = "auto";

/// Outcome of compressing one bundle part.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionResult {
    pub strategy: String,
    #[serde(skip_serializing)]
    pub compressed: Vec<u8>,
    pub metadata: String,
    /// Actual compressed/original size.
    pub ratio: f64,
    pub original_len: usize,
}

impl CompressionResult {
    pub fn compressed_len(&self) -> usize {
        self.compressed.len()
    }

    pub fn reduction_pct(&self) -> f64 {
        (1.0 - self.ratio) * 100.0
    }
}

#[derive(Clone)]
pub struct Selector {
    registry: Arc<Registry>,
}

impl Selector {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn with_defaults(config: &CompressionConfig) -> Self {
        Self::new(Arc::new(Registry::with_defaults(config)))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Compress with the auto-selected strategy.
    pub fn compress(&self, content: &[u8]) -> Result<CompressionResult> {
        self.compress_with(content, AUTO)
    }

    /// Compress with `strategy_name`, or auto-select for `"auto"`. A result
    /// that does not shrink the content is replaced by a `none` passthrough,
    /// whether or not the registry holds a `none` strategy.
    pub fn compress_with(&self, content: &[u8], strategy_name: &str) -> Result<CompressionResult> {
        let strategy = if strategy_name == AUTO {
            let (strategy, estimate) = self.registry.select_best(content);
            if strategy.name() == none::NAME {
                info!("auto-selected none (no compression benefit detected)");
            } else {
                info!(
                    strategy = strategy.name(),
                    estimated_reduction_pct = (1.0 - estimate) * 100.0,
                    "auto-selected strategy"
                );
            }
            strategy
        } else {
            let strategy = self.registry.get(strategy_name)?;
            info!(strategy = strategy.name(), "using strategy");
            strategy
        };

        let out = strategy.compress(content)?;
        let ratio = if content.is_empty() {
            1.0
        } else {
            out.bytes.len() as f64 / content.len() as f64
        };

        if ratio >= 1.0 && strategy.name() != none::NAME {
            info!(strategy = strategy.name(), "no size reduction, falling back to none");
            return Ok(CompressionResult {
                strategy: none::NAME.to_string(),
                compressed: content.to_vec(),
                metadata: none::NAME.to_string(),
                ratio: 1.0,
                original_len: content.len(),
            });
        }

        Ok(CompressionResult {
            strategy: strategy.name().to_string(),
            compressed: out.bytes,
            metadata: out.metadata,
            ratio,
            original_len: content.len(),
        })
    }

    /// Decompress with whichever registered strategy claims `metadata`.
    /// Passthrough metadata decodes even when no `none` is registered.
    pub fn decompress(&self, compressed: &[u8], metadata: &str) -> Result<Vec<u8>> {
        match self.registry.find_decompressor(metadata) {
            Ok(strategy) => strategy.decompress(compressed, metadata),
            Err(err) => {
                let passthrough = NoneStrategy::new();
                if passthrough.can_decompress(metadata) {
                    passthrough.decompress(compressed, metadata)
                } else {
                    Err(err)
                }
            }
        }
    }
}
