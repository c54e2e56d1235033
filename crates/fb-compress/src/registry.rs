//! Name → strategy table shared by every selector.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::strategy::Strategy;
use crate::{none, CombinedStrategy, DeltaStrategy, DictionaryStrategy, NoneStrategy, TemplateStrategy};
use fb_core::config::SelectionConfig;
use fb_core::{CompressionConfig, CompressionError, Result};

/// Thread-safe strategy registry. Names iterate in sorted order, so
/// selection ties and decompressor lookup are deterministic.
pub struct Registry {
    strategies: RwLock<BTreeMap<String, Arc<dyn Strategy>>>,
    selection_threshold: f64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry with the default auto-selection threshold.
    pub fn new() -> Self {
        Self::with_threshold(SelectionConfig::default().auto_threshold)
    }

    pub fn with_threshold(selection_threshold: f64) -> Self {
        Self {
            strategies: RwLock::new(BTreeMap::new()),
            selection_threshold,
        }
    }

    /// `none`, `dictionary`, `template`, `delta` and `template+delta`,
    /// each configured from `config`.
    pub fn with_defaults(config: &CompressionConfig) -> Self {
        let registry = Self::with_threshold(config.selection.auto_threshold);
        let defaults: Vec<Arc<dyn Strategy>> = vec![
            Arc::new(NoneStrategy::new()),
            Arc::new(DictionaryStrategy::with_config(config.dictionary.clone())),
            Arc::new(TemplateStrategy::with_config(config.template.clone())),
            Arc::new(DeltaStrategy::with_config(config.delta.clone())),
            Arc::new(CombinedStrategy::template_delta(config)),
        ];
        {
            let mut map = registry.strategies.write();
            for strategy in defaults {
                map.insert(strategy.name().to_string(), strategy);
            }
        }
        registry
    }

    /// Ratio a candidate must undercut to beat `none` in [`Self::select_best`].
    pub fn selection_threshold(&self) -> f64 {
        self.selection_threshold
    }

    pub fn register(&self, strategy: Arc<dyn Strategy>) -> Result<()> {
        let mut map = self.strategies.write();
        let name = strategy.name().to_string();
        if map.contains_key(&name) {
            return Err(CompressionError::StrategyAlreadyRegistered(name));
        }
        map.insert(name, strategy);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Strategy>> {
        let map = self.strategies.read();
        map.get(name).cloned().ok_or_else(|| CompressionError::StrategyNotFound {
            name: name.to_string(),
            available: map.keys().cloned().collect(),
        })
    }

    pub fn list(&self) -> Vec<String> {
        self.strategies.read().keys().cloned().collect()
    }

    /// Lowest estimated ratio among strategies that accept `content`, with
    /// `none` (ratio `1.0`) as the baseline. A candidate must beat both the
    /// current best and the selection threshold. The baseline is the built-in
    /// passthrough when no `none` is registered, so selection cannot fail.
    pub fn select_best(&self, content: &[u8]) -> (Arc<dyn Strategy>, f64) {
        let map = self.strategies.read();
        let mut best: Arc<dyn Strategy> = match map.get(none::NAME) {
            Some(s) => Arc::clone(s),
            None => Arc::new(NoneStrategy::new()),
        };
        let mut best_ratio = 1.0;

        for (name, strategy) in map.iter() {
            if name == none::NAME || !strategy.can_compress(content) {
                continue;
            }
            let ratio = strategy.estimate_ratio(content);
            debug!(strategy = %name, ratio, "estimated ratio");
            if ratio < best_ratio && ratio < self.selection_threshold {
                best = Arc::clone(strategy);
                best_ratio = ratio;
            }
        }

        (best, best_ratio)
    }

    /// First strategy, in name order, that claims `metadata`.
    pub fn find_decompressor(&self, metadata: &str) -> Result<Arc<dyn Strategy>> {
        let map = self.strategies.read();
        map.values()
            .find(|s| s.can_decompress(metadata))
            .cloned()
            .ok_or_else(|| CompressionError::StrategyNotFound {
                name: metadata.split(':').next().unwrap_or(metadata).to_string(),
                available: map.keys().cloned().collect(),
            })
    }
}
