use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tunables for every compression strategy plus auto-selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub selection: SelectionConfig,
    pub dictionary: DictionaryConfig,
    pub template: TemplateConfig,
    pub delta: DeltaConfig,
}

impl CompressionConfig {
    /// Parse a (possibly partial) JSON config; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// `auto` only adopts a strategy whose estimated ratio is below this.
    pub auto_threshold: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { auto_threshold: 0.9 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    pub min_pattern_length: usize,
    pub max_pattern_length: usize,
    pub min_occurrences: usize,
    pub min_content_len: usize,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            min_pattern_length: 20,
            max_pattern_length: 100,
            min_occurrences: 3,
            min_content_len: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Shorter lines are never templated.
    pub min_line_len: usize,
    pub min_instances: usize,
    /// How far ahead (in chars) the line differ searches to resynchronize.
    pub lookahead: usize,
    /// Length of the matching run that counts as resynchronized.
    pub anchor_len: usize,
    pub min_content_len: usize,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            min_line_len: 20,
            min_instances: 3,
            lookahead: 50,
            anchor_len: 5,
            min_content_len: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaConfig {
    pub min_similarity: f64,
    /// A delta is only used when its estimated size is below this fraction of the raw file.
    pub max_delta_fraction: f64,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.5,
            max_delta_fraction: 0.8,
        }
    }
}
