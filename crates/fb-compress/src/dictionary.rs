//! Dictionary strategy — repeated substrings → `«k»` references plus a lookup table.

use std::collections::HashMap;

use tracing::debug;

use crate::envelope::take_section;
use crate::strategy::{as_text, clamped_ratio, metadata, require_detail, Compressed, Strategy};
use fb_core::config::DictionaryConfig;
use fb_core::markers::RESERVED_FRAGMENTS;
use fb_core::{CompressionError, Result};

pub const NAME: &str = "dictionary";
pub const DICT_START: &str = "--- BEGIN DICTIONARY ---\n";
pub const DICT_END: &str = "--- END DICTIONARY ---\n";

const REF_OPEN: char = '«';
const REF_CLOSE: char = '»';
/// Byte cost of a typical short reference such as `«7»`, used for ranking.
const REF_COST: usize = 5;

/// Reference token for dictionary entry `k` (1-based).
pub fn token(k: usize) -> String {
    format!("{REF_OPEN}{k}{REF_CLOSE}")
}

/// A repeated substring and every position it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub text: String,
    pub occurrences: usize,
    pub positions: Vec<usize>,
}

impl Pattern {
    fn estimated_savings(&self) -> usize {
        self.text.len().saturating_sub(REF_COST) * self.occurrences
    }
}

/// A pattern that made it into the dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictEntry {
    pub token: String,
    pub text: String,
    pub savings: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DictionaryStrategy {
    config: DictionaryConfig,
}

impl DictionaryStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DictionaryConfig) -> Self {
        Self { config }
    }

    /// Repeated, non-overlapping substrings ranked by estimated savings.
    ///
    /// Every substring with a length in `[min_pattern_length, max_pattern_length]`
    /// is counted. Candidates that cross a newline, a reference delimiter or a
    /// reserved frame fragment are skipped, as are mostly-blank ones. Selection
    /// is first-fit: a candidate is dropped if any of its spans touches a span
    /// already claimed by a better-ranked one.
    pub fn find_patterns(&self, text: &str) -> Vec<Pattern> {
        let min = self.config.min_pattern_length.max(1);
        let max = self.config.max_pattern_length.max(min);
        if text.len() < min {
            return Vec::new();
        }

        let mut seen: HashMap<&str, Vec<usize>> = HashMap::new();
        for start in 0..=text.len() - min {
            if !text.is_char_boundary(start) {
                continue;
            }
            for len in min..=max {
                let end = start + len;
                if end > text.len() {
                    break;
                }
                if !text.is_char_boundary(end) {
                    continue;
                }
                let candidate = &text[start..end];
                // Longer candidates from the same start contain this one.
                if is_excluded(candidate) {
                    break;
                }
                if candidate.trim().len() < len / 2 {
                    continue;
                }
                seen.entry(candidate).or_default().push(start);
            }
        }

        let mut patterns: Vec<Pattern> = seen
            .into_iter()
            .filter(|(_, positions)| positions.len() >= self.config.min_occurrences)
            .map(|(text, positions)| Pattern {
                text: text.to_string(),
                occurrences: positions.len(),
                positions,
            })
            .collect();
        patterns.sort_by(|a, b| {
            b.estimated_savings()
                .cmp(&a.estimated_savings())
                .then_with(|| a.positions[0].cmp(&b.positions[0]))
                .then_with(|| b.text.len().cmp(&a.text.len()))
        });

        remove_overlaps(patterns, text.len())
    }

    /// Assign tokens in rank order, keeping only entries with positive net savings.
    pub fn build_dictionary(&self, patterns: &[Pattern]) -> Vec<DictEntry> {
        let mut entries = Vec::new();
        for p in patterns {
            let tok = token(entries.len() + 1);
            let entry_cost = tok.len() + 1 + p.text.len() + 1;
            let original = p.text.len() * p.occurrences;
            let encoded = entry_cost + tok.len() * p.occurrences;
            if original > encoded {
                entries.push(DictEntry {
                    token: tok,
                    text: p.text.clone(),
                    savings: original - encoded,
                });
            }
        }
        entries
    }
}

fn is_excluded(candidate: &str) -> bool {
    candidate.contains(['\n', REF_OPEN, REF_CLOSE])
        || RESERVED_FRAGMENTS.iter().any(|f| candidate.contains(*f))
}

fn remove_overlaps(patterns: Vec<Pattern>, text_len: usize) -> Vec<Pattern> {
    let mut used = vec![false; text_len];
    let mut kept = Vec::new();
    for p in patterns {
        let len = p.text.len();
        let overlaps = p.positions.iter().any(|&pos| used[pos..pos + len].iter().any(|&u| u));
        if overlaps {
            continue;
        }
        for &pos in &p.positions {
            used[pos..pos + len].iter_mut().for_each(|u| *u = true);
        }
        kept.push(p);
    }
    kept
}

fn has_reserved_delimiters(text: &str) -> bool {
    text.contains([REF_OPEN, REF_CLOSE])
}

impl Strategy for DictionaryStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn can_compress(&self, content: &[u8]) -> bool {
        match as_text(content) {
            Some(text) => text.len() > self.config.min_content_len && !has_reserved_delimiters(text),
            None => false,
        }
    }

    fn estimate_ratio(&self, content: &[u8]) -> f64 {
        let Some(text) = as_text(content).filter(|t| !has_reserved_delimiters(t)) else {
            return 1.0;
        };
        let entries = self.build_dictionary(&self.find_patterns(text));
        let savings: usize = entries.iter().map(|e| e.savings).sum();
        let overhead = DICT_START.len() + DICT_END.len();
        if savings <= overhead {
            return 1.0;
        }
        clamped_ratio(text.len().saturating_sub(savings) + overhead, text.len())
    }

    fn compress(&self, content: &[u8]) -> Result<Compressed> {
        let Some(text) = as_text(content) else {
            return Ok(Compressed::passthrough(NAME, content));
        };
        if has_reserved_delimiters(text) {
            debug!("dictionary: reference delimiters present in input, passing through");
            return Ok(Compressed::passthrough(NAME, content));
        }

        let entries = self.build_dictionary(&self.find_patterns(text));
        if entries.is_empty() {
            return Ok(Compressed::passthrough(NAME, content));
        }

        let mut body = text.to_string();
        for e in &entries {
            body = body.replace(&e.text, &e.token);
        }

        let mut out = String::with_capacity(body.len() + 64 * entries.len());
        out.push_str(DICT_START);
        for e in &entries {
            out.push_str(&e.token);
            out.push('=');
            out.push_str(&e.text);
            out.push('\n');
        }
        out.push_str(DICT_END);
        out.push_str(&body);

        if out.len() >= content.len() {
            debug!(entries = entries.len(), "dictionary: no net savings, passing through");
            return Ok(Compressed::passthrough(NAME, content));
        }
        debug!(entries = entries.len(), before = content.len(), after = out.len(), "dictionary: compressed");
        Ok(Compressed::new(out.into_bytes(), metadata(NAME, entries.len())))
    }

    fn decompress(&self, compressed: &[u8], metadata: &str) -> Result<Vec<u8>> {
        let expected = require_detail(metadata)?;
        if expected == 0 {
            return Ok(compressed.to_vec());
        }
        let text = std::str::from_utf8(compressed)
            .map_err(|_| CompressionError::malformed("dictionary payload is not UTF-8"))?;
        let (section, body) = take_section(text, DICT_START, DICT_END)?;

        let mut entries: Vec<(&str, &str)> = Vec::with_capacity(expected);
        for line in section.split('\n').filter(|l| !l.is_empty()) {
            let entry = line
                .split_once('=')
                .filter(|(tok, _)| tok.starts_with(REF_OPEN) && tok.ends_with(REF_CLOSE));
            match entry {
                Some(entry) => entries.push(entry),
                None => return Err(CompressionError::malformed(format!("invalid dictionary entry: {line}"))),
            }
        }
        if entries.len() != expected {
            return Err(CompressionError::malformed(format!(
                "dictionary has {} entries, metadata says {expected}",
                entries.len()
            )));
        }

        // Longest token first.
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        let mut out = body.to_string();
        for (tok, original) in entries {
            out = out.replace(tok, original);
        }
        Ok(out.into_bytes())
    }
}
