//! Delta strategy — near-duplicate files → edit scripts against an earlier file.
//!
//! Payload layout: a `===DELTA_START===` … `===DELTA_END===` record block
//! (one record per content block, in order) followed by the bundle skeleton,
//! i.e. the original text with every content block's lines cut out.

use tracing::debug;

use crate::envelope::{take_section, LineCursor};
use crate::strategy::{as_text, clamped_ratio, metadata, require_detail, Compressed, Strategy};
use fb_core::config::DeltaConfig;
use fb_core::markers::{content_spans, ContentSpan};
use fb_core::{CompressionError, Result};

pub const NAME: &str = "delta";
pub const DELTA_START: &str = "===DELTA_START===\n";
pub const DELTA_END: &str = "===DELTA_END===\n";

const RECORD_END: &str = "---";
const TEXT_PREFIX: char = '>';
const ESCAPE: char = '\\';

/// One edit step. `line` is the base cursor position the step applies at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOp {
    Keep { line: usize, count: usize },
    Add { line: usize, text: Vec<String> },
    Remove { line: usize, count: usize },
    Replace { line: usize, count: usize, text: Vec<String> },
}

/// A file's content block as extracted from the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUnit {
    pub path: String,
    pub lines: Vec<String>,
}

impl FileUnit {
    fn raw_size(&self) -> usize {
        self.lines.iter().map(|l| l.len() + 1).sum()
    }
}

/// Content blocks of `text`, in order.
pub fn extract_units(text: &str) -> Vec<FileUnit> {
    let lines: Vec<&str> = text.split('\n').collect();
    units_from_spans(&lines, &content_spans(&lines))
}

fn units_from_spans(lines: &[&str], spans: &[ContentSpan]) -> Vec<FileUnit> {
    spans
        .iter()
        .map(|s| FileUnit {
            path: s.path.clone(),
            lines: lines[s.start..s.end].iter().map(|l| l.to_string()).collect(),
        })
        .collect()
}

/// Fraction of lockstep positions where both sequences agree.
pub fn similarity(base: &[String], target: &[String]) -> f64 {
    let longest = base.len().max(target.len());
    if longest == 0 {
        return 0.0;
    }
    let matched = base.iter().zip(target).filter(|(a, b)| a == b).count();
    matched as f64 / longest as f64
}

/// Greedy lockstep diff: runs of equal lines become `Keep`, each mismatched
/// line a single-line `Replace`, and whatever is left over in the longer
/// sequence one trailing `Add` or `Remove`.
pub fn diff_lines(base: &[String], target: &[String]) -> Vec<DeltaOp> {
    let common = base.len().min(target.len());
    let mut ops = Vec::new();
    let mut i = 0;
    while i < common {
        let start = i;
        while i < common && base[i] == target[i] {
            i += 1;
        }
        if i > start {
            ops.push(DeltaOp::Keep { line: start, count: i - start });
        }
        if i < common {
            ops.push(DeltaOp::Replace {
                line: i,
                count: 1,
                text: vec![target[i].clone()],
            });
            i += 1;
        }
    }
    if target.len() > common {
        ops.push(DeltaOp::Add {
            line: common,
            text: target[common..].to_vec(),
        });
    } else if base.len() > common {
        ops.push(DeltaOp::Remove {
            line: common,
            count: base.len() - common,
        });
    }
    ops
}

/// Replay `ops` over `base`. Base lines not consumed by any op are appended.
pub fn apply_ops(base: &[String], ops: &[DeltaOp]) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(base.len());
    let mut cursor = 0;
    let consume = |cursor: &mut usize, count: usize| -> Result<std::ops::Range<usize>> {
        let end = *cursor + count;
        if end > base.len() {
            return Err(CompressionError::malformed(format!(
                "delta op consumes past end of base ({end} > {})",
                base.len()
            )));
        }
        let range = *cursor..end;
        *cursor = end;
        Ok(range)
    };
    for op in ops {
        match op {
            DeltaOp::Keep { count, .. } => {
                let range = consume(&mut cursor, *count)?;
                out.extend_from_slice(&base[range]);
            }
            DeltaOp::Add { text, .. } => out.extend(text.iter().cloned()),
            DeltaOp::Remove { count, .. } => {
                consume(&mut cursor, *count)?;
            }
            DeltaOp::Replace { count, text, .. } => {
                consume(&mut cursor, *count)?;
                out.extend(text.iter().cloned());
            }
        }
    }
    out.extend_from_slice(&base[cursor..]);
    Ok(out)
}

fn estimated_size(ops: &[DeltaOp]) -> usize {
    let text_cost = |text: &[String]| text.iter().map(|l| l.len() + 2).sum::<usize>();
    ops.iter()
        .map(|op| match op {
            DeltaOp::Keep { .. } | DeltaOp::Remove { .. } => 10,
            DeltaOp::Add { text, .. } => 5 + text_cost(text),
            DeltaOp::Replace { text, .. } => 10 + text_cost(text),
        })
        .sum()
}

/// How a unit is stored: verbatim, or as ops against an earlier unit.
enum Record {
    File,
    Delta { base: usize, ops: Vec<DeltaOp> },
}

#[derive(Debug, Clone, Default)]
pub struct DeltaStrategy {
    config: DeltaConfig,
}

impl DeltaStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DeltaConfig) -> Self {
        Self { config }
    }

    /// Most similar eligible earlier unit for `units[i]`. Only the latest
    /// unit with a given path is eligible, so `BASE:<path>` stays unambiguous.
    fn best_base(&self, units: &[FileUnit], i: usize) -> Option<usize> {
        let target = &units[i];
        let mut best: Option<(usize, f64)> = None;
        for j in 0..i {
            let shadowed = units[j + 1..i].iter().any(|u| u.path == units[j].path);
            if shadowed {
                continue;
            }
            let sim = similarity(&units[j].lines, &target.lines);
            if sim >= self.config.min_similarity && best.map_or(true, |(_, s)| sim > s) {
                best = Some((j, sim));
            }
        }
        best.map(|(j, _)| j)
    }

    fn plan(&self, units: &[FileUnit]) -> Vec<Record> {
        (0..units.len())
            .map(|i| {
                let Some(base) = self.best_base(units, i) else {
                    return Record::File;
                };
                let ops = diff_lines(&units[base].lines, &units[i].lines);
                let limit = units[i].raw_size() as f64 * self.config.max_delta_fraction;
                if ops.is_empty() || estimated_size(&ops) as f64 >= limit {
                    return Record::File;
                }
                Record::Delta { base, ops }
            })
            .collect()
    }
}

/// Raw lines that would read as a record terminator, the block end marker or
/// an escaped line.
fn needs_escape(line: &str) -> bool {
    line == RECORD_END || line == DELTA_END.trim_end_matches('\n') || line.starts_with(ESCAPE)
}

fn write_file_record(out: &mut String, unit: &FileUnit) {
    out.push_str("FILE:");
    out.push_str(&unit.path);
    out.push('\n');
    for line in &unit.lines {
        if needs_escape(line) {
            out.push(ESCAPE);
        }
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(RECORD_END);
    out.push('\n');
}

fn write_text(out: &mut String, text: &[String]) {
    for line in text {
        out.push(TEXT_PREFIX);
        out.push_str(line);
        out.push('\n');
    }
}

fn write_delta_record(out: &mut String, base: &str, target: &str, ops: &[DeltaOp]) {
    out.push_str(&format!("BASE:{base}\nTARGET:{target}\n"));
    for op in ops {
        match op {
            DeltaOp::Keep { line, count } => out.push_str(&format!("K{line},{count}\n")),
            DeltaOp::Add { line, text } => {
                out.push_str(&format!("A{line}\n"));
                write_text(out, text);
            }
            DeltaOp::Remove { line, count } => out.push_str(&format!("R{line},{count}\n")),
            DeltaOp::Replace { line, count, text } => {
                out.push_str(&format!("C{line},{count}\n"));
                write_text(out, text);
            }
        }
    }
    out.push_str(RECORD_END);
    out.push('\n');
}

fn parse_number(s: &str) -> Result<usize> {
    s.parse()
        .map_err(|_| CompressionError::malformed(format!("invalid number in delta op: {s:?}")))
}

fn parse_pair(s: &str) -> Result<(usize, usize)> {
    let (line, count) = s
        .split_once(',')
        .ok_or_else(|| CompressionError::malformed(format!("expected <line>,<count>, got {s:?}")))?;
    Ok((parse_number(line)?, parse_number(count)?))
}

fn read_text(cursor: &mut LineCursor<'_>) -> Vec<String> {
    let mut text = Vec::new();
    while let Some(line) = cursor.peek().and_then(|l| l.strip_prefix(TEXT_PREFIX)) {
        text.push(line.to_string());
        cursor.next_line();
    }
    text
}

fn parse_ops(cursor: &mut LineCursor<'_>) -> Result<Vec<DeltaOp>> {
    let mut ops = Vec::new();
    loop {
        let line = cursor.expect_line("delta op or record end")?;
        if line == RECORD_END {
            return Ok(ops);
        }
        let mut chars = line.chars();
        let tag = chars.next();
        let rest = chars.as_str();
        let op = match tag {
            Some('K') => {
                let (line, count) = parse_pair(rest)?;
                DeltaOp::Keep { line, count }
            }
            Some('R') => {
                let (line, count) = parse_pair(rest)?;
                DeltaOp::Remove { line, count }
            }
            Some('A') => {
                let line = parse_number(rest)?;
                DeltaOp::Add { line, text: read_text(cursor) }
            }
            Some('C') => {
                let (line, count) = parse_pair(rest)?;
                DeltaOp::Replace { line, count, text: read_text(cursor) }
            }
            _ => return Err(CompressionError::malformed(format!("unknown delta op: {line:?}"))),
        };
        ops.push(op);
    }
}

fn parse_file_lines(cursor: &mut LineCursor<'_>) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    loop {
        let line = cursor.expect_line("file line or record end")?;
        if line == RECORD_END {
            return Ok(lines);
        }
        lines.push(line.strip_prefix(ESCAPE).unwrap_or(line).to_string());
    }
}

fn parse_records(section: &str) -> Result<Vec<FileUnit>> {
    let mut units: Vec<FileUnit> = Vec::new();
    let mut cursor = LineCursor::new(section);
    while let Some(line) = cursor.next_line() {
        if let Some(path) = line.strip_prefix("FILE:") {
            let lines = parse_file_lines(&mut cursor)?;
            units.push(FileUnit { path: path.to_string(), lines });
        } else if let Some(base_path) = line.strip_prefix("BASE:") {
            let target = cursor.expect_line("TARGET line")?;
            let path = target
                .strip_prefix("TARGET:")
                .ok_or_else(|| CompressionError::malformed(format!("expected TARGET line, got {target:?}")))?;
            let ops = parse_ops(&mut cursor)?;
            let base = units
                .iter()
                .rev()
                .find(|u| u.path == base_path)
                .ok_or_else(|| CompressionError::malformed(format!("delta base not found: {base_path}")))?;
            let lines = apply_ops(&base.lines, &ops)?;
            units.push(FileUnit { path: path.to_string(), lines });
        } else {
            return Err(CompressionError::malformed(format!("unexpected delta record line: {line:?}")));
        }
    }
    Ok(units)
}

impl Strategy for DeltaStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn can_compress(&self, content: &[u8]) -> bool {
        as_text(content).is_some_and(|text| {
            let lines: Vec<&str> = text.split('\n').collect();
            content_spans(&lines).len() >= 2
        })
    }

    fn estimate_ratio(&self, content: &[u8]) -> f64 {
        let Some(text) = as_text(content) else {
            return 1.0;
        };
        let units = extract_units(text);
        if units.len() < 2 {
            return 1.0;
        }
        let savings: usize = self
            .plan(&units)
            .iter()
            .zip(&units)
            .map(|(record, unit)| match record {
                Record::File => 0,
                Record::Delta { ops, .. } => unit.raw_size().saturating_sub(estimated_size(ops)),
            })
            .sum();
        let overhead = DELTA_START.len() + DELTA_END.len() + units.len() * 16;
        if savings <= overhead {
            return 1.0;
        }
        clamped_ratio(text.len().saturating_sub(savings) + overhead, text.len())
    }

    fn compress(&self, content: &[u8]) -> Result<Compressed> {
        let Some(text) = as_text(content) else {
            return Ok(Compressed::passthrough(NAME, content));
        };
        let lines: Vec<&str> = text.split('\n').collect();
        let spans = content_spans(&lines);
        let units = units_from_spans(&lines, &spans);
        let plan = self.plan(&units);
        let deltas = plan.iter().filter(|r| matches!(r, Record::Delta { .. })).count();
        if deltas == 0 {
            debug!(files = units.len(), "delta: no similar files, passing through");
            return Ok(Compressed::passthrough(NAME, content));
        }

        let mut out = String::with_capacity(text.len());
        out.push_str(DELTA_START);
        for (unit, record) in units.iter().zip(&plan) {
            match record {
                Record::File => write_file_record(&mut out, unit),
                Record::Delta { base, ops } => write_delta_record(&mut out, &units[*base].path, &unit.path, ops),
            }
        }
        out.push_str(DELTA_END);

        let mut skeleton: Vec<&str> = Vec::with_capacity(lines.len());
        let mut next = 0;
        for span in &spans {
            skeleton.extend_from_slice(&lines[next..span.start]);
            next = span.end;
        }
        skeleton.extend_from_slice(&lines[next..]);
        out.push_str(&skeleton.join("\n"));

        if out.len() >= content.len() {
            debug!(deltas, "delta: no net savings, passing through");
            return Ok(Compressed::passthrough(NAME, content));
        }
        debug!(files = units.len(), deltas, before = content.len(), after = out.len(), "delta: compressed");
        Ok(Compressed::new(out.into_bytes(), metadata(NAME, deltas)))
    }

    fn decompress(&self, compressed: &[u8], metadata: &str) -> Result<Vec<u8>> {
        if require_detail(metadata)? == 0 {
            return Ok(compressed.to_vec());
        }
        let text = std::str::from_utf8(compressed)
            .map_err(|_| CompressionError::malformed("delta payload is not UTF-8"))?;
        let (section, skeleton) = take_section(text, DELTA_START, DELTA_END)?;
        let units = parse_records(section)?;

        let skeleton: Vec<&str> = skeleton.split('\n').collect();
        let spans = content_spans(&skeleton);
        if spans.len() != units.len() {
            return Err(CompressionError::malformed(format!(
                "skeleton has {} content blocks, records describe {}",
                spans.len(),
                units.len()
            )));
        }

        let mut out: Vec<&str> = Vec::with_capacity(skeleton.len());
        let mut next = 0;
        for (span, unit) in spans.iter().zip(&units) {
            if span.path != unit.path || !span.is_empty() {
                return Err(CompressionError::malformed(format!(
                    "skeleton block {:?} does not match record {:?}",
                    span.path, unit.path
                )));
            }
            out.extend_from_slice(&skeleton[next..span.start]);
            out.extend(unit.lines.iter().map(String::as_str));
            next = span.start;
        }
        out.extend_from_slice(&skeleton[next..]);
        Ok(out.join("\n").into_bytes())
    }
}
