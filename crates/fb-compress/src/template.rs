//! Template strategy — near-duplicate lines → one parameterized pattern plus
//! `T<k>{v1,v2,..}` reference rows.
//!
//! Lines are grouped by a normalized shape (quoted strings, numbers and
//! identifiers masked). The first two lines of a group are diffed to find the
//! varying spans, which become `⦃name⦄` placeholders; every line of the group
//! is then validated against the resulting pattern.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::envelope::take_section;
use crate::strategy::{as_text, clamped_ratio, metadata, require_detail, Compressed, Strategy};
use fb_core::config::TemplateConfig;
use fb_core::markers::is_frame_line;
use fb_core::{CompressionError, Result};

pub const NAME: &str = "template";
pub const TEMPLATES_START: &str = "===TEMPLATES_START===\n";
pub const TEMPLATES_END: &str = "===TEMPLATES_END===\n";

pub const PLACEHOLDER_OPEN: char = '⦃';
pub const PLACEHOLDER_CLOSE: char = '⦄';
const VALUE_SEPARATOR: char = ',';
const ESCAPE: char = '\\';

static RE_DOUBLE_QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""[^"]*""#).unwrap());
static RE_SINGLE_QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'[^']*'").unwrap());
static RE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d+\b").unwrap());
static RE_IDENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[a-zA-Z_]\w*\b").unwrap());
static RE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^T(\d+)\{(.*)\}$").unwrap());

/// A parameterized pattern and the places it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Text with `⦃name⦄` placeholders; may span several lines.
    pub pattern: String,
    /// Placeholder names in first-seen order, all distinct.
    pub params: Vec<String>,
    pub instances: Vec<TemplateInstance>,
}

/// One realization of a template: the line it starts on and one value per
/// parameter, in `params` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInstance {
    pub line: usize,
    pub values: Vec<String>,
}

impl Template {
    pub fn occurrences(&self) -> usize {
        self.instances.len()
    }

    /// Number of lines one instance covers.
    pub fn height(&self) -> usize {
        self.pattern.split('\n').count()
    }

    fn raw_bytes(&self, lines: &[&str]) -> usize {
        let height = self.height();
        self.instances
            .iter()
            .filter(|inst| inst.line + height <= lines.len())
            .map(|inst| {
                let span = &lines[inst.line..inst.line + height];
                span.iter().map(|l| l.len()).sum::<usize>() + height - 1
            })
            .sum()
    }
}

/// A template that earned a token.
struct Selected<'a> {
    token: String,
    template: &'a Template,
    encoded: String,
    savings: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateStrategy {
    config: TemplateConfig,
}

impl TemplateStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TemplateConfig) -> Self {
        Self { config }
    }

    /// Discover single-line templates, best savings first.
    pub fn find_templates(&self, lines: &[&str]) -> Vec<Template> {
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, line) in lines.iter().enumerate() {
            if line.len() < self.config.min_line_len
                || is_frame_line(line)
                || line.contains([PLACEHOLDER_OPEN, PLACEHOLDER_CLOSE])
            {
                continue;
            }
            groups.entry(normalize(line)).or_default().push(i);
        }

        let min_instances = self.config.min_instances.max(2);
        let mut groups: Vec<Vec<usize>> = groups.into_values().filter(|g| g.len() >= min_instances).collect();
        groups.sort_by_key(|g| g[0]);

        let mut templates: Vec<Template> = groups
            .iter()
            .filter_map(|group| self.extract_template(lines, group))
            .collect();
        templates.sort_by(|a, b| {
            let sa = a.raw_bytes(lines).saturating_sub(a.pattern.len());
            let sb = b.raw_bytes(lines).saturating_sub(b.pattern.len());
            sb.cmp(&sa).then_with(|| {
                let first = |t: &Template| t.instances.first().map(|i| i.line);
                first(a).cmp(&first(b))
            })
        });
        templates
    }

    fn extract_template(&self, lines: &[&str], group: &[usize]) -> Option<Template> {
        let (pattern, params) = self.find_differences(lines[group[0]], lines[group[1]])?;
        if params.is_empty() {
            return None;
        }
        let re = matcher(&pattern)?;

        let instances: Vec<TemplateInstance> = group
            .iter()
            .filter_map(|&line| {
                let caps = re.captures(lines[line])?;
                let values: Vec<String> = caps
                    .iter()
                    .skip(1)
                    .map(|m| m.map_or("", |m| m.as_str()).to_string())
                    .collect();
                if values.iter().any(|v| v.contains(VALUE_SEPARATOR)) {
                    return None;
                }
                Some(TemplateInstance { line, values })
            })
            .collect();

        if instances.len() < self.config.min_instances {
            return None;
        }
        Some(Template { pattern, params, instances })
    }

    /// Diff two lines into a pattern with placeholders where they differ.
    ///
    /// On a mismatch the differ looks up to `lookahead` chars ahead in both
    /// lines for a position where an `anchor_len`-char run matches again (or
    /// either line is about to end). Everything skipped becomes a parameter.
    /// Returns `None` when no resynchronization point exists.
    pub fn find_differences(&self, first: &str, second: &str) -> Option<(String, Vec<String>)> {
        let a: Vec<char> = first.chars().collect();
        let b: Vec<char> = second.chars().collect();
        let mut pattern = String::with_capacity(first.len());
        let mut params: Vec<String> = Vec::new();

        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            if a[i] == b[j] {
                pattern.push(a[i]);
                i += 1;
                j += 1;
                continue;
            }
            let (end_a, end_b) = self.resync(&a, &b, i, j)?;
            let va: String = a[i..end_a].iter().collect();
            let vb: String = b[j..end_b].iter().collect();
            let name = unique_name(param_name(&va, &vb), &params);
            pattern.push(PLACEHOLDER_OPEN);
            pattern.push_str(&name);
            pattern.push(PLACEHOLDER_CLOSE);
            params.push(name);
            i = end_a;
            j = end_b;
        }
        pattern.extend(&a[i..]);
        Some((pattern, params))
    }

    fn resync(&self, a: &[char], b: &[char], i: usize, j: usize) -> Option<(usize, usize)> {
        let window = self.config.lookahead;
        let anchor = self.config.anchor_len;
        for k in 1..window {
            let ia = i + k;
            if ia >= a.len() {
                break;
            }
            for l in 1..window {
                let jb = j + l;
                if jb >= b.len() {
                    break;
                }
                if a[ia] != b[jb] {
                    continue;
                }
                let near_end = ia + anchor >= a.len() || jb + anchor >= b.len();
                if near_end || a[ia..ia + anchor] == b[jb..jb + anchor] {
                    return Some((ia, jb));
                }
            }
        }
        None
    }

    /// Encode `text` with the given templates. Templates that do not pay for
    /// themselves are dropped; instances are spliced out only where the
    /// expanded pattern matches the original lines exactly.
    pub fn apply_templates(&self, content: &[u8], templates: &[Template]) -> Result<Compressed> {
        let Some(text) = as_text(content) else {
            return Ok(Compressed::passthrough(NAME, content));
        };
        let lines: Vec<&str> = text.split('\n').collect();
        let selected = select(templates, &lines);
        if selected.is_empty() {
            return Ok(Compressed::passthrough(NAME, content));
        }

        let body = render(&lines, &selected);
        let mut out = String::with_capacity(text.len());
        out.push_str(TEMPLATES_START);
        for sel in &selected {
            out.push_str(&sel.token);
            out.push('=');
            out.push_str(&sel.encoded);
            out.push('\n');
        }
        out.push_str(TEMPLATES_END);
        out.push('\n');
        out.push_str(&body.join("\n"));

        if out.len() >= content.len() {
            debug!(templates = selected.len(), "template: no net savings, passing through");
            return Ok(Compressed::passthrough(NAME, content));
        }
        debug!(templates = selected.len(), before = content.len(), after = out.len(), "template: compressed");
        Ok(Compressed::new(out.into_bytes(), metadata(NAME, selected.len())))
    }
}

/// Mask quoted strings, numbers and identifiers so similar lines collide.
pub fn normalize(line: &str) -> String {
    let s = RE_DOUBLE_QUOTED.replace_all(line, "\"?\"").into_owned();
    let s = RE_SINGLE_QUOTED.replace_all(&s, "'?'").into_owned();
    let s = RE_NUMBER.replace_all(&s, "?").into_owned();
    RE_IDENT.replace_all(&s, "?").into_owned()
}

fn param_name(first: &str, second: &str) -> &'static str {
    if first.contains('/') || second.contains('/') {
        "path"
    } else if !first.is_empty() && first.bytes().all(|c| c.is_ascii_digit()) {
        "number"
    } else if first.starts_with(['\'', '"']) {
        "string"
    } else {
        "param"
    }
}

fn unique_name(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|t| t == base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Literal segments and placeholder names, in order; one more literal than names.
fn split_pattern(pattern: &str) -> Result<(Vec<&str>, Vec<&str>)> {
    let mut literals = Vec::new();
    let mut names = Vec::new();
    let mut rest = pattern;
    while let Some(open) = rest.find(PLACEHOLDER_OPEN) {
        let after = &rest[open + PLACEHOLDER_OPEN.len_utf8()..];
        let close = after
            .find(PLACEHOLDER_CLOSE)
            .ok_or_else(|| CompressionError::malformed(format!("unterminated placeholder in {pattern:?}")))?;
        literals.push(&rest[..open]);
        names.push(&after[..close]);
        rest = &after[close + PLACEHOLDER_CLOSE.len_utf8()..];
    }
    literals.push(rest);
    Ok((literals, names))
}

fn matcher(pattern: &str) -> Option<Regex> {
    let (literals, _) = split_pattern(pattern).ok()?;
    let mut re = String::from("^");
    for (idx, literal) in literals.iter().enumerate() {
        if idx > 0 {
            re.push_str("(.+?)");
        }
        re.push_str(&regex::escape(literal));
    }
    re.push('$');
    Regex::new(&re).ok()
}

/// Substitute `values` positionally into the placeholders of `pattern`.
pub fn expand_pattern<S: AsRef<str>>(token: &str, pattern: &str, values: &[S]) -> Result<String> {
    let (literals, names) = split_pattern(pattern)?;
    if names.len() != values.len() {
        return Err(CompressionError::DecodeMismatch {
            token: token.to_string(),
            expected: names.len(),
            got: values.len(),
        });
    }
    let mut out = String::with_capacity(pattern.len());
    for (idx, literal) in literals.iter().enumerate() {
        if idx > 0 {
            out.push_str(values[idx - 1].as_ref());
        }
        out.push_str(literal);
    }
    Ok(out)
}

fn reference_line<S: AsRef<str>>(token: &str, values: &[S]) -> String {
    let joined: Vec<&str> = values.iter().map(|v| v.as_ref()).collect();
    format!("{token}{{{}}}", joined.join(","))
}

fn encode_pattern(pattern: &str) -> String {
    pattern.replace('\\', "\\\\").replace('\n', "\\n")
}

fn decode_pattern(encoded: &str) -> Result<String> {
    let mut out = String::with_capacity(encoded.len());
    let mut chars = encoded.chars();
    while let Some(c) = chars.next() {
        if c != ESCAPE {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            other => {
                return Err(CompressionError::malformed(format!("bad escape {other:?} in template pattern")));
            }
        }
    }
    Ok(out)
}

fn escape_line(line: &str) -> Cow<'_, str> {
    if line.starts_with(ESCAPE) || RE_REFERENCE.is_match(line) {
        Cow::Owned(format!("{ESCAPE}{line}"))
    } else {
        Cow::Borrowed(line)
    }
}

fn is_token(s: &str) -> bool {
    s.strip_prefix('T')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|c| c.is_ascii_digit()))
}

fn select<'a>(templates: &'a [Template], lines: &[&str]) -> Vec<Selected<'a>> {
    let mut selected = Vec::new();
    for template in templates {
        let token = format!("T{}", selected.len() + 1);
        let encoded = encode_pattern(&template.pattern);
        let def_cost = token.len() + 1 + encoded.len() + 1;
        let ref_cost: usize = template
            .instances
            .iter()
            .map(|inst| reference_line(&token, &inst.values).len())
            .sum();
        let raw = template.raw_bytes(lines);
        if raw > def_cost + ref_cost {
            selected.push(Selected {
                token,
                template,
                encoded,
                savings: raw - def_cost - ref_cost,
            });
        }
    }
    selected
}

fn render<'l>(lines: &[&'l str], selected: &[Selected<'_>]) -> Vec<Cow<'l, str>> {
    let mut claimed = vec![false; lines.len()];
    let mut starts: HashMap<usize, (String, usize)> = HashMap::new();

    for sel in selected {
        let height = sel.template.height();
        for inst in &sel.template.instances {
            let end = inst.line + height;
            if end > lines.len() || claimed[inst.line..end].iter().any(|&c| c) {
                continue;
            }
            let Ok(expanded) = expand_pattern(&sel.token, &sel.template.pattern, &inst.values) else {
                continue;
            };
            if !expanded.split('\n').eq(lines[inst.line..end].iter().copied()) {
                continue;
            }
            claimed[inst.line..end].fill(true);
            starts.insert(inst.line, (reference_line(&sel.token, &inst.values), height));
        }
    }

    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if let Some((reference, height)) = starts.remove(&i) {
            out.push(Cow::Owned(reference));
            i += height;
        } else {
            out.push(escape_line(lines[i]));
            i += 1;
        }
    }
    out
}

impl Strategy for TemplateStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn can_compress(&self, content: &[u8]) -> bool {
        as_text(content).is_some_and(|text| text.len() > self.config.min_content_len)
    }

    fn estimate_ratio(&self, content: &[u8]) -> f64 {
        let Some(text) = as_text(content) else {
            return 1.0;
        };
        let lines: Vec<&str> = text.split('\n').collect();
        let templates = self.find_templates(&lines);
        let savings: usize = select(&templates, &lines).iter().map(|s| s.savings).sum();
        let overhead = TEMPLATES_START.len() + TEMPLATES_END.len() + 1;
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
        let templates = self.find_templates(&lines);
        if templates.is_empty() {
            return Ok(Compressed::passthrough(NAME, content));
        }
        self.apply_templates(content, &templates)
    }

    fn decompress(&self, compressed: &[u8], metadata: &str) -> Result<Vec<u8>> {
        let expected = require_detail(metadata)?;
        if expected == 0 {
            return Ok(compressed.to_vec());
        }
        let text = std::str::from_utf8(compressed)
            .map_err(|_| CompressionError::malformed("template payload is not UTF-8"))?;
        let (section, rest) = take_section(text, TEMPLATES_START, TEMPLATES_END)?;
        let body = rest
            .strip_prefix('\n')
            .ok_or_else(|| CompressionError::malformed("missing blank line after template table"))?;

        let mut defs: HashMap<&str, String> = HashMap::new();
        for line in section.split('\n').filter(|l| !l.is_empty()) {
            let (token, encoded) = line
                .split_once('=')
                .filter(|(token, _)| is_token(token))
                .ok_or_else(|| CompressionError::malformed(format!("invalid template entry: {line}")))?;
            defs.insert(token, decode_pattern(encoded)?);
        }
        if defs.len() != expected {
            return Err(CompressionError::malformed(format!(
                "template table has {} entries, metadata says {expected}",
                defs.len()
            )));
        }

        let mut out: Vec<Cow<'_, str>> = Vec::new();
        for line in body.split('\n') {
            if let Some(literal) = line.strip_prefix(ESCAPE) {
                out.push(Cow::Borrowed(literal));
                continue;
            }
            let Some(caps) = RE_REFERENCE.captures(line) else {
                out.push(Cow::Borrowed(line));
                continue;
            };
            let token = caps.get(1).map_or(line, |m| &line[..m.end()]);
            let pattern = defs
                .get(token)
                .ok_or_else(|| CompressionError::malformed(format!("unknown template reference {token}")))?;
            let values: Vec<&str> = caps
                .get(2)
                .map_or("", |m| m.as_str())
                .split(VALUE_SEPARATOR)
                .collect();
            match expand_pattern(token, pattern, &values) {
                Ok(expanded) => out.push(Cow::Owned(expanded)),
                Err(err @ CompressionError::DecodeMismatch { .. }) => {
                    warn!(%err, "template: leaving reference line unexpanded");
                    out.push(Cow::Borrowed(line));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(out.join("\n").into_bytes())
    }
}
