//! Formula source resolution
//!
//! A formula's source can come from the Markdown the preview was rendered
//! from, from attributes our wrappers carry, or from what the math engines
//! leave in the DOM (assistive MathML, KaTeX annotations).

use kuchiki::NodeRef;

use super::FormulaEncoding;
use crate::raster::wrapper;
use crate::utils::constants::{MML_SOURCE_ATTR, TEX_SOURCE_ATTR};
use crate::utils::dom;

/// A formula found in the Markdown source, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFormula {
    pub source: String,
    pub display: bool,
}

impl ExtractedFormula {
    pub fn new(source: impl Into<String>, display: bool) -> Self {
        Self {
            source: source.into(),
            display,
        }
    }
}

/// Outcome of source resolution for one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Source to hand to the renderer
    Source {
        text: String,
        encoding: FormulaEncoding,
        display: bool,
    },
    /// Vector markup already present in the node, used as-is
    Vector(String),
    /// Nothing usable
    Unresolved,
}

/// Resolve the source of candidate number `index`
///
/// `positional` is the caller's list in document order. When its length
/// matches `candidate_count` entries are taken by position. Otherwise the
/// list is out of step with the DOM, so the node's own sources are tried
/// first and an entry is taken only as a last resort, and only if its
/// display flag agrees with the candidate's.
#[must_use]
pub fn resolve_source(
    node: &NodeRef,
    index: usize,
    display: bool,
    positional: &[ExtractedFormula],
    candidate_count: usize,
) -> Resolution {
    let aligned = positional.len() == candidate_count;
    let entry = positional
        .get(index)
        .filter(|entry| !entry.source.trim().is_empty());
    let from_entry = |entry: &ExtractedFormula| Resolution::Source {
        text: entry.source.clone(),
        encoding: FormulaEncoding::Tex,
        display: entry.display,
    };

    if aligned && let Some(entry) = entry {
        return from_entry(entry);
    }

    match dom_source(node, display) {
        Resolution::Unresolved => entry
            .filter(|entry| entry.display == display)
            .map_or(Resolution::Unresolved, from_entry),
        resolved => resolved,
    }
}

/// Sources the node itself carries, in order of trust
fn dom_source(node: &NodeRef, display: bool) -> Resolution {
    let source = |text: String, encoding| Resolution::Source {
        text,
        encoding,
        display,
    };

    if let Some((text, encoding)) = attribute_source(node) {
        return source(text, encoding);
    }
    if let Some(math) = select_outer_html(node, "mjx-assistive-mml math") {
        return source(math, FormulaEncoding::Mml);
    }
    if let Ok(annotation) = node.select_first(r#"annotation[encoding="application/x-tex"]"#) {
        let tex = annotation.text_contents().trim().to_string();
        if !tex.is_empty() {
            return source(tex, FormulaEncoding::Tex);
        }
    }
    if let Some(math) = select_outer_html(node, ".katex-mathml math") {
        return source(math, FormulaEncoding::Mml);
    }
    if let Some(svg) = wrapper::standalone_svg(node) {
        return Resolution::Vector(svg);
    }
    if let Some(math) = select_outer_html(node, "math") {
        return source(math, FormulaEncoding::Mml);
    }

    Resolution::Unresolved
}

/// `data-tex` / `data-mml` on the node or its first descendant carrying one
fn attribute_source(node: &NodeRef) -> Option<(String, FormulaEncoding)> {
    node.inclusive_descendants().find_map(|n| {
        let attr = |name| dom::attr(&n, name).filter(|v| !v.trim().is_empty());
        attr(TEX_SOURCE_ATTR)
            .map(|tex| (tex, FormulaEncoding::Tex))
            .or_else(|| attr(MML_SOURCE_ATTR).map(|mml| (mml, FormulaEncoding::Mml)))
    })
}

fn select_outer_html(node: &NodeRef, selector: &str) -> Option<String> {
    let found = node.select_first(selector).ok()?;
    dom::outer_html(found.as_node()).ok()
}

/// Pull `$...$` and `$$...$$` formulas out of Markdown, in document order
///
/// Fenced code blocks, inline code spans and escaped dollars are skipped.
/// Display formulas may span lines, inline ones may not. An inline formula
/// opens on a `$` not followed by whitespace and closes on a `$` not preceded
/// by whitespace nor followed by a digit, so prices such as `$5 and $6` are
/// left alone.
#[must_use]
pub fn extract_formula_sources(markdown: &str) -> Vec<ExtractedFormula> {
    let text: Vec<char> = mask_code(markdown).chars().collect();
    let mut formulas = Vec::new();
    let mut i = 0;

    while i < text.len() {
        match text[i] {
            '\\' => i += 2,
            '$' if text.get(i + 1) == Some(&'$') => match find_display_end(&text, i + 2) {
                Some(end) => {
                    let source: String = text[i + 2..end].iter().collect();
                    let source = source.trim();
                    if !source.is_empty() {
                        formulas.push(ExtractedFormula::new(source, true));
                    }
                    i = end + 2;
                }
                None => i += 2,
            },
            '$' => match find_inline_end(&text, i + 1) {
                Some(end) => {
                    let source: String = text[i + 1..end].iter().collect();
                    formulas.push(ExtractedFormula::new(source, false));
                    i = end + 1;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }

    formulas
}

fn find_display_end(text: &[char], from: usize) -> Option<usize> {
    let mut j = from;
    while j + 1 < text.len() {
        match text[j] {
            '\\' => j += 2,
            '$' if text[j + 1] == '$' => return Some(j),
            _ => j += 1,
        }
    }
    None
}

fn find_inline_end(text: &[char], from: usize) -> Option<usize> {
    let first = *text.get(from)?;
    if first.is_whitespace() || first == '$' {
        return None;
    }

    let mut j = from;
    while j < text.len() {
        match text[j] {
            '\\' => j += 2,
            '\n' => return None,
            '$' => {
                let closes = !text[j - 1].is_whitespace()
                    && !text.get(j + 1).is_some_and(|c| c.is_ascii_digit());
                if closes {
                    return Some(j);
                }
                j += 1;
            }
            _ => j += 1,
        }
    }
    None
}

/// Blank out fenced code blocks and inline code spans, keeping line structure
fn mask_code(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut fence: Option<(char, usize)> = None;

    for line in markdown.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~');
        let run = marker.map_or(0, |m| trimmed.chars().take_while(|c| *c == m).count());

        match (fence, marker) {
            (None, Some(m)) if run >= 3 => {
                fence = Some((m, run));
                out.push('\n');
            }
            (Some((open, len)), Some(m))
                if m == open && run >= len && trimmed[run..].trim().is_empty() =>
            {
                fence = None;
                out.push('\n');
            }
            (Some(_), _) => {
                if line.ends_with('\n') {
                    out.push('\n');
                }
            }
            (None, _) => out.push_str(&mask_inline_code(line)),
        }
    }
    out
}

fn mask_inline_code(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '`' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let run = chars[i..].iter().take_while(|c| **c == '`').count();
        let close = (i + run..chars.len()).find(|&j| {
            chars[j..].iter().take_while(|c| **c == '`').count() == run
                && (j == 0 || chars[j - 1] != '`')
        });
        match close {
            Some(j) => {
                out.extend(std::iter::repeat_n(' ', j + run - i));
                i = j + run;
            }
            None => {
                out.extend(std::iter::repeat_n('`', run));
                i += run;
            }
        }
    }
    out
}
