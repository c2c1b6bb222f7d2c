//! Minimal CSS handling: inline declarations, lengths, and stylesheet rules
//!
//! This is not a CSS engine. It understands what the export needs: splitting
//! `style` attributes, simple rule blocks from theme and math stylesheets,
//! and `@font-face` blocks.

use std::collections::HashSet;

/// One `property: value` pair
pub type Declaration = (String, String);

/// A plain style rule: selector list and its declarations
#[derive(Debug, Clone, PartialEq)]
pub struct CssRule {
    pub selector: String,
    pub declarations: Vec<Declaration>,
}

/// An `@font-face` block together with the family it declares
#[derive(Debug, Clone, PartialEq)]
pub struct FontFaceRule {
    pub family: String,
    pub css_text: String,
}

/// Split `s` on `separator` outside of quotes and parentheses
fn split_top_level(s: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (idx, ch) in s.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                c if c == separator && depth == 0 => {
                    parts.push(&s[start..idx]);
                    start = idx + ch.len_utf8();
                }
                _ => {}
            },
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Parse a `style` attribute or a rule body into declarations
///
/// Property names are lowercased; later duplicates replace earlier ones but keep
/// the position of the first occurrence.
#[must_use]
pub fn parse_declarations(style: &str) -> Vec<Declaration> {
    let mut declarations: Vec<Declaration> = Vec::new();

    for part in split_top_level(style, ';') {
        let Some((name, value)) = part.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            continue;
        }
        match declarations.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value.to_string(),
            None => declarations.push((name, value.to_string())),
        }
    }

    declarations
}

#[must_use]
pub fn serialize_declarations(declarations: &[Declaration]) -> String {
    declarations
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Merge computed declarations under inline ones
///
/// Inline declarations keep their order and values; properties only present in
/// `computed` are appended in computed order.
#[must_use]
pub fn merge_inline_first(inline: &[Declaration], computed: &[Declaration]) -> Vec<Declaration> {
    let mut merged = inline.to_vec();
    let present: HashSet<String> = inline.iter().map(|(n, _)| n.clone()).collect();
    for (name, value) in computed {
        if !present.contains(name) {
            merged.push((name.clone(), value.clone()));
        }
    }
    merged
}

/// Look up a property in a declaration list
#[must_use]
pub fn declaration<'a>(declarations: &'a [Declaration], name: &str) -> Option<&'a str> {
    declarations
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Convert a CSS length to pixels
///
/// Supports `px`, `em`, `rem`, `ex` (half an em), `pt`, `pc`, `in`, `cm`, `mm` and
/// bare numbers (treated as px, as SVG attributes are). Percentages and `auto`
/// have no intrinsic size and return `None`.
#[must_use]
pub fn parse_length_px(value: &str, font_size_px: f32) -> Option<f32> {
    let value = value.trim().to_ascii_lowercase();
    let split_at = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+' || c == 'e'))
        .unwrap_or(value.len());
    // "ex" and "em" start with 'e', which the number scan also accepts
    let (number, unit) = if value[..split_at].ends_with('e') && split_at < value.len() {
        value.split_at(split_at - 1)
    } else {
        value.split_at(split_at)
    };
    let number: f32 = number.parse().ok()?;
    if !number.is_finite() {
        return None;
    }

    let px = match unit.trim() {
        "" | "px" => number,
        "em" | "rem" => number * font_size_px,
        "ex" => number * font_size_px * 0.5,
        "pt" => number * 96.0 / 72.0,
        "pc" => number * 16.0,
        "in" => number * 96.0,
        "cm" => number * 96.0 / 2.54,
        "mm" => number * 96.0 / 25.4,
        _ => return None,
    };
    Some(px)
}

/// Strip `/* ... */` comments
#[must_use]
pub fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Top-level blocks of a stylesheet as `(prelude, body)` pairs
fn top_level_blocks(css: &str) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut prelude_start = 0;
    let mut body_start = 0;
    let mut quote: Option<char> = None;

    for (idx, ch) in css.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '{' => {
                    if depth == 0 {
                        body_start = idx + 1;
                    }
                    depth += 1;
                }
                '}' if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        let prelude = css[prelude_start..body_start - 1].trim().to_string();
                        let body = css[body_start..idx].to_string();
                        blocks.push((prelude, body));
                        prelude_start = idx + 1;
                    }
                }
                ';' if depth == 0 => {
                    // statement at-rules such as @import / @charset
                    prelude_start = idx + 1;
                }
                _ => {}
            },
        }
    }
    blocks
}

/// Plain style rules of a stylesheet, in source order
///
/// At-rules are skipped except `@media screen`/`@media all` whose inner rules
/// apply on screen.
#[must_use]
pub fn parse_rules(css: &str) -> Vec<CssRule> {
    let css = strip_comments(css);
    let mut rules = Vec::new();

    for (prelude, body) in top_level_blocks(&css) {
        if let Some(at_rule) = prelude.strip_prefix('@') {
            let lower = at_rule.to_ascii_lowercase();
            if lower.starts_with("media")
                && (lower.contains("screen") || lower.contains("all"))
                && !lower.contains("print")
            {
                rules.extend(parse_rules(&body));
            }
            continue;
        }
        if prelude.is_empty() {
            continue;
        }
        rules.push(CssRule {
            selector: prelude,
            declarations: parse_declarations(&body),
        });
    }

    rules
}

/// Normalize a `font-family` value to its first family name, unquoted and lowercased
#[must_use]
pub fn primary_family(value: &str) -> Option<String> {
    split_top_level(value, ',')
        .into_iter()
        .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_ascii_lowercase())
        .find(|f| !f.is_empty())
}

/// Every family named in a `font-family` value, normalized
#[must_use]
pub fn all_families(value: &str) -> Vec<String> {
    split_top_level(value, ',')
        .into_iter()
        .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_ascii_lowercase())
        .filter(|f| !f.is_empty())
        .collect()
}

/// `@font-face` blocks of a stylesheet
#[must_use]
pub fn parse_font_faces(css: &str) -> Vec<FontFaceRule> {
    let css = strip_comments(css);
    top_level_blocks(&css)
        .into_iter()
        .filter(|(prelude, _)| prelude.eq_ignore_ascii_case("@font-face"))
        .filter_map(|(_, body)| {
            let declarations = parse_declarations(&body);
            let family = declaration(&declarations, "font-family").and_then(primary_family)?;
            Some(FontFaceRule {
                family,
                css_text: format!("@font-face {{{}}}", body.trim()),
            })
        })
        .collect()
}

/// `url(...)` references inside a CSS value, unquoted
#[must_use]
pub fn url_references(value: &str) -> Vec<String> {
    let mut urls = Vec::new();
    let mut rest = value;
    while let Some(start) = rest.find("url(") {
        let after = &rest[start + 4..];
        let Some(end) = after.find(')') else {
            break;
        };
        let inner = after[..end].trim().trim_matches(|c| c == '"' || c == '\'');
        if !inner.is_empty() {
            urls.push(inner.to_string());
        }
        rest = &after[end + 1..];
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_declarations_keeps_data_uri_intact() {
        let decls = parse_declarations(
            "color: red; background: url(\"data:image/png;base64,AAAA\"); COLOR: blue",
        );
        assert_eq!(
            decls,
            vec![
                ("color".to_string(), "blue".to_string()),
                (
                    "background".to_string(),
                    "url(\"data:image/png;base64,AAAA\")".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_merge_inline_first_is_stable() {
        let inline = parse_declarations("color: red; margin: 0");
        let computed = parse_declarations("display: inline-block; color: black");
        let merged = merge_inline_first(&inline, &computed);
        assert_eq!(
            serialize_declarations(&merged),
            "color: red; margin: 0; display: inline-block"
        );
        let again = merge_inline_first(&merged, &computed);
        assert_eq!(again, merged);
    }

    #[test]
    fn test_parse_length_units() {
        assert_eq!(parse_length_px("12px", 16.0), Some(12.0));
        assert_eq!(parse_length_px("2em", 16.0), Some(32.0));
        assert_eq!(parse_length_px("2.5ex", 16.0), Some(20.0));
        assert_eq!(parse_length_px("40", 16.0), Some(40.0));
        assert_eq!(parse_length_px("50%", 16.0), None);
        assert_eq!(parse_length_px("auto", 16.0), None);
    }

    #[test]
    fn test_parse_rules_skips_at_rules() {
        let css = r#"
            /* theme */
            @import url("x.css");
            .katex { font: normal 1.21em KaTeX_Main; }
            @font-face { font-family: "KaTeX_Main"; src: url(fonts/KaTeX_Main.woff2) format("woff2"); }
            @media print { .katex { display: none; } }
            @media screen { .mord { color: red; } }
        "#;
        let rules = parse_rules(css);
        let selectors: Vec<_> = rules.iter().map(|r| r.selector.as_str()).collect();
        assert_eq!(selectors, vec![".katex", ".mord"]);

        let faces = parse_font_faces(css);
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].family, "katex_main");
        assert_eq!(url_references(&faces[0].css_text), vec!["fonts/KaTeX_Main.woff2"]);
    }
}
