//! SVG markup preparation: normalization, standalone extraction and
//! `foreignObject` wrappers

use std::fmt::Write;

use kuchiki::NodeRef;

use crate::utils::constants::{SVG_NAMESPACE, XHTML_NAMESPACE};
use crate::utils::dom;

const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

/// Reduce renderer or DOM output to a standalone SVG document
///
/// Everything outside the outermost `<svg>...</svg>` is dropped and the SVG
/// (and, when used, XLink) namespace declarations are added if missing.
/// Returns `None` when there is no `<svg` element in `markup`.
#[must_use]
pub fn normalize_svg(markup: &str) -> Option<String> {
    let lower = markup.to_ascii_lowercase();
    let start = lower.find("<svg")?;
    let open_end = start + lower[start..].find('>')?;

    let end = match lower.rfind("</svg>") {
        Some(close) if close > start => close + "</svg>".len(),
        _ if lower[..open_end].ends_with('/') => open_end + 1,
        _ => return None,
    };

    let svg = &markup[start..end];
    let open_tag = &svg[..open_end - start];
    let mut declarations = String::new();
    if !open_tag.contains("xmlns=") {
        let _ = write!(declarations, r#" xmlns="{SVG_NAMESPACE}""#);
    }
    if svg.contains("xlink:") && !open_tag.contains("xmlns:xlink") {
        let _ = write!(declarations, r#" xmlns:xlink="{XLINK_NAMESPACE}""#);
    }

    Some(format!("<svg{declarations}{}", &svg[4..]))
}

/// The first `<svg>` at or below `node`, if any
#[must_use]
pub fn find_svg(node: &NodeRef) -> Option<NodeRef> {
    node.inclusive_descendants()
        .find(|n| dom::local_name(n).as_deref() == Some("svg"))
}

/// Serialized, normalized markup of the first `<svg>` at or below `node`
#[must_use]
pub fn standalone_svg(node: &NodeRef) -> Option<String> {
    let svg = find_svg(node)?;
    let markup = dom::outer_html(&svg).ok()?;
    normalize_svg(&markup)
}

/// Wrap HTML markup in an SVG `foreignObject` on a white background
///
/// `font_css` holds the `@font-face` rules the markup needs.
#[must_use]
pub fn foreign_object_wrapper(html: &str, width: u32, height: u32, font_css: &str) -> String {
    let mut svg = String::with_capacity(html.len() + font_css.len() + 512);
    let _ = write!(
        svg,
        r#"<svg xmlns="{SVG_NAMESPACE}" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    if !font_css.is_empty() {
        let _ = write!(svg, "<defs><style><![CDATA[{font_css}]]></style></defs>");
    }
    let _ = write!(
        svg,
        r#"<rect width="100%" height="100%" fill="white"/><foreignObject x="0" y="0" width="100%" height="100%"><div xmlns="{XHTML_NAMESPACE}">{html}</div></foreignObject></svg>"#
    );
    svg
}

/// Why a markup cannot be drawn by the raster backend, if it cannot
#[must_use]
pub fn taint_reason(svg: &str) -> Option<&'static str> {
    if svg.contains("<foreignObject") || svg.contains("<foreignobject") {
        return Some("foreignObject content");
    }
    let mut rest = svg;
    while let Some(pos) = rest.find("href=") {
        let value = rest[pos + 5..].trim_start_matches(['"', '\'']);
        if !(value.starts_with('#') || value.starts_with("data:")) {
            return Some("external href");
        }
        rest = &rest[pos + 5..];
    }
    None
}
