//! Font-face collection for synthesized SVG wrappers

use std::collections::HashSet;

use kuchiki::NodeRef;

use crate::utils::css::{self, FontFaceRule};
use crate::utils::dom;

/// Families named in `font-family` (or the `font` shorthand) on `node` and its descendants
#[must_use]
pub fn used_families(node: &NodeRef) -> HashSet<String> {
    let mut families = HashSet::new();
    for element in node.inclusive_descendants() {
        let Some(style) = dom::attr(&element, "style") else {
            continue;
        };
        let declarations = css::parse_declarations(&style);
        if let Some(value) = css::declaration(&declarations, "font-family") {
            families.extend(css::all_families(value));
        }
        if let Some(value) = css::declaration(&declarations, "font") {
            // the family list is the tail of the shorthand, after the size
            if let Some(idx) = value.find(|c: char| c == '"' || c == '\'' || c.is_ascii_uppercase()) {
                families.extend(css::all_families(&value[idx..]));
            }
        }
    }
    families
}

/// CSS text of the `@font-face` rules whose family `node` uses
///
/// Pure: the result is only ever injected into the raster wrapper.
#[must_use]
pub fn collect_font_faces(node: &NodeRef, faces: &[FontFaceRule]) -> String {
    let used = used_families(node);
    faces
        .iter()
        .filter(|face| used.contains(&face.family))
        .map(|face| face.css_text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_used_families_are_collected() {
        let faces = css::parse_font_faces(
            r#"@font-face { font-family: KaTeX_Main; src: url(a.woff2) }
               @font-face { font-family: "KaTeX_Math"; src: url(b.woff2) }
               @font-face { font-family: Unused; src: url(c.woff2) }"#,
        );
        let node = dom::parse_root_element(
            r#"<span style="font: normal 1.21em KaTeX_Main, serif"><i style="font-family: 'KaTeX_Math'">x</i></span>"#,
        )
        .unwrap();

        let css_text = collect_font_faces(&node, &faces);
        assert!(css_text.contains("a.woff2"));
        assert!(css_text.contains("b.woff2"));
        assert!(!css_text.contains("c.woff2"));
    }
}
