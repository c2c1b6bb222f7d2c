//! Formula candidate discovery

use kuchiki::NodeRef;
use log::warn;

use crate::utils::dom;

/// Elements produced by MathJax, KaTeX, Obsidian's math wrapper and our own
/// source-carrying wrappers
pub const CANDIDATE_SELECTOR: &str = "mjx-container, .MathJax, .katex-display, .katex, \
     span.math, div.math, .mp-math, [data-tex], [data-mml]";

const DISPLAY_CLASSES: &[&str] = &["katex-display", "math-block", "mp-math-block"];

/// Outermost formula elements under `root`, in document order
///
/// A candidate nested in another candidate (KaTeX's `.katex` inside
/// `.katex-display`, for instance) is discarded in favor of the outer one.
#[must_use]
pub fn find_candidates(root: &NodeRef) -> Vec<NodeRef> {
    let matches = match root.select(CANDIDATE_SELECTOR) {
        Ok(matches) => matches,
        Err(()) => {
            warn!("Formula candidate selector failed to compile");
            return Vec::new();
        }
    };

    let mut outermost: Vec<NodeRef> = Vec::new();
    for candidate in matches {
        let node = candidate.as_node().clone();
        if !outermost.iter().any(|kept| dom::is_descendant_of(&node, kept)) {
            outermost.push(node);
        }
    }
    outermost
}

/// Whether a candidate is a display (block) formula
#[must_use]
pub fn is_display(node: &NodeRef) -> bool {
    if dom::local_name(node).as_deref() == Some("div") {
        return true;
    }
    if dom::classes(node)
        .iter()
        .any(|class| DISPLAY_CLASSES.contains(&class.as_str()))
    {
        return true;
    }
    matches!(
        dom::attr(node, "display").as_deref(),
        Some("true" | "block")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = r#"<section>
        <p>a <mjx-container class="MathJax" jax="SVG"><svg></svg><mjx-assistive-mml><math><mi>x</mi></math></mjx-assistive-mml></mjx-container></p>
        <span class="katex-display"><span class="katex"><span class="katex-mathml"></span></span></span>
        <span class="katex">y</span>
        <div class="math math-block"><span class="mp-math" data-tex="z">z</span></div>
        <p data-mml="&lt;math/&gt;">m</p>
    </section>"#;

    #[test]
    fn test_candidates_are_outermost_and_ordered() {
        let root = dom::parse_root_element(MIXED).unwrap();
        let names: Vec<_> = find_candidates(&root)
            .iter()
            .map(|n| (dom::local_name(n).unwrap(), dom::attr(n, "class")))
            .collect();
        assert_eq!(
            names,
            vec![
                ("mjx-container".to_string(), Some("MathJax".to_string())),
                ("span".to_string(), Some("katex-display".to_string())),
                ("span".to_string(), Some("katex".to_string())),
                ("div".to_string(), Some("math math-block".to_string())),
                ("p".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_candidates_never_nested_and_discovery_idempotent() {
        let root = dom::parse_root_element(MIXED).unwrap();
        let first = find_candidates(&root);
        for (i, a) in first.iter().enumerate() {
            for (j, b) in first.iter().enumerate() {
                if i != j {
                    assert!(!dom::is_descendant_of(a, b));
                }
            }
        }
        assert_eq!(find_candidates(&root), first);
    }

    #[test]
    fn test_display_detection() {
        let root = dom::parse_root_element(
            r#"<section><mjx-container display="true"></mjx-container><span class="katex"></span><span class="mp-math mp-math-block"></span><div class="math"></div></section>"#,
        )
        .unwrap();
        let flags: Vec<bool> = find_candidates(&root).iter().map(is_display).collect();
        assert_eq!(flags, vec![true, false, true, true]);
    }
}
