//! Attribute and class allow-lists

use kuchiki::NodeRef;

use crate::config::SanitizeConfig;
use crate::utils::constants::CONTENT_SECTION_CLASS;
use crate::utils::dom;

/// Compiled view of `SanitizeConfig` with lowercased names
#[derive(Debug, Clone)]
pub struct Policy {
    allowed_attributes: Vec<String>,
    disallowed_prefixes: Vec<String>,
    preserved_attributes: Vec<String>,
    allowed_classes: Vec<String>,
    allowed_class_prefixes: Vec<String>,
    removed_elements: Vec<String>,
}

/// What to do with one attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeVerdict {
    Keep,
    Strip,
}

impl Policy {
    #[must_use]
    pub fn new(config: &SanitizeConfig) -> Self {
        let lower = |items: &[String]| items.iter().map(|s| s.to_ascii_lowercase()).collect();
        Self {
            allowed_attributes: lower(&config.allowed_attributes),
            disallowed_prefixes: lower(&config.disallowed_attribute_prefixes),
            preserved_attributes: lower(&config.preserved_attributes),
            allowed_classes: config.allowed_classes.clone(),
            allowed_class_prefixes: config.allowed_class_prefixes.clone(),
            removed_elements: lower(&config.removed_elements),
        }
    }

    #[must_use]
    pub fn is_removed_element(&self, node: &NodeRef) -> bool {
        dom::local_name(node).is_some_and(|name| self.removed_elements.contains(&name))
    }

    /// Decide on one attribute of an element
    ///
    /// `in_vector` is true for `<svg>`/`<math>` elements and their descendants,
    /// which keep presentation attributes outside the HTML allow-list.
    #[must_use]
    pub fn attribute_verdict(&self, name: &str, value: &str, in_vector: bool) -> AttributeVerdict {
        let name = name.to_ascii_lowercase();

        if self.preserved_attributes.contains(&name) {
            return AttributeVerdict::Keep;
        }
        if self.disallowed_prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            return AttributeVerdict::Strip;
        }
        if !in_vector && !self.allowed_attributes.contains(&name) {
            return AttributeVerdict::Strip;
        }
        if is_script_value(&name, value) {
            return AttributeVerdict::Strip;
        }
        AttributeVerdict::Keep
    }

    #[must_use]
    pub fn is_allowed_class(&self, class: &str) -> bool {
        self.allowed_classes.iter().any(|c| c == class)
            || self
                .allowed_class_prefixes
                .iter()
                .any(|prefix| class.starts_with(prefix.as_str()))
    }

    /// Allowed classes of `node`, in attribute order
    #[must_use]
    pub fn retained_classes(&self, node: &NodeRef) -> Vec<String> {
        dom::classes(node)
            .into_iter()
            .filter(|class| self.is_allowed_class(class))
            .collect()
    }

    /// True when the element itself marks math: a retained math class, an
    /// `mjx-*` tag, `<svg>` or `<math>`
    #[must_use]
    pub fn marks_math(&self, node: &NodeRef) -> bool {
        let Some(name) = dom::local_name(node) else {
            return false;
        };
        name.starts_with("mjx-")
            || name == "svg"
            || name == "math"
            || self
                .retained_classes(node)
                .iter()
                .any(|class| class != CONTENT_SECTION_CLASS)
    }
}

/// `style`, `href` and `src` values that would execute script
pub(crate) fn is_script_value(name: &str, value: &str) -> bool {
    let value = value.to_ascii_lowercase();
    match name {
        "style" => value.contains("javascript:") || value.contains("expression("),
        "href" | "src" => value.trim_start().starts_with("javascript:"),
        _ => false,
    }
}

/// True for `<svg>` and `<math>` elements and anything nested in them
#[must_use]
pub fn in_vector_subtree(node: &NodeRef) -> bool {
    node.inclusive_ancestors()
        .any(|n| matches!(dom::local_name(&n).as_deref(), Some("svg" | "math")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Policy {
        Policy::new(&SanitizeConfig::default())
    }

    #[test]
    fn test_attribute_prefixes_and_preserved_sources() {
        let policy = policy();
        assert_eq!(policy.attribute_verdict("onclick", "x()", true), AttributeVerdict::Strip);
        assert_eq!(policy.attribute_verdict("data-line", "3", false), AttributeVerdict::Strip);
        assert_eq!(policy.attribute_verdict("data-tex", "x^2", false), AttributeVerdict::Keep);
        assert_eq!(policy.attribute_verdict("id", "MJX-1", true), AttributeVerdict::Strip);
        assert_eq!(policy.attribute_verdict("aria-hidden", "true", true), AttributeVerdict::Strip);
    }

    #[test]
    fn test_vector_subtrees_keep_presentation_attributes() {
        let policy = policy();
        assert_eq!(policy.attribute_verdict("viewBox", "0 0 1 1", true), AttributeVerdict::Keep);
        assert_eq!(policy.attribute_verdict("viewBox", "0 0 1 1", false), AttributeVerdict::Strip);
        assert_eq!(policy.attribute_verdict("colspan", "2", false), AttributeVerdict::Keep);
    }

    #[test]
    fn test_script_values_are_stripped() {
        let policy = policy();
        assert_eq!(
            policy.attribute_verdict("style", "width: expression(alert(1))", false),
            AttributeVerdict::Strip
        );
        assert_eq!(
            policy.attribute_verdict("href", " JavaScript:alert(1)", false),
            AttributeVerdict::Strip
        );
        assert_eq!(policy.attribute_verdict("style", "color: red", false), AttributeVerdict::Keep);
    }

    #[test]
    fn test_class_allow_list() {
        let policy = policy();
        assert!(policy.is_allowed_class("katex-display"));
        assert!(policy.is_allowed_class("MathJax_SVG"));
        assert!(policy.is_allowed_class("math"));
        assert!(policy.is_allowed_class("mp-math-block"));
        assert!(!policy.is_allowed_class("mathematics"));
        assert!(!policy.is_allowed_class("hljs"));
    }

    #[test]
    fn test_content_section_alone_does_not_mark_math() {
        let policy = policy();
        let section = dom::parse_root_element(r#"<section class="mp-content-section x"></section>"#)
            .unwrap();
        let katex = dom::parse_root_element(r#"<span class="katex"></span>"#).unwrap();
        assert!(!policy.marks_math(&section));
        assert!(policy.marks_math(&katex));
    }
}
