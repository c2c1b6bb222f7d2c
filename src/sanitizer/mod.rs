//! DOM sanitizer
//!
//! Produces a portable copy of a preview subtree: script-capable elements
//! removed, attributes and classes reduced to an allow-list, and computed style
//! inlined on math-related elements so they keep their look once the theme
//! stylesheets are gone. The caller's tree is never modified.

pub mod host;
pub mod policy;

pub use host::{HeadlessHost, RenderHost, ScratchContainer, Size};
pub use policy::Policy;

use std::rc::Rc;

use kuchiki::NodeRef;
use kuchiki::iter::NodeIterator;
use kuchiki::traits::TendrilSink;
use log::{debug, warn};

use crate::config::SanitizeConfig;
use crate::error::{ExportError, ExportResult};
use crate::utils::css;
use crate::utils::dom;
use policy::{AttributeVerdict, in_vector_subtree, is_script_value};

/// A sanitized copy, still mounted in the host's scratch container
///
/// Formula conversion needs layout while it runs, so the mount lives as long
/// as this value. `release` (or dropping it) unmounts the copy.
pub struct SanitizedTree {
    root: NodeRef,
    scratch: ScratchContainer,
}

impl SanitizedTree {
    #[must_use]
    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    #[must_use]
    pub fn host(&self) -> &Rc<dyn RenderHost> {
        self.scratch.host()
    }

    /// Unmount and hand back the sanitized root
    #[must_use]
    pub fn release(self) -> NodeRef {
        let SanitizedTree { root, scratch } = self;
        drop(scratch);
        root
    }
}

pub struct Sanitizer {
    policy: Policy,
    host: Rc<dyn RenderHost>,
}

impl Sanitizer {
    #[must_use]
    pub fn new(config: &SanitizeConfig, host: Rc<dyn RenderHost>) -> Self {
        Self {
            policy: Policy::new(config),
            host,
        }
    }

    /// Clean a deep copy of `root` and leave it mounted for conversion
    pub fn sanitize(&self, root: &NodeRef) -> ExportResult<SanitizedTree> {
        if root.as_element().is_none() {
            return Err(ExportError::EmptyPreview);
        }
        let copy = dom::deep_clone(root);
        self.remove_elements(&copy);

        let scratch = ScratchContainer::mount(self.host.clone(), &copy)?;

        // Styles are computed against the original classes, so every element is
        // styled before any attribute is touched.
        let elements: Vec<NodeRef> = copy
            .inclusive_descendants()
            .elements()
            .map(|e| e.as_node().clone())
            .collect();
        let styles: Vec<Option<String>> = elements
            .iter()
            .map(|element| self.inline_style_for(element))
            .collect();

        for (element, style) in elements.iter().zip(styles) {
            if let Some(style) = style {
                dom::set_attr(element, "style", style);
            }
            self.apply_attribute_policy(element);
        }

        Ok(SanitizedTree {
            root: copy,
            scratch,
        })
    }

    /// Sanitize an HTML fragment and serialize the result
    ///
    /// The fragment's top-level nodes are sanitized as children of a `<body>`.
    pub fn sanitize_html(&self, html: &str) -> ExportResult<String> {
        let document = kuchiki::parse_html().one(html);
        let body = document
            .select_first("body")
            .map_err(|()| ExportError::EmptyPreview)?
            .as_node()
            .clone();
        let sanitized = self.sanitize(&body)?.release();
        dom::inner_html(&sanitized).map_err(|e| ExportError::Serialization(format!("{e:#}")))
    }

    fn remove_elements(&self, root: &NodeRef) {
        let doomed: Vec<NodeRef> = root
            .descendants()
            .filter(|node| self.policy.is_removed_element(node))
            .collect();
        for node in &doomed {
            debug!(
                "Removing <{}> from export",
                dom::local_name(node).unwrap_or_default()
            );
            node.detach();
        }
    }

    /// Merged inline + computed style for a math-related element
    fn inline_style_for(&self, element: &NodeRef) -> Option<String> {
        if !self.is_math_related(element) {
            return None;
        }
        let computed = match self.host.computed_style(element) {
            Ok(computed) => computed,
            Err(e) => {
                warn!(
                    "Skipping style inlining for <{}>: {e:#}",
                    dom::local_name(element).unwrap_or_default()
                );
                return None;
            }
        };
        let inline = css::parse_declarations(&dom::attr(element, "style").unwrap_or_default());
        // Script values go per declaration so a second pass sees the same style
        let merged: Vec<_> = css::merge_inline_first(&inline, &computed)
            .into_iter()
            .filter(|(_, value)| !is_script_value("style", value))
            .collect();
        (!merged.is_empty()).then(|| css::serialize_declarations(&merged))
    }

    fn is_math_related(&self, element: &NodeRef) -> bool {
        element
            .inclusive_ancestors()
            .any(|node| self.policy.marks_math(&node))
    }

    fn apply_attribute_policy(&self, element: &NodeRef) {
        let Some(data) = element.as_element() else {
            return;
        };
        let in_vector = in_vector_subtree(element);

        {
            let mut attributes = data.attributes.borrow_mut();
            let stripped: Vec<_> = attributes
                .map
                .iter()
                .filter(|(name, attr)| {
                    self.policy
                        .attribute_verdict(&name.local, &attr.value, in_vector)
                        == AttributeVerdict::Strip
                })
                .map(|(name, _)| name.clone())
                .collect();
            for name in stripped {
                attributes.map.remove(&name);
            }
        }

        if dom::attr(element, "class").is_some() {
            let retained = self.policy.retained_classes(element);
            let mut attributes = data.attributes.borrow_mut();
            if retained.is_empty() {
                attributes.remove("class");
            } else {
                attributes.insert("class", retained.join(" "));
            }
        }
    }
}
