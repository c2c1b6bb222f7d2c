//! Render host: the layout and style facilities the export needs from a browser
//!
//! The pipeline only asks three things of its host: the computed style of an
//! element, its laid-out size, and a hidden place to mount a working copy while
//! those are computed. `HeadlessHost` answers them from the theme stylesheets
//! and declared sizes, without a layout engine.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::{Result, anyhow};
use kuchiki::traits::TendrilSink;
use kuchiki::{NodeRef, Selectors};
use log::{debug, warn};

use crate::utils::constants::{DEFAULT_FONT_SIZE_PX, SCRATCH_CONTAINER_STYLE};
use crate::utils::css::{self, Declaration, FontFaceRule};
use crate::utils::dom;

/// Width and height in device-independent pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    #[must_use]
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero, negative or not a number
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Whole pixels, rounded up and never below 1
    #[must_use]
    pub fn ceil_px(&self) -> (u32, u32) {
        let side = |v: f32| if v.is_finite() { v.ceil().max(1.0) as u32 } else { 1 };
        (side(self.width), side(self.height))
    }
}

/// Style and layout queries against a mounted DOM
pub trait RenderHost {
    /// Attach `node` to a hidden, off-screen container in the host document
    fn mount(&self, node: &NodeRef) -> Result<()>;

    /// Detach `node` and its container again; a no-op for nodes never mounted
    fn unmount(&self, node: &NodeRef);

    /// Every style property computed for `element`, in cascade order
    fn computed_style(&self, element: &NodeRef) -> Result<Vec<Declaration>>;

    /// Laid-out size of `element`
    fn bounding_rect(&self, element: &NodeRef) -> Option<Size>;

    /// Scrollable content size of `element`
    fn scroll_size(&self, element: &NodeRef) -> Option<Size>;

    /// `@font-face` rules available in the host document
    fn font_faces(&self) -> Vec<FontFaceRule> {
        Vec::new()
    }
}

/// RAII guard keeping a working copy mounted in the host
///
/// The copy is unmounted when the guard drops, on success and error paths alike.
pub struct ScratchContainer {
    host: Rc<dyn RenderHost>,
    node: NodeRef,
}

impl ScratchContainer {
    pub fn mount(host: Rc<dyn RenderHost>, node: &NodeRef) -> Result<Self> {
        host.mount(node)?;
        Ok(Self {
            host,
            node: node.clone(),
        })
    }

    #[must_use]
    pub fn host(&self) -> &Rc<dyn RenderHost> {
        &self.host
    }
}

impl Drop for ScratchContainer {
    fn drop(&mut self) {
        self.host.unmount(&self.node);
    }
}

struct CompiledRule {
    selectors: Selectors,
    declarations: Vec<Declaration>,
}

/// Stylesheet-driven host without a layout engine
///
/// Computed style is the declarations of every matching rule, in source order.
/// Sizes come from declared `width`/`height` (style, then attributes) and, for
/// scroll size, from the declared size or `viewBox` of nested `<svg>` elements.
pub struct HeadlessHost {
    document: NodeRef,
    rules: Vec<CompiledRule>,
    font_faces: Vec<FontFaceRule>,
    mounted: RefCell<Vec<NodeRef>>,
    mount_count: Cell<usize>,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl HeadlessHost {
    /// Build a host from the stylesheets active in the preview
    #[must_use]
    pub fn new(stylesheets: &[String]) -> Self {
        let mut rules = Vec::new();
        let mut font_faces = Vec::new();

        for sheet in stylesheets {
            for rule in css::parse_rules(sheet) {
                match Selectors::compile(&rule.selector) {
                    Ok(selectors) => rules.push(CompiledRule {
                        selectors,
                        declarations: rule.declarations,
                    }),
                    Err(()) => debug!("Skipping unsupported selector `{}`", rule.selector),
                }
            }
            font_faces.extend(css::parse_font_faces(sheet));
        }

        Self {
            document: kuchiki::parse_html().one("<html><head></head><body></body></html>"),
            rules,
            font_faces,
            mounted: RefCell::new(Vec::new()),
            mount_count: Cell::new(0),
        }
    }

    /// Number of copies currently mounted
    #[must_use]
    pub fn mounted_count(&self) -> usize {
        self.mounted.borrow().len()
    }

    /// Number of mounts performed over the host's lifetime
    #[must_use]
    pub fn total_mounts(&self) -> usize {
        self.mount_count.get()
    }

    fn body(&self) -> Result<NodeRef> {
        self.document
            .select_first("body")
            .map(|body| body.as_node().clone())
            .map_err(|()| anyhow!("host document has no body"))
    }

    /// Font size in px from the nearest ancestor declaring one
    fn font_size_px(&self, element: &NodeRef) -> f32 {
        for node in element.inclusive_ancestors() {
            if node.as_element().is_none() {
                continue;
            }
            let inline = css::parse_declarations(&dom::attr(&node, "style").unwrap_or_default());
            if let Some(px) = css::declaration(&inline, "font-size")
                .and_then(|v| css::parse_length_px(v, DEFAULT_FONT_SIZE_PX))
            {
                return px;
            }
        }
        DEFAULT_FONT_SIZE_PX
    }

    /// Declared size of one element: inline style, matched rules, then attributes
    fn declared_size(&self, element: &NodeRef) -> Option<Size> {
        let font_size = self.font_size_px(element);
        let inline = css::parse_declarations(&dom::attr(element, "style").unwrap_or_default());
        let computed = self.computed_style(element).unwrap_or_default();
        let style = css::merge_inline_first(&inline, &computed);

        let side = |name: &str| {
            css::declaration(&style, name)
                .and_then(|v| css::parse_length_px(v, font_size))
                .or_else(|| dom::attr(element, name).and_then(|v| css::parse_length_px(&v, font_size)))
        };

        let size = Size::new(side("width")?, side("height")?);
        (!size.is_empty()).then_some(size)
    }

    /// Size of an `<svg>` from its attributes, falling back to `viewBox`
    fn svg_size(&self, svg: &NodeRef) -> Option<Size> {
        if let Some(size) = self.declared_size(svg) {
            return Some(size);
        }
        let view_box = dom::attr(svg, "viewBox")?;
        let parts: Vec<f32> = view_box
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|p| !p.is_empty())
            .filter_map(|p| p.parse().ok())
            .collect();
        match parts.as_slice() {
            [_, _, w, h] => {
                let size = Size::new(*w, *h);
                (!size.is_empty()).then_some(size)
            }
            _ => None,
        }
    }
}

impl RenderHost for HeadlessHost {
    fn mount(&self, node: &NodeRef) -> Result<()> {
        let container = dom::parse_element(
            &format!(r#"<div style="{SCRATCH_CONTAINER_STYLE}"></div>"#),
            "div",
        )
        .ok_or_else(|| anyhow!("failed to create scratch container"))?;
        container.append(node.clone());
        self.body()?.append(container);

        self.mounted.borrow_mut().push(node.clone());
        self.mount_count.set(self.mount_count.get() + 1);
        Ok(())
    }

    fn unmount(&self, node: &NodeRef) {
        let mut mounted = self.mounted.borrow_mut();
        let Some(index) = mounted.iter().position(|n| n == node) else {
            warn!("Unmount requested for a node that is not mounted");
            return;
        };
        mounted.remove(index);

        let container = node.parent();
        node.detach();
        if let Some(container) = container {
            container.detach();
        }
    }

    fn computed_style(&self, element: &NodeRef) -> Result<Vec<Declaration>> {
        let element_ref = element
            .clone()
            .into_element_ref()
            .ok_or_else(|| anyhow!("computed style requested for a non-element node"))?;

        let mut style: Vec<Declaration> = Vec::new();
        for rule in self.rules.iter().filter(|r| r.selectors.matches(&element_ref)) {
            for (name, value) in &rule.declarations {
                match style.iter_mut().find(|(n, _)| n == name) {
                    Some(existing) => existing.1 = value.clone(),
                    None => style.push((name.clone(), value.clone())),
                }
            }
        }
        Ok(style)
    }

    fn bounding_rect(&self, element: &NodeRef) -> Option<Size> {
        self.declared_size(element)
    }

    fn scroll_size(&self, element: &NodeRef) -> Option<Size> {
        let mut largest: Option<Size> = None;
        for node in element.inclusive_descendants() {
            if dom::local_name(&node).as_deref() != Some("svg") {
                continue;
            }
            if let Some(size) = self.svg_size(&node) {
                let current = largest.get_or_insert(size);
                current.width = current.width.max(size.width);
                current.height = current.height.max(size.height);
            }
        }
        largest
    }

    fn font_faces(&self) -> Vec<FontFaceRule> {
        self.font_faces.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_container_unmounts_on_drop() {
        let host = Rc::new(HeadlessHost::default());
        let node = dom::parse_root_element("<div><span>x</span></div>").unwrap();
        {
            let _guard = ScratchContainer::mount(host.clone(), &node).unwrap();
            assert_eq!(host.mounted_count(), 1);
            let container = node.parent().unwrap();
            assert!(dom::attr(&container, "style").unwrap().contains("visibility: hidden"));
        }
        assert_eq!(host.mounted_count(), 0);
        assert!(node.parent().is_none());
    }

    #[test]
    fn test_computed_style_follows_source_order() {
        let host = HeadlessHost::new(&[
            ".katex { color: black; font-size: 1.21em }".to_string(),
            "section .katex { color: red }".to_string(),
            "p > ..bad { color: green }".to_string(),
        ]);
        let root = dom::parse_root_element(r#"<section><span class="katex">x</span></section>"#)
            .unwrap();
        let span = root.select_first(".katex").unwrap().as_node().clone();
        let style = host.computed_style(&span).unwrap();
        assert_eq!(
            style,
            vec![
                ("color".to_string(), "red".to_string()),
                ("font-size".to_string(), "1.21em".to_string()),
            ]
        );
    }

    #[test]
    fn test_sizes_from_style_and_svg() {
        let host = HeadlessHost::default();
        let root = dom::parse_root_element(
            r#"<div style="width: 120px; height: 40px"><svg width="2ex" height="1ex"></svg><svg viewBox="0 0 50 60"></svg></div>"#,
        )
        .unwrap();
        assert_eq!(host.bounding_rect(&root), Some(Size::new(120.0, 40.0)));
        assert_eq!(host.scroll_size(&root), Some(Size::new(50.0, 60.0)));
    }

    #[test]
    fn test_ceil_px_floors_at_one() {
        assert_eq!(Size::new(0.2, 39.1).ceil_px(), (1, 40));
        assert!(Size::new(0.0, 10.0).is_empty());
    }
}
