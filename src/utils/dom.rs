//! Small helpers over the kuchiki DOM
//!
//! kuchiki nodes are reference counted, so "cloning" a `NodeRef` only clones the
//! handle. `deep_clone` builds an independent copy of a subtree, which is what the
//! pipeline works on so the caller's tree is never touched.

use anyhow::{Context, Result};
use kuchiki::iter::NodeIterator;
use kuchiki::traits::TendrilSink;
use kuchiki::{NodeData, NodeRef};

/// Build an independent copy of `node` and all of its descendants
#[must_use]
pub fn deep_clone(node: &NodeRef) -> NodeRef {
    let copy = match node.data() {
        NodeData::Element(element) => NodeRef::new_element(
            element.name.clone(),
            element.attributes.borrow().map.clone(),
        ),
        NodeData::Text(text) => NodeRef::new_text(text.borrow().clone()),
        NodeData::Comment(comment) => NodeRef::new_comment(comment.borrow().clone()),
        NodeData::ProcessingInstruction(pi) => {
            let pi = pi.borrow();
            NodeRef::new_processing_instruction(pi.0.clone(), pi.1.clone())
        }
        NodeData::Doctype(doctype) => NodeRef::new_doctype(
            doctype.name.clone(),
            doctype.public_id.clone(),
            doctype.system_id.clone(),
        ),
        NodeData::Document(_) => NodeRef::new_document(),
        NodeData::DocumentFragment => NodeRef::new(NodeData::DocumentFragment),
    };

    for child in node.children() {
        copy.append(deep_clone(&child));
    }
    copy
}

/// Parse an HTML snippet and return the first element matching `selector`, detached
///
/// Used to create new elements (`<img>`, `<div>`, `<svg>`) without constructing
/// qualified names by hand: html5ever picks the right namespace for us.
pub fn parse_element(snippet: &str, selector: &str) -> Option<NodeRef> {
    let document = kuchiki::parse_html().one(snippet);
    let found = document.select_first(selector).ok()?;
    let node = found.as_node().clone();
    node.detach();
    Some(node)
}

/// Parse a preview document and return its root element
///
/// The preview is usually one wrapper element; if the body has several top-level
/// elements the first one is returned.
pub fn parse_root_element(html: &str) -> Option<NodeRef> {
    let document = kuchiki::parse_html().one(html);
    let body = document.select_first("body").ok()?;
    let root = body.as_node().children().elements().next()?;
    Some(root.as_node().clone())
}

/// Serialize a node including its own tag
pub fn outer_html(node: &NodeRef) -> Result<String> {
    let mut output = Vec::new();
    node.serialize(&mut output)
        .context("Failed to serialize DOM node")?;
    String::from_utf8(output).context("Failed to convert HTML bytes to UTF-8 string")
}

/// Serialize the children of a node
pub fn inner_html(node: &NodeRef) -> Result<String> {
    let mut html = String::new();
    for child in node.children() {
        html.push_str(&outer_html(&child)?);
    }
    Ok(html)
}

/// Lowercase local tag name of an element node
#[must_use]
pub fn local_name(node: &NodeRef) -> Option<String> {
    node.as_element()
        .map(|element| element.name.local.to_ascii_lowercase())
}

/// Attribute value of an element node
#[must_use]
pub fn attr(node: &NodeRef, name: &str) -> Option<String> {
    node.as_element()
        .and_then(|element| element.attributes.borrow().get(name).map(str::to_string))
}

pub fn set_attr(node: &NodeRef, name: &str, value: impl Into<String>) {
    if let Some(element) = node.as_element() {
        element.attributes.borrow_mut().insert(name, value.into());
    }
}

/// Class names of an element, in attribute order
#[must_use]
pub fn classes(node: &NodeRef) -> Vec<String> {
    attr(node, "class")
        .map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// True when `node` sits strictly inside `ancestor`
#[must_use]
pub fn is_descendant_of(node: &NodeRef, ancestor: &NodeRef) -> bool {
    node.ancestors().any(|candidate| candidate == *ancestor)
}

/// Put `replacement` where `original` is and detach `original`
pub fn replace_node(original: &NodeRef, replacement: NodeRef) {
    original.insert_before(replacement);
    original.detach();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_clone_is_independent() {
        let root = parse_root_element(r#"<div class="a"><p id="x">hi <b>there</b></p></div>"#)
            .unwrap();
        let copy = deep_clone(&root);

        set_attr(&copy, "class", "b");
        copy.select_first("b").unwrap().as_node().detach();

        assert_eq!(attr(&root, "class").as_deref(), Some("a"));
        assert!(root.select_first("b").is_ok());
        assert_eq!(outer_html(&copy).unwrap(), r#"<div class="b"><p id="x">hi </p></div>"#);
    }

    #[test]
    fn test_parse_element_keeps_svg_namespace() {
        let svg = parse_element(r#"<svg viewBox="0 0 10 10"><path d="M0 0"/></svg>"#, "svg")
            .unwrap();
        assert!(svg.parent().is_none());
        let element = svg.as_element().unwrap();
        assert_eq!(&*element.name.ns, "http://www.w3.org/2000/svg");
        assert_eq!(attr(&svg, "viewBox").as_deref(), Some("0 0 10 10"));
    }

    #[test]
    fn test_replace_node_keeps_position() {
        let root = parse_root_element("<p>a<span>b</span>c</p>").unwrap();
        let span = root.select_first("span").unwrap().as_node().clone();
        replace_node(&span, parse_element("<img src=\"x\">", "img").unwrap());
        assert_eq!(outer_html(&root).unwrap(), "<p>a<img src=\"x\">c</p>");
    }
}
