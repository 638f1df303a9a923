//! Owned HTML tree consumed by the renderer.
//!
//! The rcdom tree produced by html5ever is reference counted and not
//! `Send`; it is converted once into plain `Node` values so the async
//! renderer can hold borrows across suspension points.

use crate::css::parse_style;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Lower-case tag name.
    pub tag: String,
    /// Attributes other than `style`, keyed by lower-case name.
    pub attributes: BTreeMap<String, String>,
    /// Parsed inline `style` declarations.
    pub style: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(s.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.as_element().map(|el| el.tag.as_str())
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        fn walk(node: &Node, out: &mut String) {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(el) => el.children.iter().for_each(|c| walk(c, out)),
            }
        }
        walk(self, &mut out);
        out
    }
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        if name.eq_ignore_ascii_case("style") {
            self.style.extend(parse_style(value));
        } else {
            self.attributes
                .insert(name.to_ascii_lowercase(), value.to_string());
        }
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.with_child(Node::text(text))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn style_value(&self, key: &str) -> Option<&str> {
        self.style.get(key).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|token| token == class))
    }

    pub fn element_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Keep whitespace-only text between elements.
    pub keep_whitespace: bool,
}

fn html5_parse(input: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(input)
}

fn tag_lower(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string().to_ascii_lowercase()),
        _ => None,
    }
}

fn convert_handle(node: &Handle, opts: ParseOptions, in_pre: bool) -> Option<Node> {
    match &node.data {
        NodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            if !opts.keep_whitespace && !in_pre && text.trim().is_empty() {
                return None;
            }
            Some(Node::Text(text))
        }
        NodeData::Element { attrs, .. } => {
            let tag = tag_lower(node)?;
            let mut el = Element::new(&tag);
            for a in attrs.borrow().iter() {
                el = el.with_attr(&a.name.local, &a.value);
            }
            let in_pre = in_pre || tag == "pre";
            el.children = node
                .children
                .borrow()
                .iter()
                .filter_map(|c| convert_handle(c, opts, in_pre))
                .collect();
            Some(Node::Element(el))
        }
        _ => None,
    }
}

/// Parse an HTML document or fragment into the children of its `html`
/// element (`head` and `body`).
pub fn parse_html(input_html: &str, opts: ParseOptions) -> Vec<Node> {
    let wrapped = if input_html.to_ascii_lowercase().contains("<html") {
        input_html.to_string()
    } else {
        format!(
            "<!doctype html><html><head><meta charset=\"utf-8\"></head><body>{}</body></html>",
            input_html
        )
    };

    let dom = html5_parse(&wrapped);
    let root = dom
        .document
        .children
        .borrow()
        .iter()
        .find(|c| tag_lower(c).as_deref() == Some("html"))
        .cloned();

    let top: Vec<Handle> = match root {
        Some(html) => html.children.borrow().clone(),
        None => dom.document.children.borrow().clone(),
    };
    top.iter()
        .filter_map(|c| convert_handle(c, opts, false))
        .collect()
}
