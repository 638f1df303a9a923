//! Tree walk from parsed HTML to document body markup.
//!
//! Siblings are converted strictly in order, one at a time: numbering ids,
//! relationship ids and output order all follow document order.

use crate::builder::{build_paragraph, build_table, ParagraphOptions, TableOptions};
use crate::document::DocxDocument;
use crate::image::{build_image, ImageError, ImageStage};
use crate::list::build_list;
use crate::node::{Element, Node};
use crate::xml::{Fragment, XmlElement};
use std::future::Future;
use std::pin::Pin;

type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Element kinds the dispatcher knows about. Everything else is
/// `PassThrough`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    PageBreak,
    Heading(u8),
    Paragraph,
    Figure,
    Table,
    List,
    Image,
    LineBreak,
    Head,
    PassThrough,
}

impl TagKind {
    pub fn classify(el: &Element) -> Self {
        match el.tag.as_str() {
            "div" if el.has_class("page-break") || el.style.contains_key("page-break-after") => {
                TagKind::PageBreak
            }
            "h1" => TagKind::Heading(1),
            "h2" => TagKind::Heading(2),
            "h3" => TagKind::Heading(3),
            "h4" => TagKind::Heading(4),
            "h5" => TagKind::Heading(5),
            "h6" => TagKind::Heading(6),
            "span" | "strong" | "b" | "em" | "i" | "u" | "ins" | "strike" | "del" | "s" | "sub"
            | "sup" | "mark" | "p" | "a" | "blockquote" | "code" | "pre" => TagKind::Paragraph,
            "figure" => TagKind::Figure,
            "table" => TagKind::Table,
            "ol" | "ul" => TagKind::List,
            "img" => TagKind::Image,
            "br" => TagKind::LineBreak,
            "head" => TagKind::Head,
            _ => TagKind::PassThrough,
        }
    }
}

/// One node that contributed nothing because something went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub stage: ImageStage,
    /// The `src` of the offending image, truncated.
    pub source: String,
    pub message: String,
}

impl Diagnostic {
    fn from_image(img: &Element, err: &ImageError) -> Self {
        let source: String = img.attr("src").unwrap_or_default().chars().take(80).collect();
        Self {
            stage: err.stage(),
            source,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RenderOutput {
    pub fragment: Fragment,
    pub diagnostics: Vec<Diagnostic>,
}

/// What `convert` accepts: nothing, one node, or a sequence.
#[derive(Debug, Clone, Copy)]
pub enum Input<'a> {
    None,
    Node(&'a Node),
    Nodes(&'a [Node]),
}

impl<'a> From<&'a Node> for Input<'a> {
    fn from(node: &'a Node) -> Self {
        Input::Node(node)
    }
}

impl<'a> From<&'a [Node]> for Input<'a> {
    fn from(nodes: &'a [Node]) -> Self {
        Input::Nodes(nodes)
    }
}

impl<'a> From<Option<&'a Node>> for Input<'a> {
    fn from(node: Option<&'a Node>) -> Self {
        node.map_or(Input::None, Input::Node)
    }
}

pub struct RenderContext<'d> {
    document: &'d mut DocxDocument,
    diagnostics: Vec<Diagnostic>,
}

fn page_break_paragraph() -> XmlElement {
    XmlElement::new("w:p").child(
        XmlElement::new("w:r").child(XmlElement::new("w:br").attr("w:type", "page")),
    )
}

/// Pin the line rule on a picture paragraph's spacing. Both the `img` and
/// the `figure > img` paths go through here so they produce the same
/// markup.
fn patch_line_rule(fragment: &mut Fragment) {
    let spacing = fragment
        .first_mut()
        .and_then(XmlElement::first_child_mut)
        .and_then(XmlElement::first_child_mut);
    if let Some(spacing) = spacing {
        spacing.set_attr("w:lineRule", "auto");
    }
}

impl<'d> RenderContext<'d> {
    pub fn new(document: &'d mut DocxDocument) -> Self {
        Self {
            document,
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn table_options(&self) -> TableOptions {
        TableOptions {
            maximum_width: self.document.available_document_space(),
            row_cant_split: self.document.table_row_cant_split(),
        }
    }

    fn paragraph(&mut self, node: Option<&Node>, opts: &ParagraphOptions, out: &mut Fragment) {
        out.import(build_paragraph(node, opts, self.document));
    }

    fn table(&mut self, node: &Node, out: &mut Fragment) {
        let opts = self.table_options();
        let table = build_table(node, &opts, self.document);
        if table.is_empty() {
            tracing::debug!("table without cells skipped");
            return;
        }
        out.import(table);
        if self.document.add_spacing_after_table() {
            self.paragraph(None, &ParagraphOptions::default(), out);
        }
    }

    async fn image(&mut self, img: &Element, out: &mut Fragment) {
        match build_image(self.document, img, None).await {
            Ok(mut fragment) => {
                patch_line_rule(&mut fragment);
                out.import(fragment);
            }
            Err(err) => {
                tracing::warn!(stage = %err.stage(), "skipping image: {err}");
                self.diagnostics.push(Diagnostic::from_image(img, &err));
            }
        }
    }

    /// Convert `input` and append the result to `out`.
    pub fn convert<'a>(&'a mut self, input: Input<'a>, out: &'a mut Fragment) -> BoxFuture<'a> {
        Box::pin(async move {
            match input {
                Input::None => {}
                Input::Node(node) => self.convert_node(node, out).await,
                Input::Nodes(nodes) => {
                    for node in nodes {
                        self.convert_node(node, out).await;
                    }
                }
            }
        })
    }

    fn convert_node<'a>(&'a mut self, node: &'a Node, out: &'a mut Fragment) -> BoxFuture<'a> {
        Box::pin(async move {
            match node {
                Node::Text(_) => self.paragraph(Some(node), &ParagraphOptions::default(), out),
                Node::Element(el) => self.convert_element(node, el, out).await,
            }
        })
    }

    async fn convert_element(&mut self, node: &Node, el: &Element, out: &mut Fragment) {
        match TagKind::classify(el) {
            TagKind::PageBreak => {
                tracing::debug!("page break; children skipped");
                out.push(page_break_paragraph());
            }
            TagKind::Heading(level) => {
                let opts = ParagraphOptions::styled(format!("Heading{level}"));
                self.paragraph(Some(node), &opts, out);
            }
            TagKind::Paragraph => self.paragraph(Some(node), &ParagraphOptions::default(), out),
            TagKind::Figure => {
                for child in &el.children {
                    let Some(child_el) = child.as_element() else {
                        continue;
                    };
                    match child_el.tag.as_str() {
                        "table" => self.table(child, out),
                        "img" => self.image(child_el, out).await,
                        _ => {}
                    }
                }
            }
            TagKind::Table => self.table(node, out),
            TagKind::List => build_list(el, self.document, out),
            TagKind::Image => self.image(el, out).await,
            TagKind::LineBreak => self.paragraph(None, &ParagraphOptions::default(), out),
            TagKind::Head => tracing::debug!("head skipped"),
            TagKind::PassThrough => {
                for child in &el.children {
                    self.convert_node(child, out).await;
                }
            }
        }
    }
}

/// Convert a whole tree into one body fragment plus the list of nodes
/// that were skipped.
pub async fn render_document(document: &mut DocxDocument, tree: &[Node]) -> RenderOutput {
    let mut fragment = Fragment::new();
    let mut ctx = RenderContext::new(document);
    ctx.convert(Input::Nodes(tree), &mut fragment).await;
    RenderOutput {
        fragment,
        diagnostics: ctx.into_diagnostics(),
    }
}
