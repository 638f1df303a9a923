use crate::css::{color_to_hex, font_size_to_half_points, justification, length_to_twips};
use crate::document::{DocxDocument, NumberingId, RelationshipKind, TargetMode, NUMBERING_LEVELS};
use crate::node::{Element, Node};
use crate::xml::{Fragment, XmlElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberingRef {
    pub level: u32,
    pub numbering_id: NumberingId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParagraphOptions {
    pub paragraph_style: Option<String>,
    pub numbering: Option<NumberingRef>,
}

impl ParagraphOptions {
    pub fn styled(style: impl Into<String>) -> Self {
        Self {
            paragraph_style: Some(style.into()),
            numbering: None,
        }
    }

    pub fn numbered(level: u32, numbering_id: NumberingId) -> Self {
        Self {
            paragraph_style: None,
            numbering: Some(NumberingRef {
                level,
                numbering_id,
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RunStyle {
    bold: bool,
    italic: bool,
    underline: bool,
    strike: bool,
    code: bool,
    highlight: bool,
    vert_align: Option<&'static str>,
    color: Option<String>,
    shading: Option<String>,
    size: Option<u32>,
}

impl RunStyle {
    fn apply_tag(&mut self, tag: &str) {
        match tag {
            "b" | "strong" | "th" => self.bold = true,
            "i" | "em" => self.italic = true,
            "u" | "ins" => self.underline = true,
            "s" | "strike" | "del" => self.strike = true,
            "code" | "pre" | "kbd" | "samp" => self.code = true,
            "mark" => self.highlight = true,
            "sub" => self.vert_align = Some("subscript"),
            "sup" => self.vert_align = Some("superscript"),
            _ => {}
        }
    }

    fn apply_css(&mut self, el: &Element) {
        if let Some(weight) = el.style_value("font-weight") {
            self.bold = matches!(weight, "bold" | "bolder" | "600" | "700" | "800" | "900");
        }
        if let Some(style) = el.style_value("font-style") {
            self.italic = matches!(style, "italic" | "oblique");
        }
        if let Some(decoration) = el.style_value("text-decoration") {
            self.underline |= decoration.contains("underline");
            self.strike |= decoration.contains("line-through");
        }
        if let Some(color) = el.style_value("color").and_then(color_to_hex) {
            self.color = Some(color);
        }
        if let Some(bg) = el
            .style_value("background-color")
            .or_else(|| el.style_value("background"))
            .and_then(color_to_hex)
        {
            self.shading = Some(bg);
        }
        if let Some(size) = el.style_value("font-size").and_then(font_size_to_half_points) {
            self.size = Some(size);
        }
    }

    fn properties(&self, hyperlink: bool) -> Option<XmlElement> {
        let mut rpr = XmlElement::new("w:rPr");
        if hyperlink {
            rpr.push(XmlElement::new("w:rStyle").attr("w:val", "Hyperlink"));
        }
        if self.code {
            rpr.push(
                XmlElement::new("w:rFonts")
                    .attr("w:ascii", "Consolas")
                    .attr("w:hAnsi", "Consolas")
                    .attr("w:cs", "Consolas"),
            );
        }
        if self.bold {
            rpr.push(XmlElement::new("w:b"));
        }
        if self.italic {
            rpr.push(XmlElement::new("w:i"));
        }
        if self.strike {
            rpr.push(XmlElement::new("w:strike"));
        }
        if let Some(color) = &self.color {
            rpr.push(XmlElement::new("w:color").attr("w:val", color.as_str()));
        }
        if let Some(size) = self.size {
            rpr.push(XmlElement::new("w:sz").attr("w:val", size.to_string()));
            rpr.push(XmlElement::new("w:szCs").attr("w:val", size.to_string()));
        }
        if self.highlight {
            rpr.push(XmlElement::new("w:highlight").attr("w:val", "yellow"));
        }
        if self.underline {
            rpr.push(XmlElement::new("w:u").attr("w:val", "single"));
        }
        if let Some(fill) = &self.shading {
            rpr.push(
                XmlElement::new("w:shd")
                    .attr("w:val", "clear")
                    .attr("w:color", "auto")
                    .attr("w:fill", fill.as_str()),
            );
        }
        if let Some(align) = self.vert_align {
            rpr.push(XmlElement::new("w:vertAlign").attr("w:val", align));
        }
        (!rpr.children.is_empty()).then_some(rpr)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text { text: String, style: RunStyle },
    LinkText { text: String, style: RunStyle, href: String },
    Break,
}

/// Tags whose content never shows up inside a paragraph's runs.
fn skipped_inline(tag: &str) -> bool {
    matches!(
        tag,
        "ul" | "ol" | "table" | "img" | "figure" | "head" | "script" | "style" | "title"
    )
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div" | "li" | "blockquote" | "pre" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
    )
}

fn collapse_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_ws = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !in_ws {
                out.push(' ');
                in_ws = true;
            }
        } else {
            out.push(ch);
            in_ws = false;
        }
    }
    out
}

fn sanitize_href(href: &str) -> Option<String> {
    let h = href.trim();
    if h.is_empty() {
        return None;
    }
    let low = h.to_ascii_lowercase();
    if low.starts_with("javascript:") || low.starts_with("data:") || low.starts_with("vbscript:") {
        return None;
    }
    Some(h.to_string())
}

#[derive(Default)]
struct Collector {
    segments: Vec<Segment>,
    pre_depth: u32,
    links: Vec<Option<String>>,
}

impl Collector {
    fn emit_text(&mut self, raw: &str, style: &RunStyle) {
        if raw.is_empty() {
            return;
        }
        let preserve_space = self.pre_depth > 0;
        let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
        let mut text = if preserve_space {
            normalized
        } else {
            collapse_ws(&normalized)
        };
        if !preserve_space && self.ends_at_line_start() {
            text = text.trim_start().to_string();
        }

        if preserve_space && text.contains('\n') {
            let mut first = true;
            for line in text.split('\n') {
                if !first {
                    self.segments.push(Segment::Break);
                }
                first = false;
                self.push_text(line.to_string(), style);
            }
            return;
        }
        self.push_text(text, style);
    }

    fn ends_at_line_start(&self) -> bool {
        match self.segments.last() {
            None | Some(Segment::Break) => true,
            Some(Segment::Text { text, .. }) | Some(Segment::LinkText { text, .. }) => {
                text.ends_with(' ')
            }
        }
    }

    fn push_text(&mut self, text: String, style: &RunStyle) {
        if text.is_empty() {
            return;
        }
        let href = self.links.last().cloned().flatten();
        match href {
            Some(href) => self.segments.push(Segment::LinkText {
                text,
                style: style.clone(),
                href,
            }),
            None => self.segments.push(Segment::Text {
                text,
                style: style.clone(),
            }),
        }
    }

    fn walk(&mut self, node: &Node, style: &RunStyle) {
        match node {
            Node::Text(t) => self.emit_text(t, style),
            Node::Element(el) => {
                if skipped_inline(&el.tag) {
                    return;
                }
                if el.tag == "br" {
                    self.segments.push(Segment::Break);
                    return;
                }
                if is_block(&el.tag) && !self.segments.is_empty() {
                    self.segments.push(Segment::Break);
                }
                let mut style = style.clone();
                style.apply_tag(&el.tag);
                style.apply_css(el);
                self.walk_children(el, &style);
            }
        }
    }

    fn walk_children(&mut self, el: &Element, style: &RunStyle) {
        let is_pre = el.tag == "pre";
        let is_link = el.tag == "a";
        if is_pre {
            self.pre_depth += 1;
        }
        if is_link {
            self.links.push(el.attr("href").and_then(sanitize_href));
        }
        for child in &el.children {
            self.walk(child, style);
        }
        if is_link {
            self.links.pop();
        }
        if is_pre {
            self.pre_depth -= 1;
        }
    }

    fn finish(mut self) -> Vec<Segment> {
        if self.pre_depth == 0 {
            while matches!(self.segments.last(), Some(Segment::Break)) {
                self.segments.pop();
            }
        }
        if let Some(Segment::Text { text, .. } | Segment::LinkText { text, .. }) =
            self.segments.last_mut()
        {
            let trimmed = text.trim_end().len();
            text.truncate(trimmed);
            if text.is_empty() {
                self.segments.pop();
            }
        }
        self.segments
    }
}

fn collect_segments(node: &Node) -> Vec<Segment> {
    let mut collector = Collector::default();
    match node {
        Node::Text(t) => collector.emit_text(t, &RunStyle::default()),
        Node::Element(el) => {
            let mut style = RunStyle::default();
            style.apply_tag(&el.tag);
            style.apply_css(el);
            collector.walk_children(el, &style);
        }
    }
    collector.finish()
}

fn run_xml(text: &str, style: &RunStyle, hyperlink: bool) -> XmlElement {
    let mut run = XmlElement::new("w:r");
    if let Some(rpr) = style.properties(hyperlink) {
        run.push(rpr);
    }
    run.child(XmlElement::new("w:t").attr("xml:space", "preserve").text(text))
}

fn paragraph_properties(el: Option<&Element>, opts: &ParagraphOptions, max_width: u32) -> XmlElement {
    let mut ppr = XmlElement::new("w:pPr");
    if let Some(style) = &opts.paragraph_style {
        ppr.push(XmlElement::new("w:pStyle").attr("w:val", style.as_str()));
    }
    if let Some(numbering) = opts.numbering {
        // deeper nesting reuses the last defined level
        let ilvl = numbering.level.min(NUMBERING_LEVELS - 1);
        ppr.push(
            XmlElement::new("w:numPr")
                .child(XmlElement::new("w:ilvl").attr("w:val", ilvl.to_string()))
                .child(
                    XmlElement::new("w:numId").attr("w:val", numbering.numbering_id.to_string()),
                ),
        );
    }
    let Some(el) = el else {
        return ppr;
    };

    if let Some(fill) = el.style_value("background-color").and_then(color_to_hex) {
        if is_block(&el.tag) {
            ppr.push(
                XmlElement::new("w:shd")
                    .attr("w:val", "clear")
                    .attr("w:color", "auto")
                    .attr("w:fill", fill),
            );
        }
    }

    let before = el
        .style_value("margin-top")
        .and_then(|v| length_to_twips(v, max_width));
    let after = el
        .style_value("margin-bottom")
        .and_then(|v| length_to_twips(v, max_width));
    if before.is_some() || after.is_some() {
        let mut spacing = XmlElement::new("w:spacing");
        if let Some(b) = before {
            spacing.set_attr("w:before", b.to_string());
        }
        if let Some(a) = after {
            spacing.set_attr("w:after", a.to_string());
        }
        ppr.push(spacing);
    }

    if opts.numbering.is_none() {
        let left = el
            .style_value("margin-left")
            .or_else(|| el.style_value("padding-left"))
            .and_then(|v| length_to_twips(v, max_width))
            .or((el.tag == "blockquote").then_some(720));
        let first_line = el
            .style_value("text-indent")
            .and_then(|v| length_to_twips(v, max_width));
        if left.is_some() || first_line.is_some() {
            let mut ind = XmlElement::new("w:ind");
            if let Some(l) = left {
                ind.set_attr("w:left", l.to_string());
            }
            if let Some(f) = first_line {
                ind.set_attr("w:firstLine", f.to_string());
            }
            ppr.push(ind);
        }
    }

    if let Some(jc) = el.style_value("text-align").and_then(justification) {
        ppr.push(XmlElement::new("w:jc").attr("w:val", jc));
    }
    ppr
}

/// Build one `<w:p>` for `node`. `None` yields an empty paragraph.
///
/// External hyperlinks found in the node's runs are registered on `doc`.
pub fn build_paragraph(
    node: Option<&Node>,
    opts: &ParagraphOptions,
    doc: &mut DocxDocument,
) -> Fragment {
    let max_width = doc.available_document_space();
    let el = node.and_then(Node::as_element);
    let mut p = XmlElement::new("w:p").child(paragraph_properties(el, opts, max_width));

    let segments = node.map(collect_segments).unwrap_or_default();
    let mut in_link: Option<(Vec<XmlElement>, String)> = None;
    let flush_link = |p: &mut XmlElement,
                      st: &mut Option<(Vec<XmlElement>, String)>,
                      doc: &mut DocxDocument| {
        let Some((runs, href)) = st.take() else {
            return;
        };
        let mut link = XmlElement::new("w:hyperlink");
        if let Some(anchor) = href.strip_prefix('#') {
            link.set_attr("w:anchor", anchor);
        } else {
            let rid =
                doc.create_document_relationship(RelationshipKind::Hyperlink, &href, TargetMode::External);
            link.set_attr("r:id", rid);
        }
        link.set_attr("w:history", "1");
        link.children.extend(runs.into_iter().map(crate::xml::XmlNode::Element));
        p.push(link);
    };

    for seg in segments {
        match seg {
            Segment::Break => {
                flush_link(&mut p, &mut in_link, doc);
                p.push(XmlElement::new("w:r").child(XmlElement::new("w:br")));
            }
            Segment::Text { text, style } => {
                flush_link(&mut p, &mut in_link, doc);
                p.push(run_xml(&text, &style, false));
            }
            Segment::LinkText { text, style, href } => {
                let run = run_xml(&text, &style, true);
                match &mut in_link {
                    Some((runs, cur_href)) if *cur_href == href => runs.push(run),
                    _ => {
                        flush_link(&mut p, &mut in_link, doc);
                        in_link = Some((vec![run], href));
                    }
                }
            }
        }
    }
    flush_link(&mut p, &mut in_link, doc);

    Fragment::from_element(p)
}
