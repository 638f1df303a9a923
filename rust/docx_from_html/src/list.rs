//! `ul`/`ol` → numbered paragraphs.
//!
//! Every list element gets its own numbering definition. List items are
//! emitted in document order; a list nested inside an item sits one
//! level deeper than the item's list.

use crate::builder::{build_paragraph, ParagraphOptions};
use crate::document::{DocxDocument, NumberingId};
use crate::node::{Element, Node};
use crate::xml::Fragment;
use std::collections::BTreeMap;

/// Attributes and styles handed down from enclosing lists.
#[derive(Debug, Clone, Default, PartialEq)]
struct Inherited {
    attributes: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
}

impl Inherited {
    fn of(el: &Element) -> Self {
        Self {
            attributes: el.attributes.clone(),
            style: el.style.clone(),
        }
    }

    /// `el`'s own values win over inherited ones.
    fn merged_with(&self, el: &Element) -> Self {
        let mut out = self.clone();
        out.attributes
            .extend(el.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        out.style
            .extend(el.style.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }
}

struct WorkItem<'a> {
    el: &'a Element,
    level: u32,
    numbering_id: NumberingId,
    inherited: Inherited,
}

fn is_list(tag: &str) -> bool {
    matches!(tag, "ul" | "ol")
}

/// Paragraph standing in for one `li`: merged properties, the item's
/// children as content.
fn item_paragraph(li: &Element, inherited: &Inherited) -> Node {
    let merged = inherited.merged_with(li);
    Node::Element(Element {
        tag: "p".to_string(),
        attributes: merged.attributes,
        style: merged.style,
        children: li.children.clone(),
    })
}

/// Expand `item` into work items for its element children, in order.
/// Nested lists mint their numbering id here, left to right.
fn expand<'a>(item: &WorkItem<'a>, doc: &mut DocxDocument) -> Vec<WorkItem<'a>> {
    item.el
        .element_children()
        .filter_map(|child| {
            if is_list(&child.tag) {
                Some(WorkItem {
                    el: child,
                    level: item.level + 1,
                    numbering_id: doc.create_numbering(&child.tag, child),
                    inherited: item.inherited.merged_with(child),
                })
            } else if child.tag == "li" {
                Some(WorkItem {
                    el: child,
                    level: item.level,
                    numbering_id: item.numbering_id,
                    inherited: item.inherited.clone(),
                })
            } else {
                None
            }
        })
        .collect()
}

/// Append one paragraph per `li` below `list`, at every depth, in
/// document order.
pub fn build_list(list: &Element, doc: &mut DocxDocument, out: &mut Fragment) {
    let root = WorkItem {
        el: list,
        level: 0,
        numbering_id: doc.create_numbering(&list.tag, list),
        inherited: Inherited::of(list),
    };

    // Pre-order depth-first: children are pushed in reverse so the
    // leftmost is popped first.
    let mut stack = vec![root];
    while let Some(item) = stack.pop() {
        if item.el.tag == "li" {
            let paragraph = item_paragraph(item.el, &item.inherited);
            let opts = ParagraphOptions::numbered(item.level, item.numbering_id);
            out.import(build_paragraph(Some(&paragraph), &opts, doc));
        }
        let children = expand(&item, doc);
        stack.extend(children.into_iter().rev());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::test_document;
    use crate::node::{parse_html, ParseOptions};
    use crate::xml::XmlElement;

    fn first_list(html: &str) -> Element {
        let nodes = parse_html(html, ParseOptions::default());
        let body = nodes
            .iter()
            .filter_map(Node::as_element)
            .find(|e| e.tag == "body")
            .unwrap();
        let first = body.element_children().next().unwrap().clone();
        first
    }

    #[derive(Debug, PartialEq)]
    struct Item {
        text: String,
        level: u32,
        num_id: u32,
    }

    fn items(frag: &Fragment) -> Vec<Item> {
        fn text(el: &XmlElement, out: &mut String) {
            for c in &el.children {
                match c {
                    crate::xml::XmlNode::Text(t) => out.push_str(t),
                    crate::xml::XmlNode::Element(e) => text(e, out),
                }
            }
        }
        frag.iter()
            .map(|p| {
                let mut s = String::new();
                text(p, &mut s);
                Item {
                    text: s,
                    level: p.find("w:ilvl").unwrap().get_attr("w:val").unwrap().parse().unwrap(),
                    num_id: p.find("w:numId").unwrap().get_attr("w:val").unwrap().parse().unwrap(),
                }
            })
            .collect()
    }

    fn render(html: &str) -> (Vec<Item>, DocxDocument) {
        let mut doc = test_document();
        let mut out = Fragment::new();
        build_list(&first_list(html), &mut doc, &mut out);
        (items(&out), doc)
    }

    #[test]
    fn nested_list_is_one_level_deeper_with_its_own_numbering() {
        let (items, doc) = render("<ul><li>A<ul><li>B</li></ul></li><li>C</li></ul>");
        let texts: Vec<_> = items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
        assert_eq!(items[1].level, items[0].level + 1);
        assert_eq!(items[0].num_id, items[2].num_id);
        assert_ne!(items[1].num_id, items[0].num_id);
        assert_eq!(doc.numberings().len(), 2);
    }

    #[test]
    fn visits_depth_first_not_breadth_first() {
        let (items, _) = render(
            "<ol><li>1<ol><li>1.1<ul><li>1.1.1</li></ul></li><li>1.2</li></ol></li><li>2<ol><li>2.1</li></ol></li></ol>",
        );
        let got: Vec<_> = items.iter().map(|i| (i.text.as_str(), i.level)).collect();
        assert_eq!(
            got,
            vec![("1", 0), ("1.1", 1), ("1.1.1", 2), ("1.2", 1), ("2", 0), ("2.1", 1)]
        );
        let ids: std::collections::BTreeSet<_> = items.iter().map(|i| i.num_id).collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn sibling_nested_lists_get_ids_in_document_order() {
        let (items, _) = render("<ul><li>a<ol><li>x</li></ol><ol><li>y</li></ol></li></ul>");
        assert!(items[1].num_id < items[2].num_id);
        assert_eq!(items[1].level, items[2].level);
    }

    #[test]
    fn item_properties_override_inherited_ones() {
        let mut doc = test_document();
        let mut out = Fragment::new();
        let list = first_list(
            r#"<ul style="color: red; font-weight: bold"><li style="color: blue">x</li><li>y</li></ul>"#,
        );
        build_list(&list, &mut doc, &mut out);
        let xml = out.to_xml_string().unwrap();
        let (first, second) = xml.split_at(xml.find("</w:p>").unwrap());
        assert!(first.contains(r#"<w:color w:val="0000FF"/>"#));
        assert!(first.contains("<w:b/>"));
        assert!(second.contains(r#"<w:color w:val="FF0000"/>"#));
    }

    #[test]
    fn very_deep_nesting_reuses_the_last_defined_level() {
        let depth = 11;
        let html = format!(
            "{}x{}",
            "<ul><li>".repeat(depth),
            "</li></ul>".repeat(depth)
        );
        let (items, _) = render(&html);
        assert_eq!(items.len(), depth);
        let levels: Vec<_> = items.iter().map(|i| i.level).collect();
        assert_eq!(&levels[..9], &[0, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&levels[9..], &[8, 8]);
        assert!(levels.iter().all(|l| *l < crate::document::NUMBERING_LEVELS));
    }

    #[test]
    fn stray_content_directly_under_a_list_is_ignored() {
        let (items, _) = render("<ul><p>loose</p><li>kept</li></ul>");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "kept");
    }
}
