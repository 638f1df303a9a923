//! In-memory WordprocessingML fragments.
//!
//! Elements are kept as a small tree rather than a string so callers can
//! patch attributes after the fact; serialization goes through quick-xml.

use crate::error::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

pub const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
pub const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Insert or replace an attribute in place.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    pub fn first_child_mut(&mut self) -> Option<&mut XmlElement> {
        self.children.iter_mut().find_map(|c| match c {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    /// Depth-first search for the first descendant (or self) named `name`.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        if self.name == name {
            return Some(self);
        }
        self.elements().find_map(|c| c.find(name))
    }

    pub fn count(&self, name: &str) -> usize {
        let own = usize::from(self.name == name);
        own + self.elements().map(|c| c.count(name)).sum::<usize>()
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let start = BytesStart::new(self.name.as_str()).with_attributes(
            self.attributes
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            match child {
                XmlNode::Element(el) => el.write(writer)?,
                XmlNode::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }

    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write(&mut writer)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }
}

/// An ordered run of sibling elements not yet attached to a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    elements: Vec<XmlElement>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_element(el: XmlElement) -> Self {
        Self { elements: vec![el] }
    }

    pub fn push(&mut self, el: XmlElement) {
        self.elements.push(el);
    }

    /// Append all of `other`'s elements, in order.
    pub fn import(&mut self, other: Fragment) {
        self.elements.extend(other.elements);
    }

    pub fn first_mut(&mut self) -> Option<&mut XmlElement> {
        self.elements.first_mut()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, XmlElement> {
        self.elements.iter()
    }

    pub fn write_to<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        for el in &self.elements {
            el.write(writer)?;
        }
        Ok(())
    }

    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_to(&mut writer)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }
}

impl<'a> IntoIterator for &'a Fragment {
    type Item = &'a XmlElement;
    type IntoIter = std::slice::Iter<'a, XmlElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// Serialize a standalone part: XML declaration followed by `root`.
pub fn part_to_bytes(root: &XmlElement) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    writer.get_mut().push(b'\n');
    root.write(&mut writer)?;
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_nested_elements_with_escaping() {
        let p = XmlElement::new("w:p").child(
            XmlElement::new("w:r").child(
                XmlElement::new("w:t")
                    .attr("xml:space", "preserve")
                    .text("a < b & \"c\""),
            ),
        );
        let xml = p.to_xml_string().unwrap();
        assert_eq!(
            xml,
            r#"<w:p><w:r><w:t xml:space="preserve">a &lt; b &amp; &quot;c&quot;</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn import_appends_in_order_and_first_is_patchable() {
        let mut out = Fragment::new();
        out.push(XmlElement::new("w:p").attr("n", "1"));
        let mut other = Fragment::new();
        other.push(XmlElement::new("w:tbl"));
        other.push(XmlElement::new("w:p").attr("n", "2"));
        out.import(other);

        let names: Vec<_> = out.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["w:p", "w:tbl", "w:p"]);

        out.first_mut().unwrap().set_attr("n", "patched");
        assert_eq!(out.iter().next().unwrap().get_attr("n"), Some("patched"));
        assert_eq!(out.to_xml_string().unwrap(), r#"<w:p n="patched"/><w:tbl/><w:p n="2"/>"#);
    }
}
