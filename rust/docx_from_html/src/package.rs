//! Assembling the `.docx` zip from a rendered body and the document state.

use crate::config::Orientation;
use crate::document::{
    DocxDocument, ListFormat, NumberingDefinition, TargetMode, MEDIA_FOLDER, NUMBERING_LEVELS,
};
use crate::error::Result;
use crate::xml::{part_to_bytes, Fragment, XmlElement, NS_R, NS_W, NS_WP};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_CORE_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";

const BULLETS: [&str; 3] = ["\u{2022}", "\u{25E6}", "\u{25AA}"];

fn media_content_type(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

fn content_types(doc: &DocxDocument) -> XmlElement {
    let mut types = XmlElement::new("Types")
        .attr("xmlns", NS_CONTENT_TYPES)
        .child(
            XmlElement::new("Default")
                .attr("Extension", "rels")
                .attr("ContentType", "application/vnd.openxmlformats-package.relationships+xml"),
        )
        .child(
            XmlElement::new("Default")
                .attr("Extension", "xml")
                .attr("ContentType", "application/xml"),
        );
    for ext in doc.package().extensions_in(MEDIA_FOLDER) {
        let content_type = media_content_type(&ext);
        types.push(
            XmlElement::new("Default")
                .attr("Extension", ext)
                .attr("ContentType", content_type),
        );
    }
    let overrides = [
        (
            "/word/document.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
        ),
        (
            "/word/styles.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml",
        ),
        (
            "/word/numbering.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml",
        ),
        (
            "/docProps/core.xml",
            "application/vnd.openxmlformats-package.core-properties+xml",
        ),
    ];
    for (part, content_type) in overrides {
        types.push(
            XmlElement::new("Override")
                .attr("PartName", part)
                .attr("ContentType", content_type),
        );
    }
    types
}

fn package_rels() -> XmlElement {
    XmlElement::new("Relationships")
        .attr("xmlns", NS_RELATIONSHIPS)
        .child(
            XmlElement::new("Relationship")
                .attr("Id", "rId1")
                .attr("Type", REL_OFFICE_DOCUMENT)
                .attr("Target", "word/document.xml"),
        )
        .child(
            XmlElement::new("Relationship")
                .attr("Id", "rId2")
                .attr("Type", REL_CORE_PROPERTIES)
                .attr("Target", "docProps/core.xml"),
        )
}

fn document_rels(doc: &DocxDocument) -> XmlElement {
    let mut rels = XmlElement::new("Relationships").attr("xmlns", NS_RELATIONSHIPS);
    for rel in doc.relationships() {
        let mut el = XmlElement::new("Relationship")
            .attr("Id", rel.id.as_str())
            .attr("Type", rel.kind.uri())
            .attr("Target", rel.target.as_str());
        if rel.target_mode == TargetMode::External {
            el.set_attr("TargetMode", "External");
        }
        rels.push(el);
    }
    rels
}

fn core_properties(doc: &DocxDocument) -> XmlElement {
    let opts = doc.options();
    let mut core = XmlElement::new("cp:coreProperties")
        .attr(
            "xmlns:cp",
            "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
        )
        .attr("xmlns:dc", "http://purl.org/dc/elements/1.1/")
        .attr("xmlns:dcterms", "http://purl.org/dc/terms/")
        .attr("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance");
    if let Some(title) = &opts.title {
        core.push(XmlElement::new("dc:title").text(title.as_str()));
    }
    core.push(XmlElement::new("dc:creator").text(opts.creator.as_str()));
    core
}

fn section_properties(doc: &DocxDocument) -> XmlElement {
    let opts = doc.options();
    let size = opts.effective_page_size();
    let m = opts.margins;
    let mut pg_sz = XmlElement::new("w:pgSz")
        .attr("w:w", size.width.to_string())
        .attr("w:h", size.height.to_string());
    if opts.orientation == Orientation::Landscape {
        pg_sz.set_attr("w:orient", "landscape");
    }
    XmlElement::new("w:sectPr")
        .child(pg_sz)
        .child(
            XmlElement::new("w:pgMar")
                .attr("w:top", m.top.to_string())
                .attr("w:right", m.right.to_string())
                .attr("w:bottom", m.bottom.to_string())
                .attr("w:left", m.left.to_string())
                .attr("w:header", m.header.to_string())
                .attr("w:footer", m.footer.to_string())
                .attr("w:gutter", m.gutter.to_string()),
        )
        .child(XmlElement::new("w:cols").attr("w:space", "708"))
        .child(XmlElement::new("w:docGrid").attr("w:linePitch", "360"))
}

fn document_part(doc: &DocxDocument, body: &Fragment) -> XmlElement {
    let mut body_el = XmlElement::new("w:body");
    for el in body {
        body_el.push(el.clone());
    }
    body_el.push(section_properties(doc));
    XmlElement::new("w:document")
        .attr("xmlns:w", NS_W)
        .attr("xmlns:r", NS_R)
        .attr("xmlns:wp", NS_WP)
        .child(body_el)
}

fn heading_style(level: u32, size: u32) -> XmlElement {
    XmlElement::new("w:style")
        .attr("w:type", "paragraph")
        .attr("w:styleId", format!("Heading{level}"))
        .child(XmlElement::new("w:name").attr("w:val", format!("heading {level}")))
        .child(XmlElement::new("w:basedOn").attr("w:val", "Normal"))
        .child(XmlElement::new("w:next").attr("w:val", "Normal"))
        .child(XmlElement::new("w:uiPriority").attr("w:val", "9"))
        .child(XmlElement::new("w:qFormat"))
        .child(
            XmlElement::new("w:pPr")
                .child(XmlElement::new("w:keepNext"))
                .child(XmlElement::new("w:keepLines"))
                .child(
                    XmlElement::new("w:spacing")
                        .attr("w:before", "240")
                        .attr("w:after", "120"),
                )
                .child(XmlElement::new("w:outlineLvl").attr("w:val", (level - 1).to_string())),
        )
        .child(
            XmlElement::new("w:rPr")
                .child(XmlElement::new("w:b"))
                .child(XmlElement::new("w:sz").attr("w:val", size.to_string())),
        )
}

fn styles_part(doc: &DocxDocument) -> XmlElement {
    let opts = doc.options();
    let font = opts.font.as_str();
    let mut styles = XmlElement::new("w:styles")
        .attr("xmlns:w", NS_W)
        .child(
            XmlElement::new("w:docDefaults").child(
                XmlElement::new("w:rPrDefault").child(
                    XmlElement::new("w:rPr")
                        .child(
                            XmlElement::new("w:rFonts")
                                .attr("w:ascii", font)
                                .attr("w:hAnsi", font)
                                .attr("w:cs", font),
                        )
                        .child(XmlElement::new("w:sz").attr("w:val", opts.font_size.to_string()))
                        .child(
                            XmlElement::new("w:szCs").attr("w:val", opts.font_size.to_string()),
                        ),
                ),
            ),
        )
        .child(
            XmlElement::new("w:style")
                .attr("w:type", "paragraph")
                .attr("w:default", "1")
                .attr("w:styleId", "Normal")
                .child(XmlElement::new("w:name").attr("w:val", "Normal"))
                .child(XmlElement::new("w:qFormat")),
        );
    for (level, size) in [(1, 32), (2, 28), (3, 26), (4, 24), (5, 22), (6, 22)] {
        styles.push(heading_style(level, size));
    }
    styles.push(
        XmlElement::new("w:style")
            .attr("w:type", "character")
            .attr("w:styleId", "Hyperlink")
            .child(XmlElement::new("w:name").attr("w:val", "Hyperlink"))
            .child(
                XmlElement::new("w:rPr")
                    .child(XmlElement::new("w:color").attr("w:val", "0563C1"))
                    .child(XmlElement::new("w:u").attr("w:val", "single")),
            ),
    );
    styles
}

fn level(def: &NumberingDefinition, ilvl: u32) -> XmlElement {
    let (num_fmt, text) = match def.format {
        ListFormat::Bullet => ("bullet", BULLETS[ilvl as usize % BULLETS.len()].to_string()),
        other => (other.num_fmt(), format!("%{}.", ilvl + 1)),
    };
    XmlElement::new("w:lvl")
        .attr("w:ilvl", ilvl.to_string())
        .child(XmlElement::new("w:start").attr("w:val", def.start.to_string()))
        .child(XmlElement::new("w:numFmt").attr("w:val", num_fmt))
        .child(XmlElement::new("w:lvlText").attr("w:val", text))
        .child(XmlElement::new("w:lvlJc").attr("w:val", "left"))
        .child(
            XmlElement::new("w:pPr").child(
                XmlElement::new("w:ind")
                    .attr("w:left", (720 * (ilvl + 1)).to_string())
                    .attr("w:hanging", "360"),
            ),
        )
}

fn numbering_part(doc: &DocxDocument) -> XmlElement {
    let mut numbering = XmlElement::new("w:numbering").attr("xmlns:w", NS_W);
    // every abstractNum must precede the first num
    for def in doc.numberings() {
        let mut abs = XmlElement::new("w:abstractNum")
            .attr("w:abstractNumId", def.id.to_string())
            .child(XmlElement::new("w:multiLevelType").attr("w:val", "hybridMultilevel"));
        for ilvl in 0..NUMBERING_LEVELS {
            abs.push(level(def, ilvl));
        }
        numbering.push(abs);
    }
    for def in doc.numberings() {
        numbering.push(
            XmlElement::new("w:num")
                .attr("w:numId", def.id.to_string())
                .child(XmlElement::new("w:abstractNumId").attr("w:val", def.id.to_string())),
        );
    }
    numbering
}

impl DocxDocument {
    /// Zip `body` together with every part this document has accumulated.
    pub fn into_docx(self, body: &Fragment) -> Result<Vec<u8>> {
        let parts = [
            ("[Content_Types].xml", content_types(&self)),
            ("_rels/.rels", package_rels()),
            ("docProps/core.xml", core_properties(&self)),
            ("word/document.xml", document_part(&self, body)),
            ("word/styles.xml", styles_part(&self)),
            ("word/numbering.xml", numbering_part(&self)),
            ("word/_rels/document.xml.rels", document_rels(&self)),
        ];

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opt = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (path, root) in &parts {
            zip.start_file(*path, opt)?;
            zip.write_all(&part_to_bytes(root)?)?;
        }
        for (path, content) in self.package().entries() {
            zip.start_file(path, opt)?;
            zip.write_all(content)?;
        }
        let cursor = zip.finish()?;
        tracing::debug!(
            entries = parts.len() + self.package().len(),
            "docx package written"
        );
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentOptions;
    use crate::document::tests::{png_data_uri, test_document};
    use crate::document::RelationshipKind;
    use crate::node::Element;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_entry(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    fn body() -> Fragment {
        Fragment::from_element(
            XmlElement::new("w:p").child(
                XmlElement::new("w:r").child(XmlElement::new("w:t").text("hello")),
            ),
        )
    }

    #[test]
    fn writes_all_parts() {
        let bytes = test_document().into_docx(&body()).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let mut names: Vec<_> = archive.file_names().collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "[Content_Types].xml",
                "_rels/.rels",
                "docProps/core.xml",
                "word/_rels/document.xml.rels",
                "word/document.xml",
                "word/numbering.xml",
                "word/styles.xml",
            ]
        );
        let document = read_entry(&bytes, "word/document.xml");
        assert!(document.starts_with("<?xml"));
        assert!(document.contains("<w:t>hello</w:t>"));
        assert!(document.contains(r#"<w:pgSz w:w="12240" w:h="15840"/>"#));
    }

    #[test]
    fn landscape_swaps_page_dimensions() {
        let opts = DocumentOptions::from_json_str(r#"{"orientation":"landscape"}"#).unwrap();
        let doc = DocxDocument::with_fetcher(opts, test_document().fetcher());
        let bytes = doc.into_docx(&Fragment::new()).unwrap();
        let document = read_entry(&bytes, "word/document.xml");
        assert!(document.contains(r#"<w:pgSz w:w="15840" w:h="12240" w:orient="landscape"/>"#));
    }

    #[test]
    fn media_and_relationships_are_packaged() {
        let mut doc = test_document();
        let media = doc.create_media_file(&png_data_uri(2, 2)).unwrap();
        let rid = doc.create_document_relationship(
            RelationshipKind::Image,
            &format!("media/{}", media.file_name),
            TargetMode::Internal,
        );
        doc.create_document_relationship(
            RelationshipKind::Hyperlink,
            "https://example.com/",
            TargetMode::External,
        );
        let bytes = doc.into_docx(&Fragment::new()).unwrap();

        let types = read_entry(&bytes, "[Content_Types].xml");
        assert!(types.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
        let rels = read_entry(&bytes, "word/_rels/document.xml.rels");
        assert!(rels.contains(&format!(r#"Id="{rid}""#)));
        assert!(rels.contains(r#"Target="media/image-1.png""#));
        assert!(rels.contains(r#"TargetMode="External""#));
        assert!(rels.contains(r#"Id="rId1""#));
        let archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        assert!(archive.file_names().any(|n| n == "word/media/image-1.png"));
    }

    #[test]
    fn numbering_lists_abstract_definitions_first() {
        let mut doc = test_document();
        doc.create_numbering("ul", &Element::new("ul"));
        doc.create_numbering(
            "ol",
            &Element::new("ol")
                .with_attr("start", "4")
                .with_attr("style", "list-style-type: upper-roman"),
        );
        let bytes = doc.into_docx(&Fragment::new()).unwrap();
        let numbering = read_entry(&bytes, "word/numbering.xml");
        let last_abstract = numbering.rfind("<w:abstractNum ").unwrap();
        let first_num = numbering.find("<w:num ").unwrap();
        assert!(last_abstract < first_num);
        assert!(numbering.contains("<w:lvlText w:val=\"\u{2022}\"/>"));
        assert!(numbering.contains(r#"<w:numFmt w:val="upperRoman"/>"#));
        assert!(numbering.contains(r#"<w:start w:val="4"/>"#));
        assert_eq!(numbering.matches("<w:lvl ").count(), 18);
    }

    #[test]
    fn heading_properties_follow_schema_order() {
        let xml = styles_part(&test_document()).to_xml_string().unwrap();
        let start = xml.find(r#"w:styleId="Heading1""#).unwrap();
        let heading = &xml[start..];
        let ppr = &heading[heading.find("<w:pPr>").unwrap()..heading.find("</w:pPr>").unwrap()];
        assert_eq!(
            ppr,
            r#"<w:pPr><w:keepNext/><w:keepLines/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/>"#
        );
    }

    #[test]
    fn core_properties_carry_title_and_creator() {
        let opts = DocumentOptions {
            title: Some("Report & summary".to_string()),
            ..DocumentOptions::default()
        };
        let doc = DocxDocument::with_fetcher(opts, test_document().fetcher());
        let bytes = doc.into_docx(&Fragment::new()).unwrap();
        let core = read_entry(&bytes, "docProps/core.xml");
        assert!(core.contains("<dc:title>Report &amp; summary</dc:title>"));
        assert!(core.contains("<dc:creator>docx_from_html</dc:creator>"));
    }
}
