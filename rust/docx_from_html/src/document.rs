//! Per-conversion document state.
//!
//! `DocxDocument` owns everything the renderer allocates while walking the
//! tree: package entries, the document relationship table, numbering
//! definitions and media files. All ids are handed out monotonically and
//! never reused within one conversion.

use crate::config::DocumentOptions;
use crate::error::{Error, Result};
use crate::fetch::{HttpFetcher, ImageFetcher};
use crate::node::Element;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const MEDIA_FOLDER: &str = "word/media";

/// Levels defined per numbering definition; `w:ilvl` runs 0..NUMBERING_LEVELS.
pub const NUMBERING_LEVELS: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    Styles,
    Numbering,
    Image,
    Hyperlink,
}

impl RelationshipKind {
    pub fn uri(self) -> &'static str {
        match self {
            RelationshipKind::Styles => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles"
            }
            RelationshipKind::Numbering => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering"
            }
            RelationshipKind::Image => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image"
            }
            RelationshipKind::Hyperlink => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub kind: RelationshipKind,
    pub target: String,
    pub target_mode: TargetMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NumberingId(pub u32);

impl std::fmt::Display for NumberingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Level format of a list definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    Bullet,
    Decimal,
    LowerLetter,
    UpperLetter,
    LowerRoman,
    UpperRoman,
}

impl ListFormat {
    fn from_list(tag: &str, list_style_type: Option<&str>) -> Self {
        match list_style_type.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("disc" | "circle" | "square" | "none") => ListFormat::Bullet,
            Some("decimal" | "decimal-leading-zero") => ListFormat::Decimal,
            Some("lower-alpha" | "lower-latin") => ListFormat::LowerLetter,
            Some("upper-alpha" | "upper-latin") => ListFormat::UpperLetter,
            Some("lower-roman") => ListFormat::LowerRoman,
            Some("upper-roman") => ListFormat::UpperRoman,
            _ if tag == "ol" => ListFormat::Decimal,
            _ => ListFormat::Bullet,
        }
    }

    pub fn num_fmt(self) -> &'static str {
        match self {
            ListFormat::Bullet => "bullet",
            ListFormat::Decimal => "decimal",
            ListFormat::LowerLetter => "lowerLetter",
            ListFormat::UpperLetter => "upperLetter",
            ListFormat::LowerRoman => "lowerRoman",
            ListFormat::UpperRoman => "upperRoman",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingDefinition {
    pub id: NumberingId,
    pub format: ListFormat,
    pub start: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub id: u32,
    pub file_name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

/// Zip entries written during the conversion. Additive only.
#[derive(Debug, Default)]
pub struct Package {
    entries: BTreeMap<String, Vec<u8>>,
}

impl Package {
    pub fn add_file(&mut self, path: &str, content: Vec<u8>) -> Result<()> {
        if self.entries.contains_key(path) {
            return Err(Error::DuplicateEntry(path.to_string()));
        }
        self.entries.insert(path.to_string(), content);
        Ok(())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Distinct lower-case extensions of entries below `folder`.
    pub fn extensions_in(&self, folder: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .entries
            .keys()
            .filter(|k| k.starts_with(folder))
            .filter_map(|k| k.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()))
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

/// Split a `data:<mime>;base64,<payload>` URI into MIME type and bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| Error::InvalidDataUri("missing data: scheme".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::InvalidDataUri("missing payload separator".to_string()))?;
    let mut parts = header.split(';');
    let mime = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
    if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(Error::InvalidDataUri("payload is not base64".to_string()));
    }
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(payload)?;
    if bytes.is_empty() {
        return Err(Error::InvalidDataUri("empty payload".to_string()));
    }
    Ok((mime, bytes))
}

pub struct DocxDocument {
    options: DocumentOptions,
    fetcher: Arc<dyn ImageFetcher>,
    package: Package,
    relationships: Vec<Relationship>,
    numberings: Vec<NumberingDefinition>,
    media: Vec<MediaFile>,
    next_relationship: u32,
    next_numbering: u32,
    next_media: u32,
}

impl DocxDocument {
    /// `rId1` and `rId2` are reserved for the styles and numbering parts.
    const FIRST_DYNAMIC_RELATIONSHIP: u32 = 3;

    pub fn new(options: DocumentOptions) -> Self {
        let fetcher = Arc::new(HttpFetcher::new(options.image_fetch_timeout()));
        Self::with_fetcher(options, fetcher)
    }

    pub fn with_fetcher(options: DocumentOptions, fetcher: Arc<dyn ImageFetcher>) -> Self {
        let relationships = vec![
            Relationship {
                id: "rId1".to_string(),
                kind: RelationshipKind::Styles,
                target: "styles.xml".to_string(),
                target_mode: TargetMode::Internal,
            },
            Relationship {
                id: "rId2".to_string(),
                kind: RelationshipKind::Numbering,
                target: "numbering.xml".to_string(),
                target_mode: TargetMode::Internal,
            },
        ];
        Self {
            options,
            fetcher,
            package: Package::default(),
            relationships,
            numberings: Vec::new(),
            media: Vec::new(),
            next_relationship: Self::FIRST_DYNAMIC_RELATIONSHIP,
            next_numbering: 1,
            next_media: 1,
        }
    }

    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    pub fn fetcher(&self) -> Arc<dyn ImageFetcher> {
        Arc::clone(&self.fetcher)
    }

    pub fn available_document_space(&self) -> u32 {
        self.options.available_document_space()
    }

    pub fn table_row_cant_split(&self) -> bool {
        self.options.table.row.cant_split
    }

    pub fn add_spacing_after_table(&self) -> bool {
        self.options.table.add_spacing_after
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn package_mut(&mut self) -> &mut Package {
        &mut self.package
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn numberings(&self) -> &[NumberingDefinition] {
        &self.numberings
    }

    pub fn media(&self) -> &[MediaFile] {
        &self.media
    }

    pub fn create_document_relationship(
        &mut self,
        kind: RelationshipKind,
        target: &str,
        target_mode: TargetMode,
    ) -> String {
        let id = format!("rId{}", self.next_relationship);
        self.next_relationship += 1;
        self.relationships.push(Relationship {
            id: id.clone(),
            kind,
            target: target.to_string(),
            target_mode,
        });
        id
    }

    /// Mint a numbering definition for a list element. Every call returns
    /// a new id, even for identical lists.
    pub fn create_numbering(&mut self, list_tag: &str, props: &Element) -> NumberingId {
        let id = NumberingId(self.next_numbering);
        self.next_numbering += 1;
        let format = ListFormat::from_list(list_tag, props.style_value("list-style-type"));
        let start = props
            .attr("start")
            .and_then(|s| s.trim().parse::<u32>().ok())
            .unwrap_or(1);
        self.numberings.push(NumberingDefinition { id, format, start });
        id
    }

    /// Decode a data URI, name it after its sniffed type and write it to
    /// `word/media/`.
    pub fn create_media_file(&mut self, data_uri: &str) -> Result<MediaFile> {
        let (declared_mime, content) = decode_data_uri(data_uri)?;
        self.add_media(&declared_mime, content)
    }

    /// Register already decoded image bytes under `word/media/`.
    pub fn add_media(&mut self, declared_mime: &str, content: Vec<u8>) -> Result<MediaFile> {
        let format = image::guess_format(&content)
            .map_err(|e| Error::UnsupportedImage(format!("{declared_mime}: {e}")))?;
        let extension = format
            .extensions_str()
            .first()
            .copied()
            .ok_or_else(|| Error::UnsupportedImage(format!("{format:?} has no extension")))?;

        let id = self.next_media;
        let file_name = format!("image-{id}.{extension}");
        self.package
            .add_file(&format!("{MEDIA_FOLDER}/{file_name}"), content.clone())?;
        self.next_media += 1;

        let media = MediaFile {
            id,
            file_name,
            mime_type: format.to_mime_type().to_string(),
            content,
        };
        self.media.push(media.clone());
        Ok(media)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fetch::tests::StaticFetcher;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::new_rgb8(width, height)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    pub(crate) fn png_data_uri(width: u32, height: u32) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(width, height)))
    }

    pub(crate) fn test_document() -> DocxDocument {
        DocxDocument::with_fetcher(DocumentOptions::default(), Arc::new(StaticFetcher::default()))
    }

    #[test]
    fn relationship_ids_are_monotonic_after_reserved_parts() {
        let mut doc = test_document();
        let a = doc.create_document_relationship(
            RelationshipKind::Image,
            "media/a.png",
            TargetMode::Internal,
        );
        let b = doc.create_document_relationship(
            RelationshipKind::Hyperlink,
            "https://example.com",
            TargetMode::External,
        );
        assert_eq!((a.as_str(), b.as_str()), ("rId3", "rId4"));
        assert_eq!(doc.relationships().len(), 4);
    }

    #[test]
    fn numbering_ids_are_distinct_per_call() {
        let mut doc = test_document();
        let ul = Element::new("ul");
        let a = doc.create_numbering("ul", &ul);
        let b = doc.create_numbering("ul", &ul);
        let c = doc.create_numbering("ol", &Element::new("ol").with_attr("start", "4"));
        assert!(a != b && b != c && a != c);
        assert_eq!(doc.numberings()[2].format, ListFormat::Decimal);
        assert_eq!(doc.numberings()[2].start, 4);
    }

    #[test]
    fn list_style_type_overrides_tag_default() {
        let mut doc = test_document();
        let ol = Element::new("ol").with_attr("style", "list-style-type: upper-roman");
        doc.create_numbering("ol", &ol);
        let ul = Element::new("ul").with_attr("style", "list-style-type: decimal");
        doc.create_numbering("ul", &ul);
        assert_eq!(doc.numberings()[0].format, ListFormat::UpperRoman);
        assert_eq!(doc.numberings()[1].format, ListFormat::Decimal);
    }

    #[test]
    fn media_files_are_named_from_sniffed_type() {
        let mut doc = test_document();
        // Declared type is wrong on purpose; the bytes are PNG.
        let uri = png_data_uri(2, 2).replace("image/png", "image/jpeg");
        let media = doc.create_media_file(&uri).unwrap();
        assert_eq!(media.file_name, "image-1.png");
        assert_eq!(media.mime_type, "image/png");
        assert!(doc.package().contains("word/media/image-1.png"));
        assert_eq!(doc.create_media_file(&png_data_uri(1, 1)).unwrap().file_name, "image-2.png");
    }

    #[test]
    fn rejects_non_image_and_malformed_payloads() {
        let mut doc = test_document();
        let text = format!("data:image/png;base64,{}", STANDARD.encode(b"not an image"));
        assert!(matches!(doc.create_media_file(&text), Err(Error::UnsupportedImage(_))));
        assert!(matches!(
            doc.create_media_file("data:image/png,raw"),
            Err(Error::InvalidDataUri(_))
        ));
        assert!(matches!(doc.create_media_file("image.png"), Err(Error::InvalidDataUri(_))));
        assert!(doc.package().is_empty());
        assert!(doc.media().is_empty());
    }

    #[test]
    fn accepts_whitespace_after_payload_separator() {
        let uri = png_data_uri(1, 1).replacen(',', ", ", 1);
        let (mime, bytes) = decode_data_uri(&uri).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, png_bytes(1, 1));
    }

    #[test]
    fn package_refuses_to_overwrite() {
        let mut pkg = Package::default();
        pkg.add_file("word/media/x.png", vec![1]).unwrap();
        assert!(matches!(
            pkg.add_file("word/media/x.png", vec![2]),
            Err(Error::DuplicateEntry(_))
        ));
        assert_eq!(pkg.entries().next().unwrap().1, &[1]);
    }
}
