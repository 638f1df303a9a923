//! Image resolution: `img` source → media entry + relationship + picture
//! paragraph.
//!
//! Each failure is reported with the stage it happened in. The payload is
//! fully validated, dimensions included, before anything is registered, so
//! a failed image never leaves a media entry or relationship behind.

use crate::builder::{build_picture_paragraph, PictureOptions};
use crate::document::{decode_data_uri, DocxDocument, RelationshipKind, TargetMode};
use crate::fetch::{is_valid_url, FetchError};
use crate::node::Element;
use crate::xml::Fragment;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStage {
    Fetch,
    Decode,
    Register,
    Render,
}

impl fmt::Display for ImageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImageStage::Fetch => "fetch",
            ImageStage::Decode => "decode",
            ImageStage::Register => "register",
            ImageStage::Render => "render",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("could not fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("no usable image payload: {0}")]
    Decode(String),

    #[error("could not register media: {0}")]
    Register(#[source] crate::error::Error),

    #[error("could not lay out image: {0}")]
    Render(String),
}

impl ImageError {
    pub fn stage(&self) -> ImageStage {
        match self {
            ImageError::Fetch { .. } => ImageStage::Fetch,
            ImageError::Decode(_) => ImageStage::Decode,
            ImageError::Register(_) => ImageStage::Register,
            ImageError::Render(_) => ImageStage::Render,
        }
    }
}

async fn fetch_as_data_uri(doc: &DocxDocument, url: &str) -> Result<String, ImageError> {
    let timeout = doc.options().image_fetch_timeout();
    let fetcher = doc.fetcher();
    let bytes = match tokio::time::timeout(timeout, fetcher.fetch(url)).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(source)) => {
            return Err(ImageError::Fetch {
                url: url.to_string(),
                source,
            })
        }
        Err(_) => {
            return Err(ImageError::Fetch {
                url: url.to_string(),
                source: FetchError::Timeout(timeout),
            })
        }
    };
    let mime = image::guess_format(&bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(&bytes)))
}

fn decode_source(src: &str) -> Result<String, ImageError> {
    let decoded = urlencoding::decode(src).map_err(|e| ImageError::Decode(e.to_string()))?;
    let decoded = decoded.trim();
    if !decoded.starts_with("data:") {
        return Err(ImageError::Decode(format!(
            "not a URL or data URI: {}",
            decoded.chars().take(64).collect::<String>()
        )));
    }
    Ok(decoded.to_string())
}

fn pixel_dimensions(content: &[u8], format: image::ImageFormat) -> Result<(u32, u32), ImageError> {
    image::ImageReader::with_format(Cursor::new(content), format)
        .into_dimensions()
        .map_err(|e| ImageError::Render(e.to_string()))
}

/// Resolve an `img` element into a picture paragraph.
///
/// `maximum_width` is in twips and defaults to the document's content
/// width.
pub async fn build_image(
    doc: &mut DocxDocument,
    img: &Element,
    maximum_width: Option<u32>,
) -> Result<Fragment, ImageError> {
    let src = img
        .attr("src")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ImageError::Decode("missing src".to_string()))?;

    let data_uri = if is_valid_url(src) {
        fetch_as_data_uri(doc, src).await?
    } else {
        decode_source(src)?
    };

    let (declared_mime, content) = decode_data_uri(&data_uri).map_err(ImageError::Register)?;
    let format = image::guess_format(&content).map_err(|e| {
        ImageError::Register(crate::error::Error::UnsupportedImage(format!("{declared_mime}: {e}")))
    })?;
    let (original_width, original_height) = pixel_dimensions(&content, format)?;

    let media = doc
        .add_media(&declared_mime, content)
        .map_err(ImageError::Register)?;

    let relationship_id = doc.create_document_relationship(
        RelationshipKind::Image,
        &format!("media/{}", media.file_name),
        TargetMode::Internal,
    );

    let opts = PictureOptions {
        relationship_id,
        picture_id: media.id,
        file_name: media.file_name,
        description: img.attr("alt").unwrap_or_default().to_string(),
        original_width,
        original_height,
        maximum_width: maximum_width.unwrap_or_else(|| doc.available_document_space()),
    };
    Ok(build_picture_paragraph(&opts))
}
