//! HTML to WordprocessingML conversion.
//!
//! [`html_to_docx`] parses an HTML document, renders it into body markup
//! and zips the result together with styles, numbering, relationships and
//! media into `.docx` bytes. The pieces are public so callers can supply
//! their own tree, fetcher or packaging.

pub mod builder;
pub mod config;
pub mod css;
pub mod document;
pub mod error;
pub mod fetch;
pub mod image;
pub mod list;
pub mod node;
mod package;
pub mod render;
pub mod xml;

pub use config::DocumentOptions;
pub use document::DocxDocument;
pub use error::{Error, Result};
pub use fetch::{FetchError, HttpFetcher, ImageFetcher};
pub use node::{parse_html, Element, Node, ParseOptions};
pub use render::{render_document, Diagnostic, RenderOutput};
pub use xml::Fragment;

use std::sync::Arc;

/// A finished document plus everything that was skipped on the way.
#[derive(Debug)]
pub struct Converted {
    pub bytes: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Convert `html` with remote images fetched over HTTP.
pub async fn html_to_docx(html: &str, options: DocumentOptions) -> Result<Converted> {
    let fetcher = Arc::new(HttpFetcher::new(options.image_fetch_timeout()));
    html_to_docx_with_fetcher(html, options, fetcher).await
}

/// Same as [`html_to_docx`] with a caller-provided image source.
pub async fn html_to_docx_with_fetcher(
    html: &str,
    options: DocumentOptions,
    fetcher: Arc<dyn ImageFetcher>,
) -> Result<Converted> {
    if html.trim().is_empty() {
        return Err(Error::EmptyInput);
    }
    let parse_opts = ParseOptions {
        keep_whitespace: options.preprocessing.skip_html_minify,
    };
    let tree = parse_html(html, parse_opts);

    let mut document = DocxDocument::with_fetcher(options, fetcher);
    let RenderOutput {
        fragment,
        diagnostics,
    } = render_document(&mut document, &tree).await;
    tracing::info!(
        elements = fragment.len(),
        skipped = diagnostics.len(),
        "html rendered"
    );

    let bytes = document.into_docx(&fragment)?;
    Ok(Converted { bytes, diagnostics })
}
