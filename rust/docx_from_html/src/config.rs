//! Document-wide options read by the renderer and the packager.
//!
//! All lengths are in twips (1/20 pt, 1440 per inch) unless a field says
//! otherwise. Every field has a default so a partial JSON file is enough.

use crate::error::Result;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

impl Default for PageSize {
    fn default() -> Self {
        // US Letter
        Self {
            width: 12240,
            height: 15840,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Margins {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
    pub header: u32,
    pub footer: u32,
    pub gutter: u32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 1440,
            right: 1440,
            bottom: 1440,
            left: 1440,
            header: 708,
            footer: 708,
            gutter: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RowOptions {
    /// Emit `w:cantSplit` on every table row.
    pub cant_split: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableOptions {
    pub row: RowOptions,
    /// Follow every table with an empty paragraph.
    pub add_spacing_after: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            row: RowOptions::default(),
            add_spacing_after: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct PreprocessingOptions {
    /// Keep whitespace-only text nodes between elements.
    pub skip_html_minify: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentOptions {
    pub orientation: Orientation,
    pub page_size: PageSize,
    pub margins: Margins,
    pub title: Option<String>,
    pub creator: String,
    pub font: String,
    /// Default run size in half points.
    pub font_size: u32,
    pub table: TableOptions,
    pub image_fetch_timeout_ms: u64,
    pub preprocessing: PreprocessingOptions,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            orientation: Orientation::Portrait,
            page_size: PageSize::default(),
            margins: Margins::default(),
            title: None,
            creator: "docx_from_html".to_string(),
            font: "Times New Roman".to_string(),
            font_size: 22,
            table: TableOptions::default(),
            image_fetch_timeout_ms: 10_000,
            preprocessing: PreprocessingOptions::default(),
        }
    }
}

impl DocumentOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Page size with orientation applied.
    pub fn effective_page_size(&self) -> PageSize {
        let PageSize { width, height } = self.page_size;
        match self.orientation {
            Orientation::Portrait => PageSize {
                width: width.min(height),
                height: width.max(height),
            },
            Orientation::Landscape => PageSize {
                width: width.max(height),
                height: width.min(height),
            },
        }
    }

    /// Width between the left and right margins.
    pub fn available_document_space(&self) -> u32 {
        self.effective_page_size()
            .width
            .saturating_sub(self.margins.left + self.margins.right)
    }

    pub fn image_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.image_fetch_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_letter_with_inch_margins() {
        let opts = DocumentOptions::default();
        assert_eq!(opts.available_document_space(), 12240 - 2880);
        assert!(opts.table.add_spacing_after);
        assert!(!opts.table.row.cant_split);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let opts = DocumentOptions::from_json_str(
            r#"{"table":{"row":{"cantSplit":true},"addSpacingAfter":false},"orientation":"landscape"}"#,
        )
        .unwrap();
        assert!(opts.table.row.cant_split);
        assert!(!opts.table.add_spacing_after);
        assert_eq!(opts.effective_page_size().width, 15840);
        assert_eq!(opts.font_size, 22);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(DocumentOptions::from_json_str("{not json").is_err());
    }
}
