//! WordprocessingML fragment construction for single nodes.

mod drawing;
mod paragraph;
mod table;

pub use drawing::{build_picture_paragraph, picture_extent_emu, PictureOptions};
pub use paragraph::{build_paragraph, NumberingRef, ParagraphOptions};
pub use table::{build_table, TableOptions};
