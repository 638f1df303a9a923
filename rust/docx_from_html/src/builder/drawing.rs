use crate::css::{EMU_PER_PX, EMU_PER_TWIP};
use crate::xml::{Fragment, XmlElement, NS_A, NS_PIC};

/// Everything needed to place an already registered image inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureOptions {
    pub relationship_id: String,
    /// Unique per document, used for `wp:docPr/@id`.
    pub picture_id: u32,
    pub file_name: String,
    pub description: String,
    pub original_width: u32,
    pub original_height: u32,
    /// Upper bound for the rendered width, in twips.
    pub maximum_width: u32,
}

/// Rendered size in EMU, scaled down proportionally to fit the maximum
/// width.
pub fn picture_extent_emu(opts: &PictureOptions) -> (u64, u64) {
    let width = u64::from(opts.original_width) * EMU_PER_PX;
    let height = u64::from(opts.original_height) * EMU_PER_PX;
    let max = u64::from(opts.maximum_width) * EMU_PER_TWIP;
    if width == 0 || max == 0 || width <= max {
        return (width, height);
    }
    (max, height * max / width)
}

/// Build a paragraph holding a single inline `w:drawing`.
///
/// The paragraph properties start with a `w:spacing` element so callers
/// can pin the line rule of picture paragraphs.
pub fn build_picture_paragraph(opts: &PictureOptions) -> Fragment {
    let (cx, cy) = picture_extent_emu(opts);
    let (cx, cy) = (cx.to_string(), cy.to_string());
    let id = opts.picture_id.to_string();

    let pic = XmlElement::new("pic:pic")
        .attr("xmlns:pic", NS_PIC)
        .child(
            XmlElement::new("pic:nvPicPr")
                .child(
                    XmlElement::new("pic:cNvPr")
                        .attr("id", id.as_str())
                        .attr("name", opts.file_name.as_str())
                        .attr("descr", opts.description.as_str()),
                )
                .child(XmlElement::new("pic:cNvPicPr")),
        )
        .child(
            XmlElement::new("pic:blipFill")
                .child(XmlElement::new("a:blip").attr("r:embed", opts.relationship_id.as_str()))
                .child(XmlElement::new("a:stretch").child(XmlElement::new("a:fillRect"))),
        )
        .child(
            XmlElement::new("pic:spPr")
                .child(
                    XmlElement::new("a:xfrm")
                        .child(XmlElement::new("a:off").attr("x", "0").attr("y", "0"))
                        .child(
                            XmlElement::new("a:ext")
                                .attr("cx", cx.as_str())
                                .attr("cy", cy.as_str()),
                        ),
                )
                .child(
                    XmlElement::new("a:prstGeom")
                        .attr("prst", "rect")
                        .child(XmlElement::new("a:avLst")),
                ),
        );

    let inline = XmlElement::new("wp:inline")
        .attr("distT", "0")
        .attr("distB", "0")
        .attr("distL", "0")
        .attr("distR", "0")
        .child(
            XmlElement::new("wp:extent")
                .attr("cx", cx.as_str())
                .attr("cy", cy.as_str()),
        )
        .child(
            XmlElement::new("wp:effectExtent")
                .attr("l", "0")
                .attr("t", "0")
                .attr("r", "0")
                .attr("b", "0"),
        )
        .child(
            XmlElement::new("wp:docPr")
                .attr("id", id.as_str())
                .attr("name", format!("Picture {id}"))
                .attr("descr", opts.description.as_str()),
        )
        .child(
            XmlElement::new("wp:cNvGraphicFramePr").child(
                XmlElement::new("a:graphicFrameLocks")
                    .attr("xmlns:a", NS_A)
                    .attr("noChangeAspect", "1"),
            ),
        )
        .child(
            XmlElement::new("a:graphic").attr("xmlns:a", NS_A).child(
                XmlElement::new("a:graphicData")
                    .attr("uri", NS_PIC)
                    .child(pic),
            ),
        );

    let p = XmlElement::new("w:p")
        .child(
            XmlElement::new("w:pPr")
                .child(XmlElement::new("w:spacing").attr("w:line", "240")),
        )
        .child(XmlElement::new("w:r").child(XmlElement::new("w:drawing").child(inline)));
    Fragment::from_element(p)
}
