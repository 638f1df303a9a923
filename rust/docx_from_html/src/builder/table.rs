use super::paragraph::{build_paragraph, ParagraphOptions};
use crate::css::{color_to_hex, length_to_twips};
use crate::document::DocxDocument;
use crate::node::{Element, Node};
use crate::xml::{Fragment, XmlElement};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOptions {
    /// Upper bound for the table width, in twips.
    pub maximum_width: u32,
    pub row_cant_split: bool,
}

struct Cell<'a> {
    node: &'a Node,
    el: &'a Element,
    col_span: u32,
    row_span: u32,
}

enum GridCell<'a> {
    Content(Cell<'a>),
    /// Continuation of a cell spanning rows from above.
    Merged { col_span: u32 },
}

fn span_attr(el: &Element, name: &str) -> u32 {
    el.attr(name)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(1)
}

fn collect_rows(table: &Element) -> Vec<&Element> {
    let mut rows = Vec::new();
    for child in table.element_children() {
        match child.tag.as_str() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => {
                rows.extend(child.element_children().filter(|c| c.tag == "tr"))
            }
            _ => {}
        }
    }
    rows
}

fn row_cells(row: &Element) -> Vec<Cell<'_>> {
    row.children
        .iter()
        .filter_map(|node| {
            let el = node.as_element()?;
            matches!(el.tag.as_str(), "td" | "th").then(|| Cell {
                node,
                el,
                col_span: span_attr(el, "colspan"),
                row_span: span_attr(el, "rowspan"),
            })
        })
        .collect()
}

/// Lay cells out on the grid, inserting continuation cells below every
/// `rowspan` so each row covers the same columns as the source.
fn layout_rows<'a>(rows: &[&'a Element]) -> Vec<Vec<GridCell<'a>>> {
    // column -> (col_span, rows still to cover)
    let mut carry: BTreeMap<u32, (u32, u32)> = BTreeMap::new();
    let mut out = Vec::with_capacity(rows.len());

    for row in rows {
        let mut cells = row_cells(row).into_iter();
        let mut grid = Vec::new();
        let mut col = 0;
        loop {
            if let Some((span, remaining)) = carry.get(&col).copied() {
                grid.push(GridCell::Merged { col_span: span });
                if remaining <= 1 {
                    carry.remove(&col);
                } else {
                    carry.insert(col, (span, remaining - 1));
                }
                col += span;
                continue;
            }
            let Some(cell) = cells.next() else { break };
            if cell.row_span > 1 {
                carry.insert(col, (cell.col_span, cell.row_span - 1));
            }
            col += cell.col_span;
            grid.push(GridCell::Content(cell));
        }
        // Rows that end early still owe continuation cells further right.
        let pending: Vec<u32> = carry.range(col..).map(|(c, _)| *c).collect();
        for c in pending {
            if let Some((span, remaining)) = carry.remove(&c) {
                grid.push(GridCell::Merged { col_span: span });
                if remaining > 1 {
                    carry.insert(c, (span, remaining - 1));
                }
            }
        }
        out.push(grid);
    }
    out
}

fn has_block_children(el: &Element) -> bool {
    el.element_children().any(|c| {
        matches!(
            c.tag.as_str(),
            "p" | "div" | "blockquote" | "pre" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
        )
    })
}

fn cell_xml(cell: &Cell<'_>, width: u32, doc: &mut DocxDocument) -> XmlElement {
    let mut tcpr = XmlElement::new("w:tcPr").child(
        XmlElement::new("w:tcW")
            .attr("w:w", width.to_string())
            .attr("w:type", "dxa"),
    );
    if cell.col_span > 1 {
        tcpr.push(XmlElement::new("w:gridSpan").attr("w:val", cell.col_span.to_string()));
    }
    if cell.row_span > 1 {
        tcpr.push(XmlElement::new("w:vMerge").attr("w:val", "restart"));
    }
    if let Some(fill) = cell
        .el
        .style_value("background-color")
        .and_then(color_to_hex)
    {
        tcpr.push(
            XmlElement::new("w:shd")
                .attr("w:val", "clear")
                .attr("w:color", "auto")
                .attr("w:fill", fill),
        );
    }
    if let Some(align) = cell.el.style_value("vertical-align") {
        let v = match align {
            "middle" => Some("center"),
            "bottom" => Some("bottom"),
            "top" => Some("top"),
            _ => None,
        };
        if let Some(v) = v {
            tcpr.push(XmlElement::new("w:vAlign").attr("w:val", v));
        }
    }

    let mut tc = XmlElement::new("w:tc").child(tcpr);
    let opts = ParagraphOptions::default();
    if has_block_children(cell.el) {
        for child in &cell.el.children {
            if let Some(p) = build_paragraph(Some(child), &opts, doc).iter().next() {
                tc.push(p.clone());
            }
        }
    } else {
        for p in &build_paragraph(Some(cell.node), &opts, doc) {
            tc.push(p.clone());
        }
    }
    tc
}

fn merged_cell_xml(width: u32, col_span: u32) -> XmlElement {
    let mut tcpr = XmlElement::new("w:tcPr").child(
        XmlElement::new("w:tcW")
            .attr("w:w", width.to_string())
            .attr("w:type", "dxa"),
    );
    if col_span > 1 {
        tcpr.push(XmlElement::new("w:gridSpan").attr("w:val", col_span.to_string()));
    }
    tcpr.push(XmlElement::new("w:vMerge"));
    XmlElement::new("w:tc")
        .child(tcpr)
        .child(XmlElement::new("w:p").child(XmlElement::new("w:pPr")))
}

fn borders() -> XmlElement {
    let mut b = XmlElement::new("w:tblBorders");
    for side in ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"] {
        b.push(
            XmlElement::new(side)
                .attr("w:val", "single")
                .attr("w:sz", "4")
                .attr("w:space", "0")
                .attr("w:color", "D9D9D9"),
        );
    }
    b
}

/// Build one `<w:tbl>` for a `table` node. Non-table nodes yield an empty
/// fragment.
pub fn build_table(node: &Node, opts: &TableOptions, doc: &mut DocxDocument) -> Fragment {
    let Some(table) = node.as_element().filter(|el| el.tag == "table") else {
        return Fragment::new();
    };

    let rows = collect_rows(table);
    let grid = layout_rows(&rows);
    // rows without cells are invalid markup; a table needs at least one row
    let laid_out: Vec<_> = rows
        .iter()
        .zip(grid.iter())
        .filter(|(_, cells)| !cells.is_empty())
        .collect();
    if laid_out.is_empty() {
        return Fragment::new();
    }
    let columns = laid_out
        .iter()
        .map(|(_, row)| {
            row.iter()
                .map(|c| match c {
                    GridCell::Content(cell) => cell.col_span,
                    GridCell::Merged { col_span } => *col_span,
                })
                .sum::<u32>()
        })
        .max()
        .unwrap_or(0)
        .max(1);

    let width = table
        .style_value("width")
        .and_then(|w| length_to_twips(w, opts.maximum_width))
        .map_or(opts.maximum_width, |w| w.min(opts.maximum_width));
    let column_width = width / columns;

    let mut tbl = XmlElement::new("w:tbl").child(
        XmlElement::new("w:tblPr")
            .child(
                XmlElement::new("w:tblW")
                    .attr("w:w", width.to_string())
                    .attr("w:type", "dxa"),
            )
            .child(borders())
            .child(XmlElement::new("w:tblLayout").attr("w:type", "fixed")),
    );

    let mut tbl_grid = XmlElement::new("w:tblGrid");
    for _ in 0..columns {
        tbl_grid.push(XmlElement::new("w:gridCol").attr("w:w", column_width.to_string()));
    }
    tbl.push(tbl_grid);

    for (row_el, cells) in laid_out {
        let mut tr = XmlElement::new("w:tr");
        let header = !cells.is_empty()
            && cells.iter().all(|c| match c {
                GridCell::Content(cell) => cell.el.tag == "th",
                GridCell::Merged { .. } => true,
            });
        let mut trpr = XmlElement::new("w:trPr");
        if opts.row_cant_split {
            trpr.push(XmlElement::new("w:cantSplit"));
        }
        if header && row_el.element_children().any(|c| c.tag == "th") {
            trpr.push(XmlElement::new("w:tblHeader"));
        }
        if !trpr.children.is_empty() {
            tr.push(trpr);
        }
        for cell in cells {
            match cell {
                GridCell::Content(cell) => {
                    tr.push(cell_xml(cell, column_width * cell.col_span, doc))
                }
                GridCell::Merged { col_span } => {
                    tr.push(merged_cell_xml(column_width * col_span, *col_span))
                }
            }
        }
        tbl.push(tr);
    }

    Fragment::from_element(tbl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::test_document;
    use crate::node::{parse_html, ParseOptions};

    fn first_table(html: &str) -> Node {
        fn find(nodes: &[Node]) -> Option<Node> {
            for n in nodes {
                if n.tag() == Some("table") {
                    return Some(n.clone());
                }
                if let Some(el) = n.as_element() {
                    if let Some(t) = find(&el.children) {
                        return Some(t);
                    }
                }
            }
            None
        }
        find(&parse_html(html, ParseOptions::default())).unwrap()
    }

    fn render(html: &str, cant_split: bool) -> XmlElement {
        let mut doc = test_document();
        let opts = TableOptions {
            maximum_width: 9000,
            row_cant_split: cant_split,
        };
        let frag = build_table(&first_table(html), &opts, &mut doc);
        assert_eq!(frag.len(), 1);
        frag.iter().next().unwrap().clone()
    }

    #[test]
    fn builds_grid_with_equal_columns() {
        let tbl = render(
            "<table><thead><tr><th>A</th><th>B</th></tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table>",
            false,
        );
        assert_eq!(tbl.count("w:tr"), 2);
        assert_eq!(tbl.count("w:gridCol"), 2);
        assert_eq!(tbl.find("w:gridCol").unwrap().get_attr("w:w"), Some("4500"));
        assert_eq!(tbl.count("w:tblHeader"), 1);
        assert_eq!(tbl.count("w:cantSplit"), 0);
        let xml = tbl.to_xml_string().unwrap();
        assert!(xml.contains(r#"<w:b/></w:rPr><w:t xml:space="preserve">A</w:t>"#));
    }

    #[test]
    fn rows_cannot_split_when_configured() {
        let tbl = render("<table><tr><td>1</td></tr><tr><td>2</td></tr></table>", true);
        assert_eq!(tbl.count("w:cantSplit"), 2);
    }

    #[test]
    fn spans_become_grid_span_and_vertical_merge() {
        let tbl = render(
            r#"<table>
                <tr><td rowspan="2">a</td><td colspan="2">b</td></tr>
                <tr><td>c</td><td>d</td></tr>
            </table>"#,
            false,
        );
        assert_eq!(tbl.count("w:gridCol"), 3);
        assert_eq!(tbl.count("w:gridSpan"), 1);
        assert_eq!(tbl.count("w:vMerge"), 2);
        // every row covers all three columns
        for tr in tbl.elements().filter(|e| e.name == "w:tr") {
            assert_eq!(tr.count("w:tc"), if tr.count("w:gridSpan") == 1 { 2 } else { 3 });
        }
    }

    #[test]
    fn every_cell_has_a_paragraph() {
        let tbl = render("<table><tr><td></td><td><p>x</p><p>y</p></td></tr></table>", false);
        let cells: Vec<_> = tbl.find("w:tr").unwrap().elements().filter(|e| e.name == "w:tc").collect();
        assert_eq!(cells[0].count("w:p"), 1);
        assert_eq!(cells[1].count("w:p"), 2);
    }

    #[test]
    fn rows_without_cells_are_skipped() {
        let tbl = render("<table><tr></tr><tr><td>x</td></tr><tr>  </tr></table>", false);
        assert_eq!(tbl.count("w:tr"), 1);
        for tr in tbl.elements().filter(|e| e.name == "w:tr") {
            assert!(tr.count("w:tc") > 0);
        }
    }

    #[test]
    fn tables_without_cells_produce_nothing() {
        let mut doc = test_document();
        let opts = TableOptions {
            maximum_width: 9000,
            row_cant_split: false,
        };
        for html in ["<table></table>", "<table><tr></tr><thead><tr></tr></thead></table>"] {
            assert!(build_table(&first_table(html), &opts, &mut doc).is_empty(), "{html}");
        }
    }

    #[test]
    fn non_table_nodes_produce_nothing() {
        let mut doc = test_document();
        let opts = TableOptions {
            maximum_width: 100,
            row_cant_split: false,
        };
        assert!(build_table(&Node::text("x"), &opts, &mut doc).is_empty());
    }
}
