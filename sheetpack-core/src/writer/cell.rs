//! In-place cell edits on a worksheet document

use log::trace;

use crate::address::{decode, encode, letters_to_column, split_reference};
use crate::error::{PackageError, Result};
use crate::reader::CellValue;
use crate::xml::{XmlDocument, XmlElement, XmlNode};

/// Worksheet children that come before `<sheetData>`, in schema order
const BEFORE_SHEET_DATA: &[&str] = &["sheetPr", "dimension", "sheetViews", "sheetFormatPr", "cols"];

/// Cell attributes describing the old value that must not outlive it
const VALUE_ATTRIBUTES: &[&str] = &["t", "cm", "vm"];

/// Write `value` into the cell at `reference`, creating the row and the cell
/// in order when they do not exist.
///
/// The cell keeps its style and any other attributes; all previous content
/// (value, inline string, formula) is dropped before the new content is
/// written, so repeating a call leaves exactly the same subtree. Text is always
/// written as an inline string.
///
/// Returns `true` when the cell held a formula before the write.
pub fn set_cell(worksheet: &mut XmlDocument, reference: &str, value: &CellValue) -> Result<bool> {
    let (column, row) = decode(reference)?;
    let row_number = u64::from(row) + 1;
    let canonical = encode(column, row);

    let root = &mut worksheet.root;
    widen_dimension(root, column, row);

    let sheet_data = sheet_data_mut(root)?;
    let row_el = row_mut(sheet_data, row_number)?;
    widen_spans(row_el, column + 1);
    let cell = cell_mut(row_el, column, &canonical)?;

    let formula_removed = cell.child("f").is_some();
    for attr in VALUE_ATTRIBUTES {
        cell.remove_attr(attr);
    }
    cell.children.clear();

    match value {
        CellValue::Absent => {}
        CellValue::Text(text) => {
            cell.set_attr("t", "inlineStr");
            let mut t = XmlElement::new(cell.qualified("t"));
            if needs_space_preserve(text) {
                t.set_attr("xml:space", "preserve");
            }
            t.push_text(text.as_str());
            let mut is = XmlElement::new(cell.qualified("is"));
            is.push_element(t);
            cell.push_element(is);
        }
        CellValue::Number(n) => {
            let mut v = XmlElement::new(cell.qualified("v"));
            v.push_text(n.to_string());
            cell.push_element(v);
        }
    }

    trace!("set {} = {:?}", canonical, value);
    Ok(formula_removed)
}

/// Find the cell at `reference`, if the worksheet has one
pub fn find_cell<'a>(worksheet: &'a XmlDocument, reference: &str) -> Result<Option<&'a XmlElement>> {
    let (column, row) = decode(reference)?;
    let Some(sheet_data) = worksheet.root.child("sheetData") else {
        return Ok(None);
    };

    let mut implied_row = 0u64;
    for row_el in sheet_data.children_named("row") {
        implied_row = row_el
            .attr("r")
            .and_then(|r| r.parse::<u64>().ok())
            .unwrap_or(implied_row + 1);
        if implied_row != u64::from(row) + 1 {
            continue;
        }
        let mut implied_column = 0;
        for cell in row_el.children_named("c") {
            let current = cell
                .attr("r")
                .and_then(|r| decode(r).ok())
                .map(|(c, _)| c)
                .unwrap_or(implied_column);
            if current == column {
                return Ok(Some(cell));
            }
            implied_column = current + 1;
        }
        return Ok(None);
    }
    Ok(None)
}

fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

fn element_at(children: &mut [XmlNode], index: usize) -> Result<&mut XmlElement> {
    match children.get_mut(index) {
        Some(XmlNode::Element(e)) => Ok(e),
        _ => Err(PackageError::malformed("worksheet", "element position changed during edit")),
    }
}

fn sheet_data_mut(root: &mut XmlElement) -> Result<&mut XmlElement> {
    let index = match root.child_index("sheetData") {
        Some(index) => index,
        None => {
            let insert_at = root
                .children
                .iter()
                .rposition(|node| {
                    matches!(node, XmlNode::Element(e) if BEFORE_SHEET_DATA.contains(&e.local_name()))
                })
                .map(|i| i + 1)
                .unwrap_or(0);
            let sheet_data = XmlElement::new(root.qualified("sheetData"));
            root.children.insert(insert_at, XmlNode::Element(sheet_data));
            insert_at
        }
    };
    element_at(&mut root.children, index)
}

/// Position of the row numbered `row_number`, or where it has to be inserted.
///
/// Rows are not always sorted, so the whole list is searched before falling
/// back to the first row numbered past the target.
fn locate_row(sheet_data: &XmlElement, row_number: u64) -> std::result::Result<usize, usize> {
    let mut implied = 0;
    let mut insert_at = None;
    for (index, node) in sheet_data.children.iter().enumerate() {
        let XmlNode::Element(row) = node else { continue };
        if row.local_name() != "row" {
            continue;
        }
        implied = row
            .attr("r")
            .and_then(|r| r.parse::<u64>().ok())
            .unwrap_or(implied + 1);
        if implied == row_number {
            return Ok(index);
        }
        if implied > row_number && insert_at.is_none() {
            insert_at = Some(index);
        }
    }
    Err(insert_at.unwrap_or(sheet_data.children.len()))
}

fn row_mut(sheet_data: &mut XmlElement, row_number: u64) -> Result<&mut XmlElement> {
    let index = match locate_row(sheet_data, row_number) {
        Ok(index) => index,
        Err(insert_at) => {
            let row = XmlElement::new(sheet_data.qualified("row")).with_attr("r", row_number.to_string());
            sheet_data.children.insert(insert_at, XmlNode::Element(row));
            insert_at
        }
    };
    let row = element_at(&mut sheet_data.children, index)?;
    if row.attr("r").is_none() {
        row.set_attr("r", row_number.to_string());
    }
    Ok(row)
}

fn locate_cell(row: &XmlElement, column: u32) -> std::result::Result<usize, usize> {
    let mut implied = 0;
    let mut insert_at = None;
    for (index, node) in row.children.iter().enumerate() {
        let XmlNode::Element(cell) = node else { continue };
        if cell.local_name() != "c" {
            continue;
        }
        let current = cell
            .attr("r")
            .and_then(|r| decode(r).ok())
            .map(|(c, _)| c)
            .unwrap_or(implied);
        if current == column {
            return Ok(index);
        }
        if current > column && insert_at.is_none() {
            insert_at = Some(index);
        }
        implied = current.saturating_add(1);
    }
    if let Some(index) = insert_at {
        return Err(index);
    }
    // New cells go before any trailing non-cell children such as <extLst>
    let end = row
        .children
        .iter()
        .rposition(|node| matches!(node, XmlNode::Element(e) if e.local_name() == "c"))
        .map(|i| i + 1)
        .unwrap_or(0);
    Err(end)
}

fn cell_mut<'a>(row: &'a mut XmlElement, column: u32, reference: &str) -> Result<&'a mut XmlElement> {
    let index = match locate_cell(row, column) {
        Ok(index) => index,
        Err(insert_at) => {
            let cell = XmlElement::new(row.qualified("c")).with_attr("r", reference);
            row.children.insert(insert_at, XmlNode::Element(cell));
            insert_at
        }
    };
    let cell = element_at(&mut row.children, index)?;
    if cell.attr("r").is_none() {
        cell.set_attr("r", reference);
    }
    Ok(cell)
}

/// Widen a single-range `spans="a:b"` attribute to include `column_number`
fn widen_spans(row: &mut XmlElement, column_number: u32) {
    let Some(spans) = row.attr("spans") else { return };
    let Some((first, last)) = spans.split_once(':') else { return };
    let (Ok(first), Ok(last)) = (first.parse::<u32>(), last.parse::<u32>()) else {
        return;
    };
    if column_number < first || column_number > last {
        let widened = format!("{}:{}", first.min(column_number), last.max(column_number));
        row.set_attr("spans", widened);
    }
}

fn parse_corner(reference: &str) -> Option<(u32, u32)> {
    let cleaned = reference.replace('$', "");
    let (letters, digits) = split_reference(&cleaned)?;
    let column = letters_to_column(letters)?;
    let row = digits.parse::<u64>().ok()?.checked_sub(1)?;
    Some((column, u32::try_from(row).ok()?))
}

/// Widen `<dimension ref>` so it covers the written cell
fn widen_dimension(root: &mut XmlElement, column: u32, row: u32) {
    let Some(dimension) = root.child_mut("dimension") else { return };
    let Some(range) = dimension.attr("ref") else { return };
    let (start, end) = range.split_once(':').unwrap_or((range, range));
    let (Some((c1, r1)), Some((c2, r2))) = (parse_corner(start), parse_corner(end)) else {
        return;
    };
    let (min_c, min_r) = (c1.min(c2).min(column), r1.min(r2).min(row));
    let (max_c, max_r) = (c1.max(c2).max(column), r1.max(r2).max(row));
    if (min_c, min_r, max_c, max_r) == (c1.min(c2), r1.min(r2), c1.max(c2), r1.max(r2)) {
        return;
    }
    let widened = if (min_c, min_r) == (max_c, max_r) {
        encode(min_c, min_r)
    } else {
        format!("{}:{}", encode(min_c, min_r), encode(max_c, max_r))
    };
    dimension.set_attr("ref", widened);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{SharedStringTable, read_cell};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn sheet(body: &str) -> XmlDocument {
        let xml = format!(
            r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">{}</worksheet>"#,
            body
        );
        XmlDocument::parse("sheet.xml", xml.as_bytes()).unwrap()
    }

    fn dec(text: &str) -> CellValue {
        CellValue::Number(text.parse::<Decimal>().unwrap())
    }

    fn cell_xml(doc: &XmlDocument, reference: &str) -> String {
        let cell = find_cell(doc, reference).unwrap().unwrap().clone();
        let bytes = XmlDocument { declaration: None, root: cell }.to_bytes("c").unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_number_keeps_style_and_replaces_content() {
        let mut doc = sheet(r#"<sheetData><row r="13"><c r="H13" s="7" t="s"><v>2</v></c></row></sheetData>"#);
        let removed = set_cell(&mut doc, "H13", &dec("125000.00")).unwrap();
        assert!(!removed);
        assert_eq!(cell_xml(&doc, "H13"), r#"<c r="H13" s="7"><v>125000.00</v></c>"#);

        let back = read_cell(find_cell(&doc, "H13").unwrap().unwrap(), &SharedStringTable::default()).unwrap();
        assert_eq!(back.as_decimal().unwrap().to_string(), "125000.00");
    }

    #[test]
    fn test_text_is_written_inline() {
        let mut doc = sheet(r#"<sheetData><row r="1"><c r="A1" s="2"><f>B1*2</f><v>4</v></c></row></sheetData>"#);
        let removed = set_cell(&mut doc, "A1", &CellValue::text(" Hà Nội & co ")).unwrap();
        assert!(removed);
        assert_eq!(
            cell_xml(&doc, "A1"),
            r#"<c r="A1" s="2" t="inlineStr"><is><t xml:space="preserve"> Hà Nội &amp; co </t></is></c>"#
        );
    }

    #[test]
    fn test_set_cell_is_idempotent() {
        let mut doc = sheet(r#"<sheetData><row r="2"><c r="B2" s="5"/></row></sheetData>"#);
        for _ in 0..2 {
            set_cell(&mut doc, "B2", &CellValue::text("x")).unwrap();
        }
        let cell = find_cell(&doc, "B2").unwrap().unwrap();
        assert_eq!(cell.children.len(), 1);
        assert_eq!(cell.attr("s"), Some("5"));
        assert_eq!(cell.attributes.len(), 3);

        for _ in 0..2 {
            set_cell(&mut doc, "B2", &dec("1.5")).unwrap();
        }
        let cell = find_cell(&doc, "B2").unwrap().unwrap();
        assert_eq!(cell.children.len(), 1);
        assert_eq!(cell.attr("t"), None);
    }

    #[test]
    fn test_absent_clears_but_keeps_cell() {
        let mut doc = sheet(r#"<sheetData><row r="3"><c r="C3" s="9" t="inlineStr"><is><t>old</t></is></c></row></sheetData>"#);
        set_cell(&mut doc, "C3", &CellValue::Absent).unwrap();
        assert_eq!(cell_xml(&doc, "C3"), r#"<c r="C3" s="9"/>"#);
    }

    #[test]
    fn test_rows_and_cells_are_inserted_in_order() {
        let mut doc = sheet(r#"<sheetData><row r="2"><c r="B2"><v>1</v></c><c r="D2"><v>2</v></c></row><row r="5"/></sheetData>"#);
        set_cell(&mut doc, "C2", &dec("3")).unwrap();
        set_cell(&mut doc, "A2", &dec("0")).unwrap();
        set_cell(&mut doc, "E2", &dec("4")).unwrap();
        set_cell(&mut doc, "A4", &dec("9")).unwrap();
        set_cell(&mut doc, "A9", &dec("9")).unwrap();
        set_cell(&mut doc, "a1", &dec("9")).unwrap();

        let data = doc.root.child("sheetData").unwrap();
        let rows: Vec<_> = data.children_named("row").map(|r| r.attr("r").unwrap()).collect();
        assert_eq!(rows, vec!["1", "2", "4", "5", "9"]);
        let row2 = data.children_named("row").nth(1).unwrap();
        let cells: Vec<_> = row2.children_named("c").map(|c| c.attr("r").unwrap()).collect();
        assert_eq!(cells, vec!["A2", "B2", "C2", "D2", "E2"]);
        assert!(find_cell(&doc, "A1").unwrap().is_some());
    }

    #[test]
    fn test_unsorted_rows_and_cells_are_edited_in_place() {
        let mut doc = sheet(
            r#"<sheetData><row r="5"><c r="A5"><v>1</v></c></row><row r="3"><c r="D3"><v>2</v></c><c r="C3" s="4"><v>7</v></c></row></sheetData>"#,
        );
        set_cell(&mut doc, "C3", &dec("9")).unwrap();
        set_cell(&mut doc, "D3", &dec("8")).unwrap();
        set_cell(&mut doc, "B3", &dec("6")).unwrap();
        set_cell(&mut doc, "A4", &dec("5")).unwrap();

        let data = doc.root.child("sheetData").unwrap();
        let rows: Vec<_> = data.children_named("row").map(|r| r.attr("r").unwrap()).collect();
        assert_eq!(rows, vec!["4", "5", "3"]);
        let row3 = data.children_named("row").find(|r| r.attr("r") == Some("3")).unwrap();
        let cells: Vec<_> = row3.children_named("c").map(|c| c.attr("r").unwrap()).collect();
        assert_eq!(cells, vec!["B3", "D3", "C3"]);
        assert_eq!(cell_xml(&doc, "C3"), r#"<c r="C3" s="4"><v>9</v></c>"#);
        assert_eq!(cell_xml(&doc, "D3"), r#"<c r="D3"><v>8</v></c>"#);
    }

    #[test]
    fn test_last_row_of_the_range() {
        let mut doc = sheet("<sheetData/>");
        set_cell(&mut doc, "A4294967296", &dec("1")).unwrap();
        assert!(find_cell(&doc, "A4294967296").unwrap().is_some());
    }

    #[test]
    fn test_sheet_data_is_created_in_schema_order() {
        let mut doc = sheet(r#"<dimension ref="A1"/><sheetViews><sheetView workbookViewId="0"/></sheetViews><pageMargins left="0.7"/>"#);
        set_cell(&mut doc, "B2", &dec("1")).unwrap();
        let order: Vec<_> = doc.root.elements().map(|e| e.local_name().to_string()).collect();
        assert_eq!(order, vec!["dimension", "sheetViews", "sheetData", "pageMargins"]);
    }

    #[test]
    fn test_dimension_and_spans_are_widened() {
        let mut doc = sheet(r#"<dimension ref="A1:C5"/><sheetData><row r="5" spans="1:3"><c r="A5"><v>1</v></c></row></sheetData>"#);
        set_cell(&mut doc, "B2", &dec("1")).unwrap();
        assert_eq!(doc.root.child("dimension").unwrap().attr("ref"), Some("A1:C5"));

        set_cell(&mut doc, "H5", &dec("1")).unwrap();
        set_cell(&mut doc, "B13", &dec("1")).unwrap();
        assert_eq!(doc.root.child("dimension").unwrap().attr("ref"), Some("A1:H13"));
        let row5 = doc
            .root
            .child("sheetData")
            .unwrap()
            .children_named("row")
            .find(|r| r.attr("r") == Some("5"))
            .unwrap();
        assert_eq!(row5.attr("spans"), Some("1:8"));
    }

    #[test]
    fn test_prefixed_worksheet() {
        let xml = r#"<x:worksheet xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><x:sheetData/></x:worksheet>"#;
        let mut doc = XmlDocument::parse("sheet.xml", xml.as_bytes()).unwrap();
        set_cell(&mut doc, "A1", &CellValue::text("v")).unwrap();
        let bytes = doc.to_bytes("sheet.xml").unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#"<x:row r="1"><x:c r="A1" t="inlineStr"><x:is><x:t>v</x:t></x:is></x:c></x:row>"#));
    }

    #[test]
    fn test_malformed_reference_is_an_error() {
        let mut doc = sheet("<sheetData/>");
        assert!(set_cell(&mut doc, "1A", &CellValue::Absent).is_err());
    }
}
