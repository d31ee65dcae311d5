//! Workbook-level edits that accompany cell writes and sheet changes

use std::io::{Read, Seek};

use log::debug;

use super::clone::SheetAllocator;
use crate::error::{PackageError, Result};
use crate::package::{Package, RelationshipKind, SheetDescriptor, rels_path_for, sheet_relationship_attr};
use crate::xml::{XmlElement, XmlNode};

/// Workbook children that come before `<calcPr>`, in schema order
const BEFORE_CALC_PR: &[&str] = &[
    "fileVersion",
    "fileSharing",
    "workbookPr",
    "workbookProtection",
    "bookViews",
    "sheets",
    "functionGroups",
    "externalReferences",
    "definedNames",
];

/// Remove `tabSelected` from every sheet view of a worksheet. The part is only
/// rewritten when something changed.
pub fn clear_tab_selected<R: Read + Seek>(package: &mut Package<R>, part: &str) -> Result<bool> {
    let selected = package
        .document(part)?
        .root
        .child("sheetViews")
        .is_some_and(|views| views.children_named("sheetView").any(|v| v.attr("tabSelected").is_some()));
    if !selected {
        return Ok(false);
    }
    let doc = package.document_mut(part)?;
    if let Some(views) = doc.root.child_mut("sheetViews") {
        for view in views.elements_mut() {
            view.remove_attr("tabSelected");
        }
    }
    Ok(true)
}

/// Ask the spreadsheet application to recalculate everything when the file is
/// opened, so formulas depending on written cells are refreshed
pub fn request_full_recalc<R: Read + Seek>(package: &mut Package<R>) -> Result<()> {
    let workbook = package.workbook_part()?;
    let already = package
        .document(&workbook)?
        .root
        .child("calcPr")
        .is_some_and(|calc| calc.attr("fullCalcOnLoad") == Some("1"));
    if already {
        return Ok(());
    }

    let root = &mut package.document_mut(&workbook)?.root;
    match root.child_mut("calcPr") {
        Some(calc) => calc.set_attr("fullCalcOnLoad", "1"),
        None => {
            let insert_at = root
                .children
                .iter()
                .rposition(|node| matches!(node, XmlNode::Element(e) if BEFORE_CALC_PR.contains(&e.local_name())))
                .map(|i| i + 1)
                .unwrap_or(root.children.len());
            let calc = XmlElement::new(root.qualified("calcPr")).with_attr("fullCalcOnLoad", "1");
            root.children.insert(insert_at, XmlNode::Element(calc));
        }
    }
    debug!("{}: full recalculation on load requested", workbook);
    Ok(())
}

/// Drop the calculation chain part, its relationship and its content type.
///
/// The chain lists formula cells; once a formula has been overwritten the
/// stale chain makes spreadsheet applications report the file as damaged.
pub fn drop_calc_chain<R: Read + Seek>(package: &mut Package<R>) -> Result<bool> {
    let workbook = package.workbook_part()?;
    let Some(rel) = package.relationship_of_kind(&workbook, RelationshipKind::CalcChain)? else {
        return Ok(false);
    };
    package.remove_relationship(&workbook, &rel.id)?;
    package.remove_override(&rel.target)?;
    package.remove_part(&rel.target);
    debug!("dropped calculation chain {}", rel.target);
    Ok(true)
}

fn local_sheet_id(el: &XmlElement) -> Option<usize> {
    el.attr("localSheetId").and_then(|id| id.parse().ok())
}

/// Remove a sheet from the workbook together with its relationship, content
/// type override, worksheet part and worksheet relationships.
///
/// Sheet-scoped defined names of the removed sheet are dropped and the
/// remaining `localSheetId`, `activeTab` and `firstSheet` indexes are shifted.
/// Parts the worksheet pointed to (drawings and the like) stay, since clones
/// may share them.
pub fn remove_sheet<R: Read + Seek>(
    package: &mut Package<R>,
    allocator: &mut SheetAllocator,
    sheet: &SheetDescriptor,
) -> Result<()> {
    let workbook = package.workbook_part()?;
    let doc = package.document_mut(&workbook)?;

    // 1. Remove the <sheet> entry
    let sheets = doc
        .root
        .child_mut("sheets")
        .ok_or_else(|| PackageError::malformed(&workbook, "no <sheets> element"))?;
    let is_target = |el: &XmlElement| {
        el.local_name() == "sheet"
            && sheet_relationship_attr(el).map(|(_, id)| id) == Some(sheet.relationship_id.as_str())
    };
    let count = sheets.children_named("sheet").count();
    let position = sheets
        .children_named("sheet")
        .position(is_target)
        .ok_or_else(|| PackageError::malformed(&workbook, format!("sheet '{}' is not declared", sheet.name)))?;
    if count == 1 {
        return Err(PackageError::malformed(&workbook, "cannot remove the only sheet"));
    }
    sheets.retain_elements(|el| !is_target(el));
    let remaining = count - 1;

    // 2. Fix sheet-scoped defined names
    if let Some(names) = doc.root.child_mut("definedNames") {
        names.retain_elements(|el| local_sheet_id(el) != Some(position));
        for el in names.elements_mut() {
            if let Some(id) = local_sheet_id(el) {
                if id > position {
                    el.set_attr("localSheetId", (id - 1).to_string());
                }
            }
        }
    }
    doc.root
        .retain_elements(|el| !(el.local_name() == "definedNames" && el.elements().next().is_none()));

    // 3. Keep workbook views pointing at existing tabs
    if let Some(views) = doc.root.child_mut("bookViews") {
        for view in views.elements_mut() {
            for key in ["activeTab", "firstSheet"] {
                let Some(index) = view.attr(key).and_then(|v| v.parse::<usize>().ok()) else {
                    continue;
                };
                let shifted = if index > position { index - 1 } else { index };
                let shifted = shifted.min(remaining - 1);
                if shifted != index {
                    view.set_attr(key, shifted.to_string());
                }
            }
        }
    }

    // 4. Relationship, content type and parts
    package.remove_relationship(&workbook, &sheet.relationship_id)?;
    package.remove_override(&sheet.part)?;
    package.remove_part(&sheet.part);
    let rels = rels_path_for(&sheet.part);
    if package.has_part(&rels) {
        package.remove_part(&rels);
    }
    allocator.release_name(&sheet.name);

    debug!("removed sheet '{}' ({})", sheet.name, sheet.part);
    Ok(())
}
